//! FIFO cost-layer matching.
//!
//! Pure planning functions: they look at entries already loaded (and
//! locked) by the service and decide what to draw or restore. Nothing here
//! touches a store, so a failed plan leaves every layer untouched.

use landed_shared::ReturnRestorePolicy;
use landed_shared::types::{ChargeEntryId, round_amount};
use rust_decimal::Decimal;

use super::error::ChargeError;
use super::types::{ChargeLedgerEntry, ConsumptionRequest, SourceReference};
use crate::apportion;

/// Quantity and charges moved to or from one cost layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerMovement {
    /// The Addition entry.
    pub source_entry: ChargeEntryId,
    /// Quantity moved.
    pub qty: Decimal,
    /// Charges moved.
    pub charges: Decimal,
}

impl From<&LayerMovement> for SourceReference {
    fn from(movement: &LayerMovement) -> Self {
        Self {
            source_entry: movement.source_entry,
            allocated_qty: movement.qty,
            allocated_charges: movement.charges,
        }
    }
}

/// Draws decided for one allocation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    /// One draw per touched layer, FIFO order.
    pub draws: Vec<LayerMovement>,
    /// Total quantity drawn.
    pub total_qty: Decimal,
    /// Total charges drawn.
    pub total_charges: Decimal,
}

/// Plans a FIFO allocation over `sources`.
///
/// `sources` must be the open layers of the request's pool, oldest first.
/// Each layer gives `min(remaining_qty, still_needed)` at its current unit
/// charge `remaining_charges / remaining_qty`; the drawn charges are rounded
/// to `precision`, and draining a layer takes all of its remaining charges.
///
/// # Errors
///
/// Returns `ChargeError::InsufficientChargeLayers` when the layers hold
/// less quantity than requested.
pub fn plan_allocation(
    request: &ConsumptionRequest,
    sources: &[ChargeLedgerEntry],
    precision: u32,
) -> Result<AllocationPlan, ChargeError> {
    let mut draws = Vec::new();
    let mut total_qty = Decimal::ZERO;
    let mut total_charges = Decimal::ZERO;

    for source in sources {
        if total_qty >= request.qty {
            break;
        }
        if source.remaining_qty <= Decimal::ZERO {
            continue;
        }

        let take = source.remaining_qty.min(request.qty - total_qty);
        let charges = if take == source.remaining_qty {
            source.remaining_charges
        } else {
            round_amount(source.remaining_charges * take / source.remaining_qty, precision)
                .min(source.remaining_charges)
        };

        draws.push(LayerMovement {
            source_entry: source.id,
            qty: take,
            charges,
        });
        total_qty += take;
        total_charges += charges;
    }

    if total_qty < request.qty {
        return Err(ChargeError::InsufficientChargeLayers {
            item_code: request.item_code.clone(),
            charge_type: request.charge_type,
            requested: request.qty,
            available: total_qty,
        });
    }

    Ok(AllocationPlan {
        draws,
        total_qty,
        total_charges,
    })
}

/// Restorations decided for one return request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPlan {
    /// Charges given back, the sum of the restorations.
    pub charges: Decimal,
    /// Where the quantity and charges go back to.
    pub restorations: Vec<LayerMovement>,
}

/// What `reversed` still holds per source layer once the live `returns`
/// against it are netted out.
///
/// Entries of `returns` that are cancelled or reverse another allocation
/// are ignored. Amounts never go below zero.
#[must_use]
pub fn outstanding_sources(
    reversed: &ChargeLedgerEntry,
    returns: &[ChargeLedgerEntry],
) -> Vec<LayerMovement> {
    let live: Vec<&ChargeLedgerEntry> = returns
        .iter()
        .filter(|r| !r.is_cancelled && r.reverses == Some(reversed.id))
        .collect();

    reversed
        .source_references
        .iter()
        .map(|source| {
            let (qty, charges) = live
                .iter()
                .flat_map(|r| r.source_references.iter())
                .filter(|r| r.source_entry == source.source_entry)
                .fold((Decimal::ZERO, Decimal::ZERO), |(q, c), r| {
                    (q + r.allocated_qty, c + r.allocated_charges)
                });
            LayerMovement {
                source_entry: source.source_entry,
                qty: (source.allocated_qty - qty).max(Decimal::ZERO),
                charges: (source.allocated_charges - charges).max(Decimal::ZERO),
            }
        })
        .collect()
}

/// Plans a return of `qty` against `reversed`.
///
/// `outstanding` is what the allocation still holds per source layer (see
/// [`outstanding_sources`]). The returned charges are
/// `reversed.charges / reversed.qty * qty` rounded to `precision`; giving
/// back everything still outstanding gives back exactly the outstanding
/// charges. No layer ever gets back more quantity or charges than the
/// allocation drew from it.
///
/// # Errors
///
/// Returns `ChargeError::Validation` when the allocation has no quantity or
/// no source references, or when `qty` exceeds what is still returnable.
pub fn plan_return(
    reversed: &ChargeLedgerEntry,
    outstanding: &[LayerMovement],
    qty: Decimal,
    precision: u32,
    policy: ReturnRestorePolicy,
) -> Result<ReturnPlan, ChargeError> {
    if reversed.qty <= Decimal::ZERO {
        return Err(ChargeError::Validation(format!(
            "Allocation {} has no quantity to price a return against",
            reversed.id
        )));
    }
    if outstanding.is_empty() {
        return Err(ChargeError::Validation(format!(
            "Allocation {} has no source references",
            reversed.id
        )));
    }
    if qty <= Decimal::ZERO {
        return Err(ChargeError::Validation(format!(
            "qty must be positive, got {qty}"
        )));
    }

    let returnable: Decimal = outstanding.iter().map(|m| m.qty).sum();
    if qty > returnable {
        return Err(ChargeError::Validation(format!(
            "Return qty {qty} exceeds {returnable} still returnable on allocation {}",
            reversed.id
        )));
    }

    let qty_caps: Vec<Decimal> = outstanding.iter().map(|m| m.qty).collect();
    let mut qty_parts = match policy {
        ReturnRestorePolicy::FirstSource => {
            let mut parts = vec![Decimal::ZERO; outstanding.len()];
            parts[0] = qty;
            parts
        }
        ReturnRestorePolicy::Proportional => {
            let qty_scale = qty_caps
                .iter()
                .map(Decimal::scale)
                .chain(std::iter::once(qty.scale()))
                .max()
                .unwrap_or(0);
            apportion::by_weights(qty, &qty_caps, qty_scale)
        }
    };
    cap_and_spill(&mut qty_parts, &qty_caps);

    let charge_parts: Vec<Decimal> = if qty == returnable {
        outstanding.iter().map(|m| m.charges).collect()
    } else {
        let charge_caps: Vec<Decimal> = outstanding
            .iter()
            .zip(&qty_parts)
            .map(|(m, part)| if part.is_zero() { Decimal::ZERO } else { m.charges })
            .collect();
        let ceiling: Decimal = charge_caps.iter().copied().sum();
        let priced = round_amount(reversed.charges * qty / reversed.qty, precision).min(ceiling);
        let mut parts = apportion::by_weights(priced, &qty_parts, precision);
        cap_and_spill(&mut parts, &charge_caps);
        parts
    };

    let restorations: Vec<LayerMovement> = outstanding
        .iter()
        .zip(qty_parts.into_iter().zip(charge_parts))
        .filter(|(_, (part_qty, part_charges))| {
            !part_qty.is_zero() || !part_charges.is_zero()
        })
        .map(|(source, (part_qty, part_charges))| LayerMovement {
            source_entry: source.source_entry,
            qty: part_qty,
            charges: part_charges,
        })
        .collect();

    Ok(ReturnPlan {
        charges: restorations.iter().map(|m| m.charges).sum(),
        restorations,
    })
}

/// Caps every part at its cap and moves the excess, in order, onto parts
/// that still have room.
fn cap_and_spill(parts: &mut [Decimal], caps: &[Decimal]) {
    let mut excess = Decimal::ZERO;
    for (part, cap) in parts.iter_mut().zip(caps) {
        if *part > *cap {
            excess += *part - *cap;
            *part = *cap;
        }
    }
    for (part, cap) in parts.iter_mut().zip(caps) {
        if excess <= Decimal::ZERO {
            break;
        }
        let room = *cap - *part;
        if room > Decimal::ZERO {
            let add = room.min(excess);
            *part += add;
            excess -= add;
        }
    }
}
