//! Property-based tests for the charge allocation engine.
//!
//! - Property 1: FIFO order
//! - Property 2: Conservation of quantity and charges
//! - Property 3: Cancellation inverse
//! - Property 4: Layer bounds under mixed sales, returns and cancellations

use landed_shared::{ChargesConfig, ReturnRestorePolicy};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::memory::InMemoryChargeLedger;
use super::service::ChargeAllocationService;
use super::types::{
    AdditionRequest, ChargeLedgerEntry, ChargeType, ConsumptionRequest, DocumentRef, EntryType,
};

/// Strategy to generate layer quantities (1 to 500 units).
fn layer_qty() -> impl Strategy<Value = Decimal> {
    (1i64..500i64).prop_map(Decimal::from)
}

/// Strategy to generate layer charges (0.00 to 100,000.00).
fn layer_charges() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate up to five cost layers.
fn layers() -> impl Strategy<Value = Vec<(Decimal, Decimal)>> {
    prop::collection::vec((layer_qty(), layer_charges()), 1..6)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn seeded(layers: &[(Decimal, Decimal)]) -> ChargeAllocationService<InMemoryChargeLedger> {
    seeded_with(layers, ReturnRestorePolicy::FirstSource).await
}

async fn seeded_with(
    layers: &[(Decimal, Decimal)],
    policy: ReturnRestorePolicy,
) -> ChargeAllocationService<InMemoryChargeLedger> {
    let service = ChargeAllocationService::with_config(
        InMemoryChargeLedger::new(),
        &ChargesConfig {
            precision: 2,
            return_restore_policy: policy,
        },
    );
    for (i, (qty, charges)) in layers.iter().enumerate() {
        service
            .add_charges(AdditionRequest {
                item_code: "ITEM-001".to_string(),
                charge_type: ChargeType::ImportCharges,
                qty: *qty,
                charges: *charges,
                reference: DocumentRef::new("ImportDoc", format!("IMP-{i:04}")),
            })
            .await
            .unwrap();
    }
    service
}

fn sale(qty: Decimal, invoice: &str) -> ConsumptionRequest {
    ConsumptionRequest {
        item_code: "ITEM-001".to_string(),
        charge_type: ChargeType::ImportCharges,
        qty,
        reference: DocumentRef::new("Sales Invoice", invoice),
    }
}

/// One step of a sales history over a single pool.
#[derive(Debug, Clone)]
enum Step {
    Sell { percent: u32, invoice: usize },
    Return { percent: u32, invoice: usize },
    CancelSale { invoice: usize },
    CancelReturn { invoice: usize },
}

/// Strategy to generate up to twelve steps over three invoices of each kind.
fn steps() -> impl Strategy<Value = Vec<Step>> {
    let step = prop_oneof![
        3 => (1u32..=60, 0usize..3).prop_map(|(percent, invoice)| Step::Sell { percent, invoice }),
        3 => (1u32..=60, 0usize..3).prop_map(|(percent, invoice)| Step::Return { percent, invoice }),
        1 => (0usize..3).prop_map(|invoice| Step::CancelSale { invoice }),
        1 => (0usize..3).prop_map(|invoice| Step::CancelReturn { invoice }),
    ];
    prop::collection::vec(step, 1..12)
}

fn policy() -> impl Strategy<Value = ReturnRestorePolicy> {
    prop_oneof![
        Just(ReturnRestorePolicy::FirstSource),
        Just(ReturnRestorePolicy::Proportional),
    ]
}

async fn additions(service: &ChargeAllocationService<InMemoryChargeLedger>) -> Vec<ChargeLedgerEntry> {
    service
        .store()
        .entries()
        .await
        .into_iter()
        .filter(|e| e.entry_type == EntryType::Addition)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: FIFO order
    // =========================================================================

    /// Property 1.1: A layer is only touched once every older layer is drained.
    #[test]
    fn prop_fifo_order(layers in layers(), fraction in 1u32..=100) {
        runtime().block_on(async {
            let total: Decimal = layers.iter().map(|(q, _)| *q).sum();
            let qty = (total * Decimal::from(fraction) / Decimal::ONE_HUNDRED).ceil().max(Decimal::ONE);
            let service = seeded(&layers).await;

            service.allocate_charges(sale(qty, "SINV-0001")).await.unwrap();

            let after = additions(&service).await;
            let mut seen_untouched = false;
            for layer in &after {
                let touched = layer.remaining_qty < layer.qty;
                prop_assert!(!(touched && seen_untouched), "younger layer drawn before older one");
                if layer.remaining_qty > Decimal::ZERO {
                    seen_untouched = true;
                }
            }
            Ok(())
        })?;
    }

    // =========================================================================
    // Property 2: Conservation
    // =========================================================================

    /// Property 2.1: Drawn plus remaining equals what was added, and no
    /// layer goes negative.
    #[test]
    fn prop_allocation_conserves(layers in layers(), fraction in 1u32..=100) {
        runtime().block_on(async {
            let total_qty: Decimal = layers.iter().map(|(q, _)| *q).sum();
            let total_charges: Decimal = layers.iter().map(|(_, c)| *c).sum();
            let qty = (total_qty * Decimal::from(fraction) / Decimal::ONE_HUNDRED).ceil().max(Decimal::ONE);
            let service = seeded(&layers).await;

            let outcome = service.allocate_charges(sale(qty, "SINV-0001")).await.unwrap();

            let after = additions(&service).await;
            let remaining_qty: Decimal = after.iter().map(|l| l.remaining_qty).sum();
            let remaining_charges: Decimal = after.iter().map(|l| l.remaining_charges).sum();

            prop_assert_eq!(outcome.entry.qty, qty);
            prop_assert_eq!(remaining_qty + outcome.entry.qty, total_qty);
            prop_assert_eq!(remaining_charges + outcome.entry.charges, total_charges);
            for layer in &after {
                prop_assert!(layer.remaining_qty >= Decimal::ZERO);
                prop_assert!(layer.remaining_charges >= Decimal::ZERO);
                prop_assert!(layer.remaining_qty <= layer.qty);
                prop_assert!(layer.remaining_charges <= layer.charges);
            }
            Ok(())
        })?;
    }

    /// Property 2.2: Over-requests fail and leave every layer as it was.
    #[test]
    fn prop_insufficient_is_atomic(layers in layers(), extra in 1i64..100) {
        runtime().block_on(async {
            let total_qty: Decimal = layers.iter().map(|(q, _)| *q).sum();
            let service = seeded(&layers).await;
            let before = service.store().entries().await;

            let result = service
                .allocate_charges(sale(total_qty + Decimal::from(extra), "SINV-0001"))
                .await;

            prop_assert!(result.is_err());
            prop_assert_eq!(service.store().entries().await, before);
            Ok(())
        })?;
    }

    // =========================================================================
    // Property 3: Cancellation inverse
    // =========================================================================

    /// Property 3.1: Allocating then cancelling restores every layer exactly.
    #[test]
    fn prop_cancellation_inverse(
        layers in layers(),
        fractions in prop::collection::vec(1u32..=40, 1..4),
    ) {
        runtime().block_on(async {
            let total_qty: Decimal = layers.iter().map(|(q, _)| *q).sum();
            let service = seeded(&layers).await;
            let before = additions(&service).await;

            for (i, fraction) in fractions.iter().enumerate() {
                let qty = (total_qty * Decimal::from(*fraction) / Decimal::ONE_HUNDRED).floor();
                if qty > Decimal::ZERO {
                    // later requests may run dry; only successful ones matter
                    let _ = service
                        .allocate_charges(sale(qty, if i % 2 == 0 { "SINV-A" } else { "SINV-B" }))
                        .await;
                }
            }

            service.cancel_allocations("SINV-A").await.unwrap();
            service.cancel_allocations("SINV-B").await.unwrap();

            prop_assert_eq!(additions(&service).await, before);
            Ok(())
        })?;
    }

    // =========================================================================
    // Property 4: Layer bounds
    // =========================================================================

    /// Property 4.1: No layer ever holds more than it was created with, or
    /// less than nothing, whatever mix of sales, returns and cancellations
    /// runs against it. Cancelling every sale afterwards restores every
    /// layer exactly.
    #[test]
    fn prop_layers_stay_within_bounds(layers in layers(), steps in steps(), policy in policy()) {
        runtime().block_on(async {
            let total_qty: Decimal = layers.iter().map(|(q, _)| *q).sum();
            let service = seeded_with(&layers, policy).await;
            let before = additions(&service).await;
            let qty_of = |percent: u32| {
                (total_qty * Decimal::from(percent) / Decimal::ONE_HUNDRED)
                    .floor()
                    .max(Decimal::ONE)
            };

            for step in &steps {
                // rejected steps must leave the ledger consistent too
                let _ = match step {
                    Step::Sell { percent, invoice } => service
                        .allocate_charges(sale(qty_of(*percent), &format!("SINV-{invoice}")))
                        .await
                        .map(|_| ()),
                    Step::Return { percent, invoice } => service
                        .return_charges(sale(qty_of(*percent), &format!("SRET-{invoice}")))
                        .await
                        .map(|_| ()),
                    Step::CancelSale { invoice } => service
                        .cancel_allocations(&format!("SINV-{invoice}"))
                        .await
                        .map(|_| ()),
                    Step::CancelReturn { invoice } => service
                        .cancel_returns(&format!("SRET-{invoice}"))
                        .await
                        .map(|_| ()),
                };

                for layer in additions(&service).await {
                    prop_assert!(layer.remaining_qty >= Decimal::ZERO, "{step:?}: {layer:?}");
                    prop_assert!(layer.remaining_charges >= Decimal::ZERO, "{step:?}: {layer:?}");
                    prop_assert!(layer.remaining_qty <= layer.qty, "{step:?}: {layer:?}");
                    prop_assert!(layer.remaining_charges <= layer.charges, "{step:?}: {layer:?}");
                }
            }

            for invoice in 0..3 {
                service.cancel_allocations(&format!("SINV-{invoice}")).await.unwrap();
            }
            prop_assert_eq!(additions(&service).await, before);
            Ok(())
        })?;
    }
}
