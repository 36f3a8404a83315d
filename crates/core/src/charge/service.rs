//! Charge allocation engine.
//!
//! Every primitive opens one store transaction, does all of its reads and
//! writes inside it and commits at the end. Cost layers are read with
//! `for_update` so concurrent allocations of the same pool queue behind
//! each other instead of over-drawing a layer.
//!
//! The `*_with_journal` variants also post a journal voucher built from
//! the outcome before committing. A posting failure drops the transaction,
//! so the ledger and the GL never disagree about an item. The `*_all_*`
//! variants run several requests (one per pool of an item) in one
//! transaction behind one voucher.

use std::collections::HashMap;

use landed_shared::types::{ChargeEntryId, JournalId};
use landed_shared::{ChargesConfig, ReturnRestorePolicy};
use rust_decimal::Decimal;

use super::error::ChargeError;
use super::matching::{outstanding_sources, plan_allocation, plan_return};
use super::store::{ChargeEntryQuery, ChargeLedgerStore, ChargeLedgerTxn};
use super::types::{
    AdditionRequest, AllocationOutcome, CancellationOutcome, ChargeLedgerEntry, ChargeType,
    ConsumptionRequest, EntryType, NewChargeEntry, PoolBalance, ReturnOutcome, SourceReference,
};
use crate::journal::{JournalError, JournalVoucher, LedgerPoster};

/// FIFO charge allocation service over a [`ChargeLedgerStore`].
#[derive(Debug, Clone)]
pub struct ChargeAllocationService<S> {
    store: S,
    precision: u32,
    return_policy: ReturnRestorePolicy,
}

impl<S: ChargeLedgerStore> ChargeAllocationService<S> {
    /// Creates a service with the default charge configuration.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, &ChargesConfig::default())
    }

    /// Creates a service with an explicit charge configuration.
    #[must_use]
    pub fn with_config(store: S, config: &ChargesConfig) -> Self {
        Self {
            store,
            precision: config.precision,
            return_policy: config.return_restore_policy,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The restoration policy applied by returns.
    pub fn return_policy(&self) -> ReturnRestorePolicy {
        self.return_policy
    }

    /// Creates a new cost layer.
    ///
    /// # Errors
    ///
    /// Returns `ChargeError::Validation` on a non-positive quantity,
    /// negative charges or a missing item code, before anything is written.
    #[tracing::instrument(
        skip_all,
        fields(item_code = %request.item_code, charge_type = %request.charge_type, qty = %request.qty)
    )]
    pub async fn add_charges(
        &self,
        request: AdditionRequest,
    ) -> Result<ChargeLedgerEntry, ChargeError> {
        let entry = NewChargeEntry {
            entry_type: EntryType::Addition,
            charge_type: request.charge_type,
            item_code: request.item_code,
            qty: request.qty,
            charges: request.charges,
            remaining_qty: request.qty,
            remaining_charges: request.charges,
            reference: request.reference,
            source_references: Vec::new(),
            reverses: None,
        };
        entry.validate()?;

        let mut txn = self.store.begin().await?;
        let stored = txn.insert(entry).await?;
        txn.commit().await?;

        tracing::info!(entry_id = %stored.id, charges = %stored.charges, "cost layer added");
        Ok(stored)
    }

    /// Consumes charges FIFO from the open layers of the pool.
    ///
    /// # Errors
    ///
    /// Returns `ChargeError::InsufficientChargeLayers` when the pool holds
    /// less quantity than requested; nothing is written in that case.
    #[tracing::instrument(
        skip_all,
        fields(item_code = %request.item_code, charge_type = %request.charge_type, qty = %request.qty)
    )]
    pub async fn allocate_charges(
        &self,
        request: ConsumptionRequest,
    ) -> Result<AllocationOutcome, ChargeError> {
        let mut txn = self.store.begin().await?;
        let outcome = self.allocate_in(&mut txn, &request).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    /// Consumes charges and posts the voucher built from the outcome in the
    /// same transaction.
    ///
    /// `build_voucher` may return `None` when there is nothing to post.
    ///
    /// # Errors
    ///
    /// Returns any allocation error, or `ChargeError::Posting` when building
    /// or posting the voucher fails; the allocation is rolled back then.
    #[tracing::instrument(
        skip_all,
        fields(item_code = %request.item_code, charge_type = %request.charge_type, qty = %request.qty)
    )]
    pub async fn allocate_with_journal<P, F>(
        &self,
        request: ConsumptionRequest,
        poster: &P,
        build_voucher: F,
    ) -> Result<(AllocationOutcome, Option<JournalId>), ChargeError>
    where
        P: LedgerPoster + ?Sized,
        F: FnOnce(&AllocationOutcome) -> Result<Option<JournalVoucher>, JournalError> + Send,
    {
        let mut txn = self.store.begin().await?;
        let outcome = self.allocate_in(&mut txn, &request).await?;
        let journal = post_built(poster, build_voucher(&outcome)?).await?;
        txn.commit().await?;
        Ok((outcome, journal))
    }

    /// Consumes charges for every request in one transaction and posts one
    /// voucher built from all the outcomes.
    ///
    /// Either every request is allocated and posted or nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the first allocation error, or `ChargeError::Posting` when
    /// building or posting the voucher fails.
    #[tracing::instrument(skip_all, fields(requests = requests.len()))]
    pub async fn allocate_all_with_journal<P, F>(
        &self,
        requests: &[ConsumptionRequest],
        poster: &P,
        build_voucher: F,
    ) -> Result<(Vec<AllocationOutcome>, Option<JournalId>), ChargeError>
    where
        P: LedgerPoster + ?Sized,
        F: FnOnce(&[AllocationOutcome]) -> Result<Option<JournalVoucher>, JournalError> + Send,
    {
        let mut txn = self.store.begin().await?;
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.allocate_in(&mut txn, request).await?);
        }
        let journal = post_built(poster, build_voucher(&outcomes)?).await?;
        txn.commit().await?;
        Ok((outcomes, journal))
    }

    /// Gives back charges priced against the most recent active allocation
    /// of the pool that still has quantity to give back.
    ///
    /// # Errors
    ///
    /// Returns `ChargeError::NoAllocationToReturn` when no active allocation
    /// of the pool has anything left to return, and `ChargeError::Validation`
    /// when `qty` exceeds what that allocation still holds.
    #[tracing::instrument(
        skip_all,
        fields(item_code = %request.item_code, charge_type = %request.charge_type, qty = %request.qty)
    )]
    pub async fn return_charges(
        &self,
        request: ConsumptionRequest,
    ) -> Result<ReturnOutcome, ChargeError> {
        let mut txn = self.store.begin().await?;
        let outcome = self.return_in(&mut txn, &request).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    /// Returns charges and posts the voucher built from the outcome in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns any return error, or `ChargeError::Posting` when building or
    /// posting the voucher fails; the return is rolled back then.
    #[tracing::instrument(
        skip_all,
        fields(item_code = %request.item_code, charge_type = %request.charge_type, qty = %request.qty)
    )]
    pub async fn return_with_journal<P, F>(
        &self,
        request: ConsumptionRequest,
        poster: &P,
        build_voucher: F,
    ) -> Result<(ReturnOutcome, Option<JournalId>), ChargeError>
    where
        P: LedgerPoster + ?Sized,
        F: FnOnce(&ReturnOutcome) -> Result<Option<JournalVoucher>, JournalError> + Send,
    {
        let mut txn = self.store.begin().await?;
        let outcome = self.return_in(&mut txn, &request).await?;
        let journal = post_built(poster, build_voucher(&outcome)?).await?;
        txn.commit().await?;
        Ok((outcome, journal))
    }

    /// Returns charges for every request in one transaction and posts one
    /// voucher built from all the outcomes.
    ///
    /// # Errors
    ///
    /// Returns the first return error, or `ChargeError::Posting` when
    /// building or posting the voucher fails; nothing is written then.
    #[tracing::instrument(skip_all, fields(requests = requests.len()))]
    pub async fn return_all_with_journal<P, F>(
        &self,
        requests: &[ConsumptionRequest],
        poster: &P,
        build_voucher: F,
    ) -> Result<(Vec<ReturnOutcome>, Option<JournalId>), ChargeError>
    where
        P: LedgerPoster + ?Sized,
        F: FnOnce(&[ReturnOutcome]) -> Result<Option<JournalVoucher>, JournalError> + Send,
    {
        let mut txn = self.store.begin().await?;
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.return_in(&mut txn, request).await?);
        }
        let journal = post_built(poster, build_voucher(&outcomes)?).await?;
        txn.commit().await?;
        Ok((outcomes, journal))
    }

    /// Cancels every active allocation caused by a document and restores
    /// what each one still holds, net of the live returns against it.
    ///
    /// An empty outcome (nothing matched) is not an error. Return entries
    /// are left alone.
    ///
    /// # Errors
    ///
    /// Returns `ChargeError::EntryNotFound` if a source layer is missing,
    /// or any store error.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_allocations(
        &self,
        reference_name: &str,
    ) -> Result<CancellationOutcome, ChargeError> {
        let mut txn = self.store.begin().await?;
        let outcome = self.cancel_in(&mut txn, reference_name).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    /// Cancels allocations and posts the reversing voucher in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns any cancellation error, or `ChargeError::Posting` when
    /// building or posting the voucher fails; nothing is cancelled then.
    #[tracing::instrument(skip(self, poster, build_voucher))]
    pub async fn cancel_with_journal<P, F>(
        &self,
        reference_name: &str,
        poster: &P,
        build_voucher: F,
    ) -> Result<(CancellationOutcome, Option<JournalId>), ChargeError>
    where
        P: LedgerPoster + ?Sized,
        F: FnOnce(&CancellationOutcome) -> Result<Option<JournalVoucher>, JournalError> + Send,
    {
        let mut txn = self.store.begin().await?;
        let outcome = self.cancel_in(&mut txn, reference_name).await?;
        let journal = post_built(poster, build_voucher(&outcome)?).await?;
        txn.commit().await?;
        Ok((outcome, journal))
    }

    /// Cancels every live return caused by a document and takes what each
    /// one restored back off the cost layers.
    ///
    /// A return whose allocation has since been cancelled moves nothing:
    /// that cancellation only released what the return had not.
    ///
    /// # Errors
    ///
    /// Returns `ChargeError::InsufficientChargeLayers` when a layer no
    /// longer holds the restored quantity (it was drawn again since), or
    /// any store error. Nothing is written then.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_returns(
        &self,
        reference_name: &str,
    ) -> Result<CancellationOutcome, ChargeError> {
        let mut txn = self.store.begin().await?;
        let outcome = self.cancel_returns_in(&mut txn, reference_name).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    /// Cancels returns and posts the re-consuming voucher in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns any cancellation error, or `ChargeError::Posting` when
    /// building or posting the voucher fails; nothing is cancelled then.
    #[tracing::instrument(skip(self, poster, build_voucher))]
    pub async fn cancel_returns_with_journal<P, F>(
        &self,
        reference_name: &str,
        poster: &P,
        build_voucher: F,
    ) -> Result<(CancellationOutcome, Option<JournalId>), ChargeError>
    where
        P: LedgerPoster + ?Sized,
        F: FnOnce(&CancellationOutcome) -> Result<Option<JournalVoucher>, JournalError> + Send,
    {
        let mut txn = self.store.begin().await?;
        let outcome = self.cancel_returns_in(&mut txn, reference_name).await?;
        let journal = post_built(poster, build_voucher(&outcome)?).await?;
        txn.commit().await?;
        Ok((outcome, journal))
    }

    /// Unconsumed quantity and charges of a pool.
    ///
    /// # Errors
    ///
    /// Returns any store error.
    pub async fn available_charges(
        &self,
        item_code: &str,
        charge_type: ChargeType,
    ) -> Result<PoolBalance, ChargeError> {
        let mut query = ChargeEntryQuery::open_layers(item_code, charge_type);
        query.for_update = false;

        let mut txn = self.store.begin().await?;
        let layers = txn.query(&query).await?;
        drop(txn);

        Ok(PoolBalance {
            remaining_qty: layers.iter().map(|l| l.remaining_qty).sum(),
            remaining_charges: layers.iter().map(|l| l.remaining_charges).sum(),
            open_layers: layers.len(),
        })
    }

    /// Every entry caused by a document, oldest first.
    ///
    /// # Errors
    ///
    /// Returns any store error.
    pub async fn entries_for(
        &self,
        reference_name: &str,
    ) -> Result<Vec<ChargeLedgerEntry>, ChargeError> {
        let mut txn = self.store.begin().await?;
        let entries = txn
            .query(&ChargeEntryQuery::for_reference(reference_name))
            .await?;
        drop(txn);
        Ok(entries)
    }

    async fn allocate_in(
        &self,
        txn: &mut S::Txn,
        request: &ConsumptionRequest,
    ) -> Result<AllocationOutcome, ChargeError> {
        request.validate()?;

        let layers = txn
            .query(&ChargeEntryQuery::open_layers(
                &request.item_code,
                request.charge_type,
            ))
            .await?;
        let plan = plan_allocation(request, &layers, self.precision)?;

        let entry = txn
            .insert(NewChargeEntry {
                entry_type: EntryType::Allocation,
                charge_type: request.charge_type,
                item_code: request.item_code.clone(),
                qty: plan.total_qty,
                charges: plan.total_charges,
                remaining_qty: Decimal::ZERO,
                remaining_charges: Decimal::ZERO,
                reference: request.reference.clone(),
                source_references: plan.draws.iter().map(SourceReference::from).collect(),
                reverses: None,
            })
            .await?;

        let mut sources = Vec::with_capacity(plan.draws.len());
        for draw in &plan.draws {
            let mut layer = layers
                .iter()
                .find(|l| l.id == draw.source_entry)
                .cloned()
                .ok_or(ChargeError::EntryNotFound(draw.source_entry))?;
            layer.consume(draw.qty, draw.charges);
            txn.save(&layer).await?;
            sources.push(layer);
        }

        tracing::info!(
            entry_id = %entry.id,
            charges = %entry.charges,
            layers = sources.len(),
            "charges allocated"
        );
        Ok(AllocationOutcome { entry, sources })
    }

    async fn return_in(
        &self,
        txn: &mut S::Txn,
        request: &ConsumptionRequest,
    ) -> Result<ReturnOutcome, ChargeError> {
        request.validate()?;

        let allocations = txn
            .query(&ChargeEntryQuery::active_allocations(
                &request.item_code,
                request.charge_type,
            ))
            .await?;

        let mut target = None;
        for allocation in allocations {
            let returns = txn
                .query(&ChargeEntryQuery::returns_against(allocation.id))
                .await?;
            let outstanding = outstanding_sources(&allocation, &returns);
            if outstanding.iter().any(|m| m.qty > Decimal::ZERO) {
                target = Some((allocation, outstanding));
                break;
            }
        }
        let (reversed, outstanding) = target.ok_or_else(|| ChargeError::NoAllocationToReturn {
            item_code: request.item_code.clone(),
            charge_type: request.charge_type,
        })?;

        let plan = plan_return(
            &reversed,
            &outstanding,
            request.qty,
            self.precision,
            self.return_policy,
        )?;

        let mut restored = Vec::with_capacity(plan.restorations.len());
        for movement in &plan.restorations {
            let mut layer = txn.get(movement.source_entry, true).await?;
            layer.restore(movement.qty, movement.charges);
            txn.save(&layer).await?;
            restored.push(layer);
        }

        let entry = txn
            .insert(NewChargeEntry {
                entry_type: EntryType::Return,
                charge_type: request.charge_type,
                item_code: request.item_code.clone(),
                qty: request.qty,
                charges: plan.charges,
                remaining_qty: Decimal::ZERO,
                remaining_charges: Decimal::ZERO,
                reference: request.reference.clone(),
                source_references: plan
                    .restorations
                    .iter()
                    .map(SourceReference::from)
                    .collect(),
                reverses: Some(reversed.id),
            })
            .await?;

        tracing::info!(
            entry_id = %entry.id,
            reversed = %reversed.id,
            charges = %entry.charges,
            policy = ?self.return_policy,
            "charges returned"
        );
        Ok(ReturnOutcome {
            entry,
            reversed,
            restored,
        })
    }

    async fn cancel_in(
        &self,
        txn: &mut S::Txn,
        reference_name: &str,
    ) -> Result<CancellationOutcome, ChargeError> {
        let allocations = txn
            .query(&ChargeEntryQuery::active_allocations_for(reference_name))
            .await?;
        if allocations.is_empty() {
            tracing::debug!("no active allocations to cancel");
            return Ok(CancellationOutcome::default());
        }

        let mut layers = TouchedLayers::default();
        let mut released = Decimal::ZERO;
        let mut cancelled = Vec::with_capacity(allocations.len());

        for mut allocation in allocations {
            let returns = txn
                .query(&ChargeEntryQuery::returns_against(allocation.id))
                .await?;
            for movement in outstanding_sources(&allocation, &returns) {
                if movement.qty.is_zero() && movement.charges.is_zero() {
                    continue;
                }
                let layer = layers.load(txn, movement.source_entry).await?;
                layer.restore(movement.qty, movement.charges);
                released += movement.charges;
            }
            allocation.is_cancelled = true;
            txn.save(&allocation).await?;
            cancelled.push(allocation);
        }

        let outcome = CancellationOutcome {
            cancelled,
            restored: layers.save_all(txn).await?,
            released,
        };
        tracing::info!(
            cancelled = outcome.cancelled.len(),
            released = %outcome.released_charges(),
            "allocations cancelled"
        );
        Ok(outcome)
    }

    async fn cancel_returns_in(
        &self,
        txn: &mut S::Txn,
        reference_name: &str,
    ) -> Result<CancellationOutcome, ChargeError> {
        let returns = txn
            .query(&ChargeEntryQuery::active_returns_for(reference_name))
            .await?;
        if returns.is_empty() {
            tracing::debug!("no live returns to cancel");
            return Ok(CancellationOutcome::default());
        }

        let mut layers = TouchedLayers::default();
        let mut released = Decimal::ZERO;
        let mut cancelled = Vec::with_capacity(returns.len());

        for mut entry in returns {
            let allocation_live = match entry.reverses {
                Some(id) => !txn.get(id, true).await?.is_cancelled,
                None => true,
            };
            if allocation_live {
                for source in &entry.source_references {
                    let layer = layers.load(txn, source.source_entry).await?;
                    if layer.remaining_qty < source.allocated_qty {
                        return Err(ChargeError::InsufficientChargeLayers {
                            item_code: layer.item_code.clone(),
                            charge_type: layer.charge_type,
                            requested: source.allocated_qty,
                            available: layer.remaining_qty,
                        });
                    }
                    if layer.remaining_charges < source.allocated_charges {
                        return Err(ChargeError::Validation(format!(
                            "layer {} holds {} charges, return {} restored {}",
                            layer.id, layer.remaining_charges, entry.id, source.allocated_charges
                        )));
                    }
                    layer.consume(source.allocated_qty, source.allocated_charges);
                    released += source.allocated_charges;
                }
            }
            entry.is_cancelled = true;
            txn.save(&entry).await?;
            cancelled.push(entry);
        }

        let outcome = CancellationOutcome {
            cancelled,
            restored: layers.save_all(txn).await?,
            released,
        };
        tracing::info!(
            cancelled = outcome.cancelled.len(),
            consumed = %outcome.released_charges(),
            "returns cancelled"
        );
        Ok(outcome)
    }
}

/// Cost layers loaded (and locked) once per transaction and saved at the end.
#[derive(Default)]
struct TouchedLayers {
    layers: Vec<ChargeLedgerEntry>,
    index: HashMap<ChargeEntryId, usize>,
}

impl TouchedLayers {
    async fn load<T: ChargeLedgerTxn>(
        &mut self,
        txn: &mut T,
        id: ChargeEntryId,
    ) -> Result<&mut ChargeLedgerEntry, ChargeError> {
        let slot = if let Some(slot) = self.index.get(&id) {
            *slot
        } else {
            self.layers.push(txn.get(id, true).await?);
            self.index.insert(id, self.layers.len() - 1);
            self.layers.len() - 1
        };
        Ok(&mut self.layers[slot])
    }

    async fn save_all<T: ChargeLedgerTxn>(
        self,
        txn: &mut T,
    ) -> Result<Vec<ChargeLedgerEntry>, ChargeError> {
        for layer in &self.layers {
            txn.save(layer).await?;
        }
        Ok(self.layers)
    }
}

async fn post_built<P: LedgerPoster + ?Sized>(
    poster: &P,
    voucher: Option<JournalVoucher>,
) -> Result<Option<JournalId>, ChargeError> {
    match voucher {
        Some(voucher) => Ok(Some(poster.post(voucher).await?)),
        None => Ok(None),
    }
}
