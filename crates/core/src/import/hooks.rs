//! Default lifecycle handlers wiring host documents to the engine.

use std::sync::Arc;

use async_trait::async_trait;
use landed_shared::AccountsConfig;
use rust_decimal::Decimal;

use super::error::ImportError;
use super::lifecycle::{Document, DocumentHook, DocumentKind, HookRegistry, LifecycleEvent};
use super::outbox::RecomputeOutbox;
use super::ports::DocumentWriter;
use super::types::{ImportDoc, SalesInvoice};
use crate::charge::{
    AdditionRequest, AllocationOutcome, ChargeAllocationService, ChargeLedgerStore, ChargeType,
    ConsumptionRequest, ReturnOutcome,
};
use crate::journal::{
    ChargeMovement, LedgerPoster, charge_allocation_voucher, import_tax_vouchers,
};
use crate::tax::{LandedCostVoucher, TariffLookup, calculate_import_assessment};

/// Collaborators shared by the default handlers.
#[derive(Clone)]
pub struct HookContext {
    /// Posts journal vouchers to the host ledger.
    pub poster: Arc<dyn LedgerPoster>,
    /// Writes results back onto host documents.
    pub writer: Arc<dyn DocumentWriter>,
    /// Customs tariff rates.
    pub tariffs: Arc<dyn TariffLookup>,
    /// Deferred import document recomputation.
    pub outbox: Arc<dyn RecomputeOutbox>,
    /// Company account mapping.
    pub accounts: AccountsConfig,
}

/// Per-item result of a sales invoice submission.
#[derive(Debug, Default)]
pub struct SalesChargeSummary {
    /// Charges moved per item; negative for return invoices.
    pub charged: Vec<(String, Decimal)>,
    /// Items that could not be processed; nothing was written for them.
    pub failed: Vec<(String, ImportError)>,
    /// Charged items whose amount could not be written back onto the
    /// invoice. Their ledger entries and journal stand.
    pub unrecorded: Vec<(String, ImportError)>,
}

/// Allocates import charges to sold items and posts the matching journals.
pub struct SalesInvoiceCharges<S> {
    charges: Arc<ChargeAllocationService<S>>,
    ctx: HookContext,
    pools: Vec<ChargeType>,
}

impl<S: ChargeLedgerStore> SalesInvoiceCharges<S> {
    /// Creates the handler consuming the import charges pool.
    #[must_use]
    pub fn new(charges: Arc<ChargeAllocationService<S>>, ctx: HookContext) -> Self {
        Self {
            charges,
            ctx,
            pools: vec![ChargeType::ImportCharges],
        }
    }

    /// Replaces the charge pools consumed by sales.
    #[must_use]
    pub fn with_pools(mut self, pools: Vec<ChargeType>) -> Self {
        self.pools = pools;
        self
    }

    /// Allocates (or, for return invoices, returns) charges for every item.
    ///
    /// Each item is processed in one transaction covering all of its pools,
    /// together with one journal for the item total. A failing item is
    /// reported and the rest go on. The amount is written back onto the
    /// invoice after the item commits; a failed write-back is reported in
    /// [`SalesChargeSummary::unrecorded`] and the item still counts as
    /// charged.
    pub async fn submit(&self, invoice: &SalesInvoice) -> SalesChargeSummary {
        let mut summary = SalesChargeSummary::default();

        for item in &invoice.items {
            if item.qty.is_zero() {
                continue;
            }
            match self.submit_item(invoice, &item.item_code, item.qty.abs()).await {
                Ok(charges) => {
                    if let Err(err) = self
                        .ctx
                        .writer
                        .set_allocated_charges(&invoice.name, &item.item_code, charges)
                        .await
                    {
                        tracing::warn!(
                            invoice = %invoice.name,
                            item_code = %item.item_code,
                            %charges,
                            error = %err,
                            "charges committed but not written back"
                        );
                        summary.unrecorded.push((item.item_code.clone(), err));
                    }
                    summary.charged.push((item.item_code.clone(), charges));
                }
                Err(err) => {
                    tracing::error!(
                        invoice = %invoice.name,
                        item_code = %item.item_code,
                        code = err.error_code(),
                        error = %err,
                        "charge allocation failed for item"
                    );
                    summary.failed.push((item.item_code.clone(), err));
                }
            }
        }
        summary
    }

    async fn submit_item(
        &self,
        invoice: &SalesInvoice,
        item_code: &str,
        qty: Decimal,
    ) -> Result<Decimal, ImportError> {
        let reference = invoice.reference();
        let accounts = &self.ctx.accounts;
        let poster = self.ctx.poster.as_ref();
        let requests: Vec<ConsumptionRequest> = self
            .pools
            .iter()
            .map(|charge_type| ConsumptionRequest {
                item_code: item_code.to_string(),
                charge_type: *charge_type,
                qty,
                reference: reference.clone(),
            })
            .collect();

        let voucher = |charges: Decimal, movement: ChargeMovement| {
            if charges.is_zero() {
                return Ok(None);
            }
            charge_allocation_voucher(&reference, invoice.posting_date, charges, movement, accounts)
                .map(Some)
        };

        if invoice.is_return {
            let (outcomes, _) = self
                .charges
                .return_all_with_journal(&requests, poster, |outcomes| {
                    let charges = outcomes.iter().map(ReturnOutcome::returned_charges).sum();
                    voucher(charges, ChargeMovement::Restored)
                })
                .await?;
            Ok(-outcomes
                .iter()
                .map(ReturnOutcome::returned_charges)
                .sum::<Decimal>())
        } else {
            let (outcomes, _) = self
                .charges
                .allocate_all_with_journal(&requests, poster, |outcomes| {
                    let charges = outcomes.iter().map(AllocationOutcome::allocated_charges).sum();
                    voucher(charges, ChargeMovement::Allocated)
                })
                .await?;
            Ok(outcomes.iter().map(AllocationOutcome::allocated_charges).sum())
        }
    }

    /// Cancels the invoice's charge movements and posts the reversal.
    ///
    /// A sales invoice releases its allocations back to the cost layers; a
    /// return invoice takes what its returns restored back off them.
    /// Returns the charges moved.
    ///
    /// # Errors
    ///
    /// Returns the cancellation or posting failure; nothing is cancelled
    /// then.
    pub async fn cancel(&self, invoice: &SalesInvoice) -> Result<Decimal, ImportError> {
        let reference = invoice.reference();
        let accounts = &self.ctx.accounts;
        let poster = self.ctx.poster.as_ref();
        let voucher = |charges: Decimal, movement: ChargeMovement| {
            if charges.is_zero() {
                return Ok(None);
            }
            charge_allocation_voucher(&reference, invoice.posting_date, charges, movement, accounts)
                .map(Some)
        };

        let (outcome, _) = if invoice.is_return {
            self.charges
                .cancel_returns_with_journal(&invoice.name, poster, |outcome| {
                    voucher(outcome.released_charges(), ChargeMovement::Allocated)
                })
                .await?
        } else {
            self.charges
                .cancel_with_journal(&invoice.name, poster, |outcome| {
                    voucher(outcome.released_charges(), ChargeMovement::Restored)
                })
                .await?
        };
        Ok(outcome.released_charges())
    }
}

#[async_trait]
impl<S: ChargeLedgerStore> DocumentHook for SalesInvoiceCharges<S> {
    fn name(&self) -> &'static str {
        "sales_invoice_charges"
    }

    async fn handle(&self, event: LifecycleEvent, document: &Document) -> Result<(), ImportError> {
        let Document::SalesInvoice(invoice) = document else {
            return Ok(());
        };
        match event {
            LifecycleEvent::Submit => {
                let summary = self.submit(invoice).await;
                tracing::info!(
                    charged = summary.charged.len(),
                    failed = summary.failed.len(),
                    unrecorded = summary.unrecorded.len(),
                    "sales invoice charges processed"
                );
                Ok(())
            }
            LifecycleEvent::Cancel => self.cancel(invoice).await.map(|_| ()),
            LifecycleEvent::Update => Ok(()),
        }
    }
}

/// Creates the cost layers of a finalized import document.
pub struct ImportDocAdditions<S> {
    charges: Arc<ChargeAllocationService<S>>,
}

impl<S: ChargeLedgerStore> ImportDocAdditions<S> {
    /// Creates the handler.
    #[must_use]
    pub fn new(charges: Arc<ChargeAllocationService<S>>) -> Self {
        Self { charges }
    }

    fn check(doc: &ImportDoc) -> Result<(), ImportError> {
        for item in &doc.items {
            if item.item_code.trim().is_empty() {
                return Err(ImportError::Validation(format!(
                    "{}: item row without item code",
                    doc.name
                )));
            }
            if item.qty <= Decimal::ZERO {
                return Err(ImportError::Validation(format!(
                    "{}: quantity of {} must be positive",
                    doc.name, item.item_code
                )));
            }
            if item.allocated_charges_ex_cd < Decimal::ZERO {
                return Err(ImportError::Validation(format!(
                    "{}: allocated charges of {} must not be negative",
                    doc.name, item.item_code
                )));
            }
        }
        Ok(())
    }

    /// Adds one import charges layer per item, and an assessment variance
    /// layer for items with a non-zero assessment difference.
    ///
    /// Every row is checked before the first layer is written.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Validation` for a malformed row, or the first
    /// store failure.
    #[tracing::instrument(skip_all, fields(import_doc = %doc.name, items = doc.items.len()))]
    pub async fn submit(&self, doc: &ImportDoc) -> Result<usize, ImportError> {
        Self::check(doc)?;

        let mut added = 0;
        for item in &doc.items {
            self.charges
                .add_charges(AdditionRequest {
                    item_code: item.item_code.clone(),
                    charge_type: ChargeType::ImportCharges,
                    qty: item.qty,
                    charges: item.allocated_charges_ex_cd,
                    reference: doc.reference(),
                })
                .await?;
            added += 1;

            if !item.assessment_difference.is_zero() {
                self.charges
                    .add_charges(AdditionRequest {
                        item_code: item.item_code.clone(),
                        charge_type: ChargeType::AssessmentVariance,
                        qty: item.qty,
                        charges: item.assessment_difference.abs(),
                        reference: doc.reference(),
                    })
                    .await?;
                added += 1;
            }
        }
        Ok(added)
    }
}

#[async_trait]
impl<S: ChargeLedgerStore> DocumentHook for ImportDocAdditions<S> {
    fn name(&self) -> &'static str {
        "import_doc_additions"
    }

    async fn handle(&self, event: LifecycleEvent, document: &Document) -> Result<(), ImportError> {
        match (event, document) {
            (LifecycleEvent::Submit, Document::ImportDoc(doc)) => self.submit(doc).await.map(|_| ()),
            _ => Ok(()),
        }
    }
}

/// Assesses a landed cost voucher and posts its customs tax journals.
pub struct LandedCostVoucherTaxes {
    ctx: HookContext,
}

impl LandedCostVoucherTaxes {
    /// Creates the handler.
    #[must_use]
    pub fn new(ctx: HookContext) -> Self {
        Self { ctx }
    }

    /// Computes the assessment, stores it and posts one journal per item and
    /// tax category.
    ///
    /// # Errors
    ///
    /// Returns the first assessment, configuration or posting failure.
    /// Journals posted before a posting failure stay posted.
    #[tracing::instrument(skip_all, fields(voucher = %voucher.name))]
    pub async fn submit(&self, voucher: &LandedCostVoucher) -> Result<usize, ImportError> {
        let mut assessed = voucher.clone();
        calculate_import_assessment(&mut assessed, self.ctx.tariffs.as_ref())?;
        self.ctx.writer.save_assessment(&assessed).await?;

        let journals = import_tax_vouchers(&assessed, &self.ctx.accounts)?;
        let count = journals.len();
        for journal in journals {
            let id = self.ctx.poster.post(journal).await?;
            tracing::debug!(journal_id = %id, "import tax journal posted");
        }
        tracing::info!(journals = count, "import taxes posted");
        Ok(count)
    }
}

#[async_trait]
impl DocumentHook for LandedCostVoucherTaxes {
    fn name(&self) -> &'static str {
        "landed_cost_voucher_taxes"
    }

    async fn handle(&self, event: LifecycleEvent, document: &Document) -> Result<(), ImportError> {
        match (event, document) {
            (LifecycleEvent::Submit, Document::LandedCostVoucher(voucher)) => {
                self.submit(voucher).await.map(|_| ())
            }
            _ => Ok(()),
        }
    }
}

/// Queues a recomputation of the import document a document is tagged with.
pub struct EnqueueRecompute {
    outbox: Arc<dyn RecomputeOutbox>,
}

impl EnqueueRecompute {
    /// Creates the handler.
    #[must_use]
    pub fn new(outbox: Arc<dyn RecomputeOutbox>) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl DocumentHook for EnqueueRecompute {
    fn name(&self) -> &'static str {
        "enqueue_recompute"
    }

    async fn handle(&self, _event: LifecycleEvent, document: &Document) -> Result<(), ImportError> {
        let import_doc = match document {
            Document::PurchaseInvoice(pi) => pi.import_document.as_deref(),
            Document::JournalEntry(je) => je.import_document.as_deref(),
            Document::LandedCostVoucher(v) => v.import_document.as_deref(),
            Document::SalesInvoice(_) | Document::ImportDoc(_) => None,
        };
        if let Some(import_doc) = import_doc.filter(|name| !name.is_empty()) {
            let task = self.outbox.enqueue(import_doc).await?;
            tracing::debug!(%import_doc, task_id = %task, "recompute queued");
        }
        Ok(())
    }
}

/// Builds the standard handler registrations.
///
/// Sales invoices allocate on submit and release on cancel; import
/// documents add cost layers on submit; landed cost vouchers post their
/// taxes and then queue a recomputation; purchase invoices and journal
/// entries tagged with an import document queue one on submit and cancel.
pub fn default_registry<S>(
    charges: Arc<ChargeAllocationService<S>>,
    ctx: HookContext,
) -> HookRegistry
where
    S: ChargeLedgerStore + 'static,
{
    let sales = Arc::new(SalesInvoiceCharges::new(charges.clone(), ctx.clone()));
    let additions = Arc::new(ImportDocAdditions::new(charges));
    let taxes = Arc::new(LandedCostVoucherTaxes::new(ctx.clone()));
    let enqueue = Arc::new(EnqueueRecompute::new(ctx.outbox.clone()));

    let mut registry = HookRegistry::new();
    registry
        .register(DocumentKind::SalesInvoice, LifecycleEvent::Submit, sales.clone())
        .register(DocumentKind::SalesInvoice, LifecycleEvent::Cancel, sales)
        .register(DocumentKind::ImportDoc, LifecycleEvent::Submit, additions)
        .register(DocumentKind::LandedCostVoucher, LifecycleEvent::Submit, taxes)
        .register(
            DocumentKind::LandedCostVoucher,
            LifecycleEvent::Submit,
            enqueue.clone(),
        )
        .register(
            DocumentKind::LandedCostVoucher,
            LifecycleEvent::Cancel,
            enqueue.clone(),
        );
    for kind in [DocumentKind::PurchaseInvoice, DocumentKind::JournalEntry] {
        registry
            .register(kind, LifecycleEvent::Submit, enqueue.clone())
            .register(kind, LifecycleEvent::Cancel, enqueue.clone());
    }
    registry
}
