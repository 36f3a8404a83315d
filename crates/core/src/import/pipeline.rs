//! Import document recomputation.
//!
//! Rebuilds the linked-document tables and totals of an import document
//! from the documents tagged with it, then apportions the charges over its
//! items. Runs under the [`RecomputeGuard`] so two recomputations of the
//! same document never interleave.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::error::ImportError;
use super::guard::RecomputeGuard;
use super::ports::ImportDocStore;
use super::types::{
    ImportDoc, ImportDocTotals, JournalEntryDoc, LinkedMiscCharge, LinkedPurchaseInvoice,
    LinkedServiceCharge, PurchaseInvoice, PurchaseInvoiceType,
};
use crate::apportion;
use crate::charge::DocumentRef;
use crate::tax::LandedCostVoucher;

/// Result of one recomputation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// The document was rebuilt and saved.
    Completed(ImportDocTotals),
    /// Another recomputation of the same document was running.
    Skipped,
}

/// Rebuilds `doc` from the documents tagged with it.
///
/// Only submitted documents tagged with `doc` count. Assessment differences
/// are taken from `vouchers` when any is given; otherwise the item values
/// are kept.
pub fn rebuild(
    doc: &mut ImportDoc,
    invoices: &[PurchaseInvoice],
    journals: &[JournalEntryDoc],
    vouchers: &[LandedCostVoucher],
    precision: u32,
) {
    let tagged = |tag: &Option<String>| tag.as_deref() == Some(doc.name.as_str());

    let linked: Vec<&PurchaseInvoice> = invoices
        .iter()
        .filter(|pi| pi.is_submitted && tagged(&pi.import_document))
        .collect();

    doc.linked_purchase_invoices = linked
        .iter()
        .filter(|pi| pi.invoice_type == PurchaseInvoiceType::Import)
        .map(|pi| LinkedPurchaseInvoice {
            purchase_invoice: pi.name.clone(),
            total_value: pi.rounded_total,
            total_base_value: pi.base_rounded_total,
        })
        .collect();

    doc.linked_service_charges = linked
        .iter()
        .filter(|pi| pi.invoice_type == PurchaseInvoiceType::ImportServiceCharges)
        .flat_map(|pi| {
            pi.items.iter().map(|line| LinkedServiceCharge {
                document: DocumentRef::new("Purchase Invoice", pi.name.clone()),
                charge_item: line.item_name.clone(),
                paid_to: pi.supplier.clone(),
                amount: line.amount,
            })
        })
        .collect();

    doc.linked_misc_charges = journals
        .iter()
        .filter(|je| je.is_submitted && tagged(&je.import_document))
        .map(|je| LinkedMiscCharge {
            journal_entry: je.name.clone(),
            title: je.title.clone(),
            amount: je.amount,
        })
        .collect();

    let service_charges: Decimal = doc.linked_service_charges.iter().map(|r| r.amount).sum();
    let misc_charges: Decimal = doc.linked_misc_charges.iter().map(|r| r.amount).sum();
    doc.totals = ImportDocTotals {
        import_value: doc
            .linked_purchase_invoices
            .iter()
            .map(|r| r.total_base_value)
            .sum(),
        service_charges,
        misc_charges,
        total_charges: service_charges + misc_charges,
    };

    if !vouchers.is_empty() {
        let mut differences: HashMap<&str, Decimal> = HashMap::new();
        for row in vouchers.iter().flat_map(|v| v.items.iter()) {
            *differences.entry(row.item_code.as_str()).or_default() +=
                row.base_assessment_difference;
        }
        for item in &mut doc.items {
            item.assessment_difference = differences
                .get(item.item_code.as_str())
                .copied()
                .unwrap_or_default();
        }
    }

    let weights: Vec<Decimal> = doc.items.iter().map(|i| i.base_amount).collect();
    let shares = apportion::by_weights(doc.totals.total_charges, &weights, precision);
    for (item, share) in doc.items.iter_mut().zip(shares) {
        item.allocated_charges_ex_cd = share;
    }
}

/// Runs import document recomputations.
#[derive(Debug, Clone)]
pub struct ImportDocRecomputer<D> {
    docs: D,
    guard: RecomputeGuard,
    precision: u32,
}

impl<D: ImportDocStore> ImportDocRecomputer<D> {
    /// Creates a recomputer apportioning charges at `precision` decimal places.
    #[must_use]
    pub fn new(docs: D, guard: RecomputeGuard, precision: u32) -> Self {
        Self {
            docs,
            guard,
            precision,
        }
    }

    /// The document store.
    pub fn docs(&self) -> &D {
        &self.docs
    }

    /// The guard shared with other recomputers.
    pub fn guard(&self) -> &RecomputeGuard {
        &self.guard
    }

    /// Recomputes one import document.
    ///
    /// Returns [`RecomputeOutcome::Skipped`] without touching anything when
    /// the document is already being recomputed.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::NotFound` for an unknown document, or any store
    /// failure. The guard is released on every path.
    #[tracing::instrument(skip(self))]
    pub async fn recompute(&self, name: &str) -> Result<RecomputeOutcome, ImportError> {
        let Some(_token) = self.guard.try_acquire(name) else {
            tracing::warn!("import document is already being recomputed, skipping");
            return Ok(RecomputeOutcome::Skipped);
        };

        let mut doc = self.docs.load(name).await?;
        let invoices = self.docs.purchase_invoices_for(name).await?;
        let journals = self.docs.journal_entries_for(name).await?;
        let vouchers = self.docs.landed_cost_vouchers_for(name).await?;

        rebuild(&mut doc, &invoices, &journals, &vouchers, self.precision);
        self.docs.save(&doc).await?;

        tracing::info!(
            total_charges = %doc.totals.total_charges,
            items = doc.items.len(),
            "import document recomputed"
        );
        Ok(RecomputeOutcome::Completed(doc.totals))
    }
}
