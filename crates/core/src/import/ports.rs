//! Collaborator traits towards the host document store.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::ImportError;
use super::types::{ImportDoc, JournalEntryDoc, PurchaseInvoice};
use crate::tax::LandedCostVoucher;

/// Read and write access to import documents and the documents tagged
/// with them.
#[async_trait]
pub trait ImportDocStore: Send + Sync {
    /// Loads an import document.
    ///
    /// Fails with `ImportError::NotFound` for an unknown name.
    async fn load(&self, name: &str) -> Result<ImportDoc, ImportError>;

    /// Purchase invoices tagged with the import document, any status.
    async fn purchase_invoices_for(
        &self,
        import_doc: &str,
    ) -> Result<Vec<PurchaseInvoice>, ImportError>;

    /// Journal entries tagged with the import document, any status.
    async fn journal_entries_for(
        &self,
        import_doc: &str,
    ) -> Result<Vec<JournalEntryDoc>, ImportError>;

    /// Submitted landed cost vouchers of the import document, assessed.
    async fn landed_cost_vouchers_for(
        &self,
        import_doc: &str,
    ) -> Result<Vec<LandedCostVoucher>, ImportError>;

    /// Persists a recomputed import document.
    async fn save(&self, doc: &ImportDoc) -> Result<(), ImportError>;
}

/// Write-back of engine results onto host documents.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Sets the allocated charges of a sales invoice row.
    async fn set_allocated_charges(
        &self,
        invoice: &str,
        item_code: &str,
        charges: Decimal,
    ) -> Result<(), ImportError>;

    /// Stores the computed assessment of a landed cost voucher.
    async fn save_assessment(&self, voucher: &LandedCostVoucher) -> Result<(), ImportError>;
}
