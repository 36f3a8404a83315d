//! In-process implementations of the host document ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::ImportError;
use super::ports::{DocumentWriter, ImportDocStore};
use super::types::{ImportDoc, JournalEntryDoc, PurchaseInvoice};
use crate::tax::LandedCostVoucher;

#[derive(Debug, Default)]
struct Documents {
    import_docs: HashMap<String, ImportDoc>,
    purchase_invoices: Vec<PurchaseInvoice>,
    journal_entries: Vec<JournalEntryDoc>,
    landed_cost_vouchers: Vec<LandedCostVoucher>,
}

/// Import documents and their linked documents kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryImportDocs {
    documents: Mutex<Documents>,
    saves: AtomicUsize,
}

impl InMemoryImportDocs {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Documents) -> R) -> R {
        f(&mut self.documents.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Adds or replaces an import document.
    pub fn insert_import_doc(&self, doc: ImportDoc) {
        self.with(|d| d.import_docs.insert(doc.name.clone(), doc));
    }

    /// Adds a purchase invoice.
    pub fn insert_purchase_invoice(&self, invoice: PurchaseInvoice) {
        self.with(|d| d.purchase_invoices.push(invoice));
    }

    /// Adds a journal entry.
    pub fn insert_journal_entry(&self, entry: JournalEntryDoc) {
        self.with(|d| d.journal_entries.push(entry));
    }

    /// Adds a submitted landed cost voucher.
    pub fn insert_landed_cost_voucher(&self, voucher: LandedCostVoucher) {
        self.with(|d| d.landed_cost_vouchers.push(voucher));
    }

    /// Current state of an import document.
    #[must_use]
    pub fn import_doc(&self, name: &str) -> Option<ImportDoc> {
        self.with(|d| d.import_docs.get(name).cloned())
    }

    /// Number of saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImportDocStore for InMemoryImportDocs {
    async fn load(&self, name: &str) -> Result<ImportDoc, ImportError> {
        self.import_doc(name)
            .ok_or_else(|| ImportError::not_found("ImportDoc", name))
    }

    async fn purchase_invoices_for(
        &self,
        import_doc: &str,
    ) -> Result<Vec<PurchaseInvoice>, ImportError> {
        Ok(self.with(|d| {
            d.purchase_invoices
                .iter()
                .filter(|pi| pi.import_document.as_deref() == Some(import_doc))
                .cloned()
                .collect()
        }))
    }

    async fn journal_entries_for(
        &self,
        import_doc: &str,
    ) -> Result<Vec<JournalEntryDoc>, ImportError> {
        Ok(self.with(|d| {
            d.journal_entries
                .iter()
                .filter(|je| je.import_document.as_deref() == Some(import_doc))
                .cloned()
                .collect()
        }))
    }

    async fn landed_cost_vouchers_for(
        &self,
        import_doc: &str,
    ) -> Result<Vec<LandedCostVoucher>, ImportError> {
        Ok(self.with(|d| {
            d.landed_cost_vouchers
                .iter()
                .filter(|v| v.import_document.as_deref() == Some(import_doc))
                .cloned()
                .collect()
        }))
    }

    async fn save(&self, doc: &ImportDoc) -> Result<(), ImportError> {
        self.with(|d| d.import_docs.insert(doc.name.clone(), doc.clone()));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every write-back it receives.
#[derive(Debug, Default)]
pub struct RecordingDocumentWriter {
    allocated: Mutex<HashMap<(String, String), Decimal>>,
    assessments: Mutex<Vec<LandedCostVoucher>>,
}

impl RecordingDocumentWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last allocated charges written for an invoice row.
    #[must_use]
    pub fn allocated_charges(&self, invoice: &str, item_code: &str) -> Option<Decimal> {
        self.allocated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(invoice.to_string(), item_code.to_string()))
            .copied()
    }

    /// Assessed vouchers written so far.
    #[must_use]
    pub fn assessments(&self) -> Vec<LandedCostVoucher> {
        self.assessments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DocumentWriter for RecordingDocumentWriter {
    async fn set_allocated_charges(
        &self,
        invoice: &str,
        item_code: &str,
        charges: Decimal,
    ) -> Result<(), ImportError> {
        self.allocated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((invoice.to_string(), item_code.to_string()), charges);
        Ok(())
    }

    async fn save_assessment(&self, voucher: &LandedCostVoucher) -> Result<(), ImportError> {
        self.assessments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(voucher.clone());
        Ok(())
    }
}
