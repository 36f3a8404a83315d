//! Import document orchestration.
//!
//! Connects host document lifecycle events to the charge ledger, the
//! customs assessment and journal posting, and keeps import documents'
//! linked-document tables and charge apportionment up to date through a
//! deferred recompute outbox.

pub mod error;
pub mod guard;
pub mod hooks;
pub mod lifecycle;
pub mod memory;
pub mod outbox;
pub mod pipeline;
pub mod ports;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::ImportError;
pub use guard::{GuardToken, RecomputeGuard};
pub use hooks::{
    EnqueueRecompute, HookContext, ImportDocAdditions, LandedCostVoucherTaxes, SalesChargeSummary,
    SalesInvoiceCharges, default_registry,
};
pub use lifecycle::{Document, DocumentHook, DocumentKind, HookRegistry, LifecycleEvent};
pub use memory::{InMemoryImportDocs, RecordingDocumentWriter};
pub use outbox::{InMemoryOutbox, RecomputeOutbox, RecomputeTask, RecomputeWorker, TaskStatus};
pub use pipeline::{ImportDocRecomputer, RecomputeOutcome, rebuild};
pub use ports::{DocumentWriter, ImportDocStore};
pub use types::{
    ImportDoc, ImportDocItem, ImportDocTotals, JournalEntryDoc, LinkedMiscCharge,
    LinkedPurchaseInvoice, LinkedServiceCharge, PurchaseInvoice, PurchaseInvoiceLine,
    PurchaseInvoiceType, SalesInvoice, SalesInvoiceItem,
};
