//! Document lifecycle dispatch.
//!
//! Host documents are handed to the engine as typed snapshots together with
//! the lifecycle event that happened to them. Handlers are registered
//! explicitly per document kind and event.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::ImportError;
use super::types::{ImportDoc, JournalEntryDoc, PurchaseInvoice, SalesInvoice};
use crate::tax::LandedCostVoucher;

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The document was submitted.
    Submit,
    /// The document was cancelled.
    Cancel,
    /// A draft was saved.
    Update,
}

/// Kind of a host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Sales invoice.
    SalesInvoice,
    /// Purchase invoice.
    PurchaseInvoice,
    /// Journal entry.
    JournalEntry,
    /// Landed cost voucher.
    LandedCostVoucher,
    /// Import document.
    ImportDoc,
}

impl DocumentKind {
    /// Returns the host doctype label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SalesInvoice => "Sales Invoice",
            Self::PurchaseInvoice => "Purchase Invoice",
            Self::JournalEntry => "Journal Entry",
            Self::LandedCostVoucher => "Landed Cost Voucher",
            Self::ImportDoc => "ImportDoc",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a host document.
#[derive(Debug, Clone)]
pub enum Document {
    /// Sales invoice.
    SalesInvoice(SalesInvoice),
    /// Purchase invoice.
    PurchaseInvoice(PurchaseInvoice),
    /// Journal entry.
    JournalEntry(JournalEntryDoc),
    /// Landed cost voucher.
    LandedCostVoucher(LandedCostVoucher),
    /// Import document.
    ImportDoc(ImportDoc),
}

impl Document {
    /// Kind of the document.
    #[must_use]
    pub const fn kind(&self) -> DocumentKind {
        match self {
            Self::SalesInvoice(_) => DocumentKind::SalesInvoice,
            Self::PurchaseInvoice(_) => DocumentKind::PurchaseInvoice,
            Self::JournalEntry(_) => DocumentKind::JournalEntry,
            Self::LandedCostVoucher(_) => DocumentKind::LandedCostVoucher,
            Self::ImportDoc(_) => DocumentKind::ImportDoc,
        }
    }

    /// Name of the document.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SalesInvoice(d) => &d.name,
            Self::PurchaseInvoice(d) => &d.name,
            Self::JournalEntry(d) => &d.name,
            Self::LandedCostVoucher(d) => &d.name,
            Self::ImportDoc(d) => &d.name,
        }
    }
}

/// Handler run for a document event.
#[async_trait]
pub trait DocumentHook: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Handles `event` on `document`.
    async fn handle(&self, event: LifecycleEvent, document: &Document)
    -> Result<(), ImportError>;
}

/// Handlers by document kind and event, run in registration order.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<(DocumentKind, LifecycleEvent), Vec<Arc<dyn DocumentHook>>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` for `event` on documents of `kind`.
    pub fn register(
        &mut self,
        kind: DocumentKind,
        event: LifecycleEvent,
        hook: Arc<dyn DocumentHook>,
    ) -> &mut Self {
        self.hooks.entry((kind, event)).or_default().push(hook);
        self
    }

    /// Number of handlers for a kind and event.
    #[must_use]
    pub fn handlers(&self, kind: DocumentKind, event: LifecycleEvent) -> usize {
        self.hooks.get(&(kind, event)).map_or(0, Vec::len)
    }

    /// Runs every handler registered for the document's kind and `event`.
    ///
    /// # Errors
    ///
    /// Stops at the first failing handler and returns its error.
    #[tracing::instrument(skip_all, fields(kind = %document.kind(), name = document.name(), ?event))]
    pub async fn dispatch(
        &self,
        event: LifecycleEvent,
        document: &Document,
    ) -> Result<(), ImportError> {
        let Some(hooks) = self.hooks.get(&(document.kind(), event)) else {
            return Ok(());
        };
        for hook in hooks {
            tracing::debug!(hook = hook.name(), "running hook");
            hook.handle(event, document).await.inspect_err(|err| {
                tracing::error!(hook = hook.name(), error = %err, "hook failed");
            })?;
        }
        Ok(())
    }
}
