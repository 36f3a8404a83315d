//! In-memory charge ledger store.
//!
//! Transactions are serialized: `begin` takes an owned lock on the whole
//! ledger and works on a private copy, which `commit` writes back. Dropping
//! the transaction releases the lock and discards the copy.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use landed_shared::types::ChargeEntryId;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::ChargeError;
use super::store::{ChargeEntryQuery, ChargeLedgerStore, ChargeLedgerTxn, SortOrder};
use super::types::{ChargeLedgerEntry, NewChargeEntry};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    entries: Vec<ChargeLedgerEntry>,
    last_posted: Option<DateTime<Utc>>,
}

/// Charge ledger kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChargeLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryChargeLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every committed entry in insertion order.
    pub async fn entries(&self) -> Vec<ChargeLedgerEntry> {
        self.state.lock().await.entries.clone()
    }
}

#[async_trait]
impl ChargeLedgerStore for InMemoryChargeLedger {
    type Txn = InMemoryTxn;

    async fn begin(&self) -> Result<Self::Txn, ChargeError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTxn { guard, working })
    }
}

/// Transaction over an [`InMemoryChargeLedger`].
#[derive(Debug)]
pub struct InMemoryTxn {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

impl InMemoryTxn {
    fn next_posting_datetime(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let posted = match self.working.last_posted {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.working.last_posted = Some(posted);
        posted
    }

    fn position(&self, id: ChargeEntryId) -> Result<usize, ChargeError> {
        self.working
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(ChargeError::EntryNotFound(id))
    }
}

#[async_trait]
impl ChargeLedgerTxn for InMemoryTxn {
    async fn insert(&mut self, entry: NewChargeEntry) -> Result<ChargeLedgerEntry, ChargeError> {
        entry.validate()?;

        let stored = ChargeLedgerEntry {
            id: ChargeEntryId::new(),
            entry_type: entry.entry_type,
            charge_type: entry.charge_type,
            item_code: entry.item_code,
            qty: entry.qty,
            charges: entry.charges,
            remaining_qty: entry.remaining_qty,
            remaining_charges: entry.remaining_charges,
            posting_datetime: self.next_posting_datetime(),
            reference: entry.reference,
            source_references: entry.source_references,
            reverses: entry.reverses,
            is_cancelled: false,
        };
        self.working.entries.push(stored.clone());
        Ok(stored)
    }

    async fn query(
        &mut self,
        query: &ChargeEntryQuery,
    ) -> Result<Vec<ChargeLedgerEntry>, ChargeError> {
        let mut found: Vec<ChargeLedgerEntry> = self
            .working
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        found.sort_by(|a, b| (a.posting_datetime, a.id).cmp(&(b.posting_datetime, b.id)));
        if query.order == SortOrder::Desc {
            found.reverse();
        }
        if let Some(limit) = query.limit {
            found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(found)
    }

    async fn get(
        &mut self,
        id: ChargeEntryId,
        _lock: bool,
    ) -> Result<ChargeLedgerEntry, ChargeError> {
        let index = self.position(id)?;
        Ok(self.working.entries[index].clone())
    }

    async fn save(&mut self, entry: &ChargeLedgerEntry) -> Result<(), ChargeError> {
        let index = self.position(entry.id)?;
        let stored = &mut self.working.entries[index];
        stored.remaining_qty = entry.remaining_qty;
        stored.remaining_charges = entry.remaining_charges;
        stored.is_cancelled = entry.is_cancelled;
        Ok(())
    }

    async fn commit(mut self) -> Result<(), ChargeError> {
        *self.guard = self.working;
        Ok(())
    }
}
