//! Persistence boundary of the charge ledger.
//!
//! The engine never talks to a database directly. It opens a
//! [`ChargeLedgerTxn`] through a [`ChargeLedgerStore`], performs every read
//! and write of one operation inside it and commits at the end. Dropping a
//! transaction without committing discards its writes.

use async_trait::async_trait;
use landed_shared::types::ChargeEntryId;
use rust_decimal::Decimal;

use super::error::ChargeError;
use super::types::{ChargeLedgerEntry, ChargeType, EntryType, NewChargeEntry};

/// Ordering on `posting_datetime` (ties broken by entry id).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

/// Filter over ledger entries.
///
/// Empty filters match everything. `entry_types` is a membership filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChargeEntryQuery {
    /// Equality on item code.
    pub item_code: Option<String>,
    /// Equality on charge type.
    pub charge_type: Option<ChargeType>,
    /// Membership on entry type.
    pub entry_types: Vec<EntryType>,
    /// Equality on the reference document name.
    pub reference_name: Option<String>,
    /// Only entries with `remaining_qty > 0`.
    pub has_remaining: bool,
    /// Equality on the cancellation flag.
    pub is_cancelled: Option<bool>,
    /// Equality on the allocation a Return reverses.
    pub reverses: Option<ChargeEntryId>,
    /// Ordering on posting datetime.
    pub order: SortOrder,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Lock the matched rows until the transaction ends.
    pub for_update: bool,
}

impl ChargeEntryQuery {
    /// Open cost layers of a pool in FIFO order, locked for update.
    #[must_use]
    pub fn open_layers(item_code: &str, charge_type: ChargeType) -> Self {
        Self {
            item_code: Some(item_code.to_string()),
            charge_type: Some(charge_type),
            entry_types: vec![EntryType::Addition],
            has_remaining: true,
            is_cancelled: Some(false),
            order: SortOrder::Asc,
            for_update: true,
            ..Self::default()
        }
    }

    /// Active allocations of a pool, newest first, locked for update.
    #[must_use]
    pub fn active_allocations(item_code: &str, charge_type: ChargeType) -> Self {
        Self {
            item_code: Some(item_code.to_string()),
            charge_type: Some(charge_type),
            entry_types: vec![EntryType::Allocation],
            is_cancelled: Some(false),
            order: SortOrder::Desc,
            for_update: true,
            ..Self::default()
        }
    }

    /// Live returns given back against one allocation, locked for update.
    #[must_use]
    pub fn returns_against(allocation: ChargeEntryId) -> Self {
        Self {
            entry_types: vec![EntryType::Return],
            is_cancelled: Some(false),
            reverses: Some(allocation),
            order: SortOrder::Asc,
            for_update: true,
            ..Self::default()
        }
    }

    /// Live returns caused by a document, locked for update.
    #[must_use]
    pub fn active_returns_for(reference_name: &str) -> Self {
        Self {
            entry_types: vec![EntryType::Return],
            reference_name: Some(reference_name.to_string()),
            is_cancelled: Some(false),
            order: SortOrder::Asc,
            for_update: true,
            ..Self::default()
        }
    }

    /// Active allocations caused by a document, locked for update.
    #[must_use]
    pub fn active_allocations_for(reference_name: &str) -> Self {
        Self {
            entry_types: vec![EntryType::Allocation],
            reference_name: Some(reference_name.to_string()),
            is_cancelled: Some(false),
            order: SortOrder::Asc,
            for_update: true,
            ..Self::default()
        }
    }

    /// Every entry caused by a document.
    #[must_use]
    pub fn for_reference(reference_name: &str) -> Self {
        Self {
            reference_name: Some(reference_name.to_string()),
            ..Self::default()
        }
    }

    /// Returns true if `entry` passes every filter (ordering and limit aside).
    #[must_use]
    pub fn matches(&self, entry: &ChargeLedgerEntry) -> bool {
        self.item_code.as_deref().is_none_or(|code| entry.item_code == code)
            && self.charge_type.is_none_or(|ct| entry.charge_type == ct)
            && (self.entry_types.is_empty() || self.entry_types.contains(&entry.entry_type))
            && self
                .reference_name
                .as_deref()
                .is_none_or(|name| entry.reference.name == name)
            && (!self.has_remaining || entry.remaining_qty > Decimal::ZERO)
            && self.is_cancelled.is_none_or(|flag| entry.is_cancelled == flag)
            && self.reverses.is_none_or(|id| entry.reverses == Some(id))
    }
}

/// Opens transactions over the charge ledger.
#[async_trait]
pub trait ChargeLedgerStore: Send + Sync {
    /// Transaction handle type.
    type Txn: ChargeLedgerTxn;

    /// Begins a transaction.
    async fn begin(&self) -> Result<Self::Txn, ChargeError>;
}

/// One unit of work over the charge ledger.
///
/// Rows returned by a `for_update` query (or a locked `get`) stay locked
/// against concurrent transactions until commit or drop.
#[async_trait]
pub trait ChargeLedgerTxn: Send {
    /// Persists a new entry and returns it with its identity and posting datetime.
    ///
    /// Fails with `ChargeError::Validation` on missing required fields.
    async fn insert(&mut self, entry: NewChargeEntry) -> Result<ChargeLedgerEntry, ChargeError>;

    /// Returns entries matching `query`.
    async fn query(&mut self, query: &ChargeEntryQuery)
    -> Result<Vec<ChargeLedgerEntry>, ChargeError>;

    /// Loads one entry, optionally locking it.
    async fn get(&mut self, id: ChargeEntryId, lock: bool)
    -> Result<ChargeLedgerEntry, ChargeError>;

    /// Persists the mutable fields (`remaining_qty`, `remaining_charges`, `is_cancelled`).
    async fn save(&mut self, entry: &ChargeLedgerEntry) -> Result<(), ChargeError>;

    /// Commits every write of the transaction.
    async fn commit(self) -> Result<(), ChargeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charge::types::DocumentRef;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn entry(entry_type: EntryType, remaining_qty: Decimal) -> ChargeLedgerEntry {
        ChargeLedgerEntry {
            id: ChargeEntryId::new(),
            entry_type,
            charge_type: ChargeType::ImportCharges,
            item_code: "ITEM-001".to_string(),
            qty: dec!(10),
            charges: dec!(100),
            remaining_qty,
            remaining_charges: remaining_qty * dec!(10),
            posting_datetime: Utc::now(),
            reference: DocumentRef::new("Sales Invoice", "SINV-0001"),
            source_references: vec![],
            reverses: None,
            is_cancelled: false,
        }
    }

    #[test]
    fn test_open_layers_filter() {
        let query = ChargeEntryQuery::open_layers("ITEM-001", ChargeType::ImportCharges);
        assert!(query.for_update);
        assert!(query.matches(&entry(EntryType::Addition, dec!(3))));
        assert!(!query.matches(&entry(EntryType::Addition, Decimal::ZERO)));
        assert!(!query.matches(&entry(EntryType::Allocation, dec!(3))));

        let mut other_pool = entry(EntryType::Addition, dec!(3));
        other_pool.charge_type = ChargeType::AssessmentVariance;
        assert!(!query.matches(&other_pool));

        let mut other_item = entry(EntryType::Addition, dec!(3));
        other_item.item_code = "ITEM-002".to_string();
        assert!(!query.matches(&other_item));
    }

    #[test]
    fn test_active_allocations_filter_skips_cancelled() {
        let query = ChargeEntryQuery::active_allocations_for("SINV-0001");
        let mut allocation = entry(EntryType::Allocation, Decimal::ZERO);
        assert!(query.matches(&allocation));
        allocation.is_cancelled = true;
        assert!(!query.matches(&allocation));
        allocation.is_cancelled = false;
        allocation.reference.name = "SINV-0002".to_string();
        assert!(!query.matches(&allocation));
    }

    #[test]
    fn test_returns_against_filter() {
        let allocation = ChargeEntryId::new();
        let query = ChargeEntryQuery::returns_against(allocation);
        let mut ret = entry(EntryType::Return, Decimal::ZERO);
        assert!(!query.matches(&ret));
        ret.reverses = Some(allocation);
        assert!(query.matches(&ret));
        ret.reverses = Some(ChargeEntryId::new());
        assert!(!query.matches(&ret));
        ret.reverses = Some(allocation);
        ret.is_cancelled = true;
        assert!(!query.matches(&ret));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let query = ChargeEntryQuery::default();
        assert!(query.matches(&entry(EntryType::Return, Decimal::ZERO)));
        assert_eq!(query.order, SortOrder::Asc);
        assert!(!query.for_update);
    }
}
