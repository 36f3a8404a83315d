//! FIFO charge allocation ledger.
//!
//! Import charges enter as Addition cost layers per item and charge pool,
//! are consumed oldest-first by Allocations when the item is sold, and come
//! back through Returns and cancellations.

pub mod error;
pub mod matching;
pub mod memory;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::ChargeError;
pub use memory::{InMemoryChargeLedger, InMemoryTxn};
pub use service::ChargeAllocationService;
pub use store::{ChargeEntryQuery, ChargeLedgerStore, ChargeLedgerTxn, SortOrder};
pub use types::{
    AdditionRequest, AllocationOutcome, CancellationOutcome, ChargeLedgerEntry, ChargeType,
    ConsumptionRequest, DocumentRef, EntryType, NewChargeEntry, PoolBalance, ReturnOutcome,
    SourceReference,
};
