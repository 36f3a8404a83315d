//! Repository implementations of the engine's persistence traits.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod charge_ledger;
pub mod recompute_outbox;

pub use charge_ledger::{SeaChargeLedger, SeaChargeTxn};
pub use recompute_outbox::SeaRecomputeOutbox;
