//! Journal voucher construction and GL posting.
//!
//! The engine does not keep a general ledger of its own. It builds
//! balanced [`JournalVoucher`]s and hands them to the host accounting
//! system through a [`LedgerPoster`].

mod builders;
mod error;
mod memory;
mod posting;
mod types;

#[cfg(test)]
mod posting_props;

pub use builders::{ChargeMovement, charge_allocation_voucher, import_tax_vouchers};
pub use error::JournalError;
pub use memory::InMemoryLedgerPoster;
pub use posting::{BalancingPoster, LedgerPoster, balance_with_rounding, post_voucher, validate_voucher};
pub use types::{JournalLine, JournalVoucher, Party};
