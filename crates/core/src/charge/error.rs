//! Charge ledger error types.

use landed_shared::types::ChargeEntryId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::ChargeType;
use crate::journal::JournalError;

/// Errors that can occur during charge ledger operations.
#[derive(Debug, Error)]
pub enum ChargeError {
    /// Not enough unconsumed quantity across the item's cost layers.
    #[error(
        "Insufficient charge layers for item {item_code} ({charge_type}): requested {requested}, available {available}"
    )]
    InsufficientChargeLayers {
        /// The item being allocated.
        item_code: String,
        /// The charge pool searched.
        charge_type: ChargeType,
        /// Quantity requested.
        requested: Decimal,
        /// Quantity available across all open layers.
        available: Decimal,
    },

    /// Invalid entry type or malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A return found no active allocation to price against.
    #[error("No allocation to return for item {item_code} ({charge_type})")]
    NoAllocationToReturn {
        /// The item being returned.
        item_code: String,
        /// The charge pool searched.
        charge_type: ChargeType,
    },

    /// Ledger entry not found.
    #[error("Charge ledger entry not found: {0}")]
    EntryNotFound(ChargeEntryId),

    /// The journal posting attached to the operation failed.
    #[error("Journal posting failed: {0}")]
    Posting(#[from] JournalError),

    /// The underlying store failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl ChargeError {
    /// Returns the error code for callers and logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientChargeLayers { .. } => "INSUFFICIENT_CHARGE_LAYERS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NoAllocationToReturn { .. } => "NO_ALLOCATION_TO_RETURN",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::Posting(inner) => inner.error_code(),
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Returns true if retrying the same request can succeed.
    ///
    /// Store failures may be transient (lock timeouts, serialization
    /// failures); data-integrity failures never are.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
