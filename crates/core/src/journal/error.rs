//! Journal error types.

use landed_shared::AccountKey;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while building, balancing or posting a journal voucher.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A required account is not configured.
    #[error("Missing configuration: {0}")]
    MissingConfiguration(AccountKey),

    /// Debits and credits differ.
    #[error("Journal is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit.
        debit: Decimal,
        /// Total credit.
        credit: Decimal,
    },

    /// A voucher needs at least two lines.
    #[error("Journal must have at least 2 lines, got {0}")]
    InsufficientLines(usize),

    /// A line carries a negative amount.
    #[error("Negative amount on account {0}")]
    NegativeAmount(String),

    /// A line carries both a debit and a credit.
    #[error("Line on account {0} has both debit and credit")]
    BothSides(String),

    /// The host ledger rejected the voucher.
    #[error("Posting failed: {0}")]
    Posting(String),
}

impl From<AccountKey> for JournalError {
    fn from(key: AccountKey) -> Self {
        Self::MissingConfiguration(key)
    }
}

impl JournalError {
    /// Returns the error code for callers and logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingConfiguration(_) => "MISSING_CONFIGURATION",
            Self::Unbalanced { .. } => "UNBALANCED_JOURNAL",
            Self::InsufficientLines(_) => "INSUFFICIENT_LINES",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            Self::BothSides(_) => "BOTH_SIDES",
            Self::Posting(_) => "POSTING_FAILED",
        }
    }

    /// Returns true if the host ledger may accept the same voucher later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Posting(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configuration_names_the_key() {
        let err = JournalError::from(AccountKey::GovernmentPayable);
        assert_eq!(err.error_code(), "MISSING_CONFIGURATION");
        assert_eq!(
            err.to_string(),
            "Missing configuration: accounts.government_payable"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_posting_is_retryable() {
        assert!(JournalError::Posting("ledger locked".to_string()).is_retryable());
    }
}
