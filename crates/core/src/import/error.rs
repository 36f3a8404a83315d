//! Import orchestration error types.

use thiserror::Error;

use crate::charge::ChargeError;
use crate::journal::JournalError;
use crate::tax::TaxError;

/// Errors raised by lifecycle hooks, the recompute pipeline and the outbox.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Charge ledger failure.
    #[error(transparent)]
    Charge(#[from] ChargeError),

    /// Journal building or posting failure.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Customs assessment failure.
    #[error(transparent)]
    Tax(#[from] TaxError),

    /// A document does not exist.
    #[error("{doctype} not found: {name}")]
    NotFound {
        /// Document type.
        doctype: String,
        /// Document name.
        name: String,
    },

    /// A document is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A collaborator store failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl ImportError {
    /// Shorthand for [`ImportError::NotFound`].
    #[must_use]
    pub fn not_found(doctype: &str, name: &str) -> Self {
        Self::NotFound {
            doctype: doctype.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns the error code for callers and logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Charge(inner) => inner.error_code(),
            Self::Journal(inner) => inner.error_code(),
            Self::Tax(inner) => inner.error_code(),
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Returns true if the failed step may succeed when retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Charge(inner) => inner.is_retryable(),
            Self::Journal(inner) => inner.is_retryable(),
            Self::Store(_) => true,
            Self::Tax(_) | Self::NotFound { .. } | Self::Validation(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landed_shared::AccountKey;

    #[test]
    fn test_codes_delegate_to_inner_errors() {
        let err = ImportError::from(JournalError::MissingConfiguration(AccountKey::Rounding));
        assert_eq!(err.error_code(), "MISSING_CONFIGURATION");

        let err = ImportError::from(TaxError::MissingIncoterm("ITEM-001".to_string()));
        assert_eq!(err.error_code(), "MISSING_INCOTERM");
        assert!(!err.is_retryable());

        let err = ImportError::not_found("ImportDoc", "IMP-0001");
        assert_eq!(err.to_string(), "ImportDoc not found: IMP-0001");
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_store_failures_are_retryable() {
        assert!(ImportError::Store("connection reset".to_string()).is_retryable());
        assert!(ImportError::from(ChargeError::Store("timeout".to_string())).is_retryable());
    }
}
