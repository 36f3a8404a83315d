//! Tax calculation error types.

use rust_decimal::Decimal;
use thiserror::Error;

use super::types::TaxCategory;

/// Errors that can occur during customs assessment.
#[derive(Debug, Error)]
pub enum TaxError {
    /// The receipt document of an item has no incoterm.
    #[error("No incoterm found on receipt document for item {0}")]
    MissingIncoterm(String),

    /// `amount + assessment_difference != base_assessed_value`.
    #[error(
        "Assessment mismatch for item {item_code}: amount {amount} + difference {difference} != base assessed value {base_assessed_value}"
    )]
    AssessmentMismatch {
        /// The item.
        item_code: String,
        /// Invoiced base amount.
        amount: Decimal,
        /// Computed assessment difference.
        difference: Decimal,
        /// Computed base assessed value.
        base_assessed_value: Decimal,
    },

    /// A tariff rate is outside the accepted range.
    #[error("Invalid {category} rate {rate}%")]
    InvalidRate {
        /// Tax category.
        category: TaxCategory,
        /// Offending rate.
        rate: Decimal,
    },

    /// The tariff source could not be read.
    #[error("Tariff lookup failed: {0}")]
    Lookup(String),
}

impl TaxError {
    /// Returns the error code for callers and logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingIncoterm(_) => "MISSING_INCOTERM",
            Self::AssessmentMismatch { .. } => "ASSESSMENT_MISMATCH",
            Self::InvalidRate { .. } => "INVALID_RATE",
            Self::Lookup(_) => "TARIFF_LOOKUP_FAILED",
        }
    }
}
