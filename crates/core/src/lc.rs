//! Letters of credit and their settlement.
//!
//! A letter of credit is opened in the supplier's currency and converted at
//! the issuing exchange rate. Settling it converts the same foreign amount
//! at the settlement rate; the difference is the exchange gain or loss.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Letter of credit errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LcError {
    /// Expiry date before issue date.
    #[error("Expiry date {expiry} of {name} is before its issue date {issue}")]
    ExpiryBeforeIssue {
        /// Letter of credit name.
        name: String,
        /// Issue date.
        issue: NaiveDate,
        /// Expiry date.
        expiry: NaiveDate,
    },

    /// Effective date outside the issue..expiry window.
    #[error("Effective date {effective} of {name} is outside {issue}..{expiry}")]
    EffectiveOutOfRange {
        /// Letter of credit name.
        name: String,
        /// Effective date.
        effective: NaiveDate,
        /// Issue date.
        issue: NaiveDate,
        /// Expiry date.
        expiry: NaiveDate,
    },

    /// The letter of credit is already settled by another settlement.
    #[error("{letter_of_credit} is already settled by {settlement}")]
    AlreadySettled {
        /// Letter of credit name.
        letter_of_credit: String,
        /// Existing settlement.
        settlement: String,
    },

    /// The settlement belongs to a different letter of credit.
    #[error("{settlement} settles {expected}, not {actual}")]
    WrongLetterOfCredit {
        /// Settlement name.
        settlement: String,
        /// Letter of credit named on the settlement.
        expected: String,
        /// Letter of credit passed in.
        actual: String,
    },

    /// Amounts are out of range.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl LcError {
    /// Returns the error code for callers and logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ExpiryBeforeIssue { .. } | Self::EffectiveOutOfRange { .. } => "INVALID_LC_DATES",
            Self::AlreadySettled { .. } => "LC_ALREADY_SETTLED",
            Self::WrongLetterOfCredit { .. } => "LC_MISMATCH",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

/// A letter of credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterOfCredit {
    /// Document name.
    pub name: String,
    /// Amount in the LC currency.
    pub lc_amount: Decimal,
    /// Issuing exchange rate to the base currency.
    pub exchange_rate: Decimal,
    /// `lc_amount` in the base currency (computed).
    pub base_lc_amount: Decimal,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Expiry date.
    pub expiry_date: NaiveDate,
    /// Date the LC becomes effective.
    pub effective_date: Option<NaiveDate>,
    /// Settlement that closed the LC.
    pub lc_settlement: Option<String>,
}

impl LetterOfCredit {
    /// Checks the dates and computes the base amount.
    ///
    /// # Errors
    ///
    /// Returns `LcError::ExpiryBeforeIssue`, `LcError::EffectiveOutOfRange`
    /// or `LcError::Validation` for a negative amount or rate.
    pub fn validate(&mut self) -> Result<(), LcError> {
        if self.lc_amount < Decimal::ZERO || self.exchange_rate < Decimal::ZERO {
            return Err(LcError::Validation(format!(
                "{}: amount and exchange rate must not be negative",
                self.name
            )));
        }
        if self.expiry_date < self.issue_date {
            return Err(LcError::ExpiryBeforeIssue {
                name: self.name.clone(),
                issue: self.issue_date,
                expiry: self.expiry_date,
            });
        }
        if let Some(effective) = self.effective_date
            && (effective < self.issue_date || effective > self.expiry_date)
        {
            return Err(LcError::EffectiveOutOfRange {
                name: self.name.clone(),
                effective,
                issue: self.issue_date,
                expiry: self.expiry_date,
            });
        }

        self.base_lc_amount = self.exchange_rate * self.lc_amount;
        Ok(())
    }

    /// True until a settlement is submitted against the LC.
    #[must_use]
    pub fn is_outstanding(&self) -> bool {
        self.lc_settlement.is_none()
    }
}

/// Settlement of a letter of credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcSettlement {
    /// Document name.
    pub name: String,
    /// Letter of credit being settled.
    pub letter_of_credit: String,
    /// Amount in the LC currency.
    pub lc_amount: Decimal,
    /// Base amount booked when the LC was issued.
    pub base_lc_amount: Decimal,
    /// Exchange rate on the settlement date.
    pub settlement_exchange_rate: Decimal,
    /// Bank charges of the settlement, in the base currency.
    pub lc_charges: Decimal,
    /// `lc_amount` at the settlement rate (computed).
    pub settlement_base_lc_amount: Decimal,
    /// Exchange difference against the issuing rate (computed).
    pub base_exchange_gains_losses: Decimal,
    /// Base amount paid including charges (computed).
    pub total_settlement_amount: Decimal,
}

impl LcSettlement {
    /// Starts a settlement of `lc` carrying over its amounts.
    #[must_use]
    pub fn for_letter_of_credit(
        name: impl Into<String>,
        lc: &LetterOfCredit,
        settlement_exchange_rate: Decimal,
        lc_charges: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            letter_of_credit: lc.name.clone(),
            lc_amount: lc.lc_amount,
            base_lc_amount: lc.base_lc_amount,
            settlement_exchange_rate,
            lc_charges,
            settlement_base_lc_amount: Decimal::ZERO,
            base_exchange_gains_losses: Decimal::ZERO,
            total_settlement_amount: Decimal::ZERO,
        }
    }

    /// Computes the settlement amounts.
    ///
    /// # Errors
    ///
    /// Returns `LcError::Validation` for a negative rate or negative charges.
    pub fn validate(&mut self) -> Result<(), LcError> {
        if self.settlement_exchange_rate < Decimal::ZERO || self.lc_charges < Decimal::ZERO {
            return Err(LcError::Validation(format!(
                "{}: exchange rate and charges must not be negative",
                self.name
            )));
        }
        self.settlement_base_lc_amount = self.settlement_exchange_rate * self.lc_amount;
        self.base_exchange_gains_losses = self.settlement_base_lc_amount - self.base_lc_amount;
        self.total_settlement_amount = self.settlement_base_lc_amount + self.lc_charges;
        Ok(())
    }

    fn check_target(&self, lc: &LetterOfCredit) -> Result<(), LcError> {
        if lc.name != self.letter_of_credit {
            return Err(LcError::WrongLetterOfCredit {
                settlement: self.name.clone(),
                expected: self.letter_of_credit.clone(),
                actual: lc.name.clone(),
            });
        }
        Ok(())
    }

    /// Links the settlement to its letter of credit.
    ///
    /// # Errors
    ///
    /// Returns `LcError::AlreadySettled` if another settlement is linked, or
    /// `LcError::WrongLetterOfCredit`.
    pub fn submit(&self, lc: &mut LetterOfCredit) -> Result<(), LcError> {
        self.check_target(lc)?;
        match &lc.lc_settlement {
            Some(existing) if *existing != self.name => Err(LcError::AlreadySettled {
                letter_of_credit: lc.name.clone(),
                settlement: existing.clone(),
            }),
            _ => {
                lc.lc_settlement = Some(self.name.clone());
                tracing::info!(letter_of_credit = %lc.name, settlement = %self.name, "letter of credit settled");
                Ok(())
            }
        }
    }

    /// Unlinks the settlement from its letter of credit.
    ///
    /// A link to a different settlement is left in place.
    ///
    /// # Errors
    ///
    /// Returns `LcError::WrongLetterOfCredit`.
    pub fn cancel(&self, lc: &mut LetterOfCredit) -> Result<(), LcError> {
        self.check_target(lc)?;
        if lc.lc_settlement.as_deref() == Some(self.name.as_str()) {
            lc.lc_settlement = None;
        }
        Ok(())
    }
}
