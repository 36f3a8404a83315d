//! Balancing, validation and posting of journal vouchers.

use async_trait::async_trait;
use landed_shared::types::{JournalId, round_amount};
use landed_shared::{AccountKey, AccountsConfig, PostingConfig};
use rust_decimal::Decimal;

use super::error::JournalError;
use super::types::{JournalLine, JournalVoucher};

/// The host accounting system.
#[async_trait]
pub trait LedgerPoster: Send + Sync {
    /// Posts a balanced voucher and returns its identifier.
    async fn post(&self, voucher: JournalVoucher) -> Result<JournalId, JournalError>;
}

/// Rounds every line to `precision` and appends a rounding line when the
/// rounded totals differ.
///
/// The rounding line goes to `rounding_account` on whichever side brings
/// debits and credits level, so the result always balances.
///
/// # Errors
///
/// Returns `JournalError::MissingConfiguration` when a difference remains
/// and no rounding account is configured.
pub fn balance_with_rounding(
    lines: Vec<JournalLine>,
    precision: u32,
    rounding_account: Option<&str>,
) -> Result<Vec<JournalLine>, JournalError> {
    let mut lines: Vec<JournalLine> = lines
        .into_iter()
        .map(|mut line| {
            line.debit = round_amount(line.debit, precision);
            line.credit = round_amount(line.credit, precision);
            line
        })
        .collect();

    let debit: Decimal = lines.iter().map(|l| l.debit).sum();
    let credit: Decimal = lines.iter().map(|l| l.credit).sum();
    let difference = debit - credit;
    if difference.is_zero() {
        return Ok(lines);
    }

    let account = rounding_account
        .filter(|a| !a.trim().is_empty())
        .ok_or(JournalError::MissingConfiguration(AccountKey::Rounding))?;

    tracing::debug!(%difference, account, "appending rounding line");
    if difference > Decimal::ZERO {
        lines.push(JournalLine::credit(account, difference));
    } else {
        lines.push(JournalLine::debit(account, -difference));
    }
    Ok(lines)
}

/// Checks that a voucher is postable.
///
/// # Errors
///
/// Returns an error if the voucher has fewer than two lines, a negative
/// amount, a line on both sides, or unequal totals.
pub fn validate_voucher(voucher: &JournalVoucher) -> Result<(), JournalError> {
    if voucher.lines.len() < 2 {
        return Err(JournalError::InsufficientLines(voucher.lines.len()));
    }

    for line in &voucher.lines {
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(JournalError::NegativeAmount(line.account.clone()));
        }
        if !line.debit.is_zero() && !line.credit.is_zero() {
            return Err(JournalError::BothSides(line.account.clone()));
        }
    }

    let debit = voucher.total_debit();
    let credit = voucher.total_credit();
    if debit != credit {
        return Err(JournalError::Unbalanced { debit, credit });
    }

    Ok(())
}

/// Balances, validates and posts a voucher.
///
/// # Errors
///
/// Returns the first balancing, validation or posting failure. Nothing
/// reaches the poster unless the voucher is valid.
#[tracing::instrument(skip_all, fields(title = %voucher.title))]
pub async fn post_voucher<P: LedgerPoster + ?Sized>(
    poster: &P,
    mut voucher: JournalVoucher,
    precision: u32,
    rounding_account: Option<&str>,
) -> Result<JournalId, JournalError> {
    voucher.lines = balance_with_rounding(voucher.lines, precision, rounding_account)?;
    validate_voucher(&voucher)?;
    let id = poster.post(voucher).await?;
    tracing::debug!(journal_id = %id, "journal posted");
    Ok(id)
}

/// Poster that balances and validates every voucher before handing it on.
#[derive(Debug, Clone)]
pub struct BalancingPoster<P> {
    inner: P,
    precision: u32,
    rounding_account: Option<String>,
}

impl<P: LedgerPoster> BalancingPoster<P> {
    /// Wraps `inner` with the posting precision and rounding account.
    #[must_use]
    pub fn new(inner: P, precision: u32, rounding_account: Option<String>) -> Self {
        Self {
            inner,
            precision,
            rounding_account,
        }
    }

    /// Wraps `inner` using the application configuration.
    #[must_use]
    pub fn from_config(inner: P, posting: &PostingConfig, accounts: &AccountsConfig) -> Self {
        Self::new(
            inner,
            posting.precision,
            accounts.get(AccountKey::Rounding).map(str::to_string),
        )
    }

    /// The wrapped poster.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: LedgerPoster> LedgerPoster for BalancingPoster<P> {
    async fn post(&self, voucher: JournalVoucher) -> Result<JournalId, JournalError> {
        post_voucher(
            &self.inner,
            voucher,
            self.precision,
            self.rounding_account.as_deref(),
        )
        .await
    }
}
