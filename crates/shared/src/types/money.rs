//! Decimal rounding helpers for amounts and quantities.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every rounding in the system goes through these helpers so that the same
//! strategy (Banker's Rounding, `MidpointNearestEven`) is applied everywhere.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds `value` to `decimal_places` using Banker's Rounding.
#[must_use]
pub fn round_amount(value: Decimal, decimal_places: u32) -> Decimal {
    value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
}

/// Rounds `value` to whole currency units using Banker's Rounding.
///
/// Customs assessment rounds every intermediate stage with this helper.
#[must_use]
pub fn round_whole(value: Decimal) -> Decimal {
    round_amount(value, 0)
}
