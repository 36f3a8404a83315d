//! Apportionment using the Largest Remainder Method.
//!
//! Used wherever an amount has to be split over several recipients and the
//! parts must add back up to the total exactly: import charges over the
//! items of an import document, and returned quantities/charges over the
//! cost layers of an allocation.
//!
//! The method works by:
//! 1. Calculate exact shares
//! 2. Round each share toward zero
//! 3. Calculate the remainder (total - sum of rounded)
//! 4. Distribute remainder units to shares with the largest fractional parts

use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// Splits `total` over recipients in proportion to `weights`.
///
/// The sum of the returned parts is exactly `total` rounded to
/// `decimal_places`. Ties on the fractional part go to the earlier
/// recipient. When every weight is zero (or negative) the total is split
/// equally.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use landed_core::apportion::by_weights;
///
/// let parts = by_weights(dec!(100), &[dec!(1), dec!(1), dec!(1)], 2);
/// assert_eq!(parts, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
/// ```
#[must_use]
pub fn by_weights(total: Decimal, weights: &[Decimal], decimal_places: u32) -> Vec<Decimal> {
    if weights.is_empty() {
        return vec![];
    }

    let total_rounded =
        total.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven);
    let magnitude = total_rounded.abs();
    let sign = if total_rounded.is_sign_negative() {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ONE
    };

    let positive: Vec<Decimal> = weights.iter().map(|w| (*w).max(Decimal::ZERO)).collect();
    let weight_sum: Decimal = positive.iter().copied().sum();
    let positive = if weight_sum.is_zero() {
        vec![Decimal::ONE; weights.len()]
    } else {
        positive
    };
    let weight_sum: Decimal = positive.iter().copied().sum();

    let unit = Decimal::new(1, decimal_places);

    // Exact shares of the magnitude
    let exact: Vec<Decimal> = positive.iter().map(|w| magnitude * *w / weight_sum).collect();

    // Round down each
    let mut rounded: Vec<Decimal> = exact
        .iter()
        .map(|a| a.round_dp_with_strategy(decimal_places, RoundingStrategy::ToZero))
        .collect();

    let sum_rounded: Decimal = rounded.iter().copied().sum();
    let units_to_distribute = ((magnitude - sum_rounded) / unit)
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_usize()
        .unwrap_or(0);

    if units_to_distribute > 0 {
        let mut remainders: Vec<(usize, Decimal)> = exact
            .iter()
            .zip(rounded.iter())
            .enumerate()
            .map(|(i, (e, r))| (i, *e - *r))
            .collect();

        // Largest fractional part first; stable sort keeps index order on ties
        remainders.sort_by(|a, b| b.1.cmp(&a.1));

        for (idx, _) in remainders.iter().take(units_to_distribute) {
            rounded[*idx] += unit;
        }
    }

    rounded.into_iter().map(|part| part * sign).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_weights() {
        assert!(by_weights(dec!(100), &[], 2).is_empty());
    }

    #[test]
    fn test_single_recipient_takes_everything() {
        assert_eq!(by_weights(dec!(99.995), &[dec!(7)], 2), vec![dec!(100.00)]);
    }

    #[test]
    fn test_proportional_split() {
        let parts = by_weights(dec!(1000), &[dec!(600), dec!(300), dec!(100)], 0);
        assert_eq!(parts, vec![dec!(600), dec!(300), dec!(100)]);
    }

    #[test]
    fn test_remainder_goes_to_largest_fraction() {
        // 10 over 1:2 -> 3.33 / 6.67 -> [3, 6] + 1 unit to the second
        let parts = by_weights(dec!(10), &[dec!(1), dec!(2)], 0);
        assert_eq!(parts, vec![dec!(3), dec!(7)]);
    }

    #[test]
    fn test_zero_weights_split_equally() {
        let parts = by_weights(dec!(10), &[Decimal::ZERO, Decimal::ZERO, Decimal::ZERO], 0);
        assert_eq!(parts, vec![dec!(4), dec!(3), dec!(3)]);
    }

    #[test]
    fn test_negative_total_keeps_sign() {
        let parts = by_weights(dec!(-10), &[dec!(1), dec!(2)], 0);
        assert_eq!(parts, vec![dec!(-3), dec!(-7)]);
    }

    #[rstest]
    #[case(dec!(100), vec![dec!(1), dec!(1), dec!(1)], 2)]
    #[case(dec!(100), vec![dec!(3), dec!(5), dec!(7), dec!(11)], 2)]
    #[case(dec!(1), vec![dec!(1), dec!(1), dec!(1)], 0)]
    #[case(dec!(999.99), vec![dec!(10), dec!(20), dec!(30), dec!(40)], 2)]
    #[case(dec!(12345), vec![dec!(0.5), dec!(2.25), dec!(7)], 0)]
    fn test_sum_invariant(
        #[case] total: Decimal,
        #[case] weights: Vec<Decimal>,
        #[case] decimal_places: u32,
    ) {
        let parts = by_weights(total, &weights, decimal_places);
        assert_eq!(parts.len(), weights.len());
        assert_eq!(parts.iter().copied().sum::<Decimal>(), total);
    }
}
