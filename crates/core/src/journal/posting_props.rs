//! Property-based tests for journal rounding.
//!
//! - Property 1: Rounding balance

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::posting::{balance_with_rounding, validate_voucher};
use super::types::{JournalLine, JournalVoucher};
use chrono::NaiveDate;

/// Strategy to generate amounts with fractional cents (0.001 to 100,000.000).
fn fractional_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 3))
}

/// Strategy to generate a set of lines with both sides present.
fn lines() -> impl Strategy<Value = Vec<JournalLine>> {
    (
        prop::collection::vec(fractional_amount(), 1..6),
        prop::collection::vec(fractional_amount(), 1..6),
    )
        .prop_map(|(debits, credits)| {
            debits
                .into_iter()
                .enumerate()
                .map(|(i, amount)| JournalLine::debit(format!("Debit {i}"), amount))
                .chain(
                    credits
                        .into_iter()
                        .enumerate()
                        .map(|(i, amount)| JournalLine::credit(format!("Credit {i}"), amount)),
                )
                .collect()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // =========================================================================
    // Property 1: Rounding balance
    // =========================================================================

    /// Property 1.1: With a rounding account any line set balances exactly.
    #[test]
    fn prop_rounding_always_balances(lines in lines(), precision in 0u32..3) {
        let balanced = balance_with_rounding(lines, precision, Some("Round Off - CO")).unwrap();

        let voucher = JournalVoucher {
            title: "Rounding".to_string(),
            posting_date: NaiveDate::from_ymd_opt(2024, 12, 7).unwrap(),
            reference: None,
            import_document: None,
            lines: balanced,
        };
        prop_assert!(voucher.is_balanced());
        prop_assert!(validate_voucher(&voucher).is_ok());
    }

    /// Property 1.2: At most one rounding line is appended.
    #[test]
    fn prop_single_rounding_line(lines in lines()) {
        let count = lines.len();
        let balanced = balance_with_rounding(lines, 0, Some("Round Off - CO")).unwrap();
        prop_assert!(balanced.len() == count || balanced.len() == count + 1);
    }
}
