//! Property-based tests for the customs assessment.
//!
//! - Property 1: Tax cascade determinism
//! - Property 2: Assessment identity
//! - Property 3: Whole-unit stages

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::assessment::{calculate_assessed_value, calculate_import_taxes, compute_import_taxes};
use super::types::{LandedCostItem, TaxCategory, TaxRates};

/// Strategy to generate base values (1 to 10,000,000 whole units).
fn base_value() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(Decimal::from)
}

/// Strategy to generate percentage rates (0.00 to 100.00).
fn percent() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|v| Decimal::new(v, 2))
}

/// Strategy to generate a full rate table.
fn rate_table() -> impl Strategy<Value = TaxRates> {
    (percent(), percent(), percent(), percent(), percent(), percent()).prop_map(
        |(cd, acd, st, ast, it, cess)| {
            TaxRates::new()
                .with(TaxCategory::CustomsDuty, cd)
                .with(TaxCategory::AdditionalCustomsDuty, acd)
                .with(TaxCategory::SalesTax, st)
                .with(TaxCategory::AdditionalSalesTax, ast)
                .with(TaxCategory::IncomeTax, it)
                .with(TaxCategory::Cess, cess)
        },
    )
}

/// Strategy to generate a landed cost row with an incoterm.
fn landed_item() -> impl Strategy<Value = LandedCostItem> {
    (
        1i64..10_000i64,
        1i64..1_000_000i64,
        0i64..100_000i64,
        1i64..50_000i64,
        1i64..100_000_000i64,
    )
        .prop_map(|(qty, per_unit_cents, insurance_cents, rate, amount)| LandedCostItem {
            item_code: "ITEM-001".to_string(),
            qty: Decimal::from(qty),
            amount: Decimal::from(amount),
            assessed_value_per_unit: Decimal::new(per_unit_cents, 2),
            insurance: Decimal::new(insurance_cents, 2),
            exchange_rate: Decimal::new(rate, 2),
            has_incoterm: true,
            tariff_number: None,
            ..LandedCostItem::default()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: Tax cascade determinism
    // =========================================================================

    /// Property 1.1: Recomputing on the same input yields identical figures.
    #[test]
    fn prop_cascade_is_deterministic(base in base_value(), rates in rate_table()) {
        prop_assert_eq!(compute_import_taxes(base, &rates), compute_import_taxes(base, &rates));
    }

    /// Property 1.2: Recomputing an already assessed row changes nothing.
    #[test]
    fn prop_reassessment_is_idempotent(item in landed_item(), rates in rate_table()) {
        let mut once = item;
        calculate_assessed_value(&mut once).unwrap();
        calculate_import_taxes(&mut once, &rates).unwrap();

        let mut twice = once.clone();
        calculate_assessed_value(&mut twice).unwrap();
        calculate_import_taxes(&mut twice, &rates).unwrap();

        prop_assert_eq!(once, twice);
    }

    // =========================================================================
    // Property 2: Assessment identity
    // =========================================================================

    /// Property 2.1: amount + difference == base assessed value.
    #[test]
    fn prop_assessment_identity(item in landed_item(), rates in rate_table()) {
        let mut item = item;
        calculate_assessed_value(&mut item).unwrap();
        calculate_import_taxes(&mut item, &rates).unwrap();

        prop_assert_eq!(item.amount + item.base_assessment_difference, item.base_assessed_value);
        prop_assert_eq!(item.applicable_charges, item.base_assessment_difference);
    }

    // =========================================================================
    // Property 3: Whole-unit stages
    // =========================================================================

    /// Property 3.1: Every tax and the base assessed value are whole units,
    /// and the total is their sum.
    #[test]
    fn prop_stages_are_whole_units(item in landed_item(), rates in rate_table()) {
        let mut item = item;
        calculate_assessed_value(&mut item).unwrap();
        calculate_import_taxes(&mut item, &rates).unwrap();

        prop_assert_eq!(item.base_assessed_value, item.base_assessed_value.trunc());
        let taxes = item.taxes;
        let mut sum = Decimal::ZERO;
        for category in TaxCategory::ALL {
            let amount = taxes.amount(category);
            prop_assert_eq!(amount, amount.trunc());
            prop_assert!(amount >= Decimal::ZERO);
            sum += amount;
        }
        prop_assert_eq!(taxes.total, sum);
    }
}
