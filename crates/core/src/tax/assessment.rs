//! Assessed value and import tax cascade.

use landed_shared::types::round_whole;
use rust_decimal::Decimal;

use super::error::TaxError;
use super::tariff::TariffLookup;
use super::types::{ImportTaxes, LandedCostItem, LandedCostVoucher, TaxCategory, TaxRates};

/// Landing charges as a fraction of CFR value plus insurance.
pub const LANDING_CHARGE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

fn percent_of(rates: &TaxRates, category: TaxCategory, base: Decimal) -> Decimal {
    round_whole(rates.rate(category) * base / Decimal::ONE_HUNDRED)
}

/// Computes the assessed value of an item in place.
///
/// # Errors
///
/// Returns `TaxError::MissingIncoterm` if the receipt document of the item
/// carries no incoterm.
pub fn calculate_assessed_value(item: &mut LandedCostItem) -> Result<(), TaxError> {
    if !item.has_incoterm {
        return Err(TaxError::MissingIncoterm(item.item_code.clone()));
    }

    item.cfr_value = item.assessed_value_per_unit * item.qty;
    item.landing_charges = (item.cfr_value + item.insurance) * LANDING_CHARGE_RATE;
    item.assessed_value = item.cfr_value + item.landing_charges + item.insurance;
    item.base_assessed_value = round_whole(item.assessed_value * item.exchange_rate);
    Ok(())
}

/// Runs the import tax cascade on a base assessed value.
///
/// CD, ACD and cess apply to the base; sales tax and AST to base plus
/// duties; income tax to that plus both sales taxes. Every stage is rounded
/// to whole units before it feeds the next.
#[must_use]
pub fn compute_import_taxes(base_assessed_value: Decimal, rates: &TaxRates) -> ImportTaxes {
    let customs_duty = percent_of(rates, TaxCategory::CustomsDuty, base_assessed_value);
    let additional_customs_duty =
        percent_of(rates, TaxCategory::AdditionalCustomsDuty, base_assessed_value);
    let cess = percent_of(rates, TaxCategory::Cess, base_assessed_value);

    let sales_tax_base = base_assessed_value + customs_duty + additional_customs_duty;
    let additional_sales_tax = percent_of(rates, TaxCategory::AdditionalSalesTax, sales_tax_base);
    let sales_tax = percent_of(rates, TaxCategory::SalesTax, sales_tax_base);

    let income_tax_base = sales_tax_base + additional_sales_tax + sales_tax;
    let income_tax = percent_of(rates, TaxCategory::IncomeTax, income_tax_base);

    ImportTaxes {
        customs_duty,
        additional_customs_duty,
        sales_tax,
        additional_sales_tax,
        income_tax,
        cess,
        total: customs_duty
            + additional_customs_duty
            + sales_tax
            + additional_sales_tax
            + income_tax
            + cess,
    }
}

/// Computes the taxes and assessment difference of an item in place.
///
/// # Errors
///
/// Returns `TaxError::InvalidRate` for a negative rate and
/// `TaxError::AssessmentMismatch` if the assessment identity does not hold.
pub fn calculate_import_taxes(item: &mut LandedCostItem, rates: &TaxRates) -> Result<(), TaxError> {
    rates.validate()?;

    item.taxes = compute_import_taxes(item.base_assessed_value, rates);
    item.base_assessment_difference = item.base_assessed_value - item.amount;
    item.applicable_charges = item.base_assessment_difference;

    if item.amount + item.base_assessment_difference != item.base_assessed_value {
        return Err(TaxError::AssessmentMismatch {
            item_code: item.item_code.clone(),
            amount: item.amount,
            difference: item.base_assessment_difference,
            base_assessed_value: item.base_assessed_value,
        });
    }
    Ok(())
}

/// Assesses every row of a landed cost voucher.
///
/// Rows whose tariff has no rate table keep their assessed value but their
/// taxes are left untouched.
///
/// # Errors
///
/// Returns the first assessment or lookup failure; rows after it are not
/// processed.
#[tracing::instrument(skip_all, fields(voucher = %voucher.name, items = voucher.items.len()))]
pub fn calculate_import_assessment<T: TariffLookup + ?Sized>(
    voucher: &mut LandedCostVoucher,
    tariffs: &T,
) -> Result<(), TaxError> {
    for item in &mut voucher.items {
        calculate_assessed_value(item)?;

        let rates = match item.tariff_number.as_deref() {
            Some(tariff) => tariffs.rates_for(tariff)?,
            None => None,
        };
        match rates {
            Some(rates) => calculate_import_taxes(item, &rates)?,
            None => {
                tracing::warn!(
                    item_code = %item.item_code,
                    tariff = ?item.tariff_number,
                    "no tax template for tariff, taxes left unchanged"
                );
            }
        }
    }
    Ok(())
}
