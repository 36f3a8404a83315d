//! Landed cost voucher and tariff types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::TaxError;

/// Import tax category of a tariff rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaxCategory {
    /// Customs duty.
    #[serde(rename = "CD")]
    CustomsDuty,
    /// Additional customs duty.
    #[serde(rename = "ACD")]
    AdditionalCustomsDuty,
    /// Sales tax.
    #[serde(rename = "Sales Tax")]
    SalesTax,
    /// Additional sales tax.
    #[serde(rename = "AST")]
    AdditionalSalesTax,
    /// Advance income tax.
    #[serde(rename = "IT")]
    IncomeTax,
    /// Cess.
    #[serde(rename = "Cess")]
    Cess,
}

impl TaxCategory {
    /// Every category, in voucher order.
    pub const ALL: [Self; 6] = [
        Self::SalesTax,
        Self::AdditionalSalesTax,
        Self::IncomeTax,
        Self::CustomsDuty,
        Self::AdditionalCustomsDuty,
        Self::Cess,
    ];

    /// Returns the rate table label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomsDuty => "CD",
            Self::AdditionalCustomsDuty => "ACD",
            Self::SalesTax => "Sales Tax",
            Self::AdditionalSalesTax => "AST",
            Self::IncomeTax => "IT",
            Self::Cess => "Cess",
        }
    }

    /// Returns the short code used in voucher titles.
    #[must_use]
    pub const fn voucher_code(self) -> &'static str {
        match self {
            Self::SalesTax => "ST",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaxCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CD" => Ok(Self::CustomsDuty),
            "ACD" => Ok(Self::AdditionalCustomsDuty),
            "Sales Tax" | "ST" => Ok(Self::SalesTax),
            "AST" => Ok(Self::AdditionalSalesTax),
            "IT" => Ok(Self::IncomeTax),
            "Cess" => Ok(Self::Cess),
            _ => Err(format!("Unknown tax category '{s}'")),
        }
    }
}

/// Percentage rates of a tariff. Missing categories are 0%.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRates(BTreeMap<TaxCategory, Decimal>);

impl TaxRates {
    /// Creates an empty rate table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a rate (percent).
    #[must_use]
    pub fn with(mut self, category: TaxCategory, percent: Decimal) -> Self {
        self.0.insert(category, percent);
        self
    }

    /// Rate of `category` in percent.
    #[must_use]
    pub fn rate(&self, category: TaxCategory) -> Decimal {
        self.0.get(&category).copied().unwrap_or_default()
    }

    /// Rejects negative rates.
    ///
    /// # Errors
    ///
    /// Returns `TaxError::InvalidRate` for the first negative rate.
    pub fn validate(&self) -> Result<(), TaxError> {
        match self.0.iter().find(|(_, rate)| **rate < Decimal::ZERO) {
            Some((category, rate)) => Err(TaxError::InvalidRate {
                category: *category,
                rate: *rate,
            }),
            None => Ok(()),
        }
    }
}

impl FromIterator<(TaxCategory, Decimal)> for TaxRates {
    fn from_iter<I: IntoIterator<Item = (TaxCategory, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Import taxes of one landed cost item, in whole currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTaxes {
    /// Customs duty.
    pub customs_duty: Decimal,
    /// Additional customs duty.
    pub additional_customs_duty: Decimal,
    /// Sales tax.
    pub sales_tax: Decimal,
    /// Additional sales tax.
    pub additional_sales_tax: Decimal,
    /// Advance income tax.
    pub income_tax: Decimal,
    /// Cess.
    pub cess: Decimal,
    /// Sum of every category.
    pub total: Decimal,
}

impl ImportTaxes {
    /// Amount of one category.
    #[must_use]
    pub fn amount(&self, category: TaxCategory) -> Decimal {
        match category {
            TaxCategory::CustomsDuty => self.customs_duty,
            TaxCategory::AdditionalCustomsDuty => self.additional_customs_duty,
            TaxCategory::SalesTax => self.sales_tax,
            TaxCategory::AdditionalSalesTax => self.additional_sales_tax,
            TaxCategory::IncomeTax => self.income_tax,
            TaxCategory::Cess => self.cess,
        }
    }
}

/// A landed cost voucher row.
///
/// The first block of fields is input; the rest is filled in by
/// [`calculate_import_assessment`](super::calculate_import_assessment).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostItem {
    /// Item code.
    pub item_code: String,
    /// Received quantity.
    pub qty: Decimal,
    /// Invoiced value in base currency.
    pub amount: Decimal,
    /// Customs assessed value per unit, in invoice currency.
    pub assessed_value_per_unit: Decimal,
    /// Insurance, in invoice currency.
    pub insurance: Decimal,
    /// Invoice to base currency rate.
    pub exchange_rate: Decimal,
    /// Whether the receipt document carries an incoterm.
    pub has_incoterm: bool,
    /// Customs tariff number of the item.
    pub tariff_number: Option<String>,

    /// `assessed_value_per_unit * qty`.
    pub cfr_value: Decimal,
    /// 1% of CFR value plus insurance.
    pub landing_charges: Decimal,
    /// CFR value plus landing charges plus insurance.
    pub assessed_value: Decimal,
    /// Assessed value in base currency, whole units.
    pub base_assessed_value: Decimal,
    /// Computed taxes.
    pub taxes: ImportTaxes,
    /// `base_assessed_value - amount`.
    pub base_assessment_difference: Decimal,
    /// Charges applied to the item by the voucher.
    pub applicable_charges: Decimal,
}

/// A landed cost voucher: customs assessment of received goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostVoucher {
    /// Voucher name.
    pub name: String,
    /// Posting date of the voucher and the tax journals it raises.
    pub posting_date: NaiveDate,
    /// Import document the voucher belongs to.
    pub import_document: Option<String>,
    /// Assessed rows.
    pub items: Vec<LandedCostItem>,
}
