//! Customs assessment and import tax calculation.
//!
//! Assessed values and every tax stage are rounded to whole currency units
//! before feeding the next stage, so recomputing an item always yields the
//! same figures.

mod assessment;
mod error;
mod tariff;
mod types;

#[cfg(test)]
mod assessment_props;

pub use assessment::{
    LANDING_CHARGE_RATE, calculate_assessed_value, calculate_import_assessment,
    calculate_import_taxes, compute_import_taxes,
};
pub use error::TaxError;
pub use tariff::{CachedTariffLookup, StaticTariffTable, TariffLookup};
pub use types::{ImportTaxes, LandedCostItem, LandedCostVoucher, TaxCategory, TaxRates};
