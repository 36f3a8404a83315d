//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Company account mapping used by journal builders.
    #[serde(default)]
    pub accounts: AccountsConfig,
    /// Journal posting configuration.
    #[serde(default)]
    pub posting: PostingConfig,
    /// Charge ledger configuration.
    #[serde(default)]
    pub charges: ChargesConfig,
    /// Import document recomputation worker configuration.
    #[serde(default)]
    pub recompute: RecomputeConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Company-level account mapping.
///
/// Every field is optional at load time. Journal builders call
/// [`AccountsConfig::require`] and fail with a missing-configuration error
/// before anything is written.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    /// Balance sheet account holding import charges not yet expensed.
    pub unallocated_import_charges: Option<String>,
    /// P&L account charged when import charges are allocated to a sale.
    pub default_import_charges: Option<String>,
    /// Input sales tax account.
    pub sales_tax_input: Option<String>,
    /// Advance income tax account.
    pub advance_income_tax: Option<String>,
    /// Government payable account credited by customs vouchers.
    pub government_payable: Option<String>,
    /// Account receiving rounding differences.
    pub rounding: Option<String>,
    /// Party name of the customs authority.
    #[serde(default = "default_customs_party")]
    pub customs_party: String,
}

fn default_customs_party() -> String {
    "Pakistan Customs".to_string()
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            unallocated_import_charges: None,
            default_import_charges: None,
            sales_tax_input: None,
            advance_income_tax: None,
            government_payable: None,
            rounding: None,
            customs_party: default_customs_party(),
        }
    }
}

/// Identifies an entry of [`AccountsConfig`] for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKey {
    /// `accounts.unallocated_import_charges`
    UnallocatedImportCharges,
    /// `accounts.default_import_charges`
    DefaultImportCharges,
    /// `accounts.sales_tax_input`
    SalesTaxInput,
    /// `accounts.advance_income_tax`
    AdvanceIncomeTax,
    /// `accounts.government_payable`
    GovernmentPayable,
    /// `accounts.rounding`
    Rounding,
}

impl AccountKey {
    /// Returns the configuration key path.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnallocatedImportCharges => "accounts.unallocated_import_charges",
            Self::DefaultImportCharges => "accounts.default_import_charges",
            Self::SalesTaxInput => "accounts.sales_tax_input",
            Self::AdvanceIncomeTax => "accounts.advance_income_tax",
            Self::GovernmentPayable => "accounts.government_payable",
            Self::Rounding => "accounts.rounding",
        }
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AccountsConfig {
    /// Returns the configured account for `key`, if any (blank counts as missing).
    #[must_use]
    pub fn get(&self, key: AccountKey) -> Option<&str> {
        let value = match key {
            AccountKey::UnallocatedImportCharges => &self.unallocated_import_charges,
            AccountKey::DefaultImportCharges => &self.default_import_charges,
            AccountKey::SalesTaxInput => &self.sales_tax_input,
            AccountKey::AdvanceIncomeTax => &self.advance_income_tax,
            AccountKey::GovernmentPayable => &self.government_payable,
            AccountKey::Rounding => &self.rounding,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Returns the configured account for `key`.
    ///
    /// # Errors
    ///
    /// Returns the missing key when the account is not configured.
    pub fn require(&self, key: AccountKey) -> Result<&str, AccountKey> {
        self.get(key).ok_or(key)
    }
}

/// Journal posting configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostingConfig {
    /// Decimal places journal lines are rounded to (0 = whole units).
    #[serde(default)]
    pub precision: u32,
}

/// How a return restores charges to the cost layers of the allocation it reverses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnRestorePolicy {
    /// Everything goes back to the first source layer of the allocation.
    #[default]
    FirstSource,
    /// Spread over every source layer in proportion to what was drawn from it.
    Proportional,
}

/// Charge ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargesConfig {
    /// Decimal places drawn charges are rounded to.
    #[serde(default = "default_charge_precision")]
    pub precision: u32,
    /// Restoration policy applied by returns.
    #[serde(default)]
    pub return_restore_policy: ReturnRestorePolicy,
}

fn default_charge_precision() -> u32 {
    2
}

impl Default for ChargesConfig {
    fn default() -> Self {
        Self {
            precision: default_charge_precision(),
            return_restore_policy: ReturnRestorePolicy::default(),
        }
    }
}

/// Recompute worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecomputeConfig {
    /// Longest time the worker idles before polling the outbox again.
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,
    /// Attempts before a failing task is parked.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_idle_wait_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for RecomputeConfig {
    fn default() -> Self {
        Self {
            idle_wait_ms: default_idle_wait_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LANDED").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
