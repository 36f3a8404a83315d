//! Tariff rate tables.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use super::error::TaxError;
use super::types::TaxRates;

/// Default cache capacity (number of tariffs).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default time-to-live for cached rate tables (10 minutes).
const DEFAULT_TTL_SECS: u64 = 600;

/// Resolves the rate table of a customs tariff number.
pub trait TariffLookup: Send + Sync {
    /// Returns the rates of `tariff_number`, or `None` if no tax template
    /// exists for it.
    ///
    /// # Errors
    ///
    /// Returns `TaxError::Lookup` if the source cannot be read.
    fn rates_for(&self, tariff_number: &str) -> Result<Option<TaxRates>, TaxError>;
}

/// Fixed tariff table held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticTariffTable {
    rates: HashMap<String, TaxRates>,
}

impl StaticTariffTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the rates of a tariff.
    #[must_use]
    pub fn with_rates(mut self, tariff_number: impl Into<String>, rates: TaxRates) -> Self {
        self.rates.insert(tariff_number.into(), rates);
        self
    }
}

impl TariffLookup for StaticTariffTable {
    fn rates_for(&self, tariff_number: &str) -> Result<Option<TaxRates>, TaxError> {
        Ok(self.rates.get(tariff_number).cloned())
    }
}

/// Memoizes another lookup with a Moka cache.
///
/// Only found rate tables are cached, so a template created after a miss is
/// picked up on the next call.
#[derive(Clone)]
pub struct CachedTariffLookup<T> {
    inner: Arc<T>,
    cache: Cache<String, Arc<TaxRates>>,
}

impl<T: TariffLookup> CachedTariffLookup<T> {
    /// Wraps `inner` with the default capacity and TTL.
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Wraps `inner` with a custom capacity and TTL.
    #[must_use]
    pub fn with_config(inner: T, max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            inner: Arc::new(inner),
            cache,
        }
    }

    /// Drops every cached table.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached tables.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl<T: TariffLookup> TariffLookup for CachedTariffLookup<T> {
    fn rates_for(&self, tariff_number: &str) -> Result<Option<TaxRates>, TaxError> {
        if let Some(cached) = self.cache.get(tariff_number) {
            return Ok(Some((*cached).clone()));
        }

        let rates = self.inner.rates_for(tariff_number)?;
        if let Some(rates) = &rates {
            self.cache
                .insert(tariff_number.to_string(), Arc::new(rates.clone()));
        }
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::TaxCategory;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        table: StaticTariffTable,
        calls: AtomicUsize,
    }

    impl TariffLookup for CountingLookup {
        fn rates_for(&self, tariff_number: &str) -> Result<Option<TaxRates>, TaxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table.rates_for(tariff_number)
        }
    }

    #[test]
    fn test_cache_hits_skip_inner_lookup() {
        let lookup = CachedTariffLookup::new(CountingLookup {
            table: StaticTariffTable::new()
                .with_rates("8471", TaxRates::new().with(TaxCategory::CustomsDuty, dec!(10))),
            calls: AtomicUsize::new(0),
        });

        let first = lookup.rates_for("8471").unwrap();
        let second = lookup.rates_for("8471").unwrap();

        assert_eq!(first, second);
        assert_eq!(lookup.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookup.entry_count(), 1);
    }

    #[test]
    fn test_misses_are_not_cached() {
        let lookup = CachedTariffLookup::new(CountingLookup {
            table: StaticTariffTable::new(),
            calls: AtomicUsize::new(0),
        });

        assert!(lookup.rates_for("0000").unwrap().is_none());
        assert!(lookup.rates_for("0000").unwrap().is_none());
        assert_eq!(lookup.inner.calls.load(Ordering::SeqCst), 2);
    }
}
