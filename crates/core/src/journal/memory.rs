//! In-process ledger poster.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use landed_shared::types::JournalId;

use super::error::JournalError;
use super::posting::LedgerPoster;
use super::types::JournalVoucher;

/// Keeps posted vouchers in memory.
///
/// Used by embedders without a host ledger and by tests, which can switch
/// it into a rejecting mode to exercise rollback paths.
#[derive(Debug, Default)]
pub struct InMemoryLedgerPoster {
    posted: Mutex<Vec<(JournalId, JournalVoucher)>>,
    failing: AtomicBool,
}

impl InMemoryLedgerPoster {
    /// Creates an empty poster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a poster that rejects every voucher.
    #[must_use]
    pub fn failing() -> Self {
        let poster = Self::default();
        poster.set_failing(true);
        poster
    }

    /// Switches rejection on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Vouchers posted so far, in posting order.
    #[must_use]
    pub fn posted(&self) -> Vec<JournalVoucher> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl LedgerPoster for InMemoryLedgerPoster {
    async fn post(&self, voucher: JournalVoucher) -> Result<JournalId, JournalError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(JournalError::Posting(format!(
                "ledger rejected voucher '{}'",
                voucher.title
            )));
        }
        let id = JournalId::new();
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, voucher));
        Ok(id)
    }
}
