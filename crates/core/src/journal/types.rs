//! Journal voucher types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::charge::DocumentRef;

/// Party attached to a journal line (e.g. `Government / Pakistan Customs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Party type as known by the host ledger.
    pub party_type: String,
    /// Party name.
    pub name: String,
}

impl Party {
    /// Creates a party.
    #[must_use]
    pub fn new(party_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            party_type: party_type.into(),
            name: name.into(),
        }
    }

    /// The customs authority as a `Government` party.
    #[must_use]
    pub fn government(name: impl Into<String>) -> Self {
        Self::new("Government", name)
    }
}

/// One line of a journal voucher.
///
/// Exactly one of `debit` and `credit` is expected to be non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Account name in the host chart of accounts.
    pub account: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Optional party.
    pub party: Option<Party>,
    /// Counter account, for the host's "against" column.
    pub against: Option<String>,
    /// Optional cost center.
    pub cost_center: Option<String>,
}

impl JournalLine {
    /// Creates a debit line.
    #[must_use]
    pub fn debit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            debit: amount,
            credit: Decimal::ZERO,
            party: None,
            against: None,
            cost_center: None,
        }
    }

    /// Creates a credit line.
    #[must_use]
    pub fn credit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            debit: Decimal::ZERO,
            credit: amount,
            party: None,
            against: None,
            cost_center: None,
        }
    }

    /// Sets the party.
    #[must_use]
    pub fn with_party(mut self, party: Party) -> Self {
        self.party = Some(party);
        self
    }

    /// Sets the counter account.
    #[must_use]
    pub fn against(mut self, account: impl Into<String>) -> Self {
        self.against = Some(account.into());
        self
    }

    /// Sets the cost center.
    #[must_use]
    pub fn with_cost_center(mut self, cost_center: impl Into<String>) -> Self {
        self.cost_center = Some(cost_center.into());
        self
    }
}

/// A journal voucher ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalVoucher {
    /// Voucher title, e.g. `ST Pakistan Customs`.
    pub title: String,
    /// Posting date.
    pub posting_date: NaiveDate,
    /// Document the voucher was raised for.
    pub reference: Option<DocumentRef>,
    /// Import document the voucher is tagged with.
    pub import_document: Option<String>,
    /// Voucher lines.
    pub lines: Vec<JournalLine>,
}

impl JournalVoucher {
    /// Creates an empty voucher.
    #[must_use]
    pub fn new(title: impl Into<String>, posting_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            posting_date,
            reference: None,
            import_document: None,
            lines: Vec::new(),
        }
    }

    /// Sets the originating document.
    #[must_use]
    pub fn with_reference(mut self, reference: DocumentRef) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Tags the voucher with an import document.
    #[must_use]
    pub fn with_import_document(mut self, import_document: Option<String>) -> Self {
        self.import_document = import_document;
        self
    }

    /// Appends a line.
    #[must_use]
    pub fn line(mut self, line: JournalLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Sum of debits.
    #[must_use]
    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    /// Sum of credits.
    #[must_use]
    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Returns true if debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }
}
