//! Import document aggregate and the host documents that feed it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::charge::DocumentRef;

/// Purpose of a purchase invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseInvoiceType {
    /// Ordinary purchase, unrelated to imports.
    #[default]
    Standard,
    /// Supplier invoice for imported goods.
    Import,
    /// Clearing agent, freight or other service charges of an import.
    #[serde(rename = "Import Service Charges")]
    ImportServiceCharges,
}

/// A purchase invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInvoiceLine {
    /// Item name.
    pub item_name: String,
    /// Line amount in base currency.
    pub amount: Decimal,
}

/// Snapshot of a host purchase invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    /// Invoice name.
    pub name: String,
    /// Invoice purpose.
    pub invoice_type: PurchaseInvoiceType,
    /// Supplier.
    pub supplier: String,
    /// Rounded total in invoice currency.
    pub rounded_total: Decimal,
    /// Rounded total in base currency.
    pub base_rounded_total: Decimal,
    /// Invoice lines.
    pub items: Vec<PurchaseInvoiceLine>,
    /// Import document the invoice is tagged with.
    pub import_document: Option<String>,
    /// Whether the invoice is submitted.
    pub is_submitted: bool,
}

/// Snapshot of a host journal entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryDoc {
    /// Entry name.
    pub name: String,
    /// Entry title.
    pub title: String,
    /// Amount charged to the import.
    pub amount: Decimal,
    /// Import document the entry is tagged with.
    pub import_document: Option<String>,
    /// Whether the entry is submitted.
    pub is_submitted: bool,
}

/// A sales invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesInvoiceItem {
    /// Item code.
    pub item_code: String,
    /// Sold quantity (negative on return invoices).
    pub qty: Decimal,
}

/// Snapshot of a host sales invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesInvoice {
    /// Invoice name.
    pub name: String,
    /// Posting date.
    pub posting_date: NaiveDate,
    /// Credit note against an earlier invoice.
    pub is_return: bool,
    /// Invoice lines.
    pub items: Vec<SalesInvoiceItem>,
}

impl SalesInvoice {
    /// Reference used for ledger entries and vouchers.
    #[must_use]
    pub fn reference(&self) -> DocumentRef {
        DocumentRef::new("Sales Invoice", self.name.clone())
    }
}

/// An item row of an import document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDocItem {
    /// Item code.
    pub item_code: String,
    /// Imported quantity.
    pub qty: Decimal,
    /// Landed value in base currency; the apportionment weight.
    pub base_amount: Decimal,
    /// Share of the import's charges, customs duty excluded.
    pub allocated_charges_ex_cd: Decimal,
    /// Customs assessed value minus invoiced value.
    pub assessment_difference: Decimal,
}

/// A supplier invoice linked to an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPurchaseInvoice {
    /// Invoice name.
    pub purchase_invoice: String,
    /// Total in invoice currency.
    pub total_value: Decimal,
    /// Total in base currency.
    pub total_base_value: Decimal,
}

/// One service charge line linked to an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedServiceCharge {
    /// Source invoice.
    pub document: DocumentRef,
    /// Charged service.
    pub charge_item: String,
    /// Supplier paid.
    pub paid_to: String,
    /// Line amount.
    pub amount: Decimal,
}

/// A miscellaneous journal charge linked to an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedMiscCharge {
    /// Journal entry name.
    pub journal_entry: String,
    /// Journal entry title.
    pub title: String,
    /// Amount charged.
    pub amount: Decimal,
}

/// Totals of an import document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDocTotals {
    /// Base value of the linked supplier invoices.
    pub import_value: Decimal,
    /// Sum of linked service charge lines.
    pub service_charges: Decimal,
    /// Sum of linked miscellaneous charges.
    pub misc_charges: Decimal,
    /// Service plus miscellaneous charges.
    pub total_charges: Decimal,
}

/// Import document: one shipment and everything charged to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDoc {
    /// Document name.
    pub name: String,
    /// Item rows.
    pub items: Vec<ImportDocItem>,
    /// Linked supplier invoices.
    pub linked_purchase_invoices: Vec<LinkedPurchaseInvoice>,
    /// Linked service charge lines.
    pub linked_service_charges: Vec<LinkedServiceCharge>,
    /// Linked miscellaneous charges.
    pub linked_misc_charges: Vec<LinkedMiscCharge>,
    /// Totals.
    pub totals: ImportDocTotals,
}

impl ImportDoc {
    /// Reference used for ledger entries.
    #[must_use]
    pub fn reference(&self) -> DocumentRef {
        DocumentRef::new("ImportDoc", self.name.clone())
    }
}
