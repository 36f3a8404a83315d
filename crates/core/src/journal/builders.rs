//! Voucher builders for customs taxes and charge allocations.

use chrono::NaiveDate;
use landed_shared::{AccountKey, AccountsConfig};
use rust_decimal::Decimal;

use super::error::JournalError;
use super::types::{JournalLine, JournalVoucher, Party};
use crate::charge::DocumentRef;
use crate::tax::{LandedCostVoucher, TaxCategory};

/// Direction of a charge allocation posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeMovement {
    /// Charges move from the unallocated pool to the P&L.
    Allocated,
    /// Charges move back into the unallocated pool (returns, cancellations).
    Restored,
}

fn debit_account(category: TaxCategory) -> AccountKey {
    match category {
        TaxCategory::SalesTax | TaxCategory::AdditionalSalesTax => AccountKey::SalesTaxInput,
        TaxCategory::IncomeTax => AccountKey::AdvanceIncomeTax,
        TaxCategory::CustomsDuty | TaxCategory::AdditionalCustomsDuty | TaxCategory::Cess => {
            AccountKey::UnallocatedImportCharges
        }
    }
}

/// Builds one voucher per item and tax category with a positive amount.
///
/// Every required account is resolved before the first voucher is built,
/// so a missing account fails the whole batch.
///
/// # Errors
///
/// Returns `JournalError::MissingConfiguration` naming the first missing
/// account.
pub fn import_tax_vouchers(
    voucher: &LandedCostVoucher,
    accounts: &AccountsConfig,
) -> Result<Vec<JournalVoucher>, JournalError> {
    let mut needed: Vec<TaxCategory> = Vec::new();
    for item in &voucher.items {
        for category in TaxCategory::ALL {
            if item.taxes.amount(category) > Decimal::ZERO && !needed.contains(&category) {
                needed.push(category);
            }
        }
    }
    if needed.is_empty() {
        return Ok(Vec::new());
    }

    let payable = accounts.require(AccountKey::GovernmentPayable)?;
    for category in &needed {
        accounts.require(debit_account(*category))?;
    }

    let party = Party::government(accounts.customs_party.clone());
    let reference = DocumentRef::new("Landed Cost Voucher", voucher.name.clone());
    let mut vouchers = Vec::new();

    for item in &voucher.items {
        for category in TaxCategory::ALL {
            let amount = item.taxes.amount(category);
            if amount <= Decimal::ZERO {
                continue;
            }
            let debit = accounts.require(debit_account(category))?;

            vouchers.push(
                JournalVoucher::new(
                    format!("{} {}", category.voucher_code(), accounts.customs_party),
                    voucher.posting_date,
                )
                .with_reference(reference.clone())
                .with_import_document(voucher.import_document.clone())
                .line(JournalLine::debit(debit, amount))
                .line(JournalLine::credit(payable, amount).with_party(party.clone())),
            );
        }
    }

    Ok(vouchers)
}

/// Builds the voucher moving allocated import charges of a sales invoice.
///
/// # Errors
///
/// Returns `JournalError::MissingConfiguration` if either import charges
/// account is missing.
pub fn charge_allocation_voucher(
    invoice: &DocumentRef,
    posting_date: NaiveDate,
    charges: Decimal,
    movement: ChargeMovement,
    accounts: &AccountsConfig,
) -> Result<JournalVoucher, JournalError> {
    let expense = accounts.require(AccountKey::DefaultImportCharges)?;
    let unallocated = accounts.require(AccountKey::UnallocatedImportCharges)?;

    let (debit, credit) = match movement {
        ChargeMovement::Allocated => (expense, unallocated),
        ChargeMovement::Restored => (unallocated, expense),
    };
    let title = match movement {
        ChargeMovement::Allocated => format!("Import charges allocated to {}", invoice.name),
        ChargeMovement::Restored => format!("Import charges restored from {}", invoice.name),
    };

    Ok(JournalVoucher::new(title, posting_date)
        .with_reference(invoice.clone())
        .line(JournalLine::debit(debit, charges).against(credit))
        .line(JournalLine::credit(credit, charges).against(debit)))
}
