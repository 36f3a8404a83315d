//! Charge allocation ledger domain types.

use chrono::{DateTime, Utc};
use landed_shared::types::ChargeEntryId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ChargeError;

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// A new cost layer of unconsumed charges.
    Addition,
    /// Consumption drawn FIFO from one or more cost layers.
    Allocation,
    /// Reversal of a prior consumption.
    Return,
}

impl EntryType {
    /// Returns the ledger label of the entry type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Addition => "Addition",
            Self::Allocation => "Allocation",
            Self::Return => "Return",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = ChargeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Addition" => Ok(Self::Addition),
            "Allocation" => Ok(Self::Allocation),
            "Return" => Ok(Self::Return),
            _ => Err(ChargeError::Validation(format!(
                "Invalid entry type '{s}'. Must be 'Addition', 'Allocation' or 'Return'"
            ))),
        }
    }
}

/// Charge pool an entry belongs to. Pools are never mixed during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ChargeType {
    /// Customs and clearing charges apportioned at import finalization.
    #[serde(rename = "Import Charges")]
    ImportCharges,
    /// Difference between the customs assessed value and the invoiced value.
    #[serde(rename = "Assessment Variance")]
    AssessmentVariance,
}

impl ChargeType {
    /// Returns the ledger label of the charge type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImportCharges => "Import Charges",
            Self::AssessmentVariance => "Assessment Variance",
        }
    }
}

impl std::fmt::Display for ChargeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChargeType {
    type Err = ChargeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Import Charges" => Ok(Self::ImportCharges),
            "Assessment Variance" => Ok(Self::AssessmentVariance),
            _ => Err(ChargeError::Validation(format!("Unknown charge type '{s}'"))),
        }
    }
}

/// Reference to the external document that caused an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Document type, e.g. `Sales Invoice` or `ImportDoc`.
    pub doctype: String,
    /// Document name, e.g. `SINV-0001`.
    pub name: String,
}

impl DocumentRef {
    /// Creates a new document reference.
    #[must_use]
    pub fn new(doctype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.doctype, self.name)
    }
}

/// Audit link from an Allocation (or Return) to a cost layer it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    /// The Addition entry drawn from (or restored to).
    pub source_entry: ChargeEntryId,
    /// Quantity drawn from the layer.
    pub allocated_qty: Decimal,
    /// Charges drawn from the layer.
    pub allocated_charges: Decimal,
}

/// A persisted charge allocation ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeLedgerEntry {
    /// Unique identifier.
    pub id: ChargeEntryId,
    /// Addition, Allocation or Return.
    pub entry_type: EntryType,
    /// Charge pool.
    pub charge_type: ChargeType,
    /// Inventory item the pool concerns.
    pub item_code: String,
    /// Quantity added or consumed.
    pub qty: Decimal,
    /// Charges added or consumed (positive magnitude for every entry type).
    pub charges: Decimal,
    /// Unconsumed quantity of an Addition layer.
    pub remaining_qty: Decimal,
    /// Unconsumed charges of an Addition layer.
    pub remaining_charges: Decimal,
    /// FIFO ordering key, assigned by the store.
    pub posting_datetime: DateTime<Utc>,
    /// Document that caused the entry.
    pub reference: DocumentRef,
    /// Layers drawn from (Allocation) or restored to (Return).
    pub source_references: Vec<SourceReference>,
    /// Allocation given back by a Return.
    pub reverses: Option<ChargeEntryId>,
    /// Logical cancellation flag.
    pub is_cancelled: bool,
}

impl ChargeLedgerEntry {
    /// Returns true for an Addition layer that still has quantity to give.
    #[must_use]
    pub fn is_open_layer(&self) -> bool {
        self.entry_type == EntryType::Addition
            && !self.is_cancelled
            && self.remaining_qty > Decimal::ZERO
    }

    /// Charge per unit still held by this layer, if any quantity remains.
    #[must_use]
    pub fn remaining_unit_charge(&self) -> Option<Decimal> {
        (self.remaining_qty > Decimal::ZERO).then(|| self.remaining_charges / self.remaining_qty)
    }

    /// Charge per unit recorded on the entry itself.
    #[must_use]
    pub fn unit_charge(&self) -> Option<Decimal> {
        (self.qty > Decimal::ZERO).then(|| self.charges / self.qty)
    }

    pub(crate) fn consume(&mut self, qty: Decimal, charges: Decimal) {
        self.remaining_qty -= qty;
        self.remaining_charges -= charges;
    }

    pub(crate) fn restore(&mut self, qty: Decimal, charges: Decimal) {
        self.remaining_qty += qty;
        self.remaining_charges += charges;
    }
}

/// A ledger entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChargeEntry {
    /// Addition, Allocation or Return.
    pub entry_type: EntryType,
    /// Charge pool.
    pub charge_type: ChargeType,
    /// Inventory item.
    pub item_code: String,
    /// Quantity.
    pub qty: Decimal,
    /// Charges.
    pub charges: Decimal,
    /// Initial unconsumed quantity (Addition only).
    pub remaining_qty: Decimal,
    /// Initial unconsumed charges (Addition only).
    pub remaining_charges: Decimal,
    /// Document that caused the entry.
    pub reference: DocumentRef,
    /// Layers touched.
    pub source_references: Vec<SourceReference>,
    /// Allocation given back (Return only).
    pub reverses: Option<ChargeEntryId>,
}

impl NewChargeEntry {
    /// Checks the required fields before the entry reaches a store.
    ///
    /// # Errors
    ///
    /// Returns `ChargeError::Validation` on a missing or malformed field.
    pub fn validate(&self) -> Result<(), ChargeError> {
        if self.item_code.trim().is_empty() {
            return Err(ChargeError::Validation("item_code is required".to_string()));
        }
        if self.reference.doctype.trim().is_empty() || self.reference.name.trim().is_empty() {
            return Err(ChargeError::Validation(
                "reference document is required".to_string(),
            ));
        }
        if self.qty <= Decimal::ZERO {
            return Err(ChargeError::Validation(format!(
                "qty must be positive, got {}",
                self.qty
            )));
        }
        if self.charges < Decimal::ZERO {
            return Err(ChargeError::Validation(format!(
                "charges cannot be negative, got {}",
                self.charges
            )));
        }
        match self.entry_type {
            EntryType::Addition => {
                if !self.source_references.is_empty() {
                    return Err(ChargeError::Validation(
                        "Addition entries carry no source references".to_string(),
                    ));
                }
            }
            EntryType::Allocation => {
                let drawn: Decimal = self.source_references.iter().map(|r| r.allocated_qty).sum();
                if drawn != self.qty {
                    return Err(ChargeError::Validation(format!(
                        "Allocation qty {} does not match source references total {drawn}",
                        self.qty
                    )));
                }
            }
            EntryType::Return => {
                if self.reverses.is_none() {
                    return Err(ChargeError::Validation(
                        "Return entries must name the allocation they reverse".to_string(),
                    ));
                }
                let restored: Decimal =
                    self.source_references.iter().map(|r| r.allocated_qty).sum();
                if restored != self.qty {
                    return Err(ChargeError::Validation(format!(
                        "Return qty {} does not match restored total {restored}",
                        self.qty
                    )));
                }
            }
        }
        if self.entry_type != EntryType::Return && self.reverses.is_some() {
            return Err(ChargeError::Validation(format!(
                "{} entries do not reverse an allocation",
                self.entry_type
            )));
        }
        Ok(())
    }
}

/// Input for creating a cost layer.
#[derive(Debug, Clone)]
pub struct AdditionRequest {
    /// Inventory item.
    pub item_code: String,
    /// Charge pool.
    pub charge_type: ChargeType,
    /// Quantity (> 0).
    pub qty: Decimal,
    /// Charges (>= 0).
    pub charges: Decimal,
    /// Origin document, usually the import document.
    pub reference: DocumentRef,
}

/// Input for consuming (or returning) charges of an item.
#[derive(Debug, Clone)]
pub struct ConsumptionRequest {
    /// Inventory item.
    pub item_code: String,
    /// Charge pool.
    pub charge_type: ChargeType,
    /// Quantity (> 0).
    pub qty: Decimal,
    /// Origin document, usually a sales invoice.
    pub reference: DocumentRef,
}

impl ConsumptionRequest {
    pub(crate) fn validate(&self) -> Result<(), ChargeError> {
        if self.item_code.trim().is_empty() {
            return Err(ChargeError::Validation("item_code is required".to_string()));
        }
        if self.qty <= Decimal::ZERO {
            return Err(ChargeError::Validation(format!(
                "qty must be positive, got {}",
                self.qty
            )));
        }
        Ok(())
    }
}

/// Result of a FIFO allocation.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    /// The persisted Allocation entry.
    pub entry: ChargeLedgerEntry,
    /// The cost layers after they were drawn down, in FIFO order.
    pub sources: Vec<ChargeLedgerEntry>,
}

impl AllocationOutcome {
    /// Total charges drawn across every layer.
    #[must_use]
    pub fn allocated_charges(&self) -> Decimal {
        self.entry.charges
    }
}

/// Result of a return.
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    /// The persisted Return entry.
    pub entry: ChargeLedgerEntry,
    /// The Allocation entry the return was priced against.
    pub reversed: ChargeLedgerEntry,
    /// The cost layers after restoration.
    pub restored: Vec<ChargeLedgerEntry>,
}

impl ReturnOutcome {
    /// Charges given back to the cost layers.
    #[must_use]
    pub fn returned_charges(&self) -> Decimal {
        self.entry.charges
    }
}

/// Result of cancelling the allocations or returns of a document.
#[derive(Debug, Clone, Default)]
pub struct CancellationOutcome {
    /// Entries flagged as cancelled.
    pub cancelled: Vec<ChargeLedgerEntry>,
    /// The cost layers touched, after the movement.
    pub restored: Vec<ChargeLedgerEntry>,
    /// Charges moved between the cancelled entries and the cost layers.
    pub released: Decimal,
}

impl CancellationOutcome {
    /// Charges moved back to (or, for returns, taken off) the cost layers.
    #[must_use]
    pub fn released_charges(&self) -> Decimal {
        self.released
    }

    /// Returns true when nothing was cancelled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty()
    }
}

/// Unconsumed balance of a charge pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolBalance {
    /// Sum of remaining quantity across open layers.
    pub remaining_qty: Decimal,
    /// Sum of remaining charges across open layers.
    pub remaining_charges: Decimal,
    /// Number of open layers.
    pub open_layers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn new_entry(entry_type: EntryType) -> NewChargeEntry {
        NewChargeEntry {
            entry_type,
            charge_type: ChargeType::ImportCharges,
            item_code: "ITEM-001".to_string(),
            qty: dec!(10),
            charges: dec!(100),
            remaining_qty: dec!(10),
            remaining_charges: dec!(100),
            reference: DocumentRef::new("ImportDoc", "IMP-0001"),
            source_references: vec![],
            reverses: None,
        }
    }

    #[test]
    fn test_entry_type_round_trip() {
        for entry_type in [EntryType::Addition, EntryType::Allocation, EntryType::Return] {
            assert_eq!(EntryType::from_str(entry_type.as_str()).unwrap(), entry_type);
        }
        assert!(matches!(
            EntryType::from_str("Transfer"),
            Err(ChargeError::Validation(_))
        ));
    }

    #[test]
    fn test_charge_type_labels() {
        assert_eq!(ChargeType::ImportCharges.to_string(), "Import Charges");
        assert_eq!(
            ChargeType::from_str("Assessment Variance").unwrap(),
            ChargeType::AssessmentVariance
        );
        assert!(ChargeType::from_str("Freight").is_err());
    }

    #[test]
    fn test_validate_addition() {
        assert!(new_entry(EntryType::Addition).validate().is_ok());

        let mut zero_charges = new_entry(EntryType::Addition);
        zero_charges.charges = Decimal::ZERO;
        assert!(zero_charges.validate().is_ok());

        let mut no_item = new_entry(EntryType::Addition);
        no_item.item_code = "  ".to_string();
        assert!(matches!(no_item.validate(), Err(ChargeError::Validation(_))));

        let mut zero_qty = new_entry(EntryType::Addition);
        zero_qty.qty = Decimal::ZERO;
        assert!(zero_qty.validate().is_err());

        let mut negative = new_entry(EntryType::Addition);
        negative.charges = dec!(-1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_validate_allocation_requires_matching_sources() {
        let mut allocation = new_entry(EntryType::Allocation);
        allocation.source_references = vec![SourceReference {
            source_entry: ChargeEntryId::new(),
            allocated_qty: dec!(4),
            allocated_charges: dec!(40),
        }];
        assert!(allocation.validate().is_err());

        allocation.source_references.push(SourceReference {
            source_entry: ChargeEntryId::new(),
            allocated_qty: dec!(6),
            allocated_charges: dec!(60),
        });
        assert!(allocation.validate().is_ok());
    }

    #[test]
    fn test_validate_return_names_reversed_allocation() {
        let mut ret = new_entry(EntryType::Return);
        ret.source_references = vec![SourceReference {
            source_entry: ChargeEntryId::new(),
            allocated_qty: dec!(10),
            allocated_charges: dec!(100),
        }];
        assert!(matches!(ret.validate(), Err(ChargeError::Validation(_))));

        ret.reverses = Some(ChargeEntryId::new());
        assert!(ret.validate().is_ok());

        let mut addition = new_entry(EntryType::Addition);
        addition.reverses = Some(ChargeEntryId::new());
        assert!(addition.validate().is_err());
    }

    #[test]
    fn test_unit_charges() {
        let entry = ChargeLedgerEntry {
            id: ChargeEntryId::new(),
            entry_type: EntryType::Addition,
            charge_type: ChargeType::ImportCharges,
            item_code: "ITEM-001".to_string(),
            qty: dec!(10),
            charges: dec!(100),
            remaining_qty: Decimal::ZERO,
            remaining_charges: Decimal::ZERO,
            posting_datetime: Utc::now(),
            reference: DocumentRef::new("ImportDoc", "IMP-0001"),
            source_references: vec![],
            reverses: None,
            is_cancelled: false,
        };
        assert_eq!(entry.unit_charge(), Some(dec!(10)));
        assert_eq!(entry.remaining_unit_charge(), None);
        assert!(!entry.is_open_layer());
    }
}
