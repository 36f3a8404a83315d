//! `SeaORM` Entity for charge_ledger_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ChargeEntryType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "charge_ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entry_type: ChargeEntryType,
    pub charge_type: String,
    pub item_code: String,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))")]
    pub qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))")]
    pub charges: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))")]
    pub remaining_qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))")]
    pub remaining_charges: Decimal,
    pub posting_datetime: DateTimeWithTimeZone,
    pub reference_doctype: String,
    pub reference_name: String,
    pub is_cancelled: bool,
    pub reverses_entry_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::charge_source_references::Entity")]
    ChargeSourceReferences,
}

impl Related<super::charge_source_references::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChargeSourceReferences.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
