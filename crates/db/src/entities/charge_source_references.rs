//! `SeaORM` Entity for charge_source_references table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "charge_source_references")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub entry_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub position: i32,
    pub source_entry_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))")]
    pub allocated_qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))")]
    pub allocated_charges: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::charge_ledger_entries::Entity",
        from = "Column::EntryId",
        to = "super::charge_ledger_entries::Column::Id"
    )]
    ChargeLedgerEntries,
}

impl Related<super::charge_ledger_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChargeLedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
