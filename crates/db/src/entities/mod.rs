//! `SeaORM` entity definitions.

pub mod charge_ledger_entries;
pub mod charge_source_references;
pub mod recompute_tasks;
pub mod sea_orm_active_enums;
