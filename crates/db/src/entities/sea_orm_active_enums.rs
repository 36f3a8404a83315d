//! Postgres enum types.

use landed_core::charge::EntryType;
use landed_core::import::TaskStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "charge_entry_type")]
pub enum ChargeEntryType {
    #[sea_orm(string_value = "Addition")]
    Addition,
    #[sea_orm(string_value = "Allocation")]
    Allocation,
    #[sea_orm(string_value = "Return")]
    Return,
}

impl From<EntryType> for ChargeEntryType {
    fn from(value: EntryType) -> Self {
        match value {
            EntryType::Addition => Self::Addition,
            EntryType::Allocation => Self::Allocation,
            EntryType::Return => Self::Return,
        }
    }
}

impl From<ChargeEntryType> for EntryType {
    fn from(value: ChargeEntryType) -> Self {
        match value {
            ChargeEntryType::Addition => Self::Addition,
            ChargeEntryType::Allocation => Self::Allocation,
            ChargeEntryType::Return => Self::Return,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "recompute_task_status")]
pub enum RecomputeTaskStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "claimed")]
    Claimed,
    #[sea_orm(string_value = "parked")]
    Parked,
}

impl From<RecomputeTaskStatus> for TaskStatus {
    fn from(value: RecomputeTaskStatus) -> Self {
        match value {
            RecomputeTaskStatus::Pending => Self::Pending,
            RecomputeTaskStatus::Claimed => Self::Claimed,
            RecomputeTaskStatus::Parked => Self::Parked,
        }
    }
}
