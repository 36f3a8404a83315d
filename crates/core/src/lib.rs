//! Core business logic for Landed.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence and the host ERP are reached through collaborator traits.
//!
//! # Modules
//!
//! - `charge` - FIFO charge allocation ledger
//! - `tax` - Customs assessed value and import tax cascade
//! - `journal` - Journal vouchers, rounding balance and voucher builders
//! - `apportion` - Exact-sum apportionment of amounts over weights
//! - `import` - Import document lifecycle hooks, recomputation and outbox
//! - `lc` - Letters of credit and settlements

pub mod apportion;
pub mod charge;
pub mod import;
pub mod journal;
pub mod lc;
pub mod tax;
