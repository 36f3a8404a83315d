//! Shared types and configuration for Landed.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Decimal rounding helpers for amounts and quantities
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{
    AccountKey, AccountsConfig, AppConfig, ChargesConfig, DatabaseConfig, PostingConfig,
    RecomputeConfig, ReturnRestorePolicy,
};
