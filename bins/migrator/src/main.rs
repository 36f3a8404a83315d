//! Database migration runner for Landed.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations
//!
//! The connection comes from `DATABASE_URL` (or `--database-url`). When
//! neither is given, the URL from `AppConfig` (`config/*.toml`,
//! `LANDED__DATABASE__URL`) is used.

use anyhow::Context;
use landed_db::migration::Migrator;
use landed_shared::AppConfig;
use sea_orm_migration::prelude::*;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    if std::env::var_os("DATABASE_URL").is_none()
        && let Ok(config) = AppConfig::load()
    {
        // SAFETY: no other thread exists yet; the runtime is built below.
        #[allow(unsafe_code)]
        unsafe {
            std::env::set_var("DATABASE_URL", &config.database.url);
        }
    }

    // Run the migrator CLI (it sets up its own tracing)
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(cli::run_cli(Migrator));
    Ok(())
}
