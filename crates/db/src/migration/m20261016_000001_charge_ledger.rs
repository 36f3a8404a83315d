//! Charge allocation ledger tables.
//!
//! Creates the ledger entries and the source references linking each
//! allocation to the cost layers it drew from.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(CHARGE_LEDGER_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS charge_source_references CASCADE;
             DROP TABLE IF EXISTS charge_ledger_entries CASCADE;
             DROP TYPE IF EXISTS charge_entry_type;",
        )
        .await?;
        Ok(())
    }
}

const CHARGE_LEDGER_SQL: &str = r"
CREATE TYPE charge_entry_type AS ENUM ('Addition', 'Allocation', 'Return');

CREATE TABLE charge_ledger_entries (
    id UUID PRIMARY KEY,
    entry_type charge_entry_type NOT NULL,
    charge_type VARCHAR(64) NOT NULL,
    item_code VARCHAR(140) NOT NULL,
    qty NUMERIC(19, 6) NOT NULL,
    charges NUMERIC(19, 6) NOT NULL,
    remaining_qty NUMERIC(19, 6) NOT NULL DEFAULT 0,
    remaining_charges NUMERIC(19, 6) NOT NULL DEFAULT 0,
    posting_datetime TIMESTAMPTZ NOT NULL,
    reference_doctype VARCHAR(140) NOT NULL,
    reference_name VARCHAR(140) NOT NULL,
    is_cancelled BOOLEAN NOT NULL DEFAULT false,
    reverses_entry_id UUID REFERENCES charge_ledger_entries(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_charge_type CHECK (charge_type IN ('Import Charges', 'Assessment Variance')),
    CONSTRAINT chk_qty_positive CHECK (qty > 0),
    CONSTRAINT chk_charges_non_negative CHECK (charges >= 0),
    CONSTRAINT chk_remaining_non_negative CHECK (remaining_qty >= 0 AND remaining_charges >= 0),
    CONSTRAINT chk_remaining_within_layer CHECK (remaining_qty <= qty AND remaining_charges <= charges),
    CONSTRAINT chk_return_reverses CHECK ((entry_type = 'Return') = (reverses_entry_id IS NOT NULL))
);

-- FIFO scan of open layers per pool
CREATE INDEX idx_charge_entries_open_layers
    ON charge_ledger_entries(item_code, charge_type, posting_datetime, id)
    WHERE entry_type = 'Addition' AND is_cancelled = false AND remaining_qty > 0;

-- Latest allocation per pool (returns)
CREATE INDEX idx_charge_entries_allocations
    ON charge_ledger_entries(item_code, charge_type, posting_datetime DESC, id DESC)
    WHERE entry_type = 'Allocation' AND is_cancelled = false;

-- Live returns against an allocation
CREATE INDEX idx_charge_entries_reverses
    ON charge_ledger_entries(reverses_entry_id)
    WHERE reverses_entry_id IS NOT NULL;

-- Entries caused by a document (cancellation)
CREATE INDEX idx_charge_entries_reference ON charge_ledger_entries(reference_name);

CREATE TABLE charge_source_references (
    entry_id UUID NOT NULL REFERENCES charge_ledger_entries(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    source_entry_id UUID NOT NULL REFERENCES charge_ledger_entries(id),
    allocated_qty NUMERIC(19, 6) NOT NULL,
    allocated_charges NUMERIC(19, 6) NOT NULL,
    PRIMARY KEY (entry_id, position)
);

CREATE INDEX idx_charge_source_refs_source ON charge_source_references(source_entry_id);
";
