//! Recompute outbox table.
//!
//! At most one pending task exists per import document; enqueues of an
//! already pending document resolve to the existing row.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(RECOMPUTE_OUTBOX_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS recompute_tasks CASCADE;
             DROP TYPE IF EXISTS recompute_task_status;",
        )
        .await?;
        Ok(())
    }
}

const RECOMPUTE_OUTBOX_SQL: &str = r"
CREATE TYPE recompute_task_status AS ENUM ('pending', 'claimed', 'parked');

CREATE TABLE recompute_tasks (
    id UUID PRIMARY KEY,
    import_doc VARCHAR(140) NOT NULL,
    status recompute_task_status NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    claimed_at TIMESTAMPTZ,
    last_error TEXT,
    CONSTRAINT chk_attempts_non_negative CHECK (attempts >= 0)
);

CREATE UNIQUE INDEX idx_recompute_tasks_pending_doc
    ON recompute_tasks(import_doc) WHERE status = 'pending';

CREATE INDEX idx_recompute_tasks_claim
    ON recompute_tasks(enqueued_at, id) WHERE status = 'pending';
";
