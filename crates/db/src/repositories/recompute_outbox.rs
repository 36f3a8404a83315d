//! Postgres recompute outbox.
//!
//! Workers claim with `FOR UPDATE SKIP LOCKED`, so several workers (or
//! processes) drain the same table without claiming a task twice. A partial
//! unique index keeps at most one pending task per import document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use landed_core::import::{ImportError, RecomputeOutbox, RecomputeTask};
use landed_shared::types::RecomputeTaskId;
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::entities::recompute_tasks;
use crate::entities::sea_orm_active_enums::RecomputeTaskStatus;

fn db_err(err: DbErr) -> ImportError {
    ImportError::Store(err.to_string())
}

const ENQUEUE_SQL: &str = r"
INSERT INTO recompute_tasks (id, import_doc, status, attempts, enqueued_at)
VALUES ($1, $2, 'pending', 0, now())
ON CONFLICT (import_doc) WHERE status = 'pending'
DO UPDATE SET import_doc = EXCLUDED.import_doc
RETURNING id
";

/// Recompute outbox backed by Postgres.
///
/// Enqueues made through this handle wake a worker waiting on the same
/// handle; tasks written by other processes are picked up on the next poll.
#[derive(Debug, Clone)]
pub struct SeaRecomputeOutbox {
    db: DatabaseConnection,
    notify: Arc<Notify>,
}

impl SeaRecomputeOutbox {
    /// Creates a new outbox.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Parked tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Store` on a database failure.
    pub async fn parked(&self) -> Result<Vec<RecomputeTask>, ImportError> {
        let rows = recompute_tasks::Entity::find()
            .filter(recompute_tasks::Column::Status.eq(RecomputeTaskStatus::Parked))
            .order_by_asc(recompute_tasks::Column::EnqueuedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(to_task).collect())
    }
}

fn to_task(row: recompute_tasks::Model) -> RecomputeTask {
    RecomputeTask {
        id: RecomputeTaskId::from_uuid(row.id),
        import_doc: row.import_doc,
        attempts: u32::try_from(row.attempts).unwrap_or_default(),
        enqueued_at: row.enqueued_at.with_timezone(&Utc),
        last_error: row.last_error,
    }
}

#[async_trait]
impl RecomputeOutbox for SeaRecomputeOutbox {
    async fn enqueue(&self, import_doc: &str) -> Result<RecomputeTaskId, ImportError> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                ENQUEUE_SQL,
                [RecomputeTaskId::new().into_inner().into(), import_doc.into()],
            ))
            .await
            .map_err(db_err)?
            .ok_or_else(|| ImportError::Store("enqueue returned no row".to_string()))?;
        let id: Uuid = row.try_get("", "id").map_err(db_err)?;

        self.notify.notify_one();
        Ok(RecomputeTaskId::from_uuid(id))
    }

    async fn claim(&self) -> Result<Option<RecomputeTask>, ImportError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let Some(row) = recompute_tasks::Entity::find()
            .filter(recompute_tasks::Column::Status.eq(RecomputeTaskStatus::Pending))
            .order_by_asc(recompute_tasks::Column::EnqueuedAt)
            .order_by_asc(recompute_tasks::Column::Id)
            .limit(1)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let attempts = row.attempts + 1;
        let mut active = row.into_active_model();
        active.status = Set(RecomputeTaskStatus::Claimed);
        active.attempts = Set(attempts);
        active.claimed_at = Set(Some(Utc::now().fixed_offset()));
        let claimed = active.update(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(Some(to_task(claimed)))
    }

    async fn complete(&self, id: RecomputeTaskId) -> Result<(), ImportError> {
        let result = recompute_tasks::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(ImportError::not_found("RecomputeTask", &id.to_string()));
        }
        Ok(())
    }

    async fn fail(
        &self,
        id: RecomputeTaskId,
        error: &str,
        max_attempts: u32,
    ) -> Result<(), ImportError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let row = recompute_tasks::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| ImportError::not_found("RecomputeTask", &id.to_string()))?;

        let exhausted = u32::try_from(row.attempts).unwrap_or(u32::MAX) >= max_attempts;
        let covered = !exhausted
            && recompute_tasks::Entity::find()
                .filter(recompute_tasks::Column::ImportDoc.eq(row.import_doc.as_str()))
                .filter(recompute_tasks::Column::Status.eq(RecomputeTaskStatus::Pending))
                .one(&txn)
                .await
                .map_err(db_err)?
                .is_some();

        let requeued = if covered {
            // A newer pending task already covers the document
            recompute_tasks::Entity::delete_by_id(row.id)
                .exec(&txn)
                .await
                .map_err(db_err)?;
            false
        } else {
            let mut active = row.into_active_model();
            active.last_error = Set(Some(error.to_string()));
            active.status = Set(if exhausted {
                RecomputeTaskStatus::Parked
            } else {
                RecomputeTaskStatus::Pending
            });
            active.update(&txn).await.map_err(db_err)?;
            !exhausted
        };

        txn.commit().await.map_err(db_err)?;
        if exhausted {
            tracing::warn!(task_id = %id, %error, "recompute task parked");
        }
        if requeued {
            self.notify.notify_one();
        }
        Ok(())
    }

    async fn wait(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }
}
