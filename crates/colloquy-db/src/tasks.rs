//! Scheduled task repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use colloquy_core::{
    Error, Recurrence, Result, ScheduledTask, TaskMetadata, TaskRepository, TaskStatus, TaskType,
};

const TASK_COLUMNS: &str = "id, owner, title, description, task_type, scheduled_for, recurrence, \
                            status, metadata, series_id, notified_at, created_at, updated_at";

/// PostgreSQL implementation of [`TaskRepository`].
#[derive(Clone)]
pub struct PgTaskRepository {
    pool: Pool<Postgres>,
}

impl PgTaskRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<ScheduledTask> {
        let recurrence: Option<serde_json::Value> = r.get("recurrence");
        let recurrence = match recurrence {
            Some(v) if !v.is_null() => Some(serde_json::from_value::<Recurrence>(v)?),
            _ => None,
        };
        let metadata: serde_json::Value = r.get("metadata");
        let metadata: TaskMetadata = serde_json::from_value(metadata)?;
        let task_type: String = r.get("task_type");
        let status: String = r.get("status");

        Ok(ScheduledTask {
            id: r.get("id"),
            owner: r.get("owner"),
            title: r.get("title"),
            description: r.get("description"),
            task_type: task_type.parse().unwrap_or(TaskType::Reminder),
            scheduled_for: r.get("scheduled_for"),
            recurrence,
            status: status.parse().unwrap_or(TaskStatus::Pending),
            metadata,
            series_id: r.get("series_id"),
            notified_at: r.get("notified_at"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }

    fn parse_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<ScheduledTask>> {
        rows.iter().map(Self::parse_row).collect()
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn insert_series(&self, tasks: &[ScheduledTask]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for task in tasks {
            let recurrence = task
                .recurrence
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?;
            let metadata = serde_json::to_value(&task.metadata)?;

            sqlx::query(
                "INSERT INTO scheduled_tasks
                    (id, owner, title, description, task_type, scheduled_for, recurrence,
                     status, metadata, series_id, notified_at, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(task.id)
            .bind(&task.owner)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.task_type.as_str())
            .bind(task.scheduled_for)
            .bind(recurrence)
            .bind(task.status.as_str())
            .bind(metadata)
            .bind(task.series_id)
            .bind(task.notified_at)
            .bind(task.created_at)
            .bind(task.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "tasks",
            op = "insert_series",
            task_count = tasks.len(),
            "Inserted task series"
        );
        Ok(())
    }

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<ScheduledTask>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM scheduled_tasks WHERE id = $1 AND owner = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn update_status(&self, id: Uuid, owner: &str, status: TaskStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_tasks SET status = $1, updated_at = now()
             WHERE id = $2 AND owner = $3",
        )
        .bind(status.as_str())
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn snooze(&self, id: Uuid, owner: &str, until: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_tasks
             SET scheduled_for = $1, status = 'snoozed', notified_at = NULL, updated_at = now()
             WHERE id = $2 AND owner = $3",
        )
        .bind(until)
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_open(&self, owner: &str) -> Result<Vec<ScheduledTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM scheduled_tasks
             WHERE owner = $1 AND status IN ('pending', 'snoozed')
             ORDER BY scheduled_for ASC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_rows(rows)
    }

    async fn list_between(
        &self,
        owner: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM scheduled_tasks
             WHERE owner = $1 AND status IN ('pending', 'snoozed')
               AND scheduled_for >= $2 AND scheduled_for <= $3
             ORDER BY scheduled_for ASC"
        ))
        .bind(owner)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_rows(rows)
    }

    async fn list_suggestions(&self, owner: &str) -> Result<Vec<ScheduledTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM scheduled_tasks
             WHERE owner = $1 AND task_type = 'suggestion' AND status IN ('pending', 'snoozed')
             ORDER BY scheduled_for ASC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_rows(rows)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledTask>> {
        // SKIP LOCKED keeps concurrent sweeps from claiming the same rows.
        let rows = sqlx::query(&format!(
            "UPDATE scheduled_tasks
             SET notified_at = $1,
                 status = CASE WHEN status = 'snoozed' THEN 'pending' ELSE status END,
                 updated_at = $1
             WHERE id IN (
                 SELECT id FROM scheduled_tasks
                 WHERE status IN ('pending', 'snoozed')
                   AND scheduled_for <= $1
                   AND notified_at IS NULL
                 ORDER BY scheduled_for ASC
                 LIMIT $2
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut tasks = Self::parse_rows(rows)?;
        tasks.sort_by_key(|t| t.scheduled_for);
        Ok(tasks)
    }

    async fn release_claim(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE scheduled_tasks SET notified_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
