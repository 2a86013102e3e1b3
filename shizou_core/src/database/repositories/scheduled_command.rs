//! Scheduled command repository implementation

use crate::Result;
use crate::database::models::{NewScheduledCommand, QueueType, ScheduledCommand, time_utils};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::Repository;

/// Repository for future and recurring command triggers
#[derive(Debug, Clone)]
pub struct ScheduledCommandRepository {
    pool: SqlitePool,
}

impl ScheduledCommandRepository {
    /// Create a new scheduled command repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a trigger unless one exists for the same command
    ///
    /// Returns the new row id, or `None` when the existing trigger was kept.
    pub async fn insert_if_absent(&self, scheduled: &NewScheduledCommand) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO scheduled_commands (
                command_id, queue_type, args, runs_left, next_run_time, interval_ms
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(command_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&scheduled.command_id)
        .bind(scheduled.queue_type)
        .bind(&scheduled.args)
        .bind(scheduled.runs_left)
        .bind(time_utils::to_millis(scheduled.next_run_time))
        .bind(scheduled.interval_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn find_by_command_id(&self, command_id: &str) -> Result<Option<ScheduledCommand>> {
        let row = sqlx::query(
            r#"
            SELECT id, command_id, queue_type, args, runs_left, next_run_time, interval_ms
            FROM scheduled_commands
            WHERE command_id = ?
            "#,
        )
        .bind(command_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_scheduled_command).transpose()
    }

    /// Triggers of a queue whose run time is strictly before `now`
    pub async fn find_due(
        &self,
        queue: QueueType,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledCommand>> {
        let rows = sqlx::query(
            r#"
            SELECT id, command_id, queue_type, args, runs_left, next_run_time, interval_ms
            FROM scheduled_commands
            WHERE queue_type = ? AND next_run_time < ?
            ORDER BY next_run_time ASC, id ASC
            "#,
        )
        .bind(queue)
        .bind(time_utils::to_millis(now))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_scheduled_command).collect()
    }

    /// Every trigger ordered by run time
    pub async fn list(&self) -> Result<Vec<ScheduledCommand>> {
        let rows = sqlx::query(
            r#"
            SELECT id, command_id, queue_type, args, runs_left, next_run_time, interval_ms
            FROM scheduled_commands
            ORDER BY next_run_time ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_scheduled_command).collect()
    }

    /// Move a recurring trigger to its next run, consuming one run
    ///
    /// An unlimited trigger (`runs_left` NULL) keeps its NULL count.
    pub async fn advance(&self, scheduled: &ScheduledCommand) -> Result<()> {
        let interval = scheduled.interval_ms.unwrap_or_default();
        sqlx::query(
            r#"
            UPDATE scheduled_commands
            SET runs_left = CASE WHEN runs_left IS NULL THEN NULL ELSE runs_left - 1 END,
                next_run_time = next_run_time + ?
            WHERE id = ?
            "#,
        )
        .bind(interval)
        .bind(scheduled.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_scheduled_command(row: SqliteRow) -> Result<ScheduledCommand> {
    Ok(ScheduledCommand {
        id: row.try_get("id")?,
        command_id: row.try_get("command_id")?,
        queue_type: row.try_get("queue_type")?,
        args: row.try_get("args")?,
        runs_left: row.try_get("runs_left")?,
        next_run_time: time_utils::from_millis(row.try_get("next_run_time")?)?,
        interval_ms: row.try_get("interval_ms")?,
    })
}

#[async_trait]
impl Repository<ScheduledCommand> for ScheduledCommandRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<ScheduledCommand>> {
        let row = sqlx::query(
            r#"
            SELECT id, command_id, queue_type, args, runs_left, next_run_time, interval_ms
            FROM scheduled_commands
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_scheduled_command).transpose()
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM scheduled_commands WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scheduled_commands")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
