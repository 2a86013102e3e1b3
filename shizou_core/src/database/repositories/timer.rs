//! Timer repository implementation

use crate::Result;
use crate::database::models::{Timer, time_utils};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Repository for named deadlines
#[derive(Debug, Clone)]
pub struct TimerRepository {
    pool: SqlitePool,
}

impl TimerRepository {
    /// Create a new timer repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create or move a timer
    pub async fn set(&self, timer: &Timer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO timers (name, expires_at, reason) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                expires_at = excluded.expires_at,
                reason = excluded.reason
            "#,
        )
        .bind(&timer.name)
        .bind(time_utils::to_millis(timer.expires_at))
        .bind(&timer.reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find a timer by name
    pub async fn get(&self, name: &str) -> Result<Option<Timer>> {
        let row = sqlx::query("SELECT name, expires_at, reason FROM timers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_timer).transpose()
    }

    /// All timers
    pub async fn list(&self) -> Result<Vec<Timer>> {
        let rows = sqlx::query("SELECT name, expires_at, reason FROM timers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_timer).collect()
    }

    /// Remove a timer
    pub async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM timers WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_timer(row: SqliteRow) -> Result<Timer> {
    Ok(Timer {
        name: row.try_get("name")?,
        expires_at: time_utils::from_millis(row.try_get("expires_at")?)?,
        reason: row.try_get("reason")?,
    })
}
