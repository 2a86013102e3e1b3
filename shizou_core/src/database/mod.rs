//! SQLite storage
//!
//! The durable command queue, the schedule, persisted timers and the cache of
//! AniDB FILE results, each behind its own repository.

pub mod migrations;
pub mod models;
pub mod repositories;
pub mod schema;

use log::debug;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

use crate::Result;
use crate::error::{InternalError, IoError};

pub use models::{
    CommandRequest, NewCommandRequest, NewScheduledCommand, Priority, QueueType,
    ScheduledCommand, StoredFileResult, Timer,
};
pub use repositories::{
    CommandRequestRepository, FileResultRepository, QueueStats, Repository,
    ScheduledCommandRepository, TimerRepository,
};

/// Pooled handle; cheap to clone
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) and migrate the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IoError::from_std(e).with_path(parent))?;
        }

        // WAL lets every processor read while another writes
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| {
                InternalError::database(format!("Cannot open {}: {e}", db_path.display()))
            })?;
        debug!("Opened database {}", db_path.display());

        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Applied schema version
    pub async fn schema_version(&self) -> Result<i32> {
        migrations::current_version(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Command queue repository
    pub fn command_requests(&self) -> CommandRequestRepository {
        CommandRequestRepository::new(self.pool.clone())
    }

    /// Schedule repository
    pub fn scheduled_commands(&self) -> ScheduledCommandRepository {
        ScheduledCommandRepository::new(self.pool.clone())
    }

    /// Timer repository
    pub fn timers(&self) -> TimerRepository {
        TimerRepository::new(self.pool.clone())
    }

    /// FILE result repository
    pub fn file_results(&self) -> FileResultRepository {
        FileResultRepository::new(self.pool.clone())
    }

    /// Row count of every table
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let command_count = self.command_requests().count().await?;
        let scheduled_count = self.scheduled_commands().count().await?;
        let timer_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM timers")
            .fetch_one(&self.pool)
            .await?;
        let file_result_count = self.file_results().count().await?;

        Ok(DatabaseStats {
            command_count: command_count as u64,
            scheduled_count: scheduled_count as u64,
            timer_count: timer_count as u64,
            file_result_count: file_result_count as u64,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub command_count: u64,
    pub scheduled_count: u64,
    pub timer_count: u64,
    pub file_result_count: u64,
}
