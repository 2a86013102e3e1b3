//! Command queue repository implementation

use crate::Result;
use crate::database::models::{
    CommandRequest, NewCommandRequest, Priority, QueueType, time_utils,
};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use std::collections::HashMap;

use super::Repository;

/// Repository for pending command requests
#[derive(Debug, Clone)]
pub struct CommandRequestRepository {
    pool: SqlitePool,
}

impl CommandRequestRepository {
    /// Create a new command request repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a request unless one with the same command id is pending
    ///
    /// Returns `true` when a row was inserted.
    pub async fn insert_if_absent(&self, request: &NewCommandRequest) -> Result<bool> {
        insert_if_absent(&self.pool, request).await
    }

    /// Insert many requests in one transaction, skipping duplicates
    ///
    /// Returns the number of rows inserted.
    pub async fn insert_many(&self, requests: &[NewCommandRequest]) -> Result<u64> {
        if requests.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for request in requests {
            if insert_if_absent(&mut *tx, request).await? {
                inserted += 1;
            }
        }
        tx.commit().await?;

        Ok(inserted)
    }

    /// Next request for a queue: lowest priority value, then oldest
    pub async fn next(&self, queue: QueueType) -> Result<Option<CommandRequest>> {
        let row = sqlx::query(
            r#"
            SELECT id, command_id, priority, queue_type, args, created_at
            FROM command_requests
            WHERE queue_type = ?
            ORDER BY priority ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(queue)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_command_request).transpose()
    }

    /// Pending requests in execution order, optionally for one queue
    pub async fn list(&self, queue: Option<QueueType>) -> Result<Vec<CommandRequest>> {
        let rows = match queue {
            Some(queue) => {
                sqlx::query(
                    r#"
                    SELECT id, command_id, priority, queue_type, args, created_at
                    FROM command_requests
                    WHERE queue_type = ?
                    ORDER BY priority ASC, id ASC
                    "#,
                )
                .bind(queue)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, command_id, priority, queue_type, args, created_at
                    FROM command_requests
                    ORDER BY queue_type ASC, priority ASC, id ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(row_to_command_request).collect()
    }

    /// Find a pending request by its dedupe key
    pub async fn find_by_command_id(&self, command_id: &str) -> Result<Option<CommandRequest>> {
        let row = sqlx::query(
            r#"
            SELECT id, command_id, priority, queue_type, args, created_at
            FROM command_requests
            WHERE command_id = ?
            "#,
        )
        .bind(command_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_command_request).transpose()
    }

    /// Delete every pending request of a queue
    pub async fn clear_queue(&self, queue: QueueType) -> Result<u64> {
        let result = sqlx::query("DELETE FROM command_requests WHERE queue_type = ?")
            .bind(queue)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Pending counts per queue
    pub async fn get_stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query(
            r#"
            SELECT queue_type, COUNT(*) as count
            FROM command_requests
            GROUP BY queue_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let queue: QueueType = row.try_get("queue_type")?;
            let count: i64 = row.try_get("count")?;
            stats.pending.insert(queue, count as u64);
        }

        Ok(stats)
    }
}

async fn insert_if_absent<'e, E>(executor: E, request: &NewCommandRequest) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO command_requests (command_id, priority, queue_type, args, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(command_id) DO NOTHING
        "#,
    )
    .bind(&request.command_id)
    .bind(request.priority)
    .bind(request.queue_type)
    .bind(&request.args)
    .bind(time_utils::now_millis())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn row_to_command_request(row: SqliteRow) -> Result<CommandRequest> {
    let priority: Priority = row.try_get("priority")?;
    Ok(CommandRequest {
        id: row.try_get("id")?,
        command_id: row.try_get("command_id")?,
        priority,
        queue_type: row.try_get("queue_type")?,
        args: row.try_get("args")?,
        created_at: time_utils::from_millis(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl Repository<CommandRequest> for CommandRequestRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<CommandRequest>> {
        let row = sqlx::query(
            r#"
            SELECT id, command_id, priority, queue_type, args, created_at
            FROM command_requests
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_command_request).transpose()
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM command_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM command_requests")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Pending command counts
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub pending: HashMap<QueueType, u64>,
}

impl QueueStats {
    /// Pending count for one queue
    pub fn pending_for(&self, queue: QueueType) -> u64 {
        self.pending.get(&queue).copied().unwrap_or(0)
    }

    /// Pending count across all queues
    pub fn total(&self) -> u64 {
        self.pending.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_repo() -> (CommandRequestRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = crate::database::Database::new(&db_path).await.unwrap();
        (CommandRequestRepository::new(db.pool().clone()), temp_dir)
    }

    fn request(command_id: &str, priority: Priority, queue: QueueType) -> NewCommandRequest {
        NewCommandRequest {
            command_id: command_id.to_string(),
            priority,
            queue_type: queue,
            args: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_dedupes() {
        let (repo, _temp_dir) = create_test_repo().await;
        let new = request("NoopCommand_5", Priority::Normal, QueueType::General);

        assert!(repo.insert_if_absent(&new).await.unwrap());
        assert!(!repo.insert_if_absent(&new).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_next_orders_by_priority_then_insertion() {
        let (repo, _temp_dir) = create_test_repo().await;
        for (id, priority) in [
            ("a", Priority::Low),
            ("b", Priority::Urgent),
            ("c", Priority::Normal),
            ("d", Priority::Urgent),
        ] {
            repo.insert_if_absent(&request(id, priority, QueueType::General))
                .await
                .unwrap();
        }

        let mut order = Vec::new();
        while let Some(next) = repo.next(QueueType::General).await.unwrap() {
            order.push(next.command_id.clone());
            repo.delete(next.id).await.unwrap();
        }
        assert_eq!(order, vec!["b", "d", "c", "a"]);
    }

    #[tokio::test]
    async fn test_next_is_scoped_to_queue() {
        let (repo, _temp_dir) = create_test_repo().await;
        repo.insert_if_absent(&request("udp", Priority::Low, QueueType::AniDbUdp))
            .await
            .unwrap();

        assert!(repo.next(QueueType::General).await.unwrap().is_none());
        assert!(repo.next(QueueType::AniDbUdp).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_many_and_stats() {
        let (repo, _temp_dir) = create_test_repo().await;
        let inserted = repo
            .insert_many(&[
                request("a", Priority::Normal, QueueType::General),
                request("a", Priority::Normal, QueueType::General),
                request("b", Priority::Normal, QueueType::Image),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let stats = repo.get_stats().await.unwrap();
        assert_eq!(stats.pending_for(QueueType::General), 1);
        assert_eq!(stats.pending_for(QueueType::Image), 1);
        assert_eq!(stats.pending_for(QueueType::Hash), 0);
        assert_eq!(stats.total(), 2);
    }

    #[tokio::test]
    async fn test_clear_queue_leaves_other_queues() {
        let (repo, _temp_dir) = create_test_repo().await;
        repo.insert_if_absent(&request("a", Priority::Normal, QueueType::General))
            .await
            .unwrap();
        repo.insert_if_absent(&request("b", Priority::Normal, QueueType::AniDbHttp))
            .await
            .unwrap();

        assert_eq!(repo.clear_queue(QueueType::General).await.unwrap(), 1);
        assert!(repo.find_by_command_id("a").await.unwrap().is_none());
        assert!(repo.find_by_command_id("b").await.unwrap().is_some());
    }
}
