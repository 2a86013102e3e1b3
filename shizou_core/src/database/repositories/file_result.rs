//! FILE lookup cache repository implementation

use crate::Result;
use crate::database::models::{StoredFileResult, time_utils};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Repository for cached AniDB FILE results
#[derive(Debug, Clone)]
pub struct FileResultRepository {
    pool: SqlitePool,
}

impl FileResultRepository {
    /// Create a new file result repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store or refresh a result
    pub async fn upsert(&self, result: &StoredFileResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO anidb_file_results (
                fid, anime_id, ed2k, size, mylist_id, data, fetched_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fid) DO UPDATE SET
                anime_id = excluded.anime_id,
                ed2k = excluded.ed2k,
                size = excluded.size,
                mylist_id = excluded.mylist_id,
                data = excluded.data,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(result.fid)
        .bind(result.anime_id)
        .bind(&result.ed2k)
        .bind(result.size)
        .bind(result.mylist_id)
        .bind(&result.data)
        .bind(time_utils::to_millis(result.fetched_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find a result by file id
    pub async fn find_by_fid(&self, fid: i64) -> Result<Option<StoredFileResult>> {
        let row = sqlx::query(
            r#"
            SELECT fid, anime_id, ed2k, size, mylist_id, data, fetched_at
            FROM anidb_file_results
            WHERE fid = ?
            "#,
        )
        .bind(fid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_file_result).transpose()
    }

    /// Find a result by file size and ED2K digest
    pub async fn find_by_hash(&self, size: i64, ed2k: &str) -> Result<Option<StoredFileResult>> {
        let row = sqlx::query(
            r#"
            SELECT fid, anime_id, ed2k, size, mylist_id, data, fetched_at
            FROM anidb_file_results
            WHERE size = ? AND ed2k = ?
            "#,
        )
        .bind(size)
        .bind(ed2k.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_file_result).transpose()
    }

    /// Record the mylist entry of a file
    pub async fn set_mylist_id(&self, fid: i64, mylist_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE anidb_file_results SET mylist_id = ? WHERE fid = ?")
            .bind(mylist_id)
            .bind(fid)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Number of cached results
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM anidb_file_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_file_result(row: SqliteRow) -> Result<StoredFileResult> {
    Ok(StoredFileResult {
        fid: row.try_get("fid")?,
        anime_id: row.try_get("anime_id")?,
        ed2k: row.try_get("ed2k")?,
        size: row.try_get("size")?,
        mylist_id: row.try_get("mylist_id")?,
        data: row.try_get("data")?,
        fetched_at: time_utils::from_millis(row.try_get("fetched_at")?)?,
    })
}
