//! Versioned schema upgrades, one transaction per step

use log::info;
use sqlx::SqlitePool;

use super::models::time_utils;
use super::schema::{MIGRATIONS, Migration, SCHEMA_VERSION_TABLE};
use crate::Result;
use crate::error::InternalError;

/// Bring the schema up to the newest version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_VERSION_TABLE).execute(pool).await?;
    let current = current_version(pool).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(pool, migration).await?;
    }
    Ok(())
}

/// Highest applied version; 0 for a fresh file
pub async fn current_version(pool: &SqlitePool) -> Result<i32> {
    let version = sqlx::query_scalar::<_, Option<i32>>("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let version = migration.version;
    let failed =
        |step: &str, e: sqlx::Error| InternalError::database(format!("Migration {version} {step}: {e}"));

    let mut tx = pool.begin().await.map_err(|e| failed("begin", e))?;
    sqlx::raw_sql(migration.sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| failed("apply", e))?;
    sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
        .bind(version)
        .bind(time_utils::now_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| failed("record", e))?;
    tx.commit().await.map_err(|e| failed("commit", e))?;

    info!("Applied database migration {version}: {}", migration.description);
    Ok(())
}
