//! Database schema migrations
//!
//! Versioned, idempotent upgrades tracked in the `schema_version` table.
//! Never modify an existing migration; add a new one and bump
//! `CURRENT_SCHEMA_VERSION`.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    Ok(())
}

/// Migration v1: backfill the responsibilities table
///
/// Databases written before the table existed hold responsibles only in the
/// entity rows. `INSERT OR IGNORE` keeps the first claim when legacy data
/// already violates the one-per-kind rule; the violation is reported.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: backfill responsibilities");

    let sources: [(&str, &str, &str, i64); 9] = [
        ("church", "churches", "responsable_id", 0),
        ("network", "networks", "responsable1_id", 0),
        ("network", "networks", "responsable2_id", 1),
        ("group", "groups", "responsable1_id", 0),
        ("group", "groups", "responsable2_id", 1),
        ("session", "sessions", "responsable1_id", 0),
        ("session", "sessions", "responsable2_id", 1),
        ("unit", "units", "responsable1_id", 0),
        ("unit", "units", "responsable2_id", 1),
    ];

    for (kind, table, column, slot) in sources {
        let expected: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE {column} IS NOT NULL"
        ))
        .fetch_one(pool)
        .await?;

        let inserted = sqlx::query(&format!(
            r#"
            INSERT OR IGNORE INTO responsibilities (user_id, kind, entity_id, slot)
            SELECT {column}, ?, id, ? FROM {table} WHERE {column} IS NOT NULL
            "#
        ))
        .bind(kind)
        .bind(slot)
        .execute(pool)
        .await?
        .rows_affected() as i64;

        if inserted < expected {
            warn!(
                kind,
                table,
                expected,
                inserted,
                "Legacy data assigns some users to several entities of the same kind"
            );
        }
    }

    Ok(())
}
