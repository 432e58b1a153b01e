//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, creates
//! every table idempotently, then runs versioned migrations.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Default pool size when no configuration is supplied
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    init_database_with(db_path, DEFAULT_MAX_CONNECTIONS).await
}

/// Initialize database with an explicit pool size
pub async fn init_database_with(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .min_connections(1)
        // Pragmas are per connection, so apply them on every new one
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA busy_timeout = 5000")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_churches_table(pool).await?;
    create_users_table(pool).await?;
    create_networks_table(pool).await?;
    create_groups_table(pool).await?;
    create_group_members_tables(pool).await?;
    create_network_companions_table(pool).await?;
    create_sessions_table(pool).await?;
    create_units_table(pool).await?;
    create_unit_members_tables(pool).await?;
    create_impact_chain_table(pool).await?;
    create_responsibilities_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_churches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS churches (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            responsable_id TEXT REFERENCES users(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            eglise_id TEXT REFERENCES churches(id),
            qualification TEXT NOT NULL DEFAULT 'EN_INTEGRATION',
            role TEXT NOT NULL DEFAULT 'MEMBRE',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_eglise ON users(eglise_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_users_eglise_qualification ON users(eglise_id, qualification)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_networks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS networks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            eglise_id TEXT NOT NULL REFERENCES churches(id),
            responsable1_id TEXT NOT NULL REFERENCES users(id),
            responsable2_id TEXT REFERENCES users(id),
            created_at TEXT NOT NULL,
            UNIQUE(eglise_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            network_id TEXT NOT NULL REFERENCES networks(id),
            responsable1_id TEXT NOT NULL REFERENCES users(id),
            responsable2_id TEXT REFERENCES users(id),
            superieur_hierarchique_id TEXT REFERENCES users(id),
            qualification TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(network_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Membership and its append-only history
///
/// `user_id` is the primary key of `group_members`: one group per user.
/// History rows carry no foreign keys so they outlive deleted groups.
async fn create_group_members_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS group_members (
            user_id TEXT PRIMARY KEY REFERENCES users(id),
            group_id TEXT NOT NULL REFERENCES groups(id),
            joined_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_group_members_group ON group_members(group_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS group_member_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            action TEXT NOT NULL,
            occurred_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_network_companions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS network_companions (
            user_id TEXT PRIMARY KEY REFERENCES users(id),
            network_id TEXT NOT NULL REFERENCES networks(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            eglise_id TEXT NOT NULL REFERENCES churches(id),
            responsable1_id TEXT NOT NULL REFERENCES users(id),
            responsable2_id TEXT REFERENCES users(id),
            created_at TEXT NOT NULL,
            UNIQUE(eglise_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_units_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS units (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            responsable1_id TEXT NOT NULL REFERENCES users(id),
            responsable2_id TEXT REFERENCES users(id),
            created_at TEXT NOT NULL,
            UNIQUE(session_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_unit_members_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS unit_members (
            user_id TEXT PRIMARY KEY REFERENCES users(id),
            unit_id TEXT NOT NULL REFERENCES units(id),
            joined_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_unit_members_unit ON unit_members(unit_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS unit_member_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            unit_id TEXT NOT NULL,
            action TEXT NOT NULL,
            occurred_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Derived tree snapshot; safe to delete and recreate
async fn create_impact_chain_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS impact_chain (
            user_id TEXT NOT NULL,
            eglise_id TEXT NOT NULL,
            niveau INTEGER NOT NULL,
            qualification TEXT NOT NULL,
            responsable_id TEXT,
            network_id TEXT,
            group_id TEXT,
            position_x INTEGER NOT NULL DEFAULT 0,
            position_y INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, eglise_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_impact_chain_network ON impact_chain(network_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_impact_chain_group ON impact_chain(group_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// One responsibility per user per entity kind
async fn create_responsibilities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS responsibilities (
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            slot INTEGER NOT NULL,
            PRIMARY KEY (user_id, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_responsibilities_entity ON responsibilities(kind, entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
