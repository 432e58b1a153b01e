//! Tests for database initialization and migrations

use eglise_common::db::init::init_database;
use eglise_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use tempfile::TempDir;

const TABLES: [&str; 14] = [
    "schema_version",
    "churches",
    "users",
    "networks",
    "groups",
    "group_members",
    "group_member_history",
    "network_companions",
    "sessions",
    "units",
    "unit_members",
    "unit_member_history",
    "impact_chain",
    "responsibilities",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("eglise.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("eglise.db")).await.unwrap();

    for table in TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_idempotent_initialization() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("eglise.db");

    let pool1 = init_database(&db_path).await.unwrap();
    assert_eq!(get_schema_version(&pool1).await.unwrap(), CURRENT_SCHEMA_VERSION);
    drop(pool1);

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
    let pool2 = pool2.unwrap();

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(versions, 1, "migration recorded more than once");
}

#[tokio::test]
async fn test_group_membership_is_unique_per_user() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("eglise.db")).await.unwrap();

    sqlx::query("INSERT INTO churches (id, name, created_at) VALUES ('c', 'Centre', 'now')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO users (id, first_name, created_at) VALUES ('u', 'Ana', 'now')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO networks (id, name, eglise_id, responsable1_id, created_at)
         VALUES ('n', 'Nord', 'c', 'u', 'now')",
    )
    .execute(&pool)
    .await
    .unwrap();
    for g in ["g1", "g2"] {
        sqlx::query(
            "INSERT INTO groups (id, name, network_id, responsable1_id, qualification, created_at)
             VALUES (?, ?, 'n', 'u', 'LEADER', 'now')",
        )
        .bind(g)
        .bind(g)
        .execute(&pool)
        .await
        .unwrap();
    }

    sqlx::query("INSERT INTO group_members (user_id, group_id, joined_at) VALUES ('u', 'g1', 'now')")
        .execute(&pool)
        .await
        .unwrap();
    let second =
        sqlx::query("INSERT INTO group_members (user_id, group_id, joined_at) VALUES ('u', 'g2', 'now')")
            .execute(&pool)
            .await;

    let err = eglise_common::Error::from(second.unwrap_err()).on_unique_violation("dup");
    assert!(matches!(err, eglise_common::Error::Conflict(_)));
}

#[tokio::test]
async fn test_migration_backfills_responsibilities() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("legacy.db");

    // Legacy database: entity tables populated, no schema version yet
    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("DELETE FROM schema_version").execute(&pool).await.unwrap();
    sqlx::query("INSERT INTO churches (id, name, created_at) VALUES ('c', 'Centre', 'now')")
        .execute(&pool)
        .await
        .unwrap();
    for u in ["u1", "u2"] {
        sqlx::query("INSERT INTO users (id, first_name, created_at) VALUES (?, 'X', 'now')")
            .bind(u)
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query(
        "INSERT INTO networks (id, name, eglise_id, responsable1_id, responsable2_id, created_at)
         VALUES ('n', 'Nord', 'c', 'u1', 'u2', 'now')",
    )
    .execute(&pool)
    .await
    .unwrap();
    drop(pool);

    let pool = init_database(&db_path).await.unwrap();
    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT user_id, kind, slot FROM responsibilities ORDER BY slot",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(
        rows,
        vec![
            ("u1".to_string(), "network".to_string(), 0),
            ("u2".to_string(), "network".to_string(), 1),
        ]
    );
}
