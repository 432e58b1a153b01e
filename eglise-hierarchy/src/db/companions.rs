//! Network companion persistence

use eglise_common::db::NetworkCompanion;
use eglise_common::time::now_rfc3339;
use eglise_common::uuid_utils::parse;
use eglise_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn from_row(row: &SqliteRow) -> Result<NetworkCompanion> {
    Ok(NetworkCompanion {
        network_id: parse(row.try_get("network_id")?)?,
        user_id: parse(row.try_get("user_id")?)?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn add_companion(
    conn: &mut SqliteConnection,
    network_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    sqlx::query("INSERT INTO network_companions (user_id, network_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id.to_string())
        .bind(network_id.to_string())
        .bind(now_rfc3339())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// The network a user accompanies, if any
pub async fn companion_of(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<Option<NetworkCompanion>> {
    let row = sqlx::query(
        "SELECT user_id, network_id, created_at FROM network_companions WHERE user_id = ?",
    )
    .bind(user_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn list_companions(
    conn: &mut SqliteConnection,
    network_id: Uuid,
) -> Result<Vec<NetworkCompanion>> {
    let rows = sqlx::query(
        "SELECT user_id, network_id, created_at FROM network_companions \
         WHERE network_id = ? ORDER BY created_at, user_id",
    )
    .bind(network_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn remove_companion(conn: &mut SqliteConnection, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM network_companions WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}
