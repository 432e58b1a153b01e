//! Church persistence

use eglise_common::db::Church;
use eglise_common::uuid_utils::{parse, parse_opt, to_opt_string};
use eglise_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn from_row(row: &SqliteRow) -> Result<Church> {
    Ok(Church {
        id: parse(row.try_get("id")?)?,
        name: row.try_get("name")?,
        responsable_id: parse_opt(row.try_get("responsable_id")?)?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_church(conn: &mut SqliteConnection, church: &Church) -> Result<()> {
    sqlx::query("INSERT INTO churches (id, name, responsable_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(church.id.to_string())
        .bind(&church.name)
        .bind(to_opt_string(church.responsable_id))
        .bind(&church.created_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn get_church(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Church>> {
    let row = sqlx::query("SELECT id, name, responsable_id, created_at FROM churches WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn list_churches(conn: &mut SqliteConnection) -> Result<Vec<Church>> {
    let rows = sqlx::query(
        "SELECT id, name, responsable_id, created_at FROM churches ORDER BY created_at, id",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn name_taken(
    conn: &mut SqliteConnection,
    name: &str,
    except_id: Option<Uuid>,
) -> Result<bool> {
    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM churches WHERE name = ? AND id != ?)")
            .bind(name)
            .bind(except_id.map(|id| id.to_string()).unwrap_or_default())
            .fetch_one(&mut *conn)
            .await?;

    Ok(taken)
}

pub async fn update_church(conn: &mut SqliteConnection, church: &Church) -> Result<bool> {
    let result = sqlx::query("UPDATE churches SET name = ?, responsable_id = ? WHERE id = ?")
        .bind(&church.name)
        .bind(to_opt_string(church.responsable_id))
        .bind(church.id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}

pub async fn delete_church(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM churches WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}
