//! Unit persistence

use eglise_common::db::Unit;
use eglise_common::uuid_utils::{parse, parse_opt, to_opt_string};
use eglise_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const COLUMNS: &str = "id, name, session_id, responsable1_id, responsable2_id, created_at";

fn from_row(row: &SqliteRow) -> Result<Unit> {
    Ok(Unit {
        id: parse(row.try_get("id")?)?,
        name: row.try_get("name")?,
        session_id: parse(row.try_get("session_id")?)?,
        responsable1_id: parse(row.try_get("responsable1_id")?)?,
        responsable2_id: parse_opt(row.try_get("responsable2_id")?)?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_unit(conn: &mut SqliteConnection, unit: &Unit) -> Result<()> {
    sqlx::query(&format!("INSERT INTO units ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"))
        .bind(unit.id.to_string())
        .bind(&unit.name)
        .bind(unit.session_id.to_string())
        .bind(unit.responsable1_id.to_string())
        .bind(to_opt_string(unit.responsable2_id))
        .bind(&unit.created_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn get_unit(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Unit>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM units WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn list_session_units(conn: &mut SqliteConnection, session_id: Uuid) -> Result<Vec<Unit>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM units WHERE session_id = ? ORDER BY created_at, id"
    ))
    .bind(session_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn name_taken(
    conn: &mut SqliteConnection,
    session_id: Uuid,
    name: &str,
    except_id: Option<Uuid>,
) -> Result<bool> {
    super::sibling_name_taken(conn, "units", "session_id", session_id, name, except_id).await
}

pub async fn update_unit(conn: &mut SqliteConnection, unit: &Unit) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE units SET name = ?, responsable1_id = ?, responsable2_id = ? WHERE id = ?",
    )
    .bind(&unit.name)
    .bind(unit.responsable1_id.to_string())
    .bind(to_opt_string(unit.responsable2_id))
    .bind(unit.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(super::touched(result))
}

pub async fn delete_unit(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM units WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}
