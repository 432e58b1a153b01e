//! Session persistence

use eglise_common::db::Session;
use eglise_common::uuid_utils::{parse, parse_opt, to_opt_string};
use eglise_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const COLUMNS: &str = "id, name, eglise_id, responsable1_id, responsable2_id, created_at";

fn from_row(row: &SqliteRow) -> Result<Session> {
    Ok(Session {
        id: parse(row.try_get("id")?)?,
        name: row.try_get("name")?,
        eglise_id: parse(row.try_get("eglise_id")?)?,
        responsable1_id: parse(row.try_get("responsable1_id")?)?,
        responsable2_id: parse_opt(row.try_get("responsable2_id")?)?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_session(conn: &mut SqliteConnection, session: &Session) -> Result<()> {
    sqlx::query(&format!("INSERT INTO sessions ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"))
        .bind(session.id.to_string())
        .bind(&session.name)
        .bind(session.eglise_id.to_string())
        .bind(session.responsable1_id.to_string())
        .bind(to_opt_string(session.responsable2_id))
        .bind(&session.created_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn get_session(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM sessions WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn list_church_sessions(
    conn: &mut SqliteConnection,
    eglise_id: Uuid,
) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM sessions WHERE eglise_id = ? ORDER BY created_at, id"
    ))
    .bind(eglise_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn name_taken(
    conn: &mut SqliteConnection,
    eglise_id: Uuid,
    name: &str,
    except_id: Option<Uuid>,
) -> Result<bool> {
    super::sibling_name_taken(conn, "sessions", "eglise_id", eglise_id, name, except_id).await
}

pub async fn update_session(conn: &mut SqliteConnection, session: &Session) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE sessions SET name = ?, responsable1_id = ?, responsable2_id = ? WHERE id = ?",
    )
    .bind(&session.name)
    .bind(session.responsable1_id.to_string())
    .bind(to_opt_string(session.responsable2_id))
    .bind(session.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(super::touched(result))
}

pub async fn delete_session(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}
