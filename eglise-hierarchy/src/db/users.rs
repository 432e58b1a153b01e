//! User persistence

use eglise_common::db::User;
use eglise_common::uuid_utils::{parse, parse_opt, to_opt_string};
use eglise_common::{Qualification, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const COLUMNS: &str = "id, first_name, last_name, eglise_id, qualification, role, created_at";

fn from_row(row: &SqliteRow) -> Result<User> {
    let qualification: String = row.try_get("qualification")?;
    Ok(User {
        id: parse(row.try_get("id")?)?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        eglise_id: parse_opt(row.try_get("eglise_id")?)?,
        qualification: Qualification::from_stored(&qualification),
        role: row.try_get("role")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_user(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, first_name, last_name, eglise_id, qualification, role, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(to_opt_string(user.eglise_id))
    .bind(user.qualification.as_str())
    .bind(&user.role)
    .bind(&user.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_user(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM users WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Users attached to a church, in registration order
pub async fn list_church_users(conn: &mut SqliteConnection, eglise_id: Uuid) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM users WHERE eglise_id = ? ORDER BY created_at, id"
    ))
    .bind(eglise_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Users of a church holding any of `qualifications`, in registration order
pub async fn list_by_qualifications(
    conn: &mut SqliteConnection,
    eglise_id: Uuid,
    qualifications: &[Qualification],
) -> Result<Vec<User>> {
    if qualifications.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; qualifications.len()].join(", ");
    let sql = format!(
        "SELECT {COLUMNS} FROM users WHERE eglise_id = ? AND qualification IN ({placeholders}) \
         ORDER BY created_at, id"
    );

    let mut query = sqlx::query(&sql).bind(eglise_id.to_string());
    for q in qualifications {
        query = query.bind(q.as_str());
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Overwrite a user's qualification; false when the user does not exist
pub async fn set_qualification(
    conn: &mut SqliteConnection,
    id: Uuid,
    qualification: Qualification,
) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET qualification = ? WHERE id = ?")
        .bind(qualification.as_str())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}

pub async fn set_church(
    conn: &mut SqliteConnection,
    id: Uuid,
    eglise_id: Option<Uuid>,
) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET eglise_id = ? WHERE id = ?")
        .bind(to_opt_string(eglise_id))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}

/// Detach every user from a church about to be deleted
pub async fn detach_church(conn: &mut SqliteConnection, eglise_id: Uuid) -> Result<u64> {
    let result = sqlx::query("UPDATE users SET eglise_id = NULL WHERE eglise_id = ?")
        .bind(eglise_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_user(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}
