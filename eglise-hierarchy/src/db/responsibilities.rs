//! Responsibility assignments keyed on (user, kind)
//!
//! Mirrors the responsable columns of the entity tables. The primary key
//! makes a second responsibility of the same kind a unique violation.

use eglise_common::db::{Responsibility, ResponsibilityKind};
use eglise_common::uuid_utils::parse;
use eglise_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn from_row(row: &SqliteRow) -> Result<Responsibility> {
    let kind: String = row.try_get("kind")?;
    Ok(Responsibility {
        user_id: parse(row.try_get("user_id")?)?,
        kind: kind.parse::<ResponsibilityKind>()?,
        entity_id: parse(row.try_get("entity_id")?)?,
        slot: row.try_get("slot")?,
    })
}

/// The entity of `kind` a user leads, if any
pub async fn find_for_user(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    kind: ResponsibilityKind,
) -> Result<Option<Responsibility>> {
    let row = sqlx::query(
        "SELECT user_id, kind, entity_id, slot FROM responsibilities WHERE user_id = ? AND kind = ?",
    )
    .bind(user_id.to_string())
    .bind(kind.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<Vec<Responsibility>> {
    let rows = sqlx::query(
        "SELECT user_id, kind, entity_id, slot FROM responsibilities WHERE user_id = ? ORDER BY kind",
    )
    .bind(user_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Replace the responsibles of one entity with `responsables` (slot order)
pub async fn replace_for_entity(
    conn: &mut SqliteConnection,
    kind: ResponsibilityKind,
    entity_id: Uuid,
    responsables: &[Uuid],
) -> Result<()> {
    release_entity(conn, kind, entity_id).await?;

    for (slot, user_id) in responsables.iter().enumerate() {
        sqlx::query(
            "INSERT INTO responsibilities (user_id, kind, entity_id, slot) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(kind.as_str())
        .bind(entity_id.to_string())
        .bind(slot as i64)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::from(e).on_unique_violation(format!(
                "User {} is already responsible of another {}",
                user_id, kind
            ))
        })?;
    }

    Ok(())
}

pub async fn release_entity(
    conn: &mut SqliteConnection,
    kind: ResponsibilityKind,
    entity_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM responsibilities WHERE kind = ? AND entity_id = ?")
        .bind(kind.as_str())
        .bind(entity_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
