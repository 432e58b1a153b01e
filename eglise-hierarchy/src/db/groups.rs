//! Group persistence

use eglise_common::db::Group;
use eglise_common::uuid_utils::{parse, parse_opt, to_opt_string};
use eglise_common::{Qualification, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const COLUMNS: &str = "id, name, network_id, responsable1_id, responsable2_id, \
                       superieur_hierarchique_id, qualification, created_at";

fn from_row(row: &SqliteRow) -> Result<Group> {
    let qualification: String = row.try_get("qualification")?;
    Ok(Group {
        id: parse(row.try_get("id")?)?,
        name: row.try_get("name")?,
        network_id: parse(row.try_get("network_id")?)?,
        responsable1_id: parse(row.try_get("responsable1_id")?)?,
        responsable2_id: parse_opt(row.try_get("responsable2_id")?)?,
        superieur_hierarchique_id: parse_opt(row.try_get("superieur_hierarchique_id")?)?,
        qualification: Qualification::from_stored(&qualification),
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_group(conn: &mut SqliteConnection, group: &Group) -> Result<()> {
    sqlx::query(&format!("INSERT INTO groups ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"))
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(group.network_id.to_string())
        .bind(group.responsable1_id.to_string())
        .bind(to_opt_string(group.responsable2_id))
        .bind(to_opt_string(group.superieur_hierarchique_id))
        .bind(group.qualification.as_str())
        .bind(&group.created_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn get_group(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Group>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM groups WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Groups of a network in creation order
pub async fn list_network_groups(
    conn: &mut SqliteConnection,
    network_id: Uuid,
) -> Result<Vec<Group>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM groups WHERE network_id = ? ORDER BY created_at, id"
    ))
    .bind(network_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn name_taken(
    conn: &mut SqliteConnection,
    network_id: Uuid,
    name: &str,
    except_id: Option<Uuid>,
) -> Result<bool> {
    super::sibling_name_taken(conn, "groups", "network_id", network_id, name, except_id).await
}

pub async fn update_group(conn: &mut SqliteConnection, group: &Group) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE groups
        SET name = ?, responsable1_id = ?, responsable2_id = ?, superieur_hierarchique_id = ?
        WHERE id = ?
        "#,
    )
    .bind(&group.name)
    .bind(group.responsable1_id.to_string())
    .bind(to_opt_string(group.responsable2_id))
    .bind(to_opt_string(group.superieur_hierarchique_id))
    .bind(group.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(super::touched(result))
}

/// Drop a user from every explicit reporting line they appear in
pub async fn clear_superieur(conn: &mut SqliteConnection, user_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE groups SET superieur_hierarchique_id = NULL WHERE superieur_hierarchique_id = ?",
    )
    .bind(user_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_group(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM groups WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(super::touched(result))
}
