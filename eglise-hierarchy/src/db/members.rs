//! Group and unit membership with append-only history
//!
//! Both axes share the same table shapes, so one set of queries serves
//! both, parameterized by [`MemberTable`].

use eglise_common::db::{Membership, MembershipAction, MembershipHistory};
use eglise_common::time::now_rfc3339;
use eglise_common::uuid_utils::parse;
use eglise_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberTable {
    Group,
    Unit,
}

impl MemberTable {
    fn members(&self) -> &'static str {
        match self {
            MemberTable::Group => "group_members",
            MemberTable::Unit => "unit_members",
        }
    }

    fn history(&self) -> &'static str {
        match self {
            MemberTable::Group => "group_member_history",
            MemberTable::Unit => "unit_member_history",
        }
    }

    fn container(&self) -> &'static str {
        match self {
            MemberTable::Group => "group_id",
            MemberTable::Unit => "unit_id",
        }
    }
}

fn membership_from_row(table: MemberTable, row: &SqliteRow) -> Result<Membership> {
    Ok(Membership {
        user_id: parse(row.try_get("user_id")?)?,
        container_id: parse(row.try_get(table.container())?)?,
        joined_at: row.try_get("joined_at")?,
    })
}

/// Current membership of a user, if any
pub async fn membership_of(
    conn: &mut SqliteConnection,
    table: MemberTable,
    user_id: Uuid,
) -> Result<Option<Membership>> {
    let row = sqlx::query(&format!(
        "SELECT user_id, {container}, joined_at FROM {members} WHERE user_id = ?",
        container = table.container(),
        members = table.members(),
    ))
    .bind(user_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref()
        .map(|row| membership_from_row(table, row))
        .transpose()
}

pub async fn list_members(
    conn: &mut SqliteConnection,
    table: MemberTable,
    container_id: Uuid,
) -> Result<Vec<Membership>> {
    let rows = sqlx::query(&format!(
        "SELECT user_id, {container}, joined_at FROM {members} WHERE {container} = ? \
         ORDER BY joined_at, user_id",
        container = table.container(),
        members = table.members(),
    ))
    .bind(container_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| membership_from_row(table, row))
        .collect()
}

async fn record_history(
    conn: &mut SqliteConnection,
    table: MemberTable,
    user_id: Uuid,
    container_id: Uuid,
    action: MembershipAction,
    occurred_at: &str,
) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {history} (user_id, {container}, action, occurred_at) VALUES (?, ?, ?, ?)",
        history = table.history(),
        container = table.container(),
    ))
    .bind(user_id.to_string())
    .bind(container_id.to_string())
    .bind(action.as_str())
    .bind(occurred_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert a membership and its JOINED history row
///
/// The members table is keyed on `user_id`, so a second membership fails
/// with a unique violation.
pub async fn add_member(
    conn: &mut SqliteConnection,
    table: MemberTable,
    container_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    let now = now_rfc3339();

    sqlx::query(&format!(
        "INSERT INTO {members} (user_id, {container}, joined_at) VALUES (?, ?, ?)",
        members = table.members(),
        container = table.container(),
    ))
    .bind(user_id.to_string())
    .bind(container_id.to_string())
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    record_history(conn, table, user_id, container_id, MembershipAction::Joined, &now).await
}

/// Remove a membership, writing a LEFT history row; false when absent
pub async fn remove_member(
    conn: &mut SqliteConnection,
    table: MemberTable,
    container_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        "DELETE FROM {members} WHERE user_id = ? AND {container} = ?",
        members = table.members(),
        container = table.container(),
    ))
    .bind(user_id.to_string())
    .bind(container_id.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    record_history(
        conn,
        table,
        user_id,
        container_id,
        MembershipAction::Left,
        &now_rfc3339(),
    )
    .await?;

    Ok(true)
}

/// Remove every member of a container, keeping history; returns who left
pub async fn remove_all_members(
    conn: &mut SqliteConnection,
    table: MemberTable,
    container_id: Uuid,
) -> Result<Vec<Uuid>> {
    let members = list_members(conn, table, container_id).await?;

    for member in &members {
        remove_member(conn, table, container_id, member.user_id).await?;
    }

    Ok(members.into_iter().map(|m| m.user_id).collect())
}

pub async fn history(
    conn: &mut SqliteConnection,
    table: MemberTable,
    container_id: Uuid,
) -> Result<Vec<MembershipHistory>> {
    let rows = sqlx::query(&format!(
        "SELECT user_id, {container}, action, occurred_at FROM {history} \
         WHERE {container} = ? ORDER BY id",
        container = table.container(),
        history = table.history(),
    ))
    .bind(container_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let action: String = row.try_get("action")?;
            Ok(MembershipHistory {
                user_id: parse(row.try_get("user_id")?)?,
                container_id: parse(row.try_get(table.container())?)?,
                action: action.parse::<MembershipAction>()?,
                occurred_at: row.try_get("occurred_at")?,
            })
        })
        .collect()
}
