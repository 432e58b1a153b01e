//! Impact chain rows

use eglise_common::db::ImpactChainEntry;
use eglise_common::time::now_rfc3339;
use eglise_common::uuid_utils::{parse, parse_opt, to_opt_string};
use eglise_common::{Qualification, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

fn from_row(row: &SqliteRow) -> Result<ImpactChainEntry> {
    let qualification: String = row.try_get("qualification")?;
    let niveau: i64 = row.try_get("niveau")?;
    Ok(ImpactChainEntry {
        user_id: parse(row.try_get("user_id")?)?,
        niveau: niveau.clamp(0, u8::MAX as i64) as u8,
        qualification: Qualification::from_stored(&qualification),
        responsable_id: parse_opt(row.try_get("responsable_id")?)?,
        eglise_id: parse(row.try_get("eglise_id")?)?,
        network_id: parse_opt(row.try_get("network_id")?)?,
        group_id: parse_opt(row.try_get("group_id")?)?,
        position_x: row.try_get("position_x")?,
        position_y: row.try_get("position_y")?,
    })
}

/// Insert or replace the row keyed on (user_id, eglise_id)
pub async fn upsert_entry(conn: &mut SqliteConnection, entry: &ImpactChainEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO impact_chain (
            user_id, eglise_id, niveau, qualification, responsable_id,
            network_id, group_id, position_x, position_y, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, eglise_id) DO UPDATE SET
            niveau = excluded.niveau,
            qualification = excluded.qualification,
            responsable_id = excluded.responsable_id,
            network_id = excluded.network_id,
            group_id = excluded.group_id,
            position_x = excluded.position_x,
            position_y = excluded.position_y,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(entry.user_id.to_string())
    .bind(entry.eglise_id.to_string())
    .bind(entry.niveau as i64)
    .bind(entry.qualification.as_str())
    .bind(to_opt_string(entry.responsable_id))
    .bind(to_opt_string(entry.network_id))
    .bind(to_opt_string(entry.group_id))
    .bind(entry.position_x)
    .bind(entry.position_y)
    .bind(now_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rows bound per INSERT; keeps each statement under SQLite's variable limit
const INSERT_CHUNK: usize = 500;

/// Batch insert; callers clear the church first
pub async fn insert_entries(conn: &mut SqliteConnection, entries: &[ImpactChainEntry]) -> Result<()> {
    let updated_at = now_rfc3339();

    for chunk in entries.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO impact_chain (user_id, eglise_id, niveau, qualification, responsable_id, \
             network_id, group_id, position_x, position_y, updated_at) ",
        );

        builder.push_values(chunk, |mut row, entry| {
            row.push_bind(entry.user_id.to_string())
                .push_bind(entry.eglise_id.to_string())
                .push_bind(entry.niveau as i64)
                .push_bind(entry.qualification.as_str())
                .push_bind(to_opt_string(entry.responsable_id))
                .push_bind(to_opt_string(entry.network_id))
                .push_bind(to_opt_string(entry.group_id))
                .push_bind(entry.position_x)
                .push_bind(entry.position_y)
                .push_bind(updated_at.clone());
        });

        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Rows of a church ordered by level, then position
pub async fn list_for_church(
    conn: &mut SqliteConnection,
    eglise_id: Uuid,
) -> Result<Vec<ImpactChainEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, eglise_id, niveau, qualification, responsable_id,
               network_id, group_id, position_x, position_y
        FROM impact_chain
        WHERE eglise_id = ?
        ORDER BY niveau, position_x, user_id
        "#,
    )
    .bind(eglise_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

async fn delete_where(conn: &mut SqliteConnection, column: &str, id: Uuid) -> Result<u64> {
    let result = sqlx::query(&format!("DELETE FROM impact_chain WHERE {column} = ?"))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_for_church(conn: &mut SqliteConnection, eglise_id: Uuid) -> Result<u64> {
    delete_where(conn, "eglise_id", eglise_id).await
}

pub async fn delete_for_network(conn: &mut SqliteConnection, network_id: Uuid) -> Result<u64> {
    delete_where(conn, "network_id", network_id).await
}

pub async fn delete_for_group(conn: &mut SqliteConnection, group_id: Uuid) -> Result<u64> {
    delete_where(conn, "group_id", group_id).await
}

pub async fn delete_for_user(conn: &mut SqliteConnection, user_id: Uuid) -> Result<u64> {
    delete_where(conn, "user_id", user_id).await
}

/// Drop a user's row in a church only if it still points at `group_id`
pub async fn delete_user_group_entry(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    eglise_id: Uuid,
    group_id: Uuid,
) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM impact_chain WHERE user_id = ? AND eglise_id = ? AND group_id = ?")
            .bind(user_id.to_string())
            .bind(eglise_id.to_string())
            .bind(group_id.to_string())
            .execute(&mut *conn)
            .await?;

    Ok(result.rows_affected())
}

/// Drop a user's level-1 row for `network_id`
pub async fn delete_user_network_entry(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    eglise_id: Uuid,
    network_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM impact_chain WHERE user_id = ? AND eglise_id = ? AND network_id = ? \
         AND group_id IS NULL",
    )
    .bind(user_id.to_string())
    .bind(eglise_id.to_string())
    .bind(network_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
