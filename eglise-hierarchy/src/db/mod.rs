//! Database access for the hierarchy engine
//!
//! Every function takes a `&mut SqliteConnection` so the same query runs on a
//! pooled connection or inside a handler's transaction (`&mut *tx`).

pub mod churches;
pub mod companions;
pub mod groups;
pub mod impact_chain;
pub mod members;
pub mod networks;
pub mod responsibilities;
pub mod retry;
pub mod sessions;
pub mod units;
pub mod users;

use eglise_common::Result;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

/// Open a `BEGIN IMMEDIATE` transaction so the write lock is held from the
/// start and a later write never fails on a stale read snapshot
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    retry::retry_on_lock("begin write", retry::MAX_LOCK_WAIT_MS, || async {
        Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
    })
    .await
}

/// True when the statement changed at least one row
pub(crate) fn touched(result: sqlx::sqlite::SqliteQueryResult) -> bool {
    result.rows_affected() > 0
}

/// Check whether `name` is already used by a sibling in `table` under
/// `parent_column = parent_id`, ignoring `except_id`
pub(crate) async fn sibling_name_taken(
    conn: &mut SqliteConnection,
    table: &str,
    parent_column: &str,
    parent_id: uuid::Uuid,
    name: &str,
    except_id: Option<uuid::Uuid>,
) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {table} WHERE {parent_column} = ? AND name = ? AND id != ?)"
    ))
    .bind(parent_id.to_string())
    .bind(name)
    .bind(except_id.map(|id| id.to_string()).unwrap_or_default())
    .fetch_one(&mut *conn)
    .await?;

    Ok(taken)
}
