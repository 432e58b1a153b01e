//! Mutation and read handlers per entity
//!
//! Shared contract for create and update:
//! 1. required fields present (Validation)
//! 2. referenced parent and users exist (NotFound), users belong to the
//!    owning church (Validation)
//! 3. no responsible already leads another entity of the same kind
//!    (Conflict), checked inside the write transaction under user locks
//! 4. write entity, responsibilities and qualification transitions in one
//!    transaction
//! 5. rebuild the church's impact chain after commit (church axis only)

pub mod church;
pub mod companions;
pub mod group;
pub mod members;
pub mod network;
pub mod session;
pub mod unit;
pub mod users;

pub use church::{ChurchPatch, NewChurch};
pub use group::{GroupPatch, NewGroup};
pub use network::{NetworkPatch, NewNetwork};
pub use session::{NewSession, SessionPatch};
pub use unit::{NewUnit, UnitPatch};
pub use users::NewUser;

use eglise_common::db::{ImpactChainEntry, ResponsibilityKind, User};
use eglise_common::qualification::NETWORK_LEVEL;
use eglise_common::{Error, Result};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::members::MemberTable;
use crate::db::{
    companions as companion_db, impact_chain, members as member_db, responsibilities,
    users as user_db,
};
use crate::qualification::ResponsablePair;

pub(crate) fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::Validation(format!("{} is required", field)))
}

/// Trimmed, non-empty name
pub(crate) fn require_name(value: Option<&str>, field: &str) -> Result<String> {
    let name = value.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(name.to_string())
}

pub(crate) fn responsable_pair(first: Uuid, second: Option<Uuid>) -> Result<ResponsablePair> {
    if second == Some(first) {
        return Err(Error::Validation(
            "responsable1 and responsable2 must be different users".to_string(),
        ));
    }
    Ok(ResponsablePair::new(first, second))
}

/// Resolve a patch field: `None` keeps the current value
pub(crate) fn patched<T>(current: T, patch: Option<T>) -> T {
    patch.unwrap_or(current)
}

pub(crate) async fn load_user(conn: &mut SqliteConnection, user_id: Uuid) -> Result<User> {
    user_db::get_user(conn, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
}

/// Load a user who must belong to `church_id`
pub(crate) async fn load_church_user(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    church_id: Uuid,
) -> Result<User> {
    let user = load_user(conn, user_id).await?;
    if user.eglise_id != Some(church_id) {
        return Err(Error::Validation(format!(
            "User {} does not belong to church {}",
            user_id, church_id
        )));
    }
    Ok(user)
}

/// Reject a user already leading a different entity of `kind`
pub(crate) async fn ensure_available(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    kind: ResponsibilityKind,
    entity_id: Option<Uuid>,
) -> Result<()> {
    match responsibilities::find_for_user(conn, user_id, kind).await? {
        Some(held) if Some(held.entity_id) != entity_id => Err(Error::Conflict(format!(
            "User {} is already responsible of {} {}",
            user_id, kind, held.entity_id
        ))),
        _ => Ok(()),
    }
}

/// Load, church-check and availability-check every responsible of a pair
pub(crate) async fn check_responsables(
    conn: &mut SqliteConnection,
    pair: &ResponsablePair,
    kind: ResponsibilityKind,
    entity_id: Option<Uuid>,
    church_id: Uuid,
) -> Result<Vec<User>> {
    let mut loaded = Vec::new();
    for user_id in pair.iter() {
        loaded.push(load_church_user(conn, user_id, church_id).await?);
    }
    for user_id in pair.iter() {
        ensure_available(conn, user_id, kind, entity_id).await?;
    }
    Ok(loaded)
}

/// Make a responsible a member of the group or unit they lead
///
/// Already a member there: no-op. Member elsewhere on the same axis: moved,
/// with LEFT and JOINED history. A group enrolment also ends any network
/// companionship, the two being exclusive. Network responsibles are never
/// enrolled in a group.
pub(crate) async fn enroll_responsable(
    conn: &mut SqliteConnection,
    table: MemberTable,
    container_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    if table == MemberTable::Group
        && responsibilities::find_for_user(conn, user_id, ResponsibilityKind::Network)
            .await?
            .is_some()
    {
        debug!(user_id = %user_id, group_id = %container_id, "Network responsible not enrolled");
        return Ok(());
    }

    match member_db::membership_of(conn, table, user_id).await? {
        Some(current) if current.container_id == container_id => return Ok(()),
        Some(current) => {
            member_db::remove_member(conn, table, current.container_id, user_id).await?;
            info!(
                user_id = %user_id,
                from = %current.container_id,
                to = %container_id,
                "Responsible moved to the entity they lead"
            );
        }
        None => {}
    }

    if table == MemberTable::Group && companion_db::remove_companion(conn, user_id).await? {
        info!(user_id = %user_id, "Companion link ended by group enrolment");
    }

    match member_db::add_member(conn, table, container_id, user_id).await {
        Err(e) => match e.on_unique_violation("duplicate membership") {
            Error::Conflict(_) => Ok(()),
            other => Err(other),
        },
        ok => ok,
    }
}

/// Where a pair of responsibles sits in the impact chain
pub(crate) struct ChainSlot {
    pub eglise_id: Uuid,
    pub network_id: Uuid,
    /// `None` for network responsibles
    pub group_id: Option<Uuid>,
    pub responsable_id: Option<Uuid>,
}

/// Upsert one impact chain row per responsible slot (`position_x` = slot)
///
/// Runs after the qualification transition; the row takes the level of the
/// user's resulting qualification. A user whose rank does not match the
/// slot's axis (a network responsible leading a group) keeps their
/// existing row.
pub(crate) async fn upsert_responsable_rows(
    conn: &mut SqliteConnection,
    pair: &ResponsablePair,
    slot: &ChainSlot,
) -> Result<()> {
    for (position, user_id) in pair.iter().enumerate() {
        let user = load_user(conn, user_id).await?;
        let niveau = user.qualification.level();
        let fits = match slot.group_id {
            Some(_) => user.qualification.is_group_tier(),
            None => niveau == NETWORK_LEVEL,
        };
        if !fits {
            debug!(user_id = %user_id, niveau, "Impact chain slot skipped");
            continue;
        }

        impact_chain::upsert_entry(
            conn,
            &ImpactChainEntry {
                user_id,
                niveau,
                qualification: user.qualification,
                responsable_id: slot.responsable_id,
                eglise_id: slot.eglise_id,
                network_id: Some(slot.network_id),
                group_id: slot.group_id,
                position_x: position as i64,
                position_y: niveau as i64,
            },
        )
        .await?;
    }
    Ok(())
}
