//! Qualification transitions
//!
//! Applies the promotion and demotion rules when a user's responsibility
//! status changes. Every function writes through the caller's connection so
//! transitions commit or roll back with the mutation that caused them.
//!
//! Rank guards:
//! - a user who still leads a network keeps `RESPONSABLE_RESEAU` through
//!   group transitions
//! - a user who still leads a session keeps `RESPONSABLE_SESSION` through
//!   unit transitions
//! - a user holding a church-axis rank (levels 1 to 6, or leading a network
//!   or group) keeps it through every session and unit transition
//!
//! When a church-axis responsibility ends, a session or unit responsibility
//! still held decides the fallback.

use eglise_common::db::ResponsibilityKind;
use eglise_common::qualification::NETWORK_LEVEL;
use eglise_common::{Error, Qualification, Result};
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{groups, members, networks, responsibilities, sessions, units, users};
use crate::db::members::MemberTable;

/// Up to two responsibles of one entity, in slot order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponsablePair {
    pub first: Option<Uuid>,
    pub second: Option<Uuid>,
}

impl ResponsablePair {
    pub fn new(first: Uuid, second: Option<Uuid>) -> Self {
        Self {
            first: Some(first),
            second,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.first == Some(user_id) || self.second == Some(user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = Uuid> {
        self.first.into_iter().chain(self.second)
    }

    /// Users present here but not in `other`
    pub fn without(&self, other: &ResponsablePair) -> Vec<Uuid> {
        self.iter().filter(|id| !other.contains(*id)).collect()
    }
}

/// Unconditional overwrite
pub async fn set_qualification(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    qualification: Qualification,
) -> Result<()> {
    if !users::set_qualification(conn, user_id, qualification).await? {
        return Err(Error::NotFound(format!("User {}", user_id)));
    }
    debug!(user_id = %user_id, qualification = %qualification, "Qualification set");
    Ok(())
}

async fn leads(conn: &mut SqliteConnection, user_id: Uuid, kind: ResponsibilityKind) -> Result<bool> {
    Ok(responsibilities::find_for_user(conn, user_id, kind)
        .await?
        .is_some())
}

/// Church-axis rank that session and unit transitions must not overwrite
async fn holds_church_rank(conn: &mut SqliteConnection, user_id: Uuid) -> Result<bool> {
    if leads(conn, user_id, ResponsibilityKind::Network).await?
        || leads(conn, user_id, ResponsibilityKind::Group).await?
    {
        return Ok(true);
    }
    Ok(users::get_user(conn, user_id)
        .await?
        .map(|user| user.qualification.level() >= NETWORK_LEVEL)
        .unwrap_or(false))
}

/// Session-axis rank backed by a responsibility the user still holds
async fn session_rank(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Option<Qualification>> {
    if leads(conn, user_id, ResponsibilityKind::Session).await? {
        return Ok(Some(Qualification::ResponsableSession));
    }
    if leads(conn, user_id, ResponsibilityKind::Unit).await? {
        return Ok(Some(Qualification::ResponsableUnite));
    }
    Ok(None)
}

/// Session and unit writes go through here
async fn set_session_axis(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    qualification: Qualification,
) -> Result<()> {
    if holds_church_rank(conn, user_id).await? {
        debug!(user_id = %user_id, target = %qualification, "Church rank kept over session axis");
        return Ok(());
    }
    set_qualification(conn, user_id, qualification).await
}

pub async fn promote_to_group_responsible(conn: &mut SqliteConnection, user_id: Uuid) -> Result<()> {
    if leads(conn, user_id, ResponsibilityKind::Network).await? {
        debug!(user_id = %user_id, "Network responsible keeps rank on group promotion");
        return Ok(());
    }
    set_qualification(conn, user_id, Qualification::Leader).await
}

pub async fn promote_to_network_responsible(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<()> {
    set_qualification(conn, user_id, Qualification::ResponsableReseau).await
}

/// A person leads at most one group, so losing one means leading none
pub async fn demote_former_group_responsible(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<()> {
    if leads(conn, user_id, ResponsibilityKind::Network).await? {
        debug!(user_id = %user_id, "Network responsible keeps rank on group demotion");
        return Ok(());
    }
    let fallback = session_rank(conn, user_id)
        .await?
        .unwrap_or(Qualification::Regulier);
    set_qualification(conn, user_id, fallback).await
}

pub async fn demote_former_network_responsible(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<()> {
    set_qualification(conn, user_id, Qualification::Leader).await
}

pub async fn promote_to_session_responsible(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<()> {
    set_session_axis(conn, user_id, Qualification::ResponsableSession).await
}

pub async fn demote_former_session_responsible(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<()> {
    let fallback = if leads(conn, user_id, ResponsibilityKind::Unit).await? {
        Qualification::ResponsableUnite
    } else {
        Qualification::MembreSession
    };
    set_session_axis(conn, user_id, fallback).await
}

pub async fn promote_to_unit_responsible(conn: &mut SqliteConnection, user_id: Uuid) -> Result<()> {
    if leads(conn, user_id, ResponsibilityKind::Session).await? {
        debug!(user_id = %user_id, "Session responsible keeps rank on unit promotion");
        return Ok(());
    }
    set_session_axis(conn, user_id, Qualification::ResponsableUnite).await
}

pub async fn demote_former_unit_responsible(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<()> {
    if leads(conn, user_id, ResponsibilityKind::Session).await? {
        debug!(user_id = %user_id, "Session responsible keeps rank on unit demotion");
        return Ok(());
    }
    set_session_axis(conn, user_id, Qualification::MembreSession).await
}

/// Plain member leaving a group
pub async fn demote_former_group_member(conn: &mut SqliteConnection, user_id: Uuid) -> Result<()> {
    if leads(conn, user_id, ResponsibilityKind::Network).await? {
        debug!(user_id = %user_id, "Network responsible keeps rank on group exit");
        return Ok(());
    }
    let fallback = session_rank(conn, user_id)
        .await?
        .unwrap_or(Qualification::MembreIrregulier);
    set_qualification(conn, user_id, fallback).await
}

/// Plain member joining a unit
pub async fn join_unit(conn: &mut SqliteConnection, user_id: Uuid) -> Result<()> {
    set_session_axis(conn, user_id, Qualification::MembreSession).await
}

/// Plain member leaving a unit
pub async fn demote_former_unit_member(conn: &mut SqliteConnection, user_id: Uuid) -> Result<()> {
    if leads(conn, user_id, ResponsibilityKind::Session).await? {
        debug!(user_id = %user_id, "Session responsible keeps rank on unit exit");
        return Ok(());
    }
    set_session_axis(conn, user_id, Qualification::Irregulier).await
}

/// Promote newcomers and demote leavers of a group's responsible pair
///
/// A user present in both pairs (e.g. moved from slot 1 to slot 2) is left
/// untouched.
pub async fn update_group_responsables_qualification(
    conn: &mut SqliteConnection,
    group_id: Uuid,
    old: ResponsablePair,
    new: ResponsablePair,
) -> Result<()> {
    for user_id in old.without(&new) {
        demote_former_group_responsible(conn, user_id).await?;
    }
    for user_id in new.without(&old) {
        promote_to_group_responsible(conn, user_id).await?;
    }
    debug!(group_id = %group_id, "Group responsables qualification updated");
    Ok(())
}

pub async fn update_network_responsables_qualification(
    conn: &mut SqliteConnection,
    network_id: Uuid,
    old: ResponsablePair,
    new: ResponsablePair,
) -> Result<()> {
    for user_id in old.without(&new) {
        demote_former_network_responsible(conn, user_id).await?;
    }
    for user_id in new.without(&old) {
        promote_to_network_responsible(conn, user_id).await?;
    }
    debug!(network_id = %network_id, "Network responsables qualification updated");
    Ok(())
}

pub async fn update_session_responsables_qualification(
    conn: &mut SqliteConnection,
    session_id: Uuid,
    old: ResponsablePair,
    new: ResponsablePair,
) -> Result<()> {
    for user_id in old.without(&new) {
        demote_former_session_responsible(conn, user_id).await?;
    }
    for user_id in new.without(&old) {
        promote_to_session_responsible(conn, user_id).await?;
    }
    debug!(session_id = %session_id, "Session responsables qualification updated");
    Ok(())
}

pub async fn update_unit_responsables_qualification(
    conn: &mut SqliteConnection,
    unit_id: Uuid,
    old: ResponsablePair,
    new: ResponsablePair,
) -> Result<()> {
    for user_id in old.without(&new) {
        demote_former_unit_responsible(conn, user_id).await?;
    }
    for user_id in new.without(&old) {
        promote_to_unit_responsible(conn, user_id).await?;
    }
    debug!(unit_id = %unit_id, "Unit responsables qualification updated");
    Ok(())
}

fn log_cleanup_failure(entity: &str, entity_id: Uuid, user_id: Option<Uuid>, err: &Error) {
    warn!(
        entity,
        entity_id = %entity_id,
        user_id = ?user_id,
        error = %err,
        "Qualification cleanup failed, continuing deletion"
    );
}

/// Demote a group's responsibles ahead of its deletion. Never fails.
pub async fn cleanup_group_qualification(conn: &mut SqliteConnection, group_id: Uuid) {
    let group = match groups::get_group(conn, group_id).await {
        Ok(Some(group)) => group,
        Ok(None) => return,
        Err(e) => return log_cleanup_failure("group", group_id, None, &e),
    };

    for user_id in group.responsables() {
        if let Err(e) = demote_former_group_responsible(conn, user_id).await {
            log_cleanup_failure("group", group_id, Some(user_id), &e);
        }
    }
}

/// Demote a network's responsibles ahead of its deletion. Never fails.
pub async fn cleanup_network_qualification(conn: &mut SqliteConnection, network_id: Uuid) {
    let network = match networks::get_network(conn, network_id).await {
        Ok(Some(network)) => network,
        Ok(None) => return,
        Err(e) => return log_cleanup_failure("network", network_id, None, &e),
    };

    for user_id in network.responsables() {
        if let Err(e) = demote_former_network_responsible(conn, user_id).await {
            log_cleanup_failure("network", network_id, Some(user_id), &e);
        }
    }
}

/// Demote a unit's responsibles ahead of its deletion. Never fails.
pub async fn cleanup_unit_qualification(conn: &mut SqliteConnection, unit_id: Uuid) {
    let unit = match units::get_unit(conn, unit_id).await {
        Ok(Some(unit)) => unit,
        Ok(None) => return,
        Err(e) => return log_cleanup_failure("unit", unit_id, None, &e),
    };

    for user_id in unit.responsables() {
        if let Err(e) = demote_former_unit_responsible(conn, user_id).await {
            log_cleanup_failure("unit", unit_id, Some(user_id), &e);
        }
    }
}

/// Reset everyone a session reaches to `IRREGULIER` ahead of its deletion:
/// session responsibles, then every unit responsible and member. Church-axis
/// ranks are kept. Never fails; must run while the units and their members
/// still exist.
pub async fn cleanup_session_qualification(conn: &mut SqliteConnection, session_id: Uuid) {
    let session = match sessions::get_session(conn, session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return,
        Err(e) => return log_cleanup_failure("session", session_id, None, &e),
    };

    let mut affected = session.responsables();

    match units::list_session_units(conn, session_id).await {
        Ok(units) => {
            for unit in units {
                affected.extend(unit.responsables());
                match members::list_members(conn, MemberTable::Unit, unit.id).await {
                    Ok(list) => affected.extend(list.into_iter().map(|m| m.user_id)),
                    Err(e) => log_cleanup_failure("unit", unit.id, None, &e),
                }
            }
        }
        Err(e) => log_cleanup_failure("session", session_id, None, &e),
    }

    affected.sort();
    affected.dedup();

    for user_id in affected {
        if let Err(e) = set_session_axis(conn, user_id, Qualification::Irregulier).await {
            log_cleanup_failure("session", session_id, Some(user_id), &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_swap_is_not_a_change() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let old = ResponsablePair::new(alice, Some(bob));
        let new = ResponsablePair::new(bob, Some(alice));

        assert!(old.without(&new).is_empty());
        assert!(new.without(&old).is_empty());
    }

    #[test]
    fn replacement_is_one_out_one_in() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        let old = ResponsablePair::new(alice, Some(carol));
        let new = ResponsablePair::new(bob, Some(carol));

        assert_eq!(old.without(&new), vec![alice]);
        assert_eq!(new.without(&old), vec![bob]);
    }

    #[test]
    fn creation_promotes_everyone() {
        let alice = Uuid::new_v4();
        let new = ResponsablePair::new(alice, None);
        assert_eq!(new.without(&ResponsablePair::empty()), vec![alice]);
        assert_eq!(new.iter().count(), 1);
    }
}
