//! Group and unit membership handlers

use eglise_common::db::{Membership, MembershipHistory, ResponsibilityKind};
use eglise_common::{Error, Qualification, Result};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::load_church_user;
use crate::db::members::MemberTable;
use crate::db::{self, companions, groups, members, networks, responsibilities, sessions, units};
use crate::locks::LockKey;
use crate::qualification;
use crate::Hierarchy;

/// Reject a user already holding a membership on this axis
async fn ensure_unattached(
    conn: &mut SqliteConnection,
    table: MemberTable,
    user_id: Uuid,
) -> Result<()> {
    if let Some(current) = members::membership_of(conn, table, user_id).await? {
        return Err(Error::Conflict(format!(
            "User {} is already a member of {}",
            user_id, current.container_id
        )));
    }
    Ok(())
}

async fn ensure_not_leading(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    kind: ResponsibilityKind,
) -> Result<()> {
    if let Some(held) = responsibilities::find_for_user(conn, user_id, kind).await? {
        return Err(Error::Conflict(format!(
            "User {} is responsible of {} {}",
            user_id, kind, held.entity_id
        )));
    }
    Ok(())
}

fn ensure_not_excluded(
    qualification: Qualification,
    excluded: &[Qualification],
    axis: &str,
) -> Result<()> {
    if excluded.contains(&qualification) {
        return Err(Error::Validation(format!(
            "Qualification {} cannot join a {}",
            qualification, axis
        )));
    }
    Ok(())
}

impl Hierarchy {
    /// Add a plain member to a group
    ///
    /// The user becomes `REGULIER` unless they already hold a group tier.
    pub async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<Membership> {
        let (membership, eglise_id) = {
            let _entity = self.locks.acquire([LockKey::Group(group_id)]).await;
            let _users = self.locks.acquire([LockKey::User(user_id)]).await;
            let mut tx = db::begin_write(&self.db).await?;

            let group = groups::get_group(&mut tx, group_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Group {}", group_id)))?;
            let network = networks::get_network(&mut tx, group.network_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Network {}", group.network_id)))?;
            let user = load_church_user(&mut tx, user_id, network.eglise_id).await?;

            ensure_unattached(&mut tx, MemberTable::Group, user_id).await?;
            ensure_not_leading(&mut tx, user_id, ResponsibilityKind::Network).await?;
            ensure_not_excluded(
                user.qualification,
                &Qualification::GROUP_MEMBER_EXCLUDED,
                "group",
            )?;
            if let Some(companion) = companions::companion_of(&mut tx, user_id).await? {
                return Err(Error::Conflict(format!(
                    "User {} is a companion of network {}",
                    user_id, companion.network_id
                )));
            }

            members::add_member(&mut tx, MemberTable::Group, group_id, user_id)
                .await
                .map_err(|e| e.on_unique_violation(format!("User {} is already a member", user_id)))?;
            if !user.qualification.is_group_tier() {
                qualification::set_qualification(&mut tx, user_id, Qualification::Regulier).await?;
            }

            let membership = members::membership_of(&mut tx, MemberTable::Group, user_id)
                .await?
                .ok_or_else(|| Error::Internal(format!("Membership of {} not written", user_id)))?;

            tx.commit().await?;
            (membership, network.eglise_id)
        };

        info!(group_id = %group_id, user_id = %user_id, "Group member added");
        self.refresh_impact_chain(eglise_id).await;
        Ok(membership)
    }

    /// Remove a plain member; responsibles must be reassigned instead
    pub async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<()> {
        let eglise_id = {
            let _entity = self.locks.acquire([LockKey::Group(group_id)]).await;
            let _users = self.locks.acquire([LockKey::User(user_id)]).await;
            let mut tx = db::begin_write(&self.db).await?;

            let group = groups::get_group(&mut tx, group_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Group {}", group_id)))?;
            if group.is_responsable(user_id) {
                return Err(Error::Conflict(format!(
                    "User {} is a responsible of group {}; reassign the group first",
                    user_id, group_id
                )));
            }
            let network = networks::get_network(&mut tx, group.network_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Network {}", group.network_id)))?;

            if !members::remove_member(&mut tx, MemberTable::Group, group_id, user_id).await? {
                return Err(Error::NotFound(format!(
                    "User {} is not a member of group {}",
                    user_id, group_id
                )));
            }
            qualification::demote_former_group_member(&mut tx, user_id).await?;

            tx.commit().await?;
            network.eglise_id
        };

        info!(group_id = %group_id, user_id = %user_id, "Group member removed");
        self.refresh_impact_chain(eglise_id).await;
        Ok(())
    }

    pub async fn list_group_members(&self, group_id: Uuid) -> Result<Vec<Membership>> {
        let mut conn = self.db.acquire().await?;
        members::list_members(&mut conn, MemberTable::Group, group_id).await
    }

    /// JOINED/LEFT log, oldest first; kept after the group is deleted
    pub async fn group_member_history(&self, group_id: Uuid) -> Result<Vec<MembershipHistory>> {
        let mut conn = self.db.acquire().await?;
        members::history(&mut conn, MemberTable::Group, group_id).await
    }

    /// Add a plain member to a unit
    ///
    /// The user becomes `MEMBRE_SESSION` unless they hold a church-axis rank.
    pub async fn add_unit_member(&self, unit_id: Uuid, user_id: Uuid) -> Result<Membership> {
        let _entity = self.locks.acquire([LockKey::Unit(unit_id)]).await;
        let _users = self.locks.acquire([LockKey::User(user_id)]).await;
        let mut tx = db::begin_write(&self.db).await?;

        let unit = units::get_unit(&mut tx, unit_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Unit {}", unit_id)))?;
        let session = sessions::get_session(&mut tx, unit.session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session {}", unit.session_id)))?;
        let user = load_church_user(&mut tx, user_id, session.eglise_id).await?;

        ensure_unattached(&mut tx, MemberTable::Unit, user_id).await?;
        ensure_not_leading(&mut tx, user_id, ResponsibilityKind::Session).await?;
        ensure_not_excluded(user.qualification, &Qualification::UNIT_MEMBER_EXCLUDED, "unit")?;

        members::add_member(&mut tx, MemberTable::Unit, unit_id, user_id)
            .await
            .map_err(|e| e.on_unique_violation(format!("User {} is already a member", user_id)))?;
        qualification::join_unit(&mut tx, user_id).await?;

        let membership = members::membership_of(&mut tx, MemberTable::Unit, user_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Membership of {} not written", user_id)))?;

        tx.commit().await?;

        info!(unit_id = %unit_id, user_id = %user_id, "Unit member added");
        Ok(membership)
    }

    /// Remove a plain member of a unit; the user drops to `IRREGULIER` unless
    /// they hold a church-axis rank
    pub async fn remove_unit_member(&self, unit_id: Uuid, user_id: Uuid) -> Result<()> {
        let _entity = self.locks.acquire([LockKey::Unit(unit_id)]).await;
        let _users = self.locks.acquire([LockKey::User(user_id)]).await;
        let mut tx = db::begin_write(&self.db).await?;

        let unit = units::get_unit(&mut tx, unit_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Unit {}", unit_id)))?;
        if unit.is_responsable(user_id) {
            return Err(Error::Conflict(format!(
                "User {} is a responsible of unit {}; reassign the unit first",
                user_id, unit_id
            )));
        }

        if !members::remove_member(&mut tx, MemberTable::Unit, unit_id, user_id).await? {
            return Err(Error::NotFound(format!(
                "User {} is not a member of unit {}",
                user_id, unit_id
            )));
        }
        qualification::demote_former_unit_member(&mut tx, user_id).await?;

        tx.commit().await?;

        info!(unit_id = %unit_id, user_id = %user_id, "Unit member removed");
        Ok(())
    }

    pub async fn list_unit_members(&self, unit_id: Uuid) -> Result<Vec<Membership>> {
        let mut conn = self.db.acquire().await?;
        members::list_members(&mut conn, MemberTable::Unit, unit_id).await
    }

    pub async fn unit_member_history(&self, unit_id: Uuid) -> Result<Vec<MembershipHistory>> {
        let mut conn = self.db.acquire().await?;
        members::history(&mut conn, MemberTable::Unit, unit_id).await
    }
}
