//! Group handlers

use eglise_common::db::{Group, Network, ResponsibilityKind};
use eglise_common::time::now_rfc3339;
use eglise_common::{uuid_utils, Error, Qualification, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    check_responsables, enroll_responsable, load_church_user, patched, require, require_name,
    responsable_pair, upsert_responsable_rows, ChainSlot,
};
use crate::db::members::MemberTable;
use crate::db::{self, groups, impact_chain, members, networks, responsibilities};
use crate::locks::{user_keys, LockKey};
use crate::naming;
use crate::qualification::{self, ResponsablePair};
use crate::Hierarchy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGroup {
    pub network_id: Option<Uuid>,
    /// Generated from the responsibles' first names when absent
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Uuid>,
    pub superieur_hierarchique_id: Option<Uuid>,
    /// Tier of levels 2 to 6; `LEADER` when absent
    pub qualification: Option<Qualification>,
}

/// The tier is fixed at creation and cannot be patched.
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Option<Uuid>>,
    pub superieur_hierarchique_id: Option<Option<Uuid>>,
}

fn pair_of(group: &Group) -> ResponsablePair {
    ResponsablePair::new(group.responsable1_id, group.responsable2_id)
}

async fn load_network(conn: &mut SqliteConnection, network_id: Uuid) -> Result<Network> {
    networks::get_network(conn, network_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Network {}", network_id)))
}

fn chain_slot(group: &Group, network: &Network) -> ChainSlot {
    ChainSlot {
        eglise_id: network.eglise_id,
        network_id: network.id,
        group_id: Some(group.id),
        responsable_id: group
            .superieur_hierarchique_id
            .or(Some(network.responsable1_id)),
    }
}

/// Remove a group inside the caller's transaction
///
/// Members leave first (history is kept), then the group's impact chain
/// rows and the responsibles' qualifications, then the row itself.
pub(crate) async fn delete_group_cascade(conn: &mut SqliteConnection, group: &Group) -> Result<()> {
    let left = members::remove_all_members(conn, MemberTable::Group, group.id).await?;
    for user_id in left.iter().filter(|id| !group.is_responsable(**id)) {
        if let Err(e) = qualification::demote_former_group_member(conn, *user_id).await {
            warn!(group_id = %group.id, user_id = %user_id, error = %e, "Member demotion failed");
        }
    }

    impact_chain::delete_for_group(conn, group.id).await?;
    qualification::cleanup_group_qualification(conn, group.id).await;
    responsibilities::release_entity(conn, ResponsibilityKind::Group, group.id).await?;
    groups::delete_group(conn, group.id).await?;

    info!(group_id = %group.id, members = left.len(), "Group deleted");
    Ok(())
}

impl Hierarchy {
    pub async fn create_group(&self, input: NewGroup) -> Result<Group> {
        let network_id = require(input.network_id, "network_id")?;
        let responsable1_id = require(input.responsable1_id, "responsable1_id")?;
        let pair = responsable_pair(responsable1_id, input.responsable2_id)?;

        let tier = input.qualification.unwrap_or(Qualification::Leader);
        if !tier.is_group_tier() {
            return Err(Error::Validation(format!(
                "{} is not a group tier",
                tier
            )));
        }

        let mut group = Group {
            id: uuid_utils::generate(),
            name: String::new(),
            network_id,
            responsable1_id,
            responsable2_id: input.responsable2_id,
            superieur_hierarchique_id: input.superieur_hierarchique_id,
            qualification: tier,
            created_at: now_rfc3339(),
        };

        let eglise_id = {
            let _entities = self
                .locks
                .acquire([LockKey::Network(network_id), LockKey::Group(group.id)])
                .await;
            let _users = self.locks.acquire(user_keys(pair.iter())).await;
            let mut tx = db::begin_write(&self.db).await?;

            let network = load_network(&mut tx, network_id).await?;
            let responsables = check_responsables(
                &mut tx,
                &pair,
                ResponsibilityKind::Group,
                None,
                network.eglise_id,
            )
            .await?;
            if let Some(superieur_id) = group.superieur_hierarchique_id {
                load_church_user(&mut tx, superieur_id, network.eglise_id).await?;
            }

            group.name = match input.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => naming::group_name(responsables.iter().map(|u| u.first_name.as_str())),
            };
            if groups::name_taken(&mut tx, network_id, &group.name, None).await? {
                return Err(Error::Conflict(format!(
                    "Group '{}' already exists in network {}",
                    group.name, network_id
                )));
            }

            groups::insert_group(&mut tx, &group).await?;
            responsibilities::replace_for_entity(
                &mut tx,
                ResponsibilityKind::Group,
                group.id,
                &group.responsables(),
            )
            .await?;
            qualification::update_group_responsables_qualification(
                &mut tx,
                group.id,
                ResponsablePair::empty(),
                pair,
            )
            .await?;
            upsert_responsable_rows(&mut tx, &pair, &chain_slot(&group, &network)).await?;
            for user_id in pair.iter() {
                enroll_responsable(&mut tx, MemberTable::Group, group.id, user_id).await?;
            }

            tx.commit().await?;
            network.eglise_id
        };

        info!(group_id = %group.id, name = %group.name, tier = %group.qualification, "Group created");
        self.refresh_impact_chain(eglise_id).await;
        Ok(group)
    }

    pub async fn get_group(&self, group_id: Uuid) -> Result<Group> {
        let mut conn = self.db.acquire().await?;
        groups::get_group(&mut conn, group_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Group {}", group_id)))
    }

    pub async fn list_network_groups(&self, network_id: Uuid) -> Result<Vec<Group>> {
        let mut conn = self.db.acquire().await?;
        groups::list_network_groups(&mut conn, network_id).await
    }

    pub async fn update_group(&self, group_id: Uuid, patch: GroupPatch) -> Result<Group> {
        let (group, eglise_id) = {
            let _entity = self.locks.acquire([LockKey::Group(group_id)]).await;
            let current = self.get_group(group_id).await?;

            let responsable1_id = patched(current.responsable1_id, patch.responsable1_id);
            let responsable2_id = patched(current.responsable2_id, patch.responsable2_id);
            let new_pair = responsable_pair(responsable1_id, responsable2_id)?;
            let old_pair = pair_of(&current);

            let group = Group {
                name: match patch.name.as_deref() {
                    Some(name) => require_name(Some(name), "name")?,
                    None => current.name.clone(),
                },
                responsable1_id,
                responsable2_id,
                superieur_hierarchique_id: patched(
                    current.superieur_hierarchique_id,
                    patch.superieur_hierarchique_id,
                ),
                ..current.clone()
            };

            let _users = self
                .locks
                .acquire(user_keys(old_pair.iter().chain(new_pair.iter())))
                .await;
            let mut tx = db::begin_write(&self.db).await?;

            let network = load_network(&mut tx, group.network_id).await?;
            if groups::name_taken(&mut tx, group.network_id, &group.name, Some(group_id)).await? {
                return Err(Error::Conflict(format!(
                    "Group '{}' already exists in network {}",
                    group.name, group.network_id
                )));
            }
            check_responsables(
                &mut tx,
                &new_pair,
                ResponsibilityKind::Group,
                Some(group_id),
                network.eglise_id,
            )
            .await?;
            if let Some(superieur_id) = group.superieur_hierarchique_id {
                load_church_user(&mut tx, superieur_id, network.eglise_id).await?;
            }

            if !groups::update_group(&mut tx, &group).await? {
                return Err(Error::NotFound(format!("Group {}", group_id)));
            }
            responsibilities::replace_for_entity(
                &mut tx,
                ResponsibilityKind::Group,
                group_id,
                &group.responsables(),
            )
            .await?;
            qualification::update_group_responsables_qualification(
                &mut tx, group_id, old_pair, new_pair,
            )
            .await?;

            for user_id in old_pair.without(&new_pair) {
                impact_chain::delete_user_group_entry(&mut tx, user_id, network.eglise_id, group_id)
                    .await?;
            }
            upsert_responsable_rows(&mut tx, &new_pair, &chain_slot(&group, &network)).await?;
            for user_id in new_pair.without(&old_pair) {
                enroll_responsable(&mut tx, MemberTable::Group, group_id, user_id).await?;
            }

            tx.commit().await?;
            (group, network.eglise_id)
        };

        info!(group_id = %group_id, "Group updated");
        self.refresh_impact_chain(eglise_id).await;
        Ok(group)
    }

    /// Delete a group; its members leave with a LEFT history row
    pub async fn delete_group(&self, group_id: Uuid) -> Result<()> {
        let eglise_id = {
            let _entity = self.locks.acquire([LockKey::Group(group_id)]).await;

            let affected = {
                let mut conn = self.db.acquire().await?;
                let current = groups::get_group(&mut conn, group_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("Group {}", group_id)))?;
                let list = members::list_members(&mut conn, MemberTable::Group, group_id).await?;
                current
                    .responsables()
                    .into_iter()
                    .chain(list.into_iter().map(|m| m.user_id))
                    .collect::<Vec<_>>()
            };

            let _users = self.locks.acquire(user_keys(affected)).await;
            let mut tx = db::begin_write(&self.db).await?;

            let group = groups::get_group(&mut tx, group_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Group {}", group_id)))?;
            let network = load_network(&mut tx, group.network_id).await?;
            delete_group_cascade(&mut tx, &group).await?;

            tx.commit().await?;
            network.eglise_id
        };

        self.refresh_impact_chain(eglise_id).await;
        Ok(())
    }
}
