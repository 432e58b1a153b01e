//! Network handlers

use eglise_common::db::{Network, ResponsibilityKind};
use eglise_common::time::now_rfc3339;
use eglise_common::{uuid_utils, Error, Qualification, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{
    check_responsables, enroll_responsable, group, patched, require, require_name,
    responsable_pair, upsert_responsable_rows, ChainSlot,
};
use crate::db::members::MemberTable;
use crate::db::{
    self, churches, companions, groups, impact_chain, members, networks, responsibilities,
};
use crate::locks::{user_keys, LockKey};
use crate::qualification::{self, ResponsablePair};
use crate::Hierarchy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNetwork {
    pub eglise_id: Option<Uuid>,
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Uuid>,
}

/// `responsable2_id: Some(None)` clears the second slot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkPatch {
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Option<Uuid>>,
}

fn pair_of(network: &Network) -> ResponsablePair {
    ResponsablePair::new(network.responsable1_id, network.responsable2_id)
}

/// Network responsibles stop being companions
async fn end_companionships(conn: &mut SqliteConnection, pair: &ResponsablePair) -> Result<()> {
    for user_id in pair.iter() {
        if companions::remove_companion(conn, user_id).await? {
            info!(user_id = %user_id, "Companion link ended by network responsibility");
        }
    }
    Ok(())
}

/// Network responsibles hold no group membership, not even in a group
/// they lead
async fn end_group_memberships(conn: &mut SqliteConnection, pair: &ResponsablePair) -> Result<()> {
    for user_id in pair.iter() {
        if let Some(membership) = members::membership_of(conn, MemberTable::Group, user_id).await? {
            members::remove_member(conn, MemberTable::Group, membership.container_id, user_id)
                .await?;
            info!(
                user_id = %user_id,
                group_id = %membership.container_id,
                "Group membership ended by network responsibility"
            );
        }
    }
    Ok(())
}

/// A former network responsible still leading a group goes back into it
async fn rejoin_led_group(conn: &mut SqliteConnection, user_id: Uuid) -> Result<()> {
    if let Some(held) =
        responsibilities::find_for_user(conn, user_id, ResponsibilityKind::Group).await?
    {
        enroll_responsable(conn, MemberTable::Group, held.entity_id, user_id).await?;
    }
    Ok(())
}

async fn church_responsable(conn: &mut SqliteConnection, church_id: Uuid) -> Result<Option<Uuid>> {
    Ok(churches::get_church(conn, church_id)
        .await?
        .and_then(|church| church.responsable_id))
}

/// Remove a network and everything under it inside the caller's transaction
///
/// Groups first (each with its own cascade), then companions, the network's
/// impact chain rows, the responsibles' qualifications, and the row itself.
/// Responsibles who still lead a group elsewhere rejoin it.
pub(crate) async fn delete_network_cascade(
    conn: &mut SqliteConnection,
    network: &Network,
) -> Result<()> {
    let group_list = groups::list_network_groups(conn, network.id).await?;
    for grp in &group_list {
        group::delete_group_cascade(conn, grp).await?;
    }

    let companion_list = companions::list_companions(conn, network.id).await?;
    for companion in &companion_list {
        companions::remove_companion(conn, companion.user_id).await?;
        qualification::set_qualification(conn, companion.user_id, Qualification::MembreIrregulier)
            .await?;
    }

    impact_chain::delete_for_network(conn, network.id).await?;
    qualification::cleanup_network_qualification(conn, network.id).await;
    responsibilities::release_entity(conn, ResponsibilityKind::Network, network.id).await?;
    for user_id in network.responsables() {
        rejoin_led_group(conn, user_id).await?;
    }
    networks::delete_network(conn, network.id).await?;

    info!(
        network_id = %network.id,
        groups = group_list.len(),
        companions = companion_list.len(),
        "Network deleted"
    );
    Ok(())
}

impl Hierarchy {
    pub async fn create_network(&self, input: NewNetwork) -> Result<Network> {
        let eglise_id = require(input.eglise_id, "eglise_id")?;
        let responsable1_id = require(input.responsable1_id, "responsable1_id")?;
        let pair = responsable_pair(responsable1_id, input.responsable2_id)?;

        let network = Network {
            id: uuid_utils::generate(),
            name: require_name(input.name.as_deref(), "name")?,
            eglise_id,
            responsable1_id,
            responsable2_id: input.responsable2_id,
            created_at: now_rfc3339(),
        };

        {
            let _entity = self.locks.acquire([LockKey::Network(network.id)]).await;
            let _users = self.locks.acquire(user_keys(pair.iter())).await;
            let mut tx = db::begin_write(&self.db).await?;

            if churches::get_church(&mut tx, eglise_id).await?.is_none() {
                return Err(Error::NotFound(format!("Church {}", eglise_id)));
            }
            if networks::name_taken(&mut tx, eglise_id, &network.name, None).await? {
                return Err(Error::Conflict(format!(
                    "Network '{}' already exists in church {}",
                    network.name, eglise_id
                )));
            }
            check_responsables(&mut tx, &pair, ResponsibilityKind::Network, None, eglise_id)
                .await?;

            networks::insert_network(&mut tx, &network).await?;
            responsibilities::replace_for_entity(
                &mut tx,
                ResponsibilityKind::Network,
                network.id,
                &network.responsables(),
            )
            .await?;
            end_companionships(&mut tx, &pair).await?;
            end_group_memberships(&mut tx, &pair).await?;
            qualification::update_network_responsables_qualification(
                &mut tx,
                network.id,
                ResponsablePair::empty(),
                pair,
            )
            .await?;

            let slot = ChainSlot {
                eglise_id,
                network_id: network.id,
                group_id: None,
                responsable_id: church_responsable(&mut tx, eglise_id).await?,
            };
            upsert_responsable_rows(&mut tx, &pair, &slot).await?;

            tx.commit().await?;
        }

        info!(network_id = %network.id, name = %network.name, "Network created");
        self.refresh_impact_chain(eglise_id).await;
        Ok(network)
    }

    pub async fn get_network(&self, network_id: Uuid) -> Result<Network> {
        let mut conn = self.db.acquire().await?;
        networks::get_network(&mut conn, network_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Network {}", network_id)))
    }

    pub async fn list_church_networks(&self, church_id: Uuid) -> Result<Vec<Network>> {
        let mut conn = self.db.acquire().await?;
        networks::list_church_networks(&mut conn, church_id).await
    }

    pub async fn update_network(&self, network_id: Uuid, patch: NetworkPatch) -> Result<Network> {
        let network = {
            let _entity = self.locks.acquire([LockKey::Network(network_id)]).await;
            let current = self.get_network(network_id).await?;

            let responsable1_id = patched(current.responsable1_id, patch.responsable1_id);
            let responsable2_id = patched(current.responsable2_id, patch.responsable2_id);
            let new_pair = responsable_pair(responsable1_id, responsable2_id)?;
            let old_pair = pair_of(&current);

            let network = Network {
                name: match patch.name.as_deref() {
                    Some(name) => require_name(Some(name), "name")?,
                    None => current.name.clone(),
                },
                responsable1_id,
                responsable2_id,
                ..current.clone()
            };

            let _users = self
                .locks
                .acquire(user_keys(old_pair.iter().chain(new_pair.iter())))
                .await;
            let mut tx = db::begin_write(&self.db).await?;

            if networks::name_taken(&mut tx, network.eglise_id, &network.name, Some(network_id))
                .await?
            {
                return Err(Error::Conflict(format!(
                    "Network '{}' already exists in church {}",
                    network.name, network.eglise_id
                )));
            }
            check_responsables(
                &mut tx,
                &new_pair,
                ResponsibilityKind::Network,
                Some(network_id),
                network.eglise_id,
            )
            .await?;

            if !networks::update_network(&mut tx, &network).await? {
                return Err(Error::NotFound(format!("Network {}", network_id)));
            }
            responsibilities::replace_for_entity(
                &mut tx,
                ResponsibilityKind::Network,
                network_id,
                &network.responsables(),
            )
            .await?;
            end_companionships(&mut tx, &new_pair).await?;
            end_group_memberships(&mut tx, &new_pair).await?;
            qualification::update_network_responsables_qualification(
                &mut tx, network_id, old_pair, new_pair,
            )
            .await?;

            for user_id in old_pair.without(&new_pair) {
                rejoin_led_group(&mut tx, user_id).await?;
                impact_chain::delete_user_network_entry(
                    &mut tx,
                    user_id,
                    network.eglise_id,
                    network_id,
                )
                .await?;
            }
            let slot = ChainSlot {
                eglise_id: network.eglise_id,
                network_id,
                group_id: None,
                responsable_id: church_responsable(&mut tx, network.eglise_id).await?,
            };
            upsert_responsable_rows(&mut tx, &new_pair, &slot).await?;

            tx.commit().await?;
            network
        };

        info!(network_id = %network_id, "Network updated");
        self.refresh_impact_chain(network.eglise_id).await;
        Ok(network)
    }

    /// Delete a network, its groups, their members and its companions
    pub async fn delete_network(&self, network_id: Uuid) -> Result<()> {
        let eglise_id = {
            let (group_ids, affected) = {
                let mut conn = self.db.acquire().await?;
                let current = networks::get_network(&mut conn, network_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("Network {}", network_id)))?;

                let mut group_ids = Vec::new();
                let mut affected = current.responsables();
                for grp in groups::list_network_groups(&mut conn, network_id).await? {
                    group_ids.push(grp.id);
                    affected.extend(grp.responsables());
                    let list = members::list_members(&mut conn, MemberTable::Group, grp.id).await?;
                    affected.extend(list.into_iter().map(|m| m.user_id));
                }
                let list = companions::list_companions(&mut conn, network_id).await?;
                affected.extend(list.into_iter().map(|c| c.user_id));
                (group_ids, affected)
            };

            let _entities = self
                .locks
                .acquire(
                    std::iter::once(LockKey::Network(network_id))
                        .chain(group_ids.into_iter().map(LockKey::Group)),
                )
                .await;
            let _users = self.locks.acquire(user_keys(affected)).await;
            let mut tx = db::begin_write(&self.db).await?;

            let network = networks::get_network(&mut tx, network_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Network {}", network_id)))?;
            delete_network_cascade(&mut tx, &network).await?;

            tx.commit().await?;
            network.eglise_id
        };

        self.refresh_impact_chain(eglise_id).await;
        Ok(())
    }
}
