//! Network companion handlers

use eglise_common::db::{NetworkCompanion, ResponsibilityKind};
use eglise_common::{Error, Qualification, Result};
use tracing::info;
use uuid::Uuid;

use super::load_church_user;
use crate::db::members::MemberTable;
use crate::db::{self, companions, members, networks, responsibilities};
use crate::locks::LockKey;
use crate::qualification;
use crate::Hierarchy;

impl Hierarchy {
    /// Attach a user to a network as `COMPAGNON_OEUVRE`
    ///
    /// Exclusive with group membership, with leading a network, and with
    /// accompanying another network.
    pub async fn add_network_companion(
        &self,
        network_id: Uuid,
        user_id: Uuid,
    ) -> Result<NetworkCompanion> {
        let (companion, eglise_id) = {
            let _entity = self.locks.acquire([LockKey::Network(network_id)]).await;
            let _users = self.locks.acquire([LockKey::User(user_id)]).await;
            let mut tx = db::begin_write(&self.db).await?;

            let network = networks::get_network(&mut tx, network_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Network {}", network_id)))?;
            load_church_user(&mut tx, user_id, network.eglise_id).await?;

            if let Some(membership) =
                members::membership_of(&mut tx, MemberTable::Group, user_id).await?
            {
                return Err(Error::Conflict(format!(
                    "User {} is a member of group {}",
                    user_id, membership.container_id
                )));
            }
            if let Some(held) =
                responsibilities::find_for_user(&mut tx, user_id, ResponsibilityKind::Network)
                    .await?
            {
                return Err(Error::Conflict(format!(
                    "User {} is responsible of network {}",
                    user_id, held.entity_id
                )));
            }
            if let Some(existing) = companions::companion_of(&mut tx, user_id).await? {
                return Err(Error::Conflict(format!(
                    "User {} is already a companion of network {}",
                    user_id, existing.network_id
                )));
            }

            companions::add_companion(&mut tx, network_id, user_id)
                .await
                .map_err(|e| e.on_unique_violation(format!("User {} is already a companion", user_id)))?;
            qualification::set_qualification(&mut tx, user_id, Qualification::CompagnonOeuvre)
                .await?;

            let companion = companions::companion_of(&mut tx, user_id)
                .await?
                .ok_or_else(|| Error::Internal(format!("Companion {} not written", user_id)))?;

            tx.commit().await?;
            (companion, network.eglise_id)
        };

        info!(network_id = %network_id, user_id = %user_id, "Network companion added");
        self.refresh_impact_chain(eglise_id).await;
        Ok(companion)
    }

    /// Detach a companion; the user drops to `MEMBRE_IRREGULIER`
    pub async fn remove_network_companion(&self, network_id: Uuid, user_id: Uuid) -> Result<()> {
        let eglise_id = {
            let _entity = self.locks.acquire([LockKey::Network(network_id)]).await;
            let _users = self.locks.acquire([LockKey::User(user_id)]).await;
            let mut tx = db::begin_write(&self.db).await?;

            let network = networks::get_network(&mut tx, network_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Network {}", network_id)))?;

            match companions::companion_of(&mut tx, user_id).await? {
                Some(current) if current.network_id == network_id => {}
                _ => {
                    return Err(Error::NotFound(format!(
                        "User {} is not a companion of network {}",
                        user_id, network_id
                    )))
                }
            }

            companions::remove_companion(&mut tx, user_id).await?;
            qualification::set_qualification(&mut tx, user_id, Qualification::MembreIrregulier)
                .await?;

            tx.commit().await?;
            network.eglise_id
        };

        info!(network_id = %network_id, user_id = %user_id, "Network companion removed");
        self.refresh_impact_chain(eglise_id).await;
        Ok(())
    }

    pub async fn list_network_companions(&self, network_id: Uuid) -> Result<Vec<NetworkCompanion>> {
        let mut conn = self.db.acquire().await?;
        companions::list_companions(&mut conn, network_id).await
    }
}
