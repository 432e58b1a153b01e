//! Impact chain rebuild
//!
//! Recomputes a church's denormalized tree from authoritative state:
//! church responsable, network responsibles, then every user holding a
//! group tier, level by level. The church's rows are deleted and recreated
//! in one transaction.

use std::collections::{HashMap, HashSet};

use eglise_common::db::{Church, Group, ImpactChainEntry, Network, ResponsibilityKind, User};
use eglise_common::qualification::{CHURCH_LEVEL, FIRST_GROUP_LEVEL, LAST_GROUP_LEVEL, NETWORK_LEVEL};
use eglise_common::{Error, Qualification, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db::members::MemberTable;
use crate::db::{churches, groups, impact_chain, members, networks, responsibilities, users};

/// Rebuild one church's impact chain and return the rows written
pub async fn rebuild(pool: &SqlitePool, church_id: Uuid) -> Result<Vec<ImpactChainEntry>> {
    let mut tx = crate::db::begin_write(pool).await?;

    let church = churches::get_church(&mut tx, church_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Church {}", church_id)))?;

    impact_chain::delete_for_church(&mut tx, church_id).await?;
    let entries = compute_entries(&mut tx, &church).await?;
    impact_chain::insert_entries(&mut tx, &entries).await?;

    tx.commit().await?;

    info!(church_id = %church_id, rows = entries.len(), "Impact chain rebuilt");
    Ok(entries)
}

/// Group and network lookups shared across one rebuild
struct Resolver {
    networks: HashMap<Uuid, Network>,
    groups: HashMap<Uuid, Group>,
}

impl Resolver {
    fn new(networks: &[Network]) -> Self {
        Self {
            networks: networks.iter().map(|n| (n.id, n.clone())).collect(),
            groups: HashMap::new(),
        }
    }

    async fn group(&mut self, conn: &mut SqliteConnection, group_id: Uuid) -> Result<Option<Group>> {
        if let Some(group) = self.groups.get(&group_id) {
            return Ok(Some(group.clone()));
        }
        let group = groups::get_group(conn, group_id).await?;
        if let Some(group) = &group {
            self.groups.insert(group.id, group.clone());
        }
        Ok(group)
    }

    /// The group a user leads, else the group they belong to
    async fn group_of(&mut self, conn: &mut SqliteConnection, user_id: Uuid) -> Result<Option<Group>> {
        if let Some(led) =
            responsibilities::find_for_user(conn, user_id, ResponsibilityKind::Group).await?
        {
            return self.group(conn, led.entity_id).await;
        }
        match members::membership_of(conn, MemberTable::Group, user_id).await? {
            Some(membership) => self.group(conn, membership.container_id).await,
            None => Ok(None),
        }
    }

    /// Explicit reporting line, else the owning network's first responsible
    fn responsable_of(&self, group: &Group) -> Option<Uuid> {
        group.superieur_hierarchique_id.or_else(|| {
            self.networks
                .get(&group.network_id)
                .map(|network| network.responsable1_id)
        })
    }
}

/// Compute a church's rows in deterministic order without writing them
pub async fn compute_entries(
    conn: &mut SqliteConnection,
    church: &Church,
) -> Result<Vec<ImpactChainEntry>> {
    let mut entries = Vec::new();
    let mut emitted: HashSet<Uuid> = HashSet::new();

    let church_users: HashMap<Uuid, User> = users::list_church_users(conn, church.id)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    // Level 0: church responsable
    if let Some(responsable_id) = church.responsable_id {
        if let Some(user) = users::get_user(conn, responsable_id).await? {
            emitted.insert(user.id);
            entries.push(ImpactChainEntry {
                user_id: user.id,
                niveau: CHURCH_LEVEL,
                qualification: user.qualification,
                responsable_id: None,
                eglise_id: church.id,
                network_id: None,
                group_id: None,
                position_x: 0,
                position_y: CHURCH_LEVEL as i64,
            });
        }
    }

    // Level 1: network responsibles of this church
    let networks = networks::list_church_networks(conn, church.id).await?;
    let mut position = 0;
    for network in &networks {
        for responsable_id in network.responsables() {
            let Some(user) = church_users.get(&responsable_id) else {
                continue;
            };
            if !emitted.insert(user.id) {
                continue;
            }
            entries.push(ImpactChainEntry {
                user_id: user.id,
                niveau: NETWORK_LEVEL,
                qualification: user.qualification,
                responsable_id: church.responsable_id,
                eglise_id: church.id,
                network_id: Some(network.id),
                group_id: None,
                position_x: position,
                position_y: NETWORK_LEVEL as i64,
            });
            position += 1;
        }
    }

    // Levels 2..=6: users holding a group tier
    let mut resolver = Resolver::new(&networks);
    for level in FIRST_GROUP_LEVEL..=LAST_GROUP_LEVEL {
        let tier = Qualification::at_level(level);
        let holders = users::list_by_qualifications(conn, church.id, &tier).await?;

        let mut position = 0;
        for user in holders {
            if !emitted.insert(user.id) {
                continue;
            }

            let group = resolver.group_of(conn, user.id).await?;
            let (responsable_id, network_id, group_id) = match &group {
                Some(group) => (
                    resolver.responsable_of(group),
                    Some(group.network_id),
                    Some(group.id),
                ),
                None => (None, None, None),
            };

            entries.push(ImpactChainEntry {
                user_id: user.id,
                niveau: level,
                qualification: user.qualification,
                responsable_id,
                eglise_id: church.id,
                network_id,
                group_id,
                position_x: position,
                position_y: level as i64,
            });
            position += 1;
        }
    }

    Ok(entries)
}
