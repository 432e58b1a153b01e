//! Church handlers

use eglise_common::db::{Church, ResponsibilityKind};
use eglise_common::time::now_rfc3339;
use eglise_common::{uuid_utils, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{ensure_available, load_user, network, require_name, session};
use crate::db::{self, churches, impact_chain, networks, responsibilities, sessions, users};
use crate::locks::{user_keys, LockKey};
use crate::Hierarchy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewChurch {
    pub name: Option<String>,
    pub responsable_id: Option<Uuid>,
}

/// `responsable_id: Some(None)` removes the responsable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChurchPatch {
    pub name: Option<String>,
    pub responsable_id: Option<Option<Uuid>>,
}

/// Validate a church responsable; true when the user has no church yet and
/// must be attached to this one
async fn check_responsable(
    conn: &mut SqliteConnection,
    church_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let user = load_user(conn, user_id).await?;
    let adopt = match user.eglise_id {
        Some(other) if other != church_id => {
            return Err(Error::Validation(format!(
                "User {} belongs to church {}",
                user_id, other
            )))
        }
        Some(_) => false,
        None => true,
    };
    ensure_available(conn, user_id, ResponsibilityKind::Church, Some(church_id)).await?;
    Ok(adopt)
}

async fn assign_responsable(
    conn: &mut SqliteConnection,
    church_id: Uuid,
    responsable_id: Option<Uuid>,
    adopt: bool,
) -> Result<()> {
    match responsable_id {
        Some(user_id) => {
            if adopt {
                users::set_church(conn, user_id, Some(church_id)).await?;
            }
            responsibilities::replace_for_entity(
                conn,
                ResponsibilityKind::Church,
                church_id,
                &[user_id],
            )
            .await
        }
        None => responsibilities::release_entity(conn, ResponsibilityKind::Church, church_id)
            .await
            .map(|_| ()),
    }
}

impl Hierarchy {
    pub async fn create_church(&self, input: NewChurch) -> Result<Church> {
        let church = Church {
            id: uuid_utils::generate(),
            name: require_name(input.name.as_deref(), "name")?,
            responsable_id: input.responsable_id,
            created_at: now_rfc3339(),
        };

        {
            let _entity = self.locks.acquire([LockKey::Church(church.id)]).await;
            let _users = self.locks.acquire(user_keys(church.responsable_id)).await;
            let mut tx = db::begin_write(&self.db).await?;

            if churches::name_taken(&mut tx, &church.name, None).await? {
                return Err(Error::Conflict(format!(
                    "Church '{}' already exists",
                    church.name
                )));
            }

            let adopt = match church.responsable_id {
                Some(user_id) => check_responsable(&mut tx, church.id, user_id).await?,
                None => false,
            };

            churches::insert_church(&mut tx, &church).await?;
            assign_responsable(&mut tx, church.id, church.responsable_id, adopt).await?;

            tx.commit().await?;
        }

        info!(church_id = %church.id, name = %church.name, "Church created");
        self.refresh_impact_chain(church.id).await;
        Ok(church)
    }

    pub async fn get_church(&self, church_id: Uuid) -> Result<Church> {
        let mut conn = self.db.acquire().await?;
        churches::get_church(&mut conn, church_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Church {}", church_id)))
    }

    pub async fn list_churches(&self) -> Result<Vec<Church>> {
        let mut conn = self.db.acquire().await?;
        churches::list_churches(&mut conn).await
    }

    pub async fn update_church(&self, church_id: Uuid, patch: ChurchPatch) -> Result<Church> {
        let entity = self.locks.acquire([LockKey::Church(church_id)]).await;
        let current = self.get_church(church_id).await?;

        let responsable_id = patch.responsable_id.unwrap_or(current.responsable_id);
        let church = Church {
            name: match patch.name.as_deref() {
                Some(name) => require_name(Some(name), "name")?,
                None => current.name.clone(),
            },
            responsable_id,
            ..current.clone()
        };

        {
            let _users = self
                .locks
                .acquire(user_keys(current.responsable_id.into_iter().chain(responsable_id)))
                .await;
            let mut tx = db::begin_write(&self.db).await?;

            if churches::name_taken(&mut tx, &church.name, Some(church_id)).await? {
                return Err(Error::Conflict(format!(
                    "Church '{}' already exists",
                    church.name
                )));
            }

            let adopt = match church.responsable_id {
                Some(user_id) => check_responsable(&mut tx, church_id, user_id).await?,
                None => false,
            };

            if !churches::update_church(&mut tx, &church).await? {
                return Err(Error::NotFound(format!("Church {}", church_id)));
            }
            if church.responsable_id != current.responsable_id {
                assign_responsable(&mut tx, church_id, church.responsable_id, adopt).await?;
            }

            tx.commit().await?;
        }
        drop(entity);

        info!(church_id = %church_id, "Church updated");
        self.refresh_impact_chain(church_id).await;
        Ok(church)
    }

    /// Delete a church with its networks and sessions; members are detached,
    /// not deleted
    pub async fn delete_church(&self, church_id: Uuid) -> Result<()> {
        let _entity = self.locks.acquire([LockKey::Church(church_id)]).await;

        let members: Vec<Uuid> = {
            let mut conn = self.db.acquire().await?;
            users::list_church_users(&mut conn, church_id)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect()
        };
        let _users = self.locks.acquire(user_keys(members)).await;
        let mut tx = db::begin_write(&self.db).await?;

        if churches::get_church(&mut tx, church_id).await?.is_none() {
            return Err(Error::NotFound(format!("Church {}", church_id)));
        }

        let network_list = networks::list_church_networks(&mut tx, church_id).await?;
        for net in &network_list {
            network::delete_network_cascade(&mut tx, net).await?;
        }

        let session_list = sessions::list_church_sessions(&mut tx, church_id).await?;
        for sess in &session_list {
            session::delete_session_cascade(&mut tx, sess).await?;
        }

        impact_chain::delete_for_church(&mut tx, church_id).await?;
        responsibilities::release_entity(&mut tx, ResponsibilityKind::Church, church_id).await?;
        let detached = users::detach_church(&mut tx, church_id).await?;
        churches::delete_church(&mut tx, church_id).await?;

        tx.commit().await?;

        info!(
            church_id = %church_id,
            networks = network_list.len(),
            sessions = session_list.len(),
            detached,
            "Church deleted"
        );
        Ok(())
    }
}
