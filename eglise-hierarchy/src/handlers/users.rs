//! User handlers

use eglise_common::db::User;
use eglise_common::time::now_rfc3339;
use eglise_common::{uuid_utils, Error, Qualification, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{load_user, require_name};
use crate::db::members::MemberTable;
use crate::db::{
    self, churches, companions, groups, impact_chain, members, responsibilities, users,
};
use crate::locks::LockKey;
use crate::qualification;
use crate::Hierarchy;

/// Role given to every registered user
pub const DEFAULT_ROLE: &str = "MEMBRE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub eglise_id: Option<Uuid>,
}

impl Hierarchy {
    /// Register a user as `EN_INTEGRATION`
    pub async fn create_user(&self, input: NewUser) -> Result<User> {
        let user = User {
            id: uuid_utils::generate(),
            first_name: require_name(input.first_name.as_deref(), "first_name")?,
            last_name: input.last_name.map(|s| s.trim().to_string()).unwrap_or_default(),
            eglise_id: input.eglise_id,
            qualification: Qualification::EnIntegration,
            role: DEFAULT_ROLE.to_string(),
            created_at: now_rfc3339(),
        };

        let mut conn = self.db.acquire().await?;
        if let Some(eglise_id) = user.eglise_id {
            if churches::get_church(&mut conn, eglise_id).await?.is_none() {
                return Err(Error::NotFound(format!("Church {}", eglise_id)));
            }
        }
        users::insert_user(&mut conn, &user).await?;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        let mut conn = self.db.acquire().await?;
        load_user(&mut conn, user_id).await
    }

    /// Users of a church in registration order
    pub async fn list_church_users(&self, church_id: Uuid) -> Result<Vec<User>> {
        let mut conn = self.db.acquire().await?;
        users::list_church_users(&mut conn, church_id).await
    }

    /// Unconditional overwrite; the caller owns the legality of the value
    pub async fn set_user_qualification(
        &self,
        user_id: Uuid,
        value: Qualification,
    ) -> Result<User> {
        if value == Qualification::Unmapped {
            return Err(Error::Validation(
                "UNMAPPED is a read fallback, not an assignable qualification".to_string(),
            ));
        }

        let user = {
            let _users = self.locks.acquire([LockKey::User(user_id)]).await;
            let mut tx = db::begin_write(&self.db).await?;
            qualification::set_qualification(&mut tx, user_id, value).await?;
            let user = load_user(&mut tx, user_id).await?;
            tx.commit().await?;
            user
        };

        if let Some(eglise_id) = user.eglise_id {
            self.refresh_impact_chain(eglise_id).await;
        }
        Ok(user)
    }

    /// Delete a user who holds no responsibility
    ///
    /// Memberships end with a LEFT history row; companion links, explicit
    /// reporting lines and impact chain rows naming the user are removed.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let eglise_id = {
            let _users = self.locks.acquire([LockKey::User(user_id)]).await;
            let mut tx = db::begin_write(&self.db).await?;

            let user = load_user(&mut tx, user_id).await?;
            let held = responsibilities::list_for_user(&mut tx, user_id).await?;
            if let Some(first) = held.first() {
                return Err(Error::Conflict(format!(
                    "User {} is still responsible of {} {}",
                    user_id, first.kind, first.entity_id
                )));
            }

            for table in [MemberTable::Group, MemberTable::Unit] {
                if let Some(membership) = members::membership_of(&mut tx, table, user_id).await? {
                    members::remove_member(&mut tx, table, membership.container_id, user_id)
                        .await?;
                }
            }
            companions::remove_companion(&mut tx, user_id).await?;
            let cleared = groups::clear_superieur(&mut tx, user_id).await?;
            impact_chain::delete_for_user(&mut tx, user_id).await?;

            if !users::delete_user(&mut tx, user_id).await? {
                return Err(Error::NotFound(format!("User {}", user_id)));
            }

            tx.commit().await?;
            info!(user_id = %user_id, reporting_lines_cleared = cleared, "User deleted");
            user.eglise_id
        };

        if let Some(eglise_id) = eglise_id {
            self.refresh_impact_chain(eglise_id).await;
        }
        Ok(())
    }
}
