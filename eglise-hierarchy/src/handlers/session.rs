//! Session handlers
//!
//! Sessions and units form a separate axis: they drive qualifications but
//! never appear in the impact chain, so no rebuild follows.

use eglise_common::db::{ResponsibilityKind, Session};
use eglise_common::time::now_rfc3339;
use eglise_common::{uuid_utils, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{check_responsables, patched, require, require_name, responsable_pair};
use crate::db::members::MemberTable;
use crate::db::{self, churches, members, responsibilities, sessions, units};
use crate::locks::{user_keys, LockKey};
use crate::qualification::{self, ResponsablePair};
use crate::Hierarchy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSession {
    pub eglise_id: Option<Uuid>,
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Option<Uuid>>,
}

/// Remove a session and its units inside the caller's transaction
///
/// Qualifications are reset first, while units and members are still
/// readable.
pub(crate) async fn delete_session_cascade(
    conn: &mut SqliteConnection,
    session: &Session,
) -> Result<()> {
    qualification::cleanup_session_qualification(conn, session.id).await;

    let unit_list = units::list_session_units(conn, session.id).await?;
    for unit in &unit_list {
        members::remove_all_members(conn, MemberTable::Unit, unit.id).await?;
        responsibilities::release_entity(conn, ResponsibilityKind::Unit, unit.id).await?;
        units::delete_unit(conn, unit.id).await?;
    }

    responsibilities::release_entity(conn, ResponsibilityKind::Session, session.id).await?;
    sessions::delete_session(conn, session.id).await?;

    info!(session_id = %session.id, units = unit_list.len(), "Session deleted");
    Ok(())
}

impl Hierarchy {
    pub async fn create_session(&self, input: NewSession) -> Result<Session> {
        let eglise_id = require(input.eglise_id, "eglise_id")?;
        let responsable1_id = require(input.responsable1_id, "responsable1_id")?;
        let pair = responsable_pair(responsable1_id, input.responsable2_id)?;

        let session = Session {
            id: uuid_utils::generate(),
            name: require_name(input.name.as_deref(), "name")?,
            eglise_id,
            responsable1_id,
            responsable2_id: input.responsable2_id,
            created_at: now_rfc3339(),
        };

        let _entity = self.locks.acquire([LockKey::Session(session.id)]).await;
        let _users = self.locks.acquire(user_keys(pair.iter())).await;
        let mut tx = db::begin_write(&self.db).await?;

        if churches::get_church(&mut tx, eglise_id).await?.is_none() {
            return Err(Error::NotFound(format!("Church {}", eglise_id)));
        }
        if sessions::name_taken(&mut tx, eglise_id, &session.name, None).await? {
            return Err(Error::Conflict(format!(
                "Session '{}' already exists in church {}",
                session.name, eglise_id
            )));
        }
        check_responsables(&mut tx, &pair, ResponsibilityKind::Session, None, eglise_id).await?;

        sessions::insert_session(&mut tx, &session).await?;
        responsibilities::replace_for_entity(
            &mut tx,
            ResponsibilityKind::Session,
            session.id,
            &session.responsables(),
        )
        .await?;
        qualification::update_session_responsables_qualification(
            &mut tx,
            session.id,
            ResponsablePair::empty(),
            pair,
        )
        .await?;

        tx.commit().await?;

        info!(session_id = %session.id, name = %session.name, "Session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        let mut conn = self.db.acquire().await?;
        sessions::get_session(&mut conn, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session {}", session_id)))
    }

    pub async fn list_church_sessions(&self, church_id: Uuid) -> Result<Vec<Session>> {
        let mut conn = self.db.acquire().await?;
        sessions::list_church_sessions(&mut conn, church_id).await
    }

    pub async fn update_session(&self, session_id: Uuid, patch: SessionPatch) -> Result<Session> {
        let _entity = self.locks.acquire([LockKey::Session(session_id)]).await;
        let current = self.get_session(session_id).await?;

        let responsable1_id = patched(current.responsable1_id, patch.responsable1_id);
        let responsable2_id = patched(current.responsable2_id, patch.responsable2_id);
        let new_pair = responsable_pair(responsable1_id, responsable2_id)?;
        let old_pair = ResponsablePair::new(current.responsable1_id, current.responsable2_id);

        let session = Session {
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

        if sessions::name_taken(&mut tx, session.eglise_id, &session.name, Some(session_id)).await?
        {
            return Err(Error::Conflict(format!(
                "Session '{}' already exists in church {}",
                session.name, session.eglise_id
            )));
        }
        check_responsables(
            &mut tx,
            &new_pair,
            ResponsibilityKind::Session,
            Some(session_id),
            session.eglise_id,
        )
        .await?;

        if !sessions::update_session(&mut tx, &session).await? {
            return Err(Error::NotFound(format!("Session {}", session_id)));
        }
        responsibilities::replace_for_entity(
            &mut tx,
            ResponsibilityKind::Session,
            session_id,
            &session.responsables(),
        )
        .await?;
        qualification::update_session_responsables_qualification(
            &mut tx, session_id, old_pair, new_pair,
        )
        .await?;

        tx.commit().await?;

        info!(session_id = %session_id, "Session updated");
        Ok(session)
    }

    /// Delete a session and its units; everyone reached drops to `IRREGULIER`
    pub async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let (unit_ids, affected) = {
            let mut conn = self.db.acquire().await?;
            let current = sessions::get_session(&mut conn, session_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Session {}", session_id)))?;

            let mut unit_ids = Vec::new();
            let mut affected = current.responsables();
            for unit in units::list_session_units(&mut conn, session_id).await? {
                unit_ids.push(unit.id);
                affected.extend(unit.responsables());
                let list = members::list_members(&mut conn, MemberTable::Unit, unit.id).await?;
                affected.extend(list.into_iter().map(|m| m.user_id));
            }
            (unit_ids, affected)
        };

        let _entities = self
            .locks
            .acquire(
                std::iter::once(LockKey::Session(session_id))
                    .chain(unit_ids.into_iter().map(LockKey::Unit)),
            )
            .await;
        let _users = self.locks.acquire(user_keys(affected)).await;
        let mut tx = db::begin_write(&self.db).await?;

        let session = sessions::get_session(&mut tx, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session {}", session_id)))?;
        delete_session_cascade(&mut tx, &session).await?;

        tx.commit().await?;
        Ok(())
    }
}
