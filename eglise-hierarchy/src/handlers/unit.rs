//! Unit handlers

use eglise_common::db::{ResponsibilityKind, Session, Unit};
use eglise_common::time::now_rfc3339;
use eglise_common::{uuid_utils, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    check_responsables, enroll_responsable, patched, require, require_name, responsable_pair,
};
use crate::db::members::MemberTable;
use crate::db::{self, members, responsibilities, sessions, units};
use crate::locks::{user_keys, LockKey};
use crate::qualification::{self, ResponsablePair};
use crate::Hierarchy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUnit {
    pub session_id: Option<Uuid>,
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitPatch {
    pub name: Option<String>,
    pub responsable1_id: Option<Uuid>,
    pub responsable2_id: Option<Option<Uuid>>,
}

async fn load_session(conn: &mut SqliteConnection, session_id: Uuid) -> Result<Session> {
    sessions::get_session(conn, session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {}", session_id)))
}

impl Hierarchy {
    pub async fn create_unit(&self, input: NewUnit) -> Result<Unit> {
        let session_id = require(input.session_id, "session_id")?;
        let responsable1_id = require(input.responsable1_id, "responsable1_id")?;
        let pair = responsable_pair(responsable1_id, input.responsable2_id)?;

        let unit = Unit {
            id: uuid_utils::generate(),
            name: require_name(input.name.as_deref(), "name")?,
            session_id,
            responsable1_id,
            responsable2_id: input.responsable2_id,
            created_at: now_rfc3339(),
        };

        let _entities = self
            .locks
            .acquire([LockKey::Session(session_id), LockKey::Unit(unit.id)])
            .await;
        let _users = self.locks.acquire(user_keys(pair.iter())).await;
        let mut tx = db::begin_write(&self.db).await?;

        let session = load_session(&mut tx, session_id).await?;
        if units::name_taken(&mut tx, session_id, &unit.name, None).await? {
            return Err(Error::Conflict(format!(
                "Unit '{}' already exists in session {}",
                unit.name, session_id
            )));
        }
        check_responsables(&mut tx, &pair, ResponsibilityKind::Unit, None, session.eglise_id)
            .await?;

        units::insert_unit(&mut tx, &unit).await?;
        responsibilities::replace_for_entity(
            &mut tx,
            ResponsibilityKind::Unit,
            unit.id,
            &unit.responsables(),
        )
        .await?;
        qualification::update_unit_responsables_qualification(
            &mut tx,
            unit.id,
            ResponsablePair::empty(),
            pair,
        )
        .await?;
        for user_id in pair.iter() {
            enroll_responsable(&mut tx, MemberTable::Unit, unit.id, user_id).await?;
        }

        tx.commit().await?;

        info!(unit_id = %unit.id, name = %unit.name, "Unit created");
        Ok(unit)
    }

    pub async fn get_unit(&self, unit_id: Uuid) -> Result<Unit> {
        let mut conn = self.db.acquire().await?;
        units::get_unit(&mut conn, unit_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Unit {}", unit_id)))
    }

    pub async fn list_session_units(&self, session_id: Uuid) -> Result<Vec<Unit>> {
        let mut conn = self.db.acquire().await?;
        units::list_session_units(&mut conn, session_id).await
    }

    pub async fn update_unit(&self, unit_id: Uuid, patch: UnitPatch) -> Result<Unit> {
        let _entity = self.locks.acquire([LockKey::Unit(unit_id)]).await;
        let current = self.get_unit(unit_id).await?;

        let responsable1_id = patched(current.responsable1_id, patch.responsable1_id);
        let responsable2_id = patched(current.responsable2_id, patch.responsable2_id);
        let new_pair = responsable_pair(responsable1_id, responsable2_id)?;
        let old_pair = ResponsablePair::new(current.responsable1_id, current.responsable2_id);

        let unit = Unit {
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

        let session = load_session(&mut tx, unit.session_id).await?;
        if units::name_taken(&mut tx, unit.session_id, &unit.name, Some(unit_id)).await? {
            return Err(Error::Conflict(format!(
                "Unit '{}' already exists in session {}",
                unit.name, unit.session_id
            )));
        }
        check_responsables(
            &mut tx,
            &new_pair,
            ResponsibilityKind::Unit,
            Some(unit_id),
            session.eglise_id,
        )
        .await?;

        if !units::update_unit(&mut tx, &unit).await? {
            return Err(Error::NotFound(format!("Unit {}", unit_id)));
        }
        responsibilities::replace_for_entity(
            &mut tx,
            ResponsibilityKind::Unit,
            unit_id,
            &unit.responsables(),
        )
        .await?;
        qualification::update_unit_responsables_qualification(&mut tx, unit_id, old_pair, new_pair)
            .await?;
        for user_id in new_pair.without(&old_pair) {
            enroll_responsable(&mut tx, MemberTable::Unit, unit_id, user_id).await?;
        }

        tx.commit().await?;

        info!(unit_id = %unit_id, "Unit updated");
        Ok(unit)
    }

    /// Delete a unit; plain members drop to `IRREGULIER`, responsibles are
    /// demoted
    pub async fn delete_unit(&self, unit_id: Uuid) -> Result<()> {
        let _entity = self.locks.acquire([LockKey::Unit(unit_id)]).await;

        let affected = {
            let mut conn = self.db.acquire().await?;
            let current = units::get_unit(&mut conn, unit_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Unit {}", unit_id)))?;
            let list = members::list_members(&mut conn, MemberTable::Unit, unit_id).await?;
            current
                .responsables()
                .into_iter()
                .chain(list.into_iter().map(|m| m.user_id))
                .collect::<Vec<_>>()
        };

        let _users = self.locks.acquire(user_keys(affected)).await;
        let mut tx = db::begin_write(&self.db).await?;

        let unit = units::get_unit(&mut tx, unit_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Unit {}", unit_id)))?;

        let left = members::remove_all_members(&mut tx, MemberTable::Unit, unit_id).await?;
        for user_id in left.iter().filter(|id| !unit.is_responsable(**id)) {
            if let Err(e) = qualification::demote_former_unit_member(&mut tx, *user_id).await {
                warn!(unit_id = %unit_id, user_id = %user_id, error = %e, "Member demotion failed");
            }
        }
        qualification::cleanup_unit_qualification(&mut tx, unit_id).await;
        responsibilities::release_entity(&mut tx, ResponsibilityKind::Unit, unit_id).await?;
        units::delete_unit(&mut tx, unit_id).await?;

        tx.commit().await?;

        info!(unit_id = %unit_id, members = left.len(), "Unit deleted");
        Ok(())
    }
}
