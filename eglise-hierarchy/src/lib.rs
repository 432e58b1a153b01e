//! Church hierarchy consistency engine
//!
//! Mutation handlers for churches, networks, groups, sessions and units
//! that keep each user's qualification in step with their responsibility
//! assignments, plus the impact chain rebuild.

pub mod db;
pub mod handlers;
pub mod impact_chain;
pub mod locks;
pub mod naming;
pub mod qualification;

use eglise_common::config::HierarchyConfig;
use eglise_common::db::ImpactChainEntry;
use eglise_common::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

pub use handlers::{
    ChurchPatch, GroupPatch, NetworkPatch, NewChurch, NewGroup, NewNetwork, NewSession, NewUnit,
    NewUser, SessionPatch, UnitPatch,
};
pub use locks::{LockKey, LockRegistry};

/// Entry point shared by every transport
#[derive(Clone)]
pub struct Hierarchy {
    db: SqlitePool,
    locks: LockRegistry,
    rebuild_after_mutation: bool,
}

impl Hierarchy {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            locks: LockRegistry::new(),
            rebuild_after_mutation: true,
        }
    }

    /// Open (or create) the database under `root_folder` per `config`
    pub async fn open(config: &HierarchyConfig, root_folder: &Path) -> Result<Self> {
        let db_path = config.database_path(root_folder);
        let pool =
            eglise_common::db::init_database_with(&db_path, config.max_connections).await?;
        Ok(Self::new(pool).with_rebuild_after_mutation(config.rebuild_after_mutation))
    }

    pub fn with_rebuild_after_mutation(mut self, enabled: bool) -> Self {
        self.rebuild_after_mutation = enabled;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Recompute one church's impact chain
    pub async fn rebuild(&self, church_id: Uuid) -> Result<Vec<ImpactChainEntry>> {
        let _guard = self.locks.acquire([LockKey::Church(church_id)]).await;
        impact_chain::rebuild(&self.db, church_id).await
    }

    /// Rebuild every church; failures are logged per church. Returns how
    /// many churches were rebuilt.
    pub async fn rebuild_all(&self) -> Result<usize> {
        let churches = {
            let mut conn = self.db.acquire().await?;
            db::churches::list_churches(&mut conn).await?
        };

        let mut rebuilt = 0;
        for church in churches {
            match self.rebuild(church.id).await {
                Ok(_) => rebuilt += 1,
                Err(e) => warn!(church_id = %church.id, error = %e, "Impact chain rebuild failed"),
            }
        }

        info!(rebuilt, "Rebuilt impact chains");
        Ok(rebuilt)
    }

    /// Post-commit refresh after a church, network or group mutation.
    /// The mutation already committed, so failures are only logged.
    pub(crate) async fn refresh_impact_chain(&self, church_id: Uuid) {
        if !self.rebuild_after_mutation {
            return;
        }
        if let Err(e) = self.rebuild(church_id).await {
            warn!(
                church_id = %church_id,
                error = %e,
                "Impact chain rebuild failed after mutation"
            );
        }
    }

    /// Current impact chain rows of a church
    pub async fn impact_chain(&self, church_id: Uuid) -> Result<Vec<ImpactChainEntry>> {
        let mut conn = self.db.acquire().await?;
        db::impact_chain::list_for_church(&mut conn, church_id).await
    }
}
