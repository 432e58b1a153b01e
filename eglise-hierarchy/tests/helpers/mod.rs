//! Test Helper Utilities
//!
//! Temporary databases and seed data for the hierarchy tests

#![allow(dead_code)]

use eglise_common::config::HierarchyConfig;
use eglise_common::db::{Church, Group, Network, User};
use eglise_common::Qualification;
use eglise_hierarchy::{Hierarchy, NewChurch, NewGroup, NewNetwork, NewUser};
use tempfile::TempDir;
use uuid::Uuid;

/// A hierarchy on a temporary database with one empty church
///
/// The TempDir must stay alive for the duration of the test.
pub struct Fixture {
    pub _dir: TempDir,
    pub hierarchy: Hierarchy,
    pub church: Church,
}

pub async fn open_hierarchy() -> (TempDir, Hierarchy) {
    let dir = TempDir::new().unwrap();
    let hierarchy = Hierarchy::open(&HierarchyConfig::default(), dir.path())
        .await
        .unwrap();
    (dir, hierarchy)
}

pub async fn setup() -> Fixture {
    let (dir, hierarchy) = open_hierarchy().await;
    let church = hierarchy
        .create_church(NewChurch {
            name: Some("Eglise Centrale".into()),
            responsable_id: None,
        })
        .await
        .unwrap();

    Fixture {
        _dir: dir,
        hierarchy,
        church,
    }
}

impl Fixture {
    pub async fn user(&self, first_name: &str) -> User {
        self.hierarchy
            .create_user(NewUser {
                first_name: Some(first_name.into()),
                last_name: Some("Test".into()),
                eglise_id: Some(self.church.id),
            })
            .await
            .unwrap()
    }

    pub async fn network(&self, name: &str, responsable1: Uuid) -> Network {
        self.hierarchy
            .create_network(NewNetwork {
                eglise_id: Some(self.church.id),
                name: Some(name.into()),
                responsable1_id: Some(responsable1),
                responsable2_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn group(&self, network_id: Uuid, responsable1: Uuid) -> Group {
        self.hierarchy
            .create_group(NewGroup {
                network_id: Some(network_id),
                responsable1_id: Some(responsable1),
                qualification: Some(Qualification::Qualification12),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn qualification_of(&self, user_id: Uuid) -> Qualification {
        self.hierarchy.get_user(user_id).await.unwrap().qualification
    }
}
