//! Database models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::qualification::Qualification;
use crate::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub eglise_id: Option<Uuid>,
    pub qualification: Qualification,
    /// System access tier, unrelated to hierarchy rank
    pub role: String,
    pub created_at: String,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Church {
    pub id: Uuid,
    pub name: String,
    pub responsable_id: Option<Uuid>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub id: Uuid,
    pub name: String,
    pub eglise_id: Uuid,
    pub responsable1_id: Uuid,
    pub responsable2_id: Option<Uuid>,
    pub created_at: String,
}

impl Network {
    pub fn responsables(&self) -> Vec<Uuid> {
        std::iter::once(self.responsable1_id)
            .chain(self.responsable2_id)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub network_id: Uuid,
    pub responsable1_id: Uuid,
    pub responsable2_id: Option<Uuid>,
    /// Explicit reporting line; when absent the network's responsable is used
    pub superieur_hierarchique_id: Option<Uuid>,
    /// Tier chosen at creation (levels 2 to 6)
    pub qualification: Qualification,
    pub created_at: String,
}

impl Group {
    pub fn responsables(&self) -> Vec<Uuid> {
        std::iter::once(self.responsable1_id)
            .chain(self.responsable2_id)
            .collect()
    }

    pub fn is_responsable(&self, user_id: Uuid) -> bool {
        self.responsable1_id == user_id || self.responsable2_id == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub eglise_id: Uuid,
    pub responsable1_id: Uuid,
    pub responsable2_id: Option<Uuid>,
    pub created_at: String,
}

impl Session {
    pub fn responsables(&self) -> Vec<Uuid> {
        std::iter::once(self.responsable1_id)
            .chain(self.responsable2_id)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub session_id: Uuid,
    pub responsable1_id: Uuid,
    pub responsable2_id: Option<Uuid>,
    pub created_at: String,
}

impl Unit {
    pub fn responsables(&self) -> Vec<Uuid> {
        std::iter::once(self.responsable1_id)
            .chain(self.responsable2_id)
            .collect()
    }

    pub fn is_responsable(&self, user_id: Uuid) -> bool {
        self.responsable1_id == user_id || self.responsable2_id == Some(user_id)
    }
}

/// Membership of a user in a group or a unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    pub user_id: Uuid,
    /// Group id or unit id, depending on the table it came from
    pub container_id: Uuid,
    pub joined_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipAction {
    Joined,
    Left,
}

impl MembershipAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipAction::Joined => "JOINED",
            MembershipAction::Left => "LEFT",
        }
    }
}

impl FromStr for MembershipAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JOINED" => Ok(MembershipAction::Joined),
            "LEFT" => Ok(MembershipAction::Left),
            other => Err(Error::Internal(format!("Unknown membership action: {}", other))),
        }
    }
}

/// Append-only membership log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipHistory {
    pub user_id: Uuid,
    pub container_id: Uuid,
    pub action: MembershipAction,
    pub occurred_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkCompanion {
    pub network_id: Uuid,
    pub user_id: Uuid,
    pub created_at: String,
}

/// One denormalized node of a church's impact chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImpactChainEntry {
    pub user_id: Uuid,
    pub niveau: u8,
    pub qualification: Qualification,
    pub responsable_id: Option<Uuid>,
    pub eglise_id: Uuid,
    pub network_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub position_x: i64,
    pub position_y: i64,
}

impl ImpactChainEntry {
    /// Comparison key ignoring layout fields
    pub fn shape(&self) -> (Uuid, u8, Qualification, Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        (
            self.user_id,
            self.niveau,
            self.qualification,
            self.responsable_id,
            self.network_id,
            self.group_id,
        )
    }
}

/// Entity kinds that carry responsibles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsibilityKind {
    Church,
    Network,
    Group,
    Session,
    Unit,
}

impl ResponsibilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsibilityKind::Church => "church",
            ResponsibilityKind::Network => "network",
            ResponsibilityKind::Group => "group",
            ResponsibilityKind::Session => "session",
            ResponsibilityKind::Unit => "unit",
        }
    }
}

impl fmt::Display for ResponsibilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponsibilityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "church" => Ok(ResponsibilityKind::Church),
            "network" => Ok(ResponsibilityKind::Network),
            "group" => Ok(ResponsibilityKind::Group),
            "session" => Ok(ResponsibilityKind::Session),
            "unit" => Ok(ResponsibilityKind::Unit),
            other => Err(Error::Internal(format!("Unknown responsibility kind: {}", other))),
        }
    }
}

/// Row of the responsibilities table: `user_id` leads `entity_id` in `slot`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Responsibility {
    pub user_id: Uuid,
    pub kind: ResponsibilityKind,
    pub entity_id: Uuid,
    pub slot: i64,
}
