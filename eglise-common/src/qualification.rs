//! Qualification vocabulary and level resolution
//!
//! A user's qualification is a cached rank derived from their responsibility
//! assignments and memberships. Two vocabularies share the same column: the
//! church axis (networks, groups) and the session axis (sessions, units).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Hierarchy level of the church responsable, and of every qualification
/// that carries no rank in the church tree.
pub const CHURCH_LEVEL: u8 = 0;

/// Hierarchy level of network responsibles.
pub const NETWORK_LEVEL: u8 = 1;

/// Shallowest and deepest group tiers.
pub const FIRST_GROUP_LEVEL: u8 = 2;
pub const LAST_GROUP_LEVEL: u8 = 6;

/// Rank held by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Qualification {
    // Church axis, ranked
    ResponsableReseau,
    #[serde(rename = "QUALIFICATION_12")]
    Qualification12,
    #[serde(rename = "QUALIFICATION_144")]
    Qualification144,
    #[serde(rename = "QUALIFICATION_1728")]
    Qualification1728,
    #[serde(rename = "QUALIFICATION_20736")]
    Qualification20736,
    Leader,

    // Church axis, unranked
    Gouvernance,
    Ecodim,
    ResponsableEcodim,
    CompagnonOeuvre,
    Regulier,
    MembreIrregulier,
    EnIntegration,

    // Session axis
    ResponsableSession,
    ResponsableUnite,
    MembreSession,
    Irregulier,

    /// Stored value outside the known vocabulary
    Unmapped,
}

impl Qualification {
    /// Every known qualification, in declaration order.
    pub const ALL: [Qualification; 17] = [
        Qualification::ResponsableReseau,
        Qualification::Qualification12,
        Qualification::Qualification144,
        Qualification::Qualification1728,
        Qualification::Qualification20736,
        Qualification::Leader,
        Qualification::Gouvernance,
        Qualification::Ecodim,
        Qualification::ResponsableEcodim,
        Qualification::CompagnonOeuvre,
        Qualification::Regulier,
        Qualification::MembreIrregulier,
        Qualification::EnIntegration,
        Qualification::ResponsableSession,
        Qualification::ResponsableUnite,
        Qualification::MembreSession,
        Qualification::Irregulier,
    ];

    /// Qualifications that forbid plain group membership.
    pub const GROUP_MEMBER_EXCLUDED: [Qualification; 4] = [
        Qualification::Gouvernance,
        Qualification::ResponsableReseau,
        Qualification::Ecodim,
        Qualification::ResponsableEcodim,
    ];

    /// Qualifications that forbid plain unit membership.
    pub const UNIT_MEMBER_EXCLUDED: [Qualification; 2] =
        [Qualification::Gouvernance, Qualification::ResponsableSession];

    pub fn as_str(&self) -> &'static str {
        match self {
            Qualification::ResponsableReseau => "RESPONSABLE_RESEAU",
            Qualification::Qualification12 => "QUALIFICATION_12",
            Qualification::Qualification144 => "QUALIFICATION_144",
            Qualification::Qualification1728 => "QUALIFICATION_1728",
            Qualification::Qualification20736 => "QUALIFICATION_20736",
            Qualification::Leader => "LEADER",
            Qualification::Gouvernance => "GOUVERNANCE",
            Qualification::Ecodim => "ECODIM",
            Qualification::ResponsableEcodim => "RESPONSABLE_ECODIM",
            Qualification::CompagnonOeuvre => "COMPAGNON_OEUVRE",
            Qualification::Regulier => "REGULIER",
            Qualification::MembreIrregulier => "MEMBRE_IRREGULIER",
            Qualification::EnIntegration => "EN_INTEGRATION",
            Qualification::ResponsableSession => "RESPONSABLE_SESSION",
            Qualification::ResponsableUnite => "RESPONSABLE_UNITE",
            Qualification::MembreSession => "MEMBRE_SESSION",
            Qualification::Irregulier => "IRREGULIER",
            Qualification::Unmapped => "UNMAPPED",
        }
    }

    /// Integer depth in the church tree.
    pub fn level(&self) -> u8 {
        match self {
            Qualification::ResponsableReseau => NETWORK_LEVEL,
            Qualification::Qualification12 => 2,
            Qualification::Qualification144 => 3,
            Qualification::Qualification1728 => 4,
            Qualification::Qualification20736 => 5,
            Qualification::Leader => LAST_GROUP_LEVEL,
            // Unranked: no position of their own in the church tree
            Qualification::Gouvernance
            | Qualification::Ecodim
            | Qualification::ResponsableEcodim
            | Qualification::CompagnonOeuvre
            | Qualification::Regulier
            | Qualification::MembreIrregulier
            | Qualification::EnIntegration
            | Qualification::ResponsableSession
            | Qualification::ResponsableUnite
            | Qualification::MembreSession
            | Qualification::Irregulier
            | Qualification::Unmapped => CHURCH_LEVEL,
        }
    }

    /// True for the tiers a group can be created with (levels 2 to 6).
    pub fn is_group_tier(&self) -> bool {
        (FIRST_GROUP_LEVEL..=LAST_GROUP_LEVEL).contains(&self.level())
    }

    /// The group tiers holding `level`, in declaration order.
    pub fn at_level(level: u8) -> Vec<Qualification> {
        Qualification::ALL
            .iter()
            .copied()
            .filter(|q| q.level() == level && (level != CHURCH_LEVEL))
            .collect()
    }

    /// Decode a stored column value. Anything outside the vocabulary becomes
    /// [`Qualification::Unmapped`] instead of failing the read.
    pub fn from_stored(raw: &str) -> Qualification {
        raw.parse().unwrap_or_else(|_| {
            tracing::debug!(qualification = raw, "Unmapped qualification, using level 0");
            Qualification::Unmapped
        })
    }
}

impl fmt::Display for Qualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Qualification {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Qualification::ALL
            .iter()
            .copied()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown qualification: {}", s)))
    }
}

/// Level of a qualification.
pub fn level_of(qualification: Qualification) -> u8 {
    qualification.level()
}

/// Level of a stored qualification string. Unrecognized values resolve to
/// the church level.
pub fn level_of_str(raw: &str) -> u8 {
    Qualification::from_stored(raw).level()
}
