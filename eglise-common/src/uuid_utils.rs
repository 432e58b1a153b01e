//! UUID helpers for TEXT id columns

use crate::Result;
use uuid::Uuid;

/// Generate a new entity id
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse an id read from a TEXT column
pub fn parse(s: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

/// Parse a nullable id column
pub fn parse_opt(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse).transpose()
}

/// Bind form of a nullable id
pub fn to_opt_string(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}
