use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Name given to participants that join without one.
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// Opaque identity bound to one signaling connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random id, assigned when a connection is accepted.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated, non-empty room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::MalformedJoin("room id is empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Substitutes the placeholder for absent or blank names.
pub fn resolve_display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_DISPLAY_NAME.to_string(),
    }
}

/// A connected participant as the server tracks it.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub display_name: String,
    pub room_id: Option<RoomId>,
    pub camera_off: bool,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            room_id: None,
            camera_off: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_fall_back_to_placeholder() {
        assert_eq!(resolve_display_name(None), DEFAULT_DISPLAY_NAME);
        assert_eq!(resolve_display_name(Some("   ")), DEFAULT_DISPLAY_NAME);
        assert_eq!(resolve_display_name(Some(" Ana ")), "Ana");
    }

    #[test]
    fn room_id_rejects_empty() {
        assert!(matches!(RoomId::parse(""), Err(Error::MalformedJoin(_))));
        assert!(matches!(RoomId::parse(" \t"), Err(Error::MalformedJoin(_))));
        assert_eq!(RoomId::parse("r1").unwrap().as_str(), "r1");
    }

    #[test]
    fn short_id_handles_tiny_ids() {
        assert_eq!(SessionId::from("A").short(), "A");
        assert_eq!(SessionId::from("0123456789").short(), "01234567");
    }
}
