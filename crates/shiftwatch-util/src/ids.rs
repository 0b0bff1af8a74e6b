//! Strongly-typed identifiers for shiftwatch

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a guild (an independent organization)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(String);

impl GuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GuildId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GuildId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a guild member
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of one shift, shared by all of its events.
///
/// Freshly generated ids are UUID-backed, so they are unique within any
/// guild without consulting the store. Ids read back from storage are kept
/// verbatim, which lets purges target ids produced by older tooling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShiftId(String);

impl ShiftId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for display next to a user mention
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ShiftId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guild_id_equality() {
        let g1 = GuildId::new("1308111335950651422");
        let g2 = GuildId::from("1308111335950651422");
        let g3 = GuildId::new("42");

        assert_eq!(g1, g2);
        assert_ne!(g1, g3);
    }

    #[test]
    fn shift_id_uniqueness() {
        let s1 = ShiftId::generate();
        let s2 = ShiftId::generate();
        assert_ne!(s1, s2);
        assert_eq!(s1.as_str().len(), 32);
    }

    #[test]
    fn shift_id_short_prefix() {
        assert_eq!(ShiftId::new("1234567890").short(), "12345678");
        assert_eq!(ShiftId::new("abc").short(), "abc");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let user = UserId::new("pilot-7");
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, "\"pilot-7\"");
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(user, parsed);

        let shift = ShiftId::generate();
        let json = serde_json::to_string(&shift).unwrap();
        let parsed: ShiftId = serde_json::from_str(&json).unwrap();
        assert_eq!(shift, parsed);
    }
}
