//! Typed ID definitions for scheduler resources.

use crate::{define_external_id, define_id, IdError};

// =============================================================================
// Generated
// =============================================================================

define_id!(TaskId, "task");

// =============================================================================
// Cluster manager
// =============================================================================

define_external_id!(OfferId);
define_external_id!(FrameworkId);

// =============================================================================
// Nodes
// =============================================================================

/// Maximum length of a node name.
pub const NODE_ID_MAX_LEN: usize = 64;

/// Operator-assigned name of a node (`nn`, `dn0`, ...).
///
/// Node ids are immutable once a node is created and their ordering is the
/// order in which placement considers nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Parses and validates a node name.
    pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
        let s = s.into();
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        if s.len() > NODE_ID_MAX_LEN {
            return Err(IdError::TooLong {
                len: s.len(),
                max: NODE_ID_MAX_LEN,
            });
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(IdError::InvalidChar(c));
        }

        Ok(Self(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================
