//! Strongly-typed identifiers used across the client core.
//!
//! The backend hands out identifiers either as JSON strings (`"42"`) or as
//! JSON integers (`42`). Both forms deserialize into the same newtype; the
//! canonical in-memory and persisted form is always the string.

use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DomainError, DomainResult};

/// Identifier of a tenant (a temple, the multi-tenant boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of a user (actor identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Identifier of an entity (temple context a devotee/volunteer operates in).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Signed(n) => n.to_string(),
            WireId::Unsigned(n) => n.to_string(),
        }
    }
}

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create an identifier, rejecting empty/blank input.
            pub fn new(value: impl Into<String>) -> DomainResult<Self> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::BlankId { kind: $name });
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = WireId::deserialize(deserializer)?.into_string();
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(UserId, "UserId");
impl_string_newtype!(EntityId, "EntityId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_string_or_integer() {
        let a: TenantId = serde_json::from_str("\"42\"").unwrap();
        let b: TenantId = serde_json::from_str("42").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "42");
    }

    #[test]
    fn blank_identifier_is_rejected() {
        assert_eq!(
            TenantId::new("   "),
            Err(DomainError::BlankId { kind: "TenantId" })
        );
        assert!(serde_json::from_str::<EntityId>("\"\"").is_err());
        assert!("7".parse::<UserId>().is_ok());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = EntityId::from(5);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"5\"");
    }
}
