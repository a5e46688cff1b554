//! Logged-in principal as returned by the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use mandir_core::{EntityId, UserId};

use crate::roles::{RawRole, Role};

/// User record held by the session.
///
/// Only the fields the client core reasons about are typed; everything else
/// the backend sends (name, email, avatar...) is kept in `extra` so it
/// survives persistence and profile merges untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RawRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RawRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_entity: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: UserId, role: impl Into<RawRole>) -> Self {
        Self {
            id,
            role: Some(role.into()),
            role_id: None,
            status: None,
            entity_id: None,
            current_entity: None,
            extra: Map::new(),
        }
    }

    /// Raw role as sent by the backend: `role`, else `role_id`.
    pub fn raw_role(&self) -> Option<&RawRole> {
        self.role.as_ref().or(self.role_id.as_ref())
    }

    /// Canonical role, recomputed on every call.
    pub fn role(&self) -> Role {
        Role::resolve(self.raw_role())
    }

    /// Entity the user is bound to: explicit `entity_id`, else `current_entity.id`.
    pub fn entity_id(&self) -> Option<EntityId> {
        if let Some(id) = &self.entity_id {
            return Some(id.clone());
        }

        self.current_entity
            .as_ref()
            .and_then(|entity| entity.get("id"))
            .and_then(|id| serde_json::from_value(id.clone()).ok())
    }

    pub fn is_pending_approval(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("pending"))
    }

    /// Shallow overlay of a profile-update response onto this user.
    ///
    /// Top-level keys in `patch` replace the existing values. On a patch that
    /// would produce an invalid user (e.g. blank `id`) nothing is changed.
    pub fn merge_profile(&mut self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let mut current = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }

        *self = serde_json::from_value(Value::Object(current))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(value: Value) -> User {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn role_is_resolved_from_string_or_number() {
        assert_eq!(user(json!({"id": 1, "role": "MonitoringUser"})).role(), Role::MonitoringUser);
        assert_eq!(user(json!({"id": 1, "role_id": 3})).role(), Role::Devotee);
        assert_eq!(user(json!({"id": 1})).role(), Role::Unknown);
    }

    #[test]
    fn entity_id_falls_back_to_current_entity() {
        let u = user(json!({"id": 1, "current_entity": {"id": 77, "name": "Sri Venkateswara"}}));
        assert_eq!(u.entity_id(), Some(EntityId::from(77)));

        let u = user(json!({"id": 1, "entity_id": "5", "current_entity": {"id": 77}}));
        assert_eq!(u.entity_id(), Some(EntityId::from(5)));
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let u = user(json!({"id": "u-1", "role": "devotee", "email": "a@b.org", "name": "Asha"}));
        let back: User = serde_json::from_str(&serde_json::to_string(&u).unwrap()).unwrap();
        assert_eq!(back, u);
        assert_eq!(back.extra.get("email"), Some(&json!("a@b.org")));
    }

    #[test]
    fn merge_profile_overlays_top_level_fields() {
        let mut u = user(json!({"id": 1, "role": "devotee", "name": "Asha", "phone": "111"}));
        let patch = json!({"name": "Asha R", "status": "active"});
        u.merge_profile(patch.as_object().unwrap()).unwrap();

        assert_eq!(u.extra.get("name"), Some(&json!("Asha R")));
        assert_eq!(u.extra.get("phone"), Some(&json!("111")));
        assert_eq!(u.status.as_deref(), Some("active"));
        assert_eq!(u.role(), Role::Devotee);
    }

    #[test]
    fn invalid_merge_leaves_user_untouched() {
        let mut u = user(json!({"id": 1, "role": "devotee"}));
        let before = u.clone();
        let patch = json!({"id": ""});
        assert!(u.merge_profile(patch.as_object().unwrap()).is_err());
        assert_eq!(u, before);
    }

    #[test]
    fn pending_status_is_case_insensitive() {
        assert!(user(json!({"id": 1, "status": "Pending"})).is_pending_approval());
        assert!(!user(json!({"id": 1, "status": "active"})).is_pending_approval());
        assert!(!user(json!({"id": 1})).is_pending_approval());
    }
}
