//! Authoritative authentication state (pure data + derived views).
//!
//! Persistence and mutation live in `mandir-session`; this type is what a
//! navigation decision reads, as one consistent snapshot.

use serde::{Deserialize, Serialize};

use mandir_core::{EntityId, TenantId};

use crate::claims::Claims;
use crate::roles::Role;
use crate::tenant::{self, TenantSelectionState};
use crate::user::User;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub claims: Claims,
    pub user: Option<User>,
    pub current_tenant_id: Option<TenantId>,
    pub assigned_tenant_id: Option<TenantId>,
    /// Entity id remembered from the last admitted entity-scoped navigation.
    pub remembered_entity_id: Option<EntityId>,
}

impl Session {
    /// Build a session from a freshly issued token and its user.
    ///
    /// The assigned tenant comes from the token's `assigned_tenant_id` claim.
    pub fn authenticated(token: String, user: User) -> Self {
        let claims = Claims::from_token(&token);
        Self {
            assigned_tenant_id: claims.assigned_tenant_id.clone(),
            token: Some(token),
            claims,
            user: Some(user),
            current_tenant_id: None,
            remembered_entity_id: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// Canonical role: the user's raw role, falling back to token claims.
    pub fn role(&self) -> Role {
        let raw = self
            .user
            .as_ref()
            .and_then(|u| u.raw_role())
            .or_else(|| self.claims.raw_role());
        Role::resolve(raw)
    }

    pub fn tenant_selection(&self) -> TenantSelectionState {
        TenantSelectionState::of(self.role(), self.assigned_tenant_id.as_ref())
    }

    pub fn needs_tenant_selection(&self) -> bool {
        tenant::needs_tenant_selection(self.role(), self.assigned_tenant_id.as_ref())
    }

    /// Temple owned by the principal (a temple admin's own identity).
    pub fn owner_id(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|u| u.id.to_string())
            .or_else(|| self.claims.user_id.as_ref().map(|id| id.to_string()))
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        self.user
            .as_ref()
            .and_then(User::entity_id)
            .or_else(|| self.claims.entity_id.clone())
            .or_else(|| self.remembered_entity_id.clone())
    }

    /// Landing page for the current principal; `/` when nobody is logged in.
    pub fn dashboard_path(&self) -> String {
        if self.user.is_none() {
            return crate::routes::paths::HOME.to_string();
        }

        tenant::dashboard_path(
            self.role(),
            self.assigned_tenant_id.as_ref(),
            self.owner_id().as_deref(),
            self.entity_id().as_ref(),
        )
    }

    /// Tenant the HTTP client should scope requests to: current, else assigned.
    pub fn request_tenant_id(&self) -> Option<&TenantId> {
        self.current_tenant_id
            .as_ref()
            .or(self.assigned_tenant_id.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use mandir_core::UserId;
    use serde_json::{Value, json};

    fn token_with(payload: Value) -> String {
        format!("h.{}.s", URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    fn user(role: Value) -> User {
        serde_json::from_value(json!({"id": 11, "role": role})).unwrap()
    }

    #[test]
    fn empty_session_is_anonymous() {
        let session = Session::default();
        assert!(!session.is_authenticated());
        assert_eq!(session.role(), Role::Unknown);
        assert_eq!(session.dashboard_path(), "/");
    }

    #[test]
    fn authenticated_requires_token_and_user() {
        let mut session = Session::authenticated("x.y.z".into(), user(json!("devotee")));
        assert!(session.is_authenticated());
        session.user = None;
        assert!(!session.is_authenticated());
    }

    #[test]
    fn temple_admin_from_role_id_claim() {
        let token = token_with(json!({"role_id": 2}));
        let u = User {
            role: None,
            ..User::new(UserId::from(11), "ignored")
        };
        let session = Session::authenticated(token, u);

        assert_eq!(session.role(), Role::TempleAdmin);
        assert!(!session.needs_tenant_selection());
        assert_eq!(session.dashboard_path(), "/tenant/11/dashboard");
    }

    #[test]
    fn monitoring_user_with_assigned_tenant() {
        let token = token_with(json!({"assigned_tenant_id": "42"}));
        let session = Session::authenticated(token, user(json!("MonitoringUser")));

        assert_eq!(session.role(), Role::MonitoringUser);
        assert_eq!(session.assigned_tenant_id, Some(TenantId::from(42)));
        assert!(!session.needs_tenant_selection());
        assert_eq!(session.dashboard_path(), "/tenant/42/dashboard");
        assert_eq!(session.request_tenant_id(), Some(&TenantId::from(42)));
    }

    #[test]
    fn monitoring_user_without_tenant_needs_selection() {
        let session = Session::authenticated(token_with(json!({})), user(json!("monitoringuser")));
        assert!(session.needs_tenant_selection());
        assert_eq!(session.tenant_selection(), TenantSelectionState::NeedsSelection);
        assert_eq!(session.dashboard_path(), "/tenant-selection");
    }

    #[test]
    fn volunteer_uses_entity_from_claims() {
        let token = token_with(json!({"entity_id": 8}));
        let session = Session::authenticated(token, user(json!(4)));
        assert_eq!(session.dashboard_path(), "/entity/8/volunteer/dashboard");
    }
}
