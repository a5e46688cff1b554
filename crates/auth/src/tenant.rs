//! Tenant-selection state and landing paths per role.

use serde::{Deserialize, Serialize};

use mandir_core::{EntityId, TenantId};

use crate::roles::Role;
use crate::routes::paths;

/// Whether a principal still has to choose the temple it works in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "tenant_id", rename_all = "snake_case")]
pub enum TenantSelectionState {
    /// The role has no tenant to choose (or it is implicit in its identity).
    NotApplicable,
    NeedsSelection,
    Resolved(TenantId),
}

impl TenantSelectionState {
    pub fn of(role: Role, assigned_tenant_id: Option<&TenantId>) -> Self {
        if !role.is_tenant_scoped() {
            return Self::NotApplicable;
        }
        match assigned_tenant_id {
            Some(id) => Self::Resolved(id.clone()),
            None => Self::NeedsSelection,
        }
    }
}

/// True iff `role` is tenant-scoped and no tenant has been assigned yet.
pub fn needs_tenant_selection(role: Role, assigned_tenant_id: Option<&TenantId>) -> bool {
    TenantSelectionState::of(role, assigned_tenant_id) == TenantSelectionState::NeedsSelection
}

/// Canonical landing page for a principal.
///
/// `owner_id` is the temple a temple admin owns (their own tenant); `entity_id`
/// is the temple a volunteer is bound to.
pub fn dashboard_path(
    role: Role,
    assigned_tenant_id: Option<&TenantId>,
    owner_id: Option<&str>,
    entity_id: Option<&EntityId>,
) -> String {
    match role {
        Role::StandardUser | Role::MonitoringUser => match assigned_tenant_id {
            Some(tenant) => format!("/tenant/{tenant}/dashboard"),
            None => paths::TENANT_SELECTION.to_string(),
        },
        Role::SuperAdmin => paths::SUPERADMIN_DASHBOARD.to_string(),
        Role::TempleAdmin => match owner_id {
            Some(owner) => format!("/tenant/{owner}/dashboard"),
            None => paths::TEMPLE_DASHBOARD.to_string(),
        },
        // Devotees pick their temple again on every session.
        Role::Devotee => paths::DEVOTEE_TEMPLE_SELECTION.to_string(),
        Role::Volunteer => match entity_id {
            Some(entity) => format!("/entity/{entity}/volunteer/dashboard"),
            None => paths::VOLUNTEER_TEMPLE_SELECTION.to_string(),
        },
        Role::Unknown => paths::HOME.to_string(),
    }
}

/// Where to go right after `role` picked `tenant_id`.
pub fn tenant_landing_path(role: Role, tenant_id: &TenantId) -> String {
    match role {
        Role::SuperAdmin | Role::StandardUser | Role::MonitoringUser => {
            format!("/entity/{tenant_id}/dashboard")
        }
        _ => format!("/tenant/{tenant_id}/dashboard"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tenant(id: u64) -> TenantId {
        TenantId::from(id)
    }

    #[test]
    fn selection_state_per_role() {
        let t = tenant(42);
        assert_eq!(
            TenantSelectionState::of(Role::StandardUser, None),
            TenantSelectionState::NeedsSelection
        );
        assert_eq!(
            TenantSelectionState::of(Role::MonitoringUser, Some(&t)),
            TenantSelectionState::Resolved(t.clone())
        );
        assert_eq!(
            TenantSelectionState::of(Role::TempleAdmin, None),
            TenantSelectionState::NotApplicable
        );
        assert_eq!(
            TenantSelectionState::of(Role::SuperAdmin, Some(&t)),
            TenantSelectionState::NotApplicable
        );
    }

    #[test]
    fn dashboard_paths() {
        let t = tenant(42);
        let e = EntityId::from(8);

        assert_eq!(dashboard_path(Role::MonitoringUser, Some(&t), None, None), "/tenant/42/dashboard");
        assert_eq!(dashboard_path(Role::StandardUser, None, None, None), "/tenant-selection");
        assert_eq!(dashboard_path(Role::SuperAdmin, Some(&t), None, None), "/superadmin/dashboard");
        assert_eq!(dashboard_path(Role::TempleAdmin, None, None, None), "/tenant/dashboard");
        assert_eq!(dashboard_path(Role::TempleAdmin, None, Some("3"), None), "/tenant/3/dashboard");
        assert_eq!(dashboard_path(Role::Devotee, Some(&t), Some("3"), Some(&e)), "/devotee/temple-selection");
        assert_eq!(dashboard_path(Role::Volunteer, None, None, Some(&e)), "/entity/8/volunteer/dashboard");
        assert_eq!(dashboard_path(Role::Volunteer, None, None, None), "/volunteer/temple-selection");
        assert_eq!(dashboard_path(Role::Unknown, Some(&t), Some("3"), Some(&e)), "/");
    }

    #[test]
    fn landing_after_tenant_selection() {
        let t = tenant(7);
        assert_eq!(tenant_landing_path(Role::SuperAdmin, &t), "/entity/7/dashboard");
        assert_eq!(tenant_landing_path(Role::StandardUser, &t), "/entity/7/dashboard");
        assert_eq!(tenant_landing_path(Role::MonitoringUser, &t), "/entity/7/dashboard");
        assert_eq!(tenant_landing_path(Role::TempleAdmin, &t), "/tenant/7/dashboard");
        assert_eq!(tenant_landing_path(Role::Devotee, &t), "/tenant/7/dashboard");
    }

    proptest! {
        /// Property: selection is needed exactly for tenant-scoped roles without a tenant.
        #[test]
        fn needs_selection_iff_scoped_and_unassigned(
            role in prop::sample::select(Role::ALL.to_vec()),
            assigned in prop::option::of(1u64..10_000),
        ) {
            let assigned = assigned.map(TenantId::from);
            let expected = matches!(role, Role::StandardUser | Role::MonitoringUser) && assigned.is_none();
            prop_assert_eq!(needs_tenant_selection(role, assigned.as_ref()), expected);
        }
    }
}
