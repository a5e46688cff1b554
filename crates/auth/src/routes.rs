//! Route descriptors and navigation requests, as handed over by the router.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use mandir_core::EntityId;

use crate::roles::Role;

/// Well-known client paths.
pub mod paths {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const UNAUTHORIZED: &str = "/unauthorized";
    pub const TENANT_SELECTION: &str = "/tenant-selection";
    pub const PENDING_APPROVAL: &str = "/pending-approval";
    pub const SUPERADMIN_DASHBOARD: &str = "/superadmin/dashboard";
    pub const TEMPLE_DASHBOARD: &str = "/tenant/dashboard";
    pub const DEVOTEE_TEMPLE_SELECTION: &str = "/devotee/temple-selection";
    pub const DEVOTEE_PROFILE_CREATION: &str = "/devotee/profile-creation";
    pub const VOLUNTEER_TEMPLE_SELECTION: &str = "/volunteer/temple-selection";

    /// Route name the router registers the tenant-selection page under.
    pub const TENANT_SELECTION_NAME: &str = "TenantSelection";
}

/// Route entry as it appears in the router configuration.
///
/// Role names are opaque strings here; they are canonicalized when the
/// descriptor is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub guest_only: bool,
    #[serde(default)]
    pub requires_profile: bool,
}

/// Read-only description of a navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub name: String,
    pub path: String,
    pub requires_auth: bool,
    /// Empty means "any role". May contain `Role::Unknown` for names the
    /// resolver did not recognize; such entries restrict the route but never
    /// match a principal.
    pub allowed_roles: HashSet<Role>,
    /// Login/register style pages an authenticated user is bounced away from.
    pub guest_only: bool,
    /// Devotee pages that need a completed devotee profile.
    pub requires_profile: bool,
}

impl RouteDescriptor {
    pub fn public(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            requires_auth: false,
            allowed_roles: HashSet::new(),
            guest_only: false,
            requires_profile: false,
        }
    }

    pub fn protected(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            requires_auth: true,
            ..Self::public(name, path)
        }
    }

    pub fn allow(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles.extend(roles);
        self
    }

    pub fn guest_only(mut self) -> Self {
        self.guest_only = true;
        self
    }

    pub fn profile_gated(mut self) -> Self {
        self.requires_profile = true;
        self
    }

    pub fn is_tenant_selection(&self) -> bool {
        self.path == paths::TENANT_SELECTION || self.name == paths::TENANT_SELECTION_NAME
    }

    /// Whether `role` passes this route's allow-list.
    pub fn admits_role(&self, role: Role) -> bool {
        self.allowed_roles.is_empty()
            || (role != Role::Unknown && self.allowed_roles.contains(&role))
    }
}

impl From<RouteConfig> for RouteDescriptor {
    fn from(config: RouteConfig) -> Self {
        Self {
            allowed_roles: config
                .allowed_roles
                .iter()
                .map(|name| Role::from_name(name))
                .collect(),
            name: config.name,
            path: config.path,
            requires_auth: config.requires_auth,
            guest_only: config.guest_only,
            requires_profile: config.requires_profile,
        }
    }
}

/// A single navigation attempt.
#[derive(Debug, Clone)]
pub struct Navigation<'a> {
    pub route: &'a RouteDescriptor,
    /// Concrete target path, including query string.
    pub full_path: String,
    /// Dynamic route segments (e.g. `id` in `/entity/:id/dashboard`).
    pub params: BTreeMap<String, String>,
}

impl<'a> Navigation<'a> {
    pub fn new(route: &'a RouteDescriptor, full_path: impl Into<String>) -> Self {
        Self {
            route,
            full_path: full_path.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Entity id carried by this navigation: a route param, else an
    /// `/entity/{id}/...` path segment.
    pub fn entity_id(&self) -> Option<EntityId> {
        ["id", "entityId", "entity_id"]
            .iter()
            .find_map(|key| self.params.get(*key))
            .and_then(|raw| raw.parse().ok())
            .or_else(|| entity_segment(&self.full_path))
    }
}

fn entity_segment(path: &str) -> Option<EntityId> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment == "entity" {
            return segments.next().and_then(|id| id.parse().ok());
        }
    }
    None
}
