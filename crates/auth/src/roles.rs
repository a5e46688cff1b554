use serde::{Deserialize, Serialize};

/// Canonical role of a principal.
///
/// A `Role` is never stored; it is derived from a [`RawRole`] through
/// [`Role::resolve`] every time it is needed. No other component inspects raw
/// role values directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Role {
    SuperAdmin,
    TempleAdmin,
    Devotee,
    Volunteer,
    StandardUser,
    MonitoringUser,
    Unknown,
}

/// Role as it arrives on the wire: a numeric identifier or a free-form name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRole {
    Numeric(i64),
    Text(String),
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SuperAdmin,
        Role::TempleAdmin,
        Role::Devotee,
        Role::Volunteer,
        Role::StandardUser,
        Role::MonitoringUser,
        Role::Unknown,
    ];

    /// Canonicalize a raw role. Total: unrecognized or absent input is `Unknown`.
    pub fn resolve(raw: Option<&RawRole>) -> Role {
        match raw {
            Some(RawRole::Numeric(id)) => Self::from_numeric(*id),
            Some(RawRole::Text(name)) => Self::from_name(name),
            None => Role::Unknown,
        }
    }

    /// Fixed numeric lookup used by the backend's `role_id` column.
    pub fn from_numeric(id: i64) -> Role {
        match id {
            1 => Role::SuperAdmin,
            2 => Role::TempleAdmin,
            3 => Role::Devotee,
            4 => Role::Volunteer,
            5 => Role::StandardUser,
            6 => Role::MonitoringUser,
            _ => Role::Unknown,
        }
    }

    /// Alias folding over a lower-cased, trimmed role name.
    pub fn from_name(name: &str) -> Role {
        match name.trim().to_lowercase().as_str() {
            "templeadmin" | "tenant" => Role::TempleAdmin,
            "standarduser" | "standard_user" => Role::StandardUser,
            "monitoringuser" | "monitoring_user" => Role::MonitoringUser,
            "superadmin" | "super_admin" => Role::SuperAdmin,
            "devotee" => Role::Devotee,
            "volunteer" => Role::Volunteer,
            _ => Role::Unknown,
        }
    }

    /// Canonical lower-case name. Resolving it yields `self` again.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::TempleAdmin => "templeadmin",
            Role::Devotee => "devotee",
            Role::Volunteer => "volunteer",
            Role::StandardUser => "standarduser",
            Role::MonitoringUser => "monitoringuser",
            Role::Unknown => "unknown",
        }
    }

    /// Roles scoped to a tenant they must pick (or be assigned) before working.
    pub fn is_tenant_scoped(&self) -> bool {
        matches!(self, Role::StandardUser | Role::MonitoringUser)
    }

    /// Roles whose self-registration waits for a super admin's approval.
    pub fn requires_approval(&self) -> bool {
        matches!(self, Role::TempleAdmin)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from_name(&value)
    }
}

impl From<Role> for RawRole {
    fn from(value: Role) -> Self {
        RawRole::Text(value.as_str().to_string())
    }
}

impl From<&str> for RawRole {
    fn from(value: &str) -> Self {
        RawRole::Text(value.to_string())
    }
}

impl From<i64> for RawRole {
    fn from(value: i64) -> Self {
        RawRole::Numeric(value)
    }
}
