//! Route admission: one ordered, short-circuiting check sequence per navigation.
//!
//! Order (first redirect wins):
//! 1. authentication
//! 2. tenant selection (takes precedence over every role check)
//! 3. super admin may always browse tenant selection
//! 4. guest-only pages bounce authenticated users to their dashboard
//! 5. role allow-list
//! 6. devotee profile completeness
//!
//! The pipeline only reads a [`Session`] snapshot; it never mutates it.

use serde::Serialize;

use crate::roles::Role;
use crate::routes::{Navigation, paths};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    AuthRequired,
    TenantSelectionRequired,
    AlreadyAuthenticated,
    RoleDenied,
    ProfileIncomplete,
}

impl RedirectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectReason::AuthRequired => "auth_required",
            RedirectReason::TenantSelectionRequired => "tenant_selection_required",
            RedirectReason::AlreadyAuthenticated => "already_authenticated",
            RedirectReason::RoleDenied => "role_denied",
            RedirectReason::ProfileIncomplete => "profile_incomplete",
        }
    }
}

impl core::fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub path: String,
    pub reason: RedirectReason,
    pub query: Vec<(String, String)>,
}

impl Redirect {
    pub fn to(path: impl Into<String>, reason: RedirectReason) -> Self {
        Self {
            path: path.into(),
            reason,
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Path plus percent-encoded query string, ready for the router.
    pub fn location(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AdmissionDecision {
    Admit,
    Redirect(Redirect),
}

impl AdmissionDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, AdmissionDecision::Admit)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            AdmissionDecision::Redirect(r) => Some(r),
            AdmissionDecision::Admit => None,
        }
    }
}

/// Inputs supplied by collaborators outside the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionInputs {
    /// Devotee profile completion, as reported by the profile service.
    /// `None` when it has not been looked up; the check is skipped then.
    pub profile_completed: Option<bool>,
}

/// Query parameter carrying the original target through the login page.
pub const RETURN_PATH_PARAM: &str = "redirect";

#[derive(Debug, Clone, Copy, Default)]
pub struct AdmissionPipeline;

impl AdmissionPipeline {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        session: &Session,
        nav: &Navigation<'_>,
        inputs: AdmissionInputs,
    ) -> AdmissionDecision {
        let decision = self.run(session, nav, inputs);
        match &decision {
            AdmissionDecision::Admit => {
                tracing::debug!(route = %nav.route.name, path = %nav.full_path, "navigation admitted");
            }
            AdmissionDecision::Redirect(r) => {
                tracing::debug!(
                    route = %nav.route.name,
                    path = %nav.full_path,
                    reason = %r.reason,
                    to = %r.path,
                    "navigation redirected"
                );
            }
        }
        decision
    }

    fn run(&self, session: &Session, nav: &Navigation<'_>, inputs: AdmissionInputs) -> AdmissionDecision {
        let route = nav.route;
        let authenticated = session.is_authenticated();

        if route.requires_auth && !authenticated {
            return AdmissionDecision::Redirect(
                Redirect::to(paths::LOGIN, RedirectReason::AuthRequired)
                    .with_query(RETURN_PATH_PARAM, nav.full_path.clone()),
            );
        }

        let role = session.role();

        if authenticated && session.needs_tenant_selection() && !route.is_tenant_selection() {
            return AdmissionDecision::Redirect(Redirect::to(
                paths::TENANT_SELECTION,
                RedirectReason::TenantSelectionRequired,
            ));
        }

        if role == Role::SuperAdmin && route.is_tenant_selection() {
            return AdmissionDecision::Admit;
        }

        if authenticated && route.guest_only {
            return AdmissionDecision::Redirect(Redirect::to(
                session.dashboard_path(),
                RedirectReason::AlreadyAuthenticated,
            ));
        }

        if !route.admits_role(role) {
            return AdmissionDecision::Redirect(Redirect::to(
                paths::UNAUTHORIZED,
                RedirectReason::RoleDenied,
            ));
        }

        if route.requires_profile && role == Role::Devotee && inputs.profile_completed == Some(false) {
            let mut redirect = Redirect::to(
                paths::DEVOTEE_PROFILE_CREATION,
                RedirectReason::ProfileIncomplete,
            );
            if let Some(entity) = nav.entity_id() {
                redirect = redirect.with_query("id", entity.to_string());
            }
            return AdmissionDecision::Redirect(redirect);
        }

        AdmissionDecision::Admit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::RouteDescriptor;
    use crate::user::User;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn token_with(payload: Value) -> String {
        format!("h.{}.s", URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    fn session(role: &str, claims: Value) -> Session {
        let user: User = serde_json::from_value(json!({"id": 3, "role": role})).unwrap();
        Session::authenticated(token_with(claims), user)
    }

    fn decide(session: &Session, nav: &Navigation<'_>) -> AdmissionDecision {
        AdmissionPipeline::new().evaluate(session, nav, AdmissionInputs::default())
    }

    fn reason(decision: &AdmissionDecision) -> Option<RedirectReason> {
        decision.redirect().map(|r| r.reason)
    }

    #[test]
    fn anonymous_user_is_sent_to_login_with_return_path() {
        let route = RouteDescriptor::protected("Donations", "/tenant/:id/donations");
        let nav = Navigation::new(&route, "/tenant/4/donations?page=2");
        let decision = decide(&Session::default(), &nav);

        let redirect = decision.redirect().unwrap();
        assert_eq!(redirect.path, "/login");
        assert_eq!(redirect.reason, RedirectReason::AuthRequired);
        assert_eq!(redirect.location(), "/login?redirect=%2Ftenant%2F4%2Fdonations%3Fpage%3D2");
    }

    #[test]
    fn malformed_token_session_cannot_reach_protected_routes() {
        let restored = Session {
            token: Some("not-a-jwt".into()),
            claims: crate::Claims::from_token("not-a-jwt"),
            ..Session::default()
        };
        assert_eq!(restored.role(), Role::Unknown);

        let route = RouteDescriptor::protected("Home", "/home");
        let nav = Navigation::new(&route, "/home");
        assert_eq!(reason(&decide(&restored, &nav)), Some(RedirectReason::AuthRequired));
    }

    #[test]
    fn public_route_admits_anonymous_user() {
        let route = RouteDescriptor::public("About", "/about");
        let nav = Navigation::new(&route, "/about");
        assert!(decide(&Session::default(), &nav).is_admit());
    }

    #[test]
    fn tenant_selection_precedes_role_check() {
        let s = session("monitoringuser", json!({}));
        let route = RouteDescriptor::protected("EntityDashboard", "/entity/:id/dashboard")
            .allow([Role::MonitoringUser, Role::StandardUser]);
        let nav = Navigation::new(&route, "/entity/7/dashboard");

        let decision = decide(&s, &nav);
        assert_eq!(decision.redirect().unwrap().path, "/tenant-selection");
        assert_eq!(reason(&decision), Some(RedirectReason::TenantSelectionRequired));
    }

    #[test]
    fn tenant_selection_route_itself_is_reachable() {
        let s = session("standard_user", json!({}));
        let route = RouteDescriptor::protected(paths::TENANT_SELECTION_NAME, paths::TENANT_SELECTION)
            .allow([Role::StandardUser, Role::MonitoringUser]);
        let nav = Navigation::new(&route, paths::TENANT_SELECTION);
        assert!(decide(&s, &nav).is_admit());
    }

    #[test]
    fn super_admin_may_browse_tenant_selection() {
        let s = session("superadmin", json!({}));
        assert!(!s.needs_tenant_selection());

        let route = RouteDescriptor::protected(paths::TENANT_SELECTION_NAME, paths::TENANT_SELECTION)
            .allow([Role::StandardUser, Role::MonitoringUser]);
        let nav = Navigation::new(&route, paths::TENANT_SELECTION);
        assert!(decide(&s, &nav).is_admit());
    }

    #[test]
    fn role_outside_allow_list_is_denied() {
        let s = session("devotee", json!({}));
        let route = RouteDescriptor::protected("SuperadminDashboard", paths::SUPERADMIN_DASHBOARD)
            .allow([Role::SuperAdmin]);
        let nav = Navigation::new(&route, paths::SUPERADMIN_DASHBOARD);

        let decision = decide(&s, &nav);
        assert_eq!(decision.redirect().unwrap().path, "/unauthorized");
        assert_eq!(reason(&decision), Some(RedirectReason::RoleDenied));
    }

    #[test]
    fn unknown_role_is_denied_by_any_allow_list() {
        let s = session("priest", json!({}));
        let route = RouteDescriptor::protected("Reports", "/reports").allow([Role::TempleAdmin]);
        let nav = Navigation::new(&route, "/reports");
        assert_eq!(reason(&decide(&s, &nav)), Some(RedirectReason::RoleDenied));
    }

    #[test]
    fn incomplete_devotee_profile_redirects_with_entity_id() {
        let s = session("devotee", json!({}));
        let route = RouteDescriptor::protected("DevoteeDashboard", "/entity/:id/devotee/dashboard")
            .allow([Role::Devotee])
            .profile_gated();
        let nav = Navigation::new(&route, "/entity/5/devotee/dashboard").param("id", "5");
        let inputs = AdmissionInputs { profile_completed: Some(false) };

        let decision = AdmissionPipeline::new().evaluate(&s, &nav, inputs);
        let redirect = decision.redirect().unwrap();
        assert_eq!(redirect.reason, RedirectReason::ProfileIncomplete);
        assert_eq!(redirect.location(), "/devotee/profile-creation?id=5");

        let complete = AdmissionInputs { profile_completed: Some(true) };
        assert!(AdmissionPipeline::new().evaluate(&s, &nav, complete).is_admit());

        let unknown = AdmissionInputs::default();
        assert!(AdmissionPipeline::new().evaluate(&s, &nav, unknown).is_admit());
    }

    #[test]
    fn authenticated_user_is_bounced_from_login() {
        let s = session("superadmin", json!({}));
        let route = RouteDescriptor::public("Login", paths::LOGIN).guest_only();
        let nav = Navigation::new(&route, paths::LOGIN);

        let decision = decide(&s, &nav);
        assert_eq!(reason(&decision), Some(RedirectReason::AlreadyAuthenticated));
        assert_eq!(decision.redirect().unwrap().path, "/superadmin/dashboard");
    }

    #[test]
    fn decision_does_not_touch_the_session() {
        let s = session("volunteer", json!({"entity_id": 2}));
        let before = s.clone();
        let route = RouteDescriptor::protected("VolunteerDashboard", "/entity/:id/volunteer/dashboard");
        let nav = Navigation::new(&route, "/entity/9/volunteer/dashboard");
        let _ = decide(&s, &nav);
        assert_eq!(s, before);
    }

    proptest! {
        /// Property: an unassigned tenant-scoped user never gets past tenant
        /// selection, whatever the route's allow-list says.
        #[test]
        fn unassigned_standard_user_always_goes_to_tenant_selection(
            allowed in prop::collection::hash_set(prop::sample::select(Role::ALL.to_vec()), 0..4),
            guest_only in any::<bool>(),
            path in "/[a-z]{1,8}(/[0-9]{1,3})?",
        ) {
            let s = session("StandardUser", json!({}));
            let mut route = RouteDescriptor::protected("Target", path.clone()).allow(allowed);
            route.guest_only = guest_only;
            prop_assume!(!route.is_tenant_selection());
            let nav = Navigation::new(&route, path);

            let decision = decide(&s, &nav);
            prop_assert_eq!(reason(&decision), Some(RedirectReason::TenantSelectionRequired));
        }
    }
}
