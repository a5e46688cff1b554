//! Stateful auth operations.
//!
//! `AuthFacade` sequences the backend calls with the session store. Every
//! operation that waits on the network captures a [`Generation`] before the
//! call and commits only if it is still current afterwards; a late completion
//! is reported as [`Completion::Stale`] and leaves the session alone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use mandir_auth::{
    AdmissionDecision, AdmissionInputs, AdmissionPipeline, Claims, Navigation, Role, Session, User,
    paths, tenant_landing_path,
};
use mandir_core::TenantId;

use crate::api::{AuthApi, Credentials, PasswordReset, Registration, TokenResponse};
use crate::config::{ClientConfig, DEFAULT_AUTH_TIMEOUT};
use crate::error::{ApiError, AuthError};
use crate::store::{Generation, SessionStore};

/// Outcome of an operation whose result may have been superseded.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Applied(T),
    /// A later login/logout started while this one was in flight.
    Stale,
}

impl<T> Completion<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Completion::Stale)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Completion::Applied(value) => Some(value),
            Completion::Stale => None,
        }
    }
}

/// Where the client should go next, and who is logged in there.
#[derive(Debug, Clone, PartialEq)]
pub struct Landing {
    pub redirect_path: String,
    pub user: Option<User>,
}

impl Landing {
    fn to(path: impl Into<String>) -> Self {
        Self {
            redirect_path: path.into(),
            user: None,
        }
    }
}

pub struct AuthFacade {
    store: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    pipeline: AdmissionPipeline,
    timeout: Duration,
}

impl AuthFacade {
    pub fn new(store: Arc<SessionStore>, api: Arc<dyn AuthApi>) -> Self {
        Self {
            store,
            api,
            pipeline: AdmissionPipeline::new(),
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Restore the persisted session selected by `config` and wire it to `api`.
    pub fn from_config(config: &ClientConfig, api: Arc<dyn AuthApi>) -> Self {
        let store = Arc::new(SessionStore::restore(config.storage()));
        Self::new(store, api).with_timeout(config.auth_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn dashboard_path(&self) -> String {
        self.store.snapshot().dashboard_path()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(self.timeout)),
        }
    }

    fn authenticated_session(response: TokenResponse) -> Result<Session, ApiError> {
        let token = response
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ApiError::MissingToken)?;
        let user = response
            .user
            .ok_or_else(|| ApiError::InvalidResponse("response did not contain a user".into()))?;
        Ok(Session::authenticated(token, user))
    }

    /// Install `session` under `generation` and compute its landing page.
    fn commit(&self, generation: Generation, session: Session) -> Result<Completion<Landing>, AuthError> {
        let landing = Landing {
            redirect_path: session.dashboard_path(),
            user: session.user.clone(),
        };
        let role = session.role();

        if !self.store.establish(generation, session)? {
            tracing::debug!("discarding stale authentication result");
            return Ok(Completion::Stale);
        }

        tracing::info!(
            %role,
            session_id = ?self.store.session_id(),
            redirect = %landing.redirect_path,
            "session established"
        );
        Ok(Completion::Applied(landing))
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Completion<Landing>, AuthError> {
        let generation = self.store.begin_operation();

        let response = self.bounded(self.api.login(credentials)).await;

        if !self.store.is_current(generation) {
            tracing::debug!("discarding stale login response");
            return Ok(Completion::Stale);
        }

        let response = response.inspect_err(|e| tracing::warn!(error = %e, "login failed"))?;

        let session = Self::authenticated_session(response)
            .inspect_err(|e| tracing::warn!(error = %e, "login response unusable"))?;
        self.commit(generation, session)
    }

    /// Log out locally, then tell the backend.
    ///
    /// Always lands on the login page; the remote call is bounded by the
    /// configured timeout and its failure is only logged.
    pub async fn logout(&self) -> Landing {
        self.store.begin_operation();
        let token = self.store.snapshot().token;
        let session_id = self.store.session_id();

        self.store.clear();
        tracing::info!(session_id = ?session_id, "session cleared");

        if let Some(token) = token {
            if let Err(err) = self.bounded(self.api.logout(&token)).await {
                tracing::warn!(error = %err, "remote logout failed; local session already cleared");
            }
        }

        Landing::to(paths::LOGIN)
    }

    /// Rotate the bearer token. Any failure logs the session out.
    pub async fn refresh(&self) -> Result<Completion<()>, AuthError> {
        let generation = self.store.generation();
        let Some(token) = self.store.snapshot().token else {
            return Err(AuthError::NotAuthenticated);
        };

        let rotated = self
            .bounded(self.api.refresh(&token))
            .await
            .and_then(|response| {
                let token = response
                    .token
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(ApiError::MissingToken)?;
                Ok((token, response.user))
            });

        let (token, user) = match rotated {
            Ok(rotated) => rotated,
            Err(err) => {
                if !self.store.is_current(generation) {
                    return Ok(Completion::Stale);
                }
                tracing::warn!(error = %err, "token refresh failed; logging out");
                self.logout().await;
                return Err(AuthError::SessionExpired(err));
            }
        };

        let applied = self.store.update(generation, |session| {
            session.claims = Claims::from_token(&token);
            if let Some(assigned) = session.claims.assigned_tenant_id.clone() {
                session.assigned_tenant_id = Some(assigned);
            }
            session.token = Some(token);
            if let Some(user) = user {
                session.user = Some(user);
            }
        })?;

        if applied {
            tracing::debug!("token refreshed");
            Ok(Completion::Applied(()))
        } else {
            Ok(Completion::Stale)
        }
    }

    /// Create an account.
    ///
    /// Roles that need a super admin's approval land on the pending page with
    /// the session untouched; self-service accounts that come back with a
    /// token are logged in directly, others are sent to the login page.
    pub async fn register(&self, registration: &Registration) -> Result<Completion<Landing>, AuthError> {
        let generation = self.store.begin_operation();

        let response = self.bounded(self.api.register(registration)).await;

        if !self.store.is_current(generation) {
            tracing::debug!("discarding stale registration response");
            return Ok(Completion::Stale);
        }

        let response =
            response.inspect_err(|e| tracing::warn!(error = %e, "registration failed"))?;

        let requested = Role::resolve(Some(&registration.role));
        let pending = response.requires_approval
            || requested.requires_approval()
            || response.user.as_ref().is_some_and(User::is_pending_approval);

        if pending {
            tracing::info!(role = %requested, "registration awaiting approval");
            return Ok(Completion::Applied(Landing {
                redirect_path: paths::PENDING_APPROVAL.to_string(),
                user: response.user,
            }));
        }

        match (response.token, response.user) {
            (Some(token), Some(user)) if !token.trim().is_empty() => {
                self.commit(generation, Session::authenticated(token, user))
            }
            (_, user) => Ok(Completion::Applied(Landing {
                redirect_path: paths::LOGIN.to_string(),
                user,
            })),
        }
    }

    /// Record the temple the principal picked and return where to go next.
    pub fn select_tenant(&self, tenant_id: TenantId) -> Result<Landing, AuthError> {
        let session = self.store.snapshot();
        if !session.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        let role = session.role();
        self.store.set_tenant(tenant_id.clone(), role.is_tenant_scoped())?;
        tracing::info!(%role, tenant_id = %tenant_id, "tenant selected");

        Ok(Landing {
            redirect_path: tenant_landing_path(role, &tenant_id),
            user: session.user,
        })
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.bounded(self.api.forgot_password(email))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "forgot-password request failed"))?;
        Ok(())
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<(), AuthError> {
        self.bounded(self.api.reset_password(reset))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "password reset failed"))?;
        Ok(())
    }

    /// Send a profile patch and overlay the accepted fields on the stored user.
    pub async fn update_profile(
        &self,
        patch: &Map<String, Value>,
    ) -> Result<Completion<User>, AuthError> {
        let generation = self.store.generation();
        let Some(token) = self.store.snapshot().token else {
            return Err(AuthError::NotAuthenticated);
        };

        let accepted = self.bounded(self.api.update_profile(&token, patch)).await;

        if !self.store.is_current(generation) {
            tracing::debug!("discarding stale profile update");
            return Ok(Completion::Stale);
        }

        let accepted = accepted.inspect_err(|e| tracing::warn!(error = %e, "profile update failed"))?;

        let mut merged = None;
        let applied = self.store.try_update(generation, |session| -> Result<(), AuthError> {
            let user = session.user.as_mut().ok_or(AuthError::NotAuthenticated)?;
            user.merge_profile(&accepted).map_err(|err| {
                tracing::warn!(error = %err, "profile update could not be applied");
                ApiError::InvalidResponse(format!("profile update could not be applied: {err}"))
            })?;
            merged = Some(user.clone());
            Ok(())
        })?;

        match merged {
            Some(user) if applied => Ok(Completion::Applied(user)),
            _ => Ok(Completion::Stale),
        }
    }

    /// Decide a navigation, then remember the entity id of an admitted
    /// entity-scoped route.
    pub fn navigate(&self, nav: &Navigation<'_>, inputs: AdmissionInputs) -> AdmissionDecision {
        let session = self.store.snapshot();
        let decision = self.pipeline.evaluate(&session, nav, inputs);

        if decision.is_admit() && session.is_authenticated() {
            if let Some(entity_id) = nav.entity_id() {
                if session.remembered_entity_id.as_ref() != Some(&entity_id) {
                    if let Err(err) = self.store.remember_entity(entity_id) {
                        tracing::warn!(error = %err, "failed to remember entity id");
                    }
                }
            }
        }

        decision
    }
}
