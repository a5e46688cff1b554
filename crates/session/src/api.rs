//! Contract with the backend's auth endpoints.
//!
//! The session core never talks HTTP itself; it drives an [`AuthApi`]
//! implementation. Transport concerns (headers, retries, base URLs) belong to
//! the implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use mandir_auth::{RawRole, User};

use crate::error::ApiError;

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login/refresh payload. `token` may be missing on a misbehaving
/// backend; that is reported as [`ApiError::MissingToken`] by the facade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Sign-up form.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub role: RawRole,
    /// Remaining form fields (name, phone, temple details...).
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    /// Backend flag for accounts waiting on a super admin.
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PasswordReset {
    pub token: String,
    pub password: String,
}

impl core::fmt::Debug for PasswordReset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordReset").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError>;

    async fn register(&self, registration: &Registration) -> Result<RegisterResponse, ApiError>;

    async fn refresh(&self, token: &str) -> Result<TokenResponse, ApiError>;

    async fn logout(&self, token: &str) -> Result<(), ApiError>;

    async fn forgot_password(&self, email: &str) -> Result<(), ApiError>;

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), ApiError>;

    /// Returns the fields the backend accepted, to be overlaid on the user.
    async fn update_profile(
        &self,
        token: &str,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ApiError>;
}

/// Ordered list of candidate endpoints; the first success wins.
///
/// A candidate that is unavailable (transport failure, timeout, 404, 5xx) is
/// skipped. Any other answer, including a rejection, is final.
pub struct FallbackAuthApi {
    candidates: Vec<Arc<dyn AuthApi>>,
}

impl FallbackAuthApi {
    pub fn new(candidates: Vec<Arc<dyn AuthApi>>) -> Self {
        Self { candidates }
    }
}

macro_rules! first_success {
    ($self:ident, $op:literal, |$api:ident| $call:expr) => {{
        let mut last = ApiError::NoEndpoint;
        for (index, $api) in $self.candidates.iter().enumerate() {
            match $call.await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_unavailable() => {
                    tracing::warn!(op = $op, candidate = index, error = %err, "auth endpoint unavailable; trying next");
                    last = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }};
}

#[async_trait]
impl AuthApi for FallbackAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        first_success!(self, "login", |api| api.login(credentials))
    }

    async fn register(&self, registration: &Registration) -> Result<RegisterResponse, ApiError> {
        first_success!(self, "register", |api| api.register(registration))
    }

    async fn refresh(&self, token: &str) -> Result<TokenResponse, ApiError> {
        first_success!(self, "refresh", |api| api.refresh(token))
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        first_success!(self, "logout", |api| api.logout(token))
    }

    async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        first_success!(self, "forgot_password", |api| api.forgot_password(email))
    }

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), ApiError> {
        first_success!(self, "reset_password", |api| api.reset_password(reset))
    }

    async fn update_profile(
        &self,
        token: &str,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ApiError> {
        first_success!(self, "update_profile", |api| api.update_profile(token, patch))
    }
}
