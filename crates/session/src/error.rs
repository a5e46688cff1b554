//! Error model of the session layer.

use std::time::Duration;

use thiserror::Error;

/// Failure of the persisted key-value storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage io error: {0}")]
    Io(String),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by (or while talking to) the backend auth endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Login/refresh succeeded on the wire but carried no token.
    #[error("response did not contain a token")]
    MissingToken,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no auth endpoint configured")]
    NoEndpoint,
}

impl ApiError {
    /// Whether another candidate endpoint may succeed where this one failed.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout(_) | ApiError::NoEndpoint => true,
            ApiError::Rejected { status, .. } => *status == 404 || *status >= 500,
            ApiError::MissingToken | ApiError::InvalidResponse(_) => false,
        }
    }
}

/// Structured error returned by [`crate::AuthFacade`] operations.
///
/// Every variant carries a human-readable message suitable for an inline
/// form error ([`AuthError::user_message`]).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("not authenticated")]
    NotAuthenticated,

    /// Token refresh failed; the session has been logged out.
    #[error("session expired: {0}")]
    SessionExpired(ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Api(err) | AuthError::SessionExpired(err) => match err {
                ApiError::Rejected { status: 401, .. } => {
                    "Invalid email or password.".to_string()
                }
                ApiError::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
                ApiError::Rejected { .. } => "The request was rejected by the server.".to_string(),
                ApiError::Transport(_) | ApiError::NoEndpoint => {
                    "Unable to reach the server. Please check your connection and try again."
                        .to_string()
                }
                ApiError::Timeout(_) => {
                    "The server took too long to respond. Please try again.".to_string()
                }
                ApiError::MissingToken | ApiError::InvalidResponse(_) => {
                    "The server returned an unexpected response. Please try again.".to_string()
                }
            },
            AuthError::NotAuthenticated => "Please log in to continue.".to_string(),
            AuthError::Storage(_) => {
                "Your session could not be saved on this device.".to_string()
            }
        }
    }
}
