//! Session lifecycle for mandir clients.
//!
//! - [`SessionStore`]: the one authoritative session (memory + persisted copy)
//! - [`AuthFacade`]: login, logout, refresh, registration and tenant selection
//! - [`AuthApi`]: the backend contract the facade drives
//!
//! A client builds one store and one facade at start-up and shares them:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use mandir_session::{AuthFacade, ClientConfig, FallbackAuthApi};
//! let config = ClientConfig::from_env();
//! mandir_observability::init_with(config.log_format);
//! let facade = AuthFacade::from_config(&config, Arc::new(FallbackAuthApi::new(Vec::new())));
//! let landing = facade.dashboard_path();
//! # let _ = landing;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod facade;
#[cfg(feature = "http")]
pub mod http;
pub mod storage;
pub mod store;

pub use api::{
    AuthApi, Credentials, FallbackAuthApi, PasswordReset, RegisterResponse, Registration,
    TokenResponse,
};
pub use config::ClientConfig;
pub use error::{ApiError, AuthError, StorageError};
pub use facade::{AuthFacade, Completion, Landing};
#[cfg(feature = "http")]
pub use http::HttpAuthApi;
pub use storage::{FileStore, KeyValueStore, MemoryStore, keys};
pub use store::{Generation, RequestCredentials, SessionStore};
