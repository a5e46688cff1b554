//! `mandir-auth`: session, role-resolution and route-admission core (pure).
//!
//! This crate is intentionally decoupled from HTTP and storage. Token claims
//! are decoded without signature verification and are advisory only; the
//! backend remains the authority for every request it serves.

pub mod admission;
pub mod claims;
pub mod roles;
pub mod routes;
pub mod session;
pub mod tenant;
pub mod user;

pub use admission::{AdmissionDecision, AdmissionInputs, AdmissionPipeline, Redirect, RedirectReason};
pub use claims::{Claims, TokenCodec, TokenDecodeError};
pub use roles::{RawRole, Role};
pub use routes::{Navigation, RouteConfig, RouteDescriptor, paths};
pub use session::Session;
pub use tenant::{TenantSelectionState, dashboard_path, needs_tenant_selection, tenant_landing_path};
pub use user::User;
