//! `mandir-core`: shared identifiers and value errors.
//!
//! This crate contains **pure** primitives (no IO, no transport concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{EntityId, TenantId, UserId};
