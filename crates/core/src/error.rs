//! Errors raised while building core values.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Identifier was empty or whitespace only.
    #[error("{kind} must not be blank")]
    BlankId { kind: &'static str },
}
