//! Domain error types.

use registry::{RegistryError, SelectorError};
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the registry store.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The schedule selector was ambiguous or incomplete.
    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),

    /// The request failed validation before reaching the store.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DomainError {
    /// Shorthand for an `InvalidRequest` with the given message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        DomainError::InvalidRequest(msg.into())
    }
}
