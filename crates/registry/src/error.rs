use thiserror::Error;

use common::ScheduleId;

/// Errors that can occur when interacting with the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The referenced row does not exist, or does not match the caller's
    /// ownership/approval filters.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Remaining capacity was zero at the time of the locked read.
    #[error("no capacity left on schedule {schedule_id}")]
    SlotExhausted { schedule_id: ScheduleId },

    /// The row is not in a state that allows the attempted transition.
    #[error("cannot {operation} while {current}")]
    InvalidState {
        operation: &'static str,
        current: String,
    },

    /// The transactional lock could not be acquired before the store's
    /// configured timeout. The transaction left no partial state, so this
    /// is the only kind a caller may safely retry.
    #[error("lock acquisition timed out")]
    OperationTimeout,

    /// A uniqueness invariant was violated at commit time. Surfaced as a
    /// conflict rather than silently retried.
    #[error("constraint violated: {constraint}")]
    ConstraintViolation { constraint: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl RegistryError {
    /// Shorthand for a `NotFound` with the given entity label.
    pub fn not_found(entity: &'static str) -> Self {
        RegistryError::NotFound { entity }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
