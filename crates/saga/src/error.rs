//! Saga error types.

use thiserror::Error;

use crate::instance::SagaId;

/// Errors surfaced by the saga orchestrator and stores.
///
/// Step and compensation failures are not errors at this level: they are
/// absorbed into persisted saga state (`Failed`, step statuses, error
/// messages) and observed by reading that state back.
#[derive(Debug, Error)]
pub enum SagaError {
    /// No saga definition is registered under this type.
    #[error("Unknown saga type: {0}")]
    UnknownSagaType(String),

    /// The initial context is not a JSON object.
    #[error("Invalid saga context: {0}")]
    InvalidContext(String),

    /// The saga instance does not exist.
    #[error("Saga not found: {0}")]
    NotFound(SagaId),

    /// Saga or step state could not be persisted.
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Publishing a step event failed.
    #[error("Event bus error: {0}")]
    Bus(#[from] event_bus::BusError),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
