use thiserror::Error;

/// Errors surfaced synchronously to publishers.
///
/// Handler failures are deliberately absent: they are absorbed per-handler
/// and observed through logs and circuit-breaker state, never raised to
/// the publisher.
#[derive(Debug, Error)]
pub enum BusError {
    /// The event failed schema validation and was not stored.
    #[error("Event rejected by validation: {0}")]
    Validation(#[from] domain::DomainError),

    /// The durable append failed; no subscriber was notified.
    #[error("Event store error: {0}")]
    Store(#[from] event_store::EventStoreError),

    /// A serialization error occurred while preparing the event.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
