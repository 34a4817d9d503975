use thiserror::Error;

/// Errors produced by the event schema catalog and value objects.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The event type string is not part of the catalog vocabulary.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// No schema is registered for this type at this version.
    #[error("Unregistered schema version {version} for event type {event_type}")]
    UnregisteredVersion { event_type: String, version: String },

    /// The payload does not match the registered schema.
    #[error("Payload for {event_type} v{version} failed schema check: {reason}")]
    SchemaViolation {
        event_type: String,
        version: String,
        reason: String,
    },

    /// A value object constraint was violated.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
