use async_trait::async_trait;
use event_store::EventRecord;
use thiserror::Error;

/// Errors raised by event handlers.
///
/// Caught per-handler by the bus worker: logged with the originating event
/// ID, counted, and fed to the circuit breaker. Never propagated to the
/// publisher or to other handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler could not process the event.
    #[error("{0}")]
    Failed(String),

    /// The handler panicked while processing the event.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Creates a failure from any displayable reason.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        HandlerError::Failed(reason.to_string())
    }
}

/// A subscriber that reacts to delivered events.
///
/// Delivery is at-least-once: handlers must be idempotent themselves or
/// rely on the idempotency middleware to dedupe by event ID.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used for logging, idempotency, and breaker state.
    fn name(&self) -> &str;

    /// Processes one delivered event.
    async fn handle(&self, event: &EventRecord) -> Result<(), HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_constructor_preserves_reason() {
        let err = HandlerError::failed("smtp timeout");
        assert_eq!(err.to_string(), "smtp timeout");
    }

    #[test]
    fn panicked_display_is_prefixed() {
        let err = HandlerError::Panicked("index out of bounds".to_string());
        assert!(err.to_string().starts_with("handler panicked"));
    }
}
