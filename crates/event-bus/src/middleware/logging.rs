//! Structured logging for every publish and dispatch.

use async_trait::async_trait;
use event_store::EventRecord;

use crate::error::Result;
use crate::handler::HandlerError;
use crate::middleware::{DispatchDecision, Middleware};

/// Records every publish attempt and every dispatch outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Creates the logging middleware.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn on_publish(&self, event: &EventRecord) -> Result<()> {
        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            "publishing event"
        );
        Ok(())
    }

    async fn before_dispatch(&self, handler: &str, event: &EventRecord) -> DispatchDecision {
        tracing::debug!(
            handler,
            event_id = %event.event_id,
            event_type = %event.event_type,
            "dispatching event"
        );
        DispatchDecision::Deliver
    }

    async fn after_dispatch(
        &self,
        handler: &str,
        event: &EventRecord,
        outcome: std::result::Result<(), &HandlerError>,
    ) {
        match outcome {
            Ok(()) => tracing::debug!(
                handler,
                event_id = %event.event_id,
                "event handled"
            ),
            Err(error) => tracing::warn!(
                handler,
                event_id = %event.event_id,
                %error,
                "event handler failed"
            ),
        }
    }
}
