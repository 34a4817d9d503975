//! Cross-cutting behaviors composed around publish and dispatch.
//!
//! Middleware run as an ordered pipeline. On the publish path every
//! middleware sees the event before the store append; the first error
//! aborts the publish. On the dispatch path each middleware may veto a
//! delivery (`before_dispatch`) and observe its outcome
//! (`after_dispatch`). `after_dispatch` runs only for deliveries that
//! actually reached the handler.

pub mod circuit_breaker;
pub mod idempotency;
pub mod logging;
pub mod validation;

use async_trait::async_trait;
use event_store::EventRecord;

use crate::error::Result;
use crate::handler::HandlerError;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerMiddleware, CircuitState};
pub use idempotency::{IdempotencyConfig, IdempotencyMiddleware};
pub use logging::LoggingMiddleware;
pub use validation::ValidationMiddleware;

/// Why a delivery was withheld from a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The handler already processed this event ID successfully.
    DuplicateDelivery,
    /// The handler's circuit is open.
    CircuitOpen,
}

impl SkipReason {
    /// Returns a short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::DuplicateDelivery => "duplicate_delivery",
            SkipReason::CircuitOpen => "circuit_open",
        }
    }
}

/// Verdict of the dispatch-path pipeline for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Invoke the handler.
    Deliver,
    /// Withhold the delivery; the handler is not invoked.
    Skip(SkipReason),
}

/// One stage of the bus pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Publish path: runs before the store append. An error aborts the
    /// publish and surfaces synchronously to the caller.
    async fn on_publish(&self, _event: &EventRecord) -> Result<()> {
        Ok(())
    }

    /// Dispatch path: runs before a handler invocation. The first `Skip`
    /// in the pipeline wins.
    async fn before_dispatch(&self, _handler: &str, _event: &EventRecord) -> DispatchDecision {
        DispatchDecision::Deliver
    }

    /// Dispatch path: observes the outcome of a handler invocation.
    async fn after_dispatch(
        &self,
        _handler: &str,
        _event: &EventRecord,
        _outcome: std::result::Result<(), &HandlerError>,
    ) {
    }
}
