//! Publish/subscribe event bus for the FundlyHub event core.
//!
//! The bus routes published events to handlers registered by event type.
//! Publishing appends to the event store before any subscriber sees the
//! event; if the append fails, nothing is delivered. Each subscriber owns
//! a FIFO delivery queue, so a handler observes events of one type in
//! publish order and a failing handler never blocks the others.
//!
//! Cross-cutting behavior lives in an ordered [`Middleware`] pipeline:
//! logging, schema validation at publish time, idempotent dispatch keyed
//! by event ID, and a per-handler circuit breaker.
//!
//! There is no global bus. Construct one at startup and share it by
//! reference; tests build a fresh bus per case.

pub mod bus;
pub mod error;
pub mod handler;
pub mod middleware;

pub use bus::{EventBus, Subscription};
pub use error::BusError;
pub use handler::{EventHandler, HandlerError};
pub use middleware::{
    CircuitBreakerConfig, CircuitBreakerMiddleware, CircuitState, DispatchDecision,
    IdempotencyConfig, IdempotencyMiddleware, LoggingMiddleware, Middleware, SkipReason,
    ValidationMiddleware,
};
