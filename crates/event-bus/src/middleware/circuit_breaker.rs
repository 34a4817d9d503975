//! Per-handler circuit breaker.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use event_store::EventRecord;
use tokio::time::Instant;

use crate::handler::HandlerError;
use crate::middleware::{DispatchDecision, Middleware, SkipReason};

/// Configuration for the circuit breaker middleware.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures within the window before the circuit opens.
    pub failure_threshold: u32,
    /// Failures further apart than this do not accumulate.
    pub failure_window: Duration,
    /// How long an open circuit withholds deliveries before a trial.
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cool_down: Duration::from_secs(30),
        }
    }
}

/// Observable circuit state for one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Deliveries flow normally.
    Closed,
    /// Deliveries are withheld until the cool-down elapses.
    Open,
    /// One trial delivery is in flight; its outcome decides the state.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug)]
enum Breaker {
    Closed {
        consecutive_failures: u32,
        last_failure_at: Option<Instant>,
    },
    Open {
        opened_at: Instant,
    },
    HalfOpen,
}

impl Default for Breaker {
    fn default() -> Self {
        Breaker::Closed {
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// Suspends dispatch to a handler that keeps failing.
///
/// Persistent failure is surfaced through this state rather than raised to
/// anyone: callers inspect [`CircuitBreakerMiddleware::state`] or watch the
/// logs. Uses the tokio clock, so tests can pause and advance time.
pub struct CircuitBreakerMiddleware {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Breaker>>,
}

impl CircuitBreakerMiddleware {
    /// Creates a circuit breaker middleware with the given config.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current circuit state for a handler.
    pub fn state(&self, handler: &str) -> CircuitState {
        let breakers = self.breakers.lock().expect("breaker lock poisoned");
        match breakers.get(handler) {
            None | Some(Breaker::Closed { .. }) => CircuitState::Closed,
            Some(Breaker::Open { .. }) => CircuitState::Open,
            Some(Breaker::HalfOpen) => CircuitState::HalfOpen,
        }
    }
}

impl Default for CircuitBreakerMiddleware {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[async_trait]
impl Middleware for CircuitBreakerMiddleware {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    async fn before_dispatch(&self, handler: &str, event: &EventRecord) -> DispatchDecision {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        let breaker = breakers.entry(handler.to_string()).or_default();

        match breaker {
            Breaker::Closed { .. } => DispatchDecision::Deliver,
            Breaker::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.cool_down {
                    // Cool-down elapsed: let exactly one trial through.
                    *breaker = Breaker::HalfOpen;
                    tracing::info!(handler, event_id = %event.event_id, "circuit half-open, trial delivery");
                    DispatchDecision::Deliver
                } else {
                    DispatchDecision::Skip(SkipReason::CircuitOpen)
                }
            }
            Breaker::HalfOpen => DispatchDecision::Skip(SkipReason::CircuitOpen),
        }
    }

    async fn after_dispatch(
        &self,
        handler: &str,
        event: &EventRecord,
        outcome: std::result::Result<(), &HandlerError>,
    ) {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        let breaker = breakers.entry(handler.to_string()).or_default();

        match outcome {
            Ok(()) => {
                if matches!(breaker, Breaker::HalfOpen) {
                    tracing::info!(handler, "circuit closed after successful trial");
                }
                *breaker = Breaker::default();
            }
            Err(_) => match breaker {
                Breaker::Closed {
                    consecutive_failures,
                    last_failure_at,
                } => {
                    let now = Instant::now();
                    let within_window = last_failure_at
                        .is_some_and(|at| now.duration_since(at) <= self.config.failure_window);
                    let failures = if within_window {
                        *consecutive_failures + 1
                    } else {
                        1
                    };

                    if failures >= self.config.failure_threshold {
                        tracing::warn!(
                            handler,
                            event_id = %event.event_id,
                            failures,
                            "circuit opened"
                        );
                        metrics::counter!("circuit_breaker_opened_total").increment(1);
                        *breaker = Breaker::Open { opened_at: now };
                    } else {
                        *breaker = Breaker::Closed {
                            consecutive_failures: failures,
                            last_failure_at: Some(now),
                        };
                    }
                }
                Breaker::HalfOpen => {
                    tracing::warn!(handler, event_id = %event.event_id, "trial failed, circuit re-opened");
                    metrics::counter!("circuit_breaker_opened_total").increment(1);
                    *breaker = Breaker::Open {
                        opened_at: Instant::now(),
                    };
                }
                Breaker::Open { .. } => {}
            },
        }
    }
}
