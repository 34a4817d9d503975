//! Step contract, accumulated context, and retry policy.

use std::time::Duration;

use async_trait::async_trait;
use domain::DomainPayload;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// A step's forward or compensating action failed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StepError {
    message: String,
}

impl StepError {
    /// Creates a step error from any displayable reason.
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Context accumulated across a saga's steps.
///
/// Starts from the caller's initial input; each completed step merges its
/// outcome entries in, and later steps (and compensations) read them back.
#[derive(Debug, Clone, Default)]
pub struct SagaContext {
    data: serde_json::Map<String, serde_json::Value>,
}

impl SagaContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from caller input. Accepts a JSON object or null.
    pub fn from_value(value: serde_json::Value) -> Result<Self, crate::error::SagaError> {
        match value {
            serde_json::Value::Null => Ok(Self::new()),
            serde_json::Value::Object(data) => Ok(Self { data }),
            other => Err(crate::error::SagaError::InvalidContext(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Reads a required typed entry.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, StepError> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| StepError::new(format!("missing context entry '{key}'")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| StepError::new(format!("context entry '{key}': {e}")))
    }

    /// Reads an optional typed entry.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StepError> {
        match self.data.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StepError::new(format!("context entry '{key}': {e}"))),
        }
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Merges a set of entries in; later values win.
    pub fn merge(&mut self, entries: serde_json::Map<String, serde_json::Value>) {
        for (key, value) in entries {
            self.data.insert(key, value);
        }
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.data
    }

    /// Clones the context into a plain map for persistence.
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.data.clone()
    }
}

/// What a successful forward action hands back to the orchestrator.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Entries merged into the saga context for later steps.
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Domain event published for this step's effect, if any.
    pub event: Option<DomainPayload>,
}

impl StepOutcome {
    /// Creates an empty outcome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a context entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Sets the domain event published for this step.
    pub fn with_event(mut self, event: DomainPayload) -> Self {
        self.event = Some(event);
        self
    }
}

/// One step of a saga definition.
///
/// `execute` runs with the accumulated context; `compensate` must
/// semantically reverse a previously successful `execute` and is only
/// invoked for steps that completed.
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Stable step name recorded in step rows and logs.
    fn name(&self) -> &'static str;

    /// Runs the forward action.
    async fn execute(&self, ctx: &SagaContext) -> Result<StepOutcome, StepError>;

    /// Reverses a completed forward action. Default: nothing to undo.
    async fn compensate(&self, _ctx: &SagaContext) -> Result<(), StepError> {
        Ok(())
    }

    /// Whether this step registers a compensating action.
    fn has_compensation(&self) -> bool {
        true
    }
}

/// Retry configuration for forward and compensating actions.
///
/// Delays grow exponentially from `base_delay` by `backoff_multiplier`,
/// capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before an action is declared failed (minimum 1).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the delay before the next attempt, given how many attempts
    /// have already failed (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        let factor = self.backoff_multiplier.powi(exponent as i32);
        let delay = self.base_delay.mul_f64(factor.max(0.0));
        delay.min(self.max_delay)
    }
}
