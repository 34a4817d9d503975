//! Persisted saga and step records.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{SagaStatus, StepStatus};

/// Unique identifier for a saga instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaId(Uuid);

impl SagaId {
    /// Creates a new random saga ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a saga ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SagaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted state of one saga execution.
///
/// Created when a workflow starts and kept for audit regardless of
/// outcome. Written with single-row upserts keyed by `id`; concurrent
/// instances never contend on the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaInstance {
    pub id: SagaId,
    pub saga_type: String,
    /// The entity being built (e.g. the campaign ID).
    pub aggregate_id: AggregateId,
    pub status: SagaStatus,
    /// Index of the step currently (or last) being executed.
    pub current_step: usize,
    /// Context accumulated across completed steps.
    pub data: serde_json::Map<String, serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SagaInstance {
    /// Creates a fresh `Pending` instance.
    pub fn new(
        saga_type: impl Into<String>,
        aggregate_id: AggregateId,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::new(),
            saga_type: saga_type.into(),
            aggregate_id,
            status: SagaStatus::Pending,
            current_step: 0,
            data,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Bumps the updated-at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Marks the instance as compensating.
    pub fn mark_compensating(&mut self) {
        self.status = SagaStatus::Compensating;
        self.touch();
    }

    /// Marks the instance completed.
    pub fn mark_completed(&mut self) {
        self.status = SagaStatus::Completed;
        self.touch();
        self.completed_at = Some(self.updated_at);
    }

    /// Marks the instance failed, carrying the original step error.
    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.status = SagaStatus::Failed;
        self.error_message = Some(error_message.into());
        self.touch();
        self.completed_at = Some(self.updated_at);
    }
}

/// Persisted state of one step within a saga instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: Uuid,
    pub saga_id: SagaId,
    pub step_number: usize,
    pub step_name: String,
    pub status: StepStatus,
    pub attempt_count: u32,
    pub error_message: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub compensated_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    /// Creates a fresh `Pending` step record.
    pub fn new(saga_id: SagaId, step_number: usize, step_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            saga_id,
            step_number,
            step_name: step_name.into(),
            status: StepStatus::Pending,
            attempt_count: 0,
            error_message: None,
            executed_at: None,
            compensated_at: None,
        }
    }

    /// Marks the forward action successful.
    pub fn mark_completed(&mut self, attempts: u32) {
        self.status = StepStatus::Completed;
        self.attempt_count = attempts;
        self.executed_at = Some(Utc::now());
    }

    /// Marks the forward action failed after exhausting retries.
    pub fn mark_failed(&mut self, attempts: u32, error_message: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.attempt_count = attempts;
        self.error_message = Some(error_message.into());
        self.executed_at = Some(Utc::now());
    }

    /// Marks the compensating action done.
    pub fn mark_compensated(&mut self) {
        self.status = StepStatus::Compensated;
        self.compensated_at = Some(Utc::now());
    }
}
