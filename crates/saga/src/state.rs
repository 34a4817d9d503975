//! Saga and step state machines.

use serde::{Deserialize, Serialize};

/// The state of a saga instance in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed
///           └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    /// Steps are being executed.
    #[default]
    Pending,

    /// A step failed and compensating actions are in progress.
    Compensating,

    /// All steps completed successfully (terminal state).
    Completed,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl SagaStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Pending => "pending",
            SagaStatus::Compensating => "compensating",
            SagaStatus::Completed => "completed",
            SagaStatus::Failed => "failed",
        }
    }

    /// Parses a status name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SagaStatus::Pending),
            "compensating" => Some(SagaStatus::Compensating),
            "completed" => Some(SagaStatus::Completed),
            "failed" => Some(SagaStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of one step within a saga instance.
///
/// A step's compensation is only invoked if the step was `Completed` when
/// a later step failed; it then moves to `Compensated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step has been scheduled but has not finished.
    #[default]
    Pending,

    /// The forward action succeeded.
    Completed,

    /// The forward action failed after exhausting retries.
    Failed,

    /// The compensating action ran after a later step failed.
    Compensated,
}

impl StepStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Compensated => "compensated",
        }
    }

    /// Parses a status name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(StepStatus::Pending),
            "completed" => Some(StepStatus::Completed),
            "failed" => Some(StepStatus::Failed),
            "compensated" => Some(StepStatus::Compensated),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(SagaStatus::default(), SagaStatus::Pending);
        assert_eq!(StepStatus::default(), StepStatus::Pending);
    }

    #[test]
    fn terminal_states() {
        assert!(!SagaStatus::Pending.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            SagaStatus::Pending,
            SagaStatus::Compensating,
            SagaStatus::Completed,
            SagaStatus::Failed,
        ] {
            assert_eq!(SagaStatus::parse(status.as_str()), Some(status));
        }
        for status in [
            StepStatus::Pending,
            StepStatus::Completed,
            StepStatus::Failed,
            StepStatus::Compensated,
        ] {
            assert_eq!(StepStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(SagaStatus::parse("running"), None);
        assert_eq!(StepStatus::parse("skipped"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&SagaStatus::Compensating).unwrap();
        assert_eq!(json, "\"compensating\"");
    }
}
