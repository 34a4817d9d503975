//! Core projection trait and position tracking.

use async_trait::async_trait;
use common::AggregateId;
use domain::EventType;
use event_store::EventRecord;

use crate::Result;

/// Tracks how many events a projection has processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Number of events processed by this projection.
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self {
            events_processed: 0,
        }
    }

    /// Advances the position by one event.
    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// A projection that processes events into a read model.
///
/// Implementations must be pure over the event history: the rows they
/// hold are a function of the events applied, never written directly by
/// command handlers, and can be rebuilt from scratch at any time.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// The event types this projection reacts to.
    ///
    /// Used by the bus adapter to subscribe; events of other types still
    /// pass through `handle` during catch-up and must be ignored there.
    fn interests(&self) -> &'static [EventType];

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &EventRecord) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;

    /// Drops the derived rows for one aggregate, ahead of a replay.
    async fn reset_aggregate(&self, aggregate_id: AggregateId) -> Result<()>;
}
