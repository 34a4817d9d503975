use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, CorrelationId, EventQuery, EventRecord, EventStoreError, Result};

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventRecord>> + Send>>;

/// Core trait for event store implementations.
///
/// The store is append-only: rows are never edited or deleted, which is
/// what allows any projection to be rebuilt from scratch by replay. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a single event to the store.
    ///
    /// Appends are idempotent on event ID: returns `true` if the record was
    /// newly stored, `false` if a record with the same ID already existed
    /// (the existing record is left untouched).
    async fn append(&self, record: EventRecord) -> Result<bool>;

    /// Appends a batch of events, skipping any whose ID is already stored.
    ///
    /// Returns the number of records actually appended.
    async fn append_batch(&self, records: Vec<EventRecord>) -> Result<usize>;

    /// Retrieves events matching a query, ordered by timestamp ascending.
    async fn query(&self, query: EventQuery) -> Result<Vec<EventRecord>>;

    /// Retrieves all events for a specific aggregate, oldest first.
    async fn events_for_aggregate(&self, aggregate_id: AggregateId) -> Result<Vec<EventRecord>>;

    /// Retrieves all events of a given type, oldest first.
    async fn events_by_type(&self, event_type: &str) -> Result<Vec<EventRecord>>;

    /// Retrieves all events sharing a correlation ID, oldest first.
    async fn events_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<EventRecord>>;

    /// Streams every event in the store, ordered by timestamp ascending.
    async fn stream_all(&self) -> Result<EventStream>;

    /// Returns the total number of events stored.
    async fn event_count(&self) -> Result<u64>;
}

/// Validates a batch before appending.
pub(crate) fn validate_for_append(records: &[EventRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(EventStoreError::InvalidRecord(
            "cannot append an empty batch".to_string(),
        ));
    }
    for record in records {
        if record.event_type.is_empty() {
            return Err(EventStoreError::InvalidRecord(format!(
                "event {} has an empty event type",
                record.event_id
            )));
        }
        if record.schema_version.is_empty() {
            return Err(EventStoreError::InvalidRecord(format!(
                "event {} has an empty schema version",
                record.event_id
            )));
        }
    }
    Ok(())
}
