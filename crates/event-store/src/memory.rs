use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, CorrelationId, EventId, EventQuery, EventRecord, Result,
    store::{EventStore, EventStream, validate_for_append},
};

/// In-memory event store implementation.
///
/// Backs the test suites and in-process deployments; provides the same
/// interface and ordering semantics as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventRecord>>>,
    seen: Arc<RwLock<HashSet<EventId>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
        self.seen.write().await.clear();
    }

    fn matches(query: &EventQuery, record: &EventRecord) -> bool {
        if let Some(ref types) = query.event_types
            && !types.contains(&record.event_type)
        {
            return false;
        }
        if let Some(id) = query.aggregate_id
            && record.aggregate_id != id
        {
            return false;
        }
        if let Some(correlation) = query.correlation_id
            && record.correlation_id != Some(correlation)
        {
            return false;
        }
        if let Some(from) = query.from_timestamp
            && record.timestamp < from
        {
            return false;
        }
        if let Some(to) = query.to_timestamp
            && record.timestamp > to
        {
            return false;
        }
        true
    }

    fn sort_by_time(events: &mut [EventRecord]) {
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.event_id.as_uuid().cmp(&b.event_id.as_uuid()))
        });
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, record: EventRecord) -> Result<bool> {
        validate_for_append(std::slice::from_ref(&record))?;

        let mut seen = self.seen.write().await;
        if !seen.insert(record.event_id) {
            return Ok(false);
        }
        self.events.write().await.push(record);
        metrics::counter!("event_store_appends_total").increment(1);
        Ok(true)
    }

    async fn append_batch(&self, records: Vec<EventRecord>) -> Result<usize> {
        validate_for_append(&records)?;

        let mut seen = self.seen.write().await;
        let mut events = self.events.write().await;
        let mut appended = 0;
        for record in records {
            if seen.insert(record.event_id) {
                events.push(record);
                appended += 1;
            }
        }
        metrics::counter!("event_store_appends_total").increment(appended as u64);
        Ok(appended)
    }

    async fn query(&self, query: EventQuery) -> Result<Vec<EventRecord>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| Self::matches(&query, e))
            .cloned()
            .collect();
        Self::sort_by_time(&mut events);

        let offset = query.offset.unwrap_or(0);
        let events: Vec<_> = events.into_iter().skip(offset).collect();

        let events = if let Some(limit) = query.limit {
            events.into_iter().take(limit).collect()
        } else {
            events
        };

        Ok(events)
    }

    async fn events_for_aggregate(&self, aggregate_id: AggregateId) -> Result<Vec<EventRecord>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        Self::sort_by_time(&mut events);
        Ok(events)
    }

    async fn events_by_type(&self, event_type: &str) -> Result<Vec<EventRecord>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect();
        Self::sort_by_time(&mut events);
        Ok(events)
    }

    async fn events_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<EventRecord>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.correlation_id == Some(correlation_id))
            .cloned()
            .collect();
        Self::sort_by_time(&mut events);
        Ok(events)
    }

    async fn stream_all(&self) -> Result<EventStream> {
        use futures_util::stream;

        let store = self.events.read().await;
        let mut events = store.clone();
        Self::sort_by_time(&mut events);

        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn event_count(&self) -> Result<u64> {
        Ok(self.events.read().await.len() as u64)
    }
}
