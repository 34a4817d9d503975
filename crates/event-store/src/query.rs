use chrono::{DateTime, Utc};

use crate::{AggregateId, CorrelationId};

/// Builder for constructing event queries.
///
/// Results are always ordered by timestamp ascending (event ID as a
/// tiebreak), so a query can be re-run from the top at any time.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<String>>,

    /// Filter by aggregate ID.
    pub aggregate_id: Option<AggregateId>,

    /// Filter by correlation ID.
    pub correlation_id: Option<CorrelationId>,

    /// Filter by events at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by events at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,

    /// Number of events to skip.
    pub offset: Option<usize>,
}

impl EventQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for events of a specific type.
    pub fn for_event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    /// Creates a query for a specific aggregate.
    pub fn for_aggregate(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    /// Creates a query for all events sharing a correlation ID.
    pub fn for_correlation(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            ..Default::default()
        }
    }

    /// Filters by event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    /// Filters by multiple event types (any of these).
    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Filters by aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Filters by correlation ID.
    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Filters to events at or after this timestamp.
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filters to events at or before this timestamp.
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Limits the number of events returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many events before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_for_event_type() {
        let query = EventQuery::for_event_type("campaign.created");

        assert!(query.aggregate_id.is_none());
        assert_eq!(
            query.event_types,
            Some(vec!["campaign.created".to_string()])
        );
    }

    #[test]
    fn query_for_correlation() {
        let id = CorrelationId::new();
        let query = EventQuery::for_correlation(id);

        assert_eq!(query.correlation_id, Some(id));
        assert!(query.event_types.is_none());
    }

    #[test]
    fn query_builder_chain() {
        let id = AggregateId::new();
        let query = EventQuery::new()
            .aggregate_id(id)
            .event_type("donation.completed")
            .limit(100)
            .offset(10);

        assert_eq!(query.aggregate_id, Some(id));
        assert_eq!(
            query.event_types,
            Some(vec!["donation.completed".to_string()])
        );
        assert_eq!(query.limit, Some(100));
        assert_eq!(query.offset, Some(10));
    }
}
