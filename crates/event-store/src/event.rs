use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, CorrelationId};

/// Unique identifier for an event.
///
/// Also serves as the idempotency key: the store skips appends of an ID it
/// has already seen, and the bus middleware uses it to deduplicate handler
/// invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EventId> for Uuid {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// An immutable record of a domain occurrence.
///
/// Once published, none of these fields ever change; corrections are
/// modeled as new events. The payload shape is governed by the schema
/// catalog entry for `(event_type, schema_version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Dotted domain type string (e.g. "campaign.created").
    pub event_type: String,

    /// The aggregate this event concerns (campaign, user, organization).
    pub aggregate_id: AggregateId,

    /// Semantic version of the payload schema.
    pub schema_version: String,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    /// Links events belonging to one logical operation.
    pub correlation_id: Option<CorrelationId>,

    /// The event that caused this one, forming a causal chain.
    pub causation_id: Option<EventId>,

    /// Open key-value bag: actor, source, trace info.
    pub metadata: HashMap<String, serde_json::Value>,

    /// Domain-specific payload as JSON.
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Creates a new event record builder.
    pub fn builder() -> EventRecordBuilder {
        EventRecordBuilder::default()
    }
}

/// Builder for constructing event records.
#[derive(Debug, Default)]
pub struct EventRecordBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    schema_version: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    correlation_id: Option<CorrelationId>,
    causation_id: Option<EventId>,
    metadata: HashMap<String, serde_json::Value>,
    payload: Option<serde_json::Value>,
}

impl EventRecordBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the payload schema version.
    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the correlation ID.
    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Sets the causation ID.
    pub fn causation_id(mut self, id: EventId) -> Self {
        self.causation_id = Some(id);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the event record.
    ///
    /// # Panics
    ///
    /// Panics if required fields (event_type, aggregate_id, schema_version,
    /// payload) are not set.
    pub fn build(self) -> EventRecord {
        EventRecord {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.expect("event_type is required"),
            aggregate_id: self.aggregate_id.expect("aggregate_id is required"),
            schema_version: self.schema_version.expect("schema_version is required"),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            metadata: self.metadata,
            payload: self.payload.expect("payload is required"),
        }
    }

    /// Tries to build the event record, returning None if required fields are missing.
    pub fn try_build(self) -> Option<EventRecord> {
        Some(EventRecord {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type?,
            aggregate_id: self.aggregate_id?,
            schema_version: self.schema_version?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            metadata: self.metadata,
            payload: self.payload?,
        })
    }
}
