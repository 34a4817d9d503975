//! Schema catalog: `(event type, version)` to payload validator.

use std::collections::HashMap;

use event_store::EventRecord;

use crate::error::{DomainError, Result};
use crate::event_type::EventType;
use crate::payloads::*;

/// The schema version every catalog type is currently published at.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

type PayloadCheck = fn(&serde_json::Value) -> std::result::Result<(), serde_json::Error>;

fn check<T: serde::de::DeserializeOwned>(
    payload: &serde_json::Value,
) -> std::result::Result<(), serde_json::Error> {
    serde_json::from_value::<T>(payload.clone()).map(|_| ())
}

/// Registry of payload schemas keyed by `(event type, version)`.
///
/// Publish-time validation looks the pair up here; an event whose type is
/// outside the vocabulary, whose version is unregistered, or whose payload
/// fails the shape check is rejected before it is stored.
pub struct SchemaCatalog {
    checks: HashMap<(EventType, String), PayloadCheck>,
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// Creates the standard catalog with the current version of every type.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.register(
            EventType::UserRegistered,
            CURRENT_SCHEMA_VERSION,
            check::<UserRegisteredPayload>,
        );
        catalog.register(
            EventType::UserRolePromoted,
            CURRENT_SCHEMA_VERSION,
            check::<UserRolePromotedPayload>,
        );
        catalog.register(
            EventType::UserRoleReverted,
            CURRENT_SCHEMA_VERSION,
            check::<UserRoleRevertedPayload>,
        );
        catalog.register(
            EventType::UserProfileUpdated,
            CURRENT_SCHEMA_VERSION,
            check::<UserProfileUpdatedPayload>,
        );
        catalog.register(
            EventType::CampaignCreated,
            CURRENT_SCHEMA_VERSION,
            check::<CampaignCreatedPayload>,
        );
        catalog.register(
            EventType::CampaignPublished,
            CURRENT_SCHEMA_VERSION,
            check::<CampaignPublishedPayload>,
        );
        catalog.register(
            EventType::CampaignSoftDeleted,
            CURRENT_SCHEMA_VERSION,
            check::<CampaignSoftDeletedPayload>,
        );
        catalog.register(
            EventType::CampaignGoalUpdated,
            CURRENT_SCHEMA_VERSION,
            check::<CampaignGoalUpdatedPayload>,
        );
        catalog.register(
            EventType::DonationCompleted,
            CURRENT_SCHEMA_VERSION,
            check::<DonationCompletedPayload>,
        );
        catalog.register(
            EventType::DonationRefunded,
            CURRENT_SCHEMA_VERSION,
            check::<DonationRefundedPayload>,
        );
        catalog.register(
            EventType::OrganizationCreated,
            CURRENT_SCHEMA_VERSION,
            check::<OrganizationCreatedPayload>,
        );
        catalog.register(
            EventType::OrganizationMemberAdded,
            CURRENT_SCHEMA_VERSION,
            check::<OrganizationMemberAddedPayload>,
        );
        catalog.register(
            EventType::AdminActionLogged,
            CURRENT_SCHEMA_VERSION,
            check::<AdminActionLoggedPayload>,
        );
        catalog.register(
            EventType::AdminCampaignFlagged,
            CURRENT_SCHEMA_VERSION,
            check::<AdminCampaignFlaggedPayload>,
        );
        catalog
    }

    /// Registers a payload check for a type at a version.
    ///
    /// Registering a new version alongside an old one is how schemas evolve
    /// backward-compatibly: both versions stay valid for replay.
    pub fn register(&mut self, event_type: EventType, version: impl Into<String>, f: PayloadCheck) {
        self.checks.insert((event_type, version.into()), f);
    }

    /// Returns true if the catalog has a schema for this pair.
    pub fn contains(&self, event_type: EventType, version: &str) -> bool {
        self.checks.contains_key(&(event_type, version.to_string()))
    }

    /// Validates a payload against the registered schema.
    pub fn validate(
        &self,
        event_type: EventType,
        version: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let Some(f) = self.checks.get(&(event_type, version.to_string())) else {
            return Err(DomainError::UnregisteredVersion {
                event_type: event_type.name().to_string(),
                version: version.to_string(),
            });
        };
        f(payload).map_err(|e| DomainError::SchemaViolation {
            event_type: event_type.name().to_string(),
            version: version.to_string(),
            reason: e.to_string(),
        })
    }

    /// Validates a full event record: type is in the vocabulary, version is
    /// registered, payload matches the schema.
    pub fn validate_record(&self, record: &EventRecord) -> Result<()> {
        let event_type = EventType::parse(&record.event_type)?;
        self.validate(event_type, &record.schema_version, &record.payload)
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
