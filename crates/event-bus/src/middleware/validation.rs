//! Publish-time schema validation.

use std::sync::Arc;

use async_trait::async_trait;
use domain::SchemaCatalog;
use event_store::EventRecord;

use crate::error::Result;
use crate::middleware::Middleware;

/// Rejects publishes whose payload fails the schema check for the event's
/// `(type, version)` pair. Runs before the store append, so a rejected
/// event is never stored and the error surfaces to the caller.
pub struct ValidationMiddleware {
    catalog: Arc<SchemaCatalog>,
}

impl ValidationMiddleware {
    /// Creates a validation middleware over the given catalog.
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    /// Creates a validation middleware over the standard catalog.
    pub fn standard() -> Self {
        Self::new(Arc::new(SchemaCatalog::standard()))
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn on_publish(&self, event: &EventRecord) -> Result<()> {
        self.catalog.validate_record(event)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::CURRENT_SCHEMA_VERSION;

    use crate::error::BusError;

    fn record(event_type: &str, payload: serde_json::Value) -> EventRecord {
        EventRecord::builder()
            .event_type(event_type)
            .aggregate_id(AggregateId::new())
            .schema_version(CURRENT_SCHEMA_VERSION)
            .payload_raw(payload)
            .build()
    }

    #[tokio::test]
    async fn rejects_unknown_type() {
        let mw = ValidationMiddleware::standard();
        let event = record("campaign.rocket_launched", serde_json::json!({}));

        let result = mw.on_publish(&event).await;
        assert!(matches!(result, Err(BusError::Validation(_))));
    }

    #[tokio::test]
    async fn rejects_malformed_payload() {
        let mw = ValidationMiddleware::standard();
        let event = record("donation.completed", serde_json::json!({"amount": true}));

        let result = mw.on_publish(&event).await;
        assert!(matches!(result, Err(BusError::Validation(_))));
    }

    #[tokio::test]
    async fn accepts_well_formed_payload() {
        let mw = ValidationMiddleware::standard();
        let payload = domain::DomainPayload::UserRegistered(domain::UserRegisteredPayload {
            user_id: AggregateId::new(),
            email: "donor@example.org".to_string(),
            display_name: "Donor".to_string(),
        });
        let event = payload.into_record().unwrap();

        assert!(mw.on_publish(&event).await.is_ok());
    }
}
