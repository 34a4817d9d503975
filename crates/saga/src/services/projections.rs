//! Seeding of derived read-model rows during campaign creation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::Money;

use crate::services::ServiceError;

/// Trait for initializing and removing projection rows for a campaign.
///
/// The read models themselves stay pure functions of the event stream;
/// this service only seeds the initial row so the campaign page renders
/// before the first donation arrives, and deletes it on rollback.
#[async_trait]
pub trait ProjectionInitializer: Send + Sync {
    /// Seeds the read-model row for a new campaign.
    async fn seed_campaign(
        &self,
        campaign_id: AggregateId,
        owner_id: AggregateId,
        title: &str,
        goal: Money,
    ) -> Result<(), ServiceError>;

    /// Removes a previously seeded row.
    async fn remove_campaign(&self, campaign_id: AggregateId) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemorySeedState {
    seeded: HashMap<AggregateId, (AggregateId, String, Money)>,
    fail_on_seed: bool,
}

/// In-memory projection initializer for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectionInitializer {
    state: Arc<RwLock<InMemorySeedState>>,
}

impl InMemoryProjectionInitializer {
    /// Creates a new empty initializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the initializer to fail on the next seed call.
    pub fn set_fail_on_seed(&self, fail: bool) {
        self.state.write().unwrap().fail_on_seed = fail;
    }

    /// Returns the number of seeded campaigns.
    pub fn seeded_count(&self) -> usize {
        self.state.read().unwrap().seeded.len()
    }

    /// Returns true if a campaign row has been seeded.
    pub fn has_campaign(&self, campaign_id: AggregateId) -> bool {
        self.state.read().unwrap().seeded.contains_key(&campaign_id)
    }
}

#[async_trait]
impl ProjectionInitializer for InMemoryProjectionInitializer {
    async fn seed_campaign(
        &self,
        campaign_id: AggregateId,
        owner_id: AggregateId,
        title: &str,
        goal: Money,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_seed {
            return Err(ServiceError::new("projection store unavailable"));
        }

        state
            .seeded
            .insert(campaign_id, (owner_id, title.to_string(), goal));
        Ok(())
    }

    async fn remove_campaign(&self, campaign_id: AggregateId) -> Result<(), ServiceError> {
        self.state.write().unwrap().seeded.remove(&campaign_id);
        Ok(())
    }
}
