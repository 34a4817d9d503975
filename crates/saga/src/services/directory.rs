//! Campaign directory: slug uniqueness and campaign records.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::{Money, Slug};

use crate::services::ServiceError;

/// A campaign row as the directory sees it.
#[derive(Debug, Clone)]
pub struct CampaignRecord {
    pub campaign_id: AggregateId,
    pub owner_id: AggregateId,
    pub slug: Slug,
    pub title: String,
    pub goal: Money,
    pub category: String,
    pub deleted: bool,
}

/// Trait for campaign record operations.
#[async_trait]
pub trait CampaignDirectory: Send + Sync {
    /// Returns true if an active campaign already holds this slug.
    async fn slug_exists(&self, slug: &Slug) -> Result<bool, ServiceError>;

    /// Creates a campaign record.
    async fn create(&self, record: CampaignRecord) -> Result<(), ServiceError>;

    /// Soft-deletes a campaign, freeing its slug.
    async fn soft_delete(&self, campaign_id: AggregateId, reason: &str)
    -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryDirectoryState {
    campaigns: HashMap<AggregateId, CampaignRecord>,
    slugs: HashMap<String, AggregateId>,
    fail_on_create: bool,
}

/// In-memory campaign directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCampaignDirectory {
    state: Arc<RwLock<InMemoryDirectoryState>>,
}

impl InMemoryCampaignDirectory {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the directory to fail on the next create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Pre-registers a slug as taken, as if another campaign owned it.
    pub fn claim_slug(&self, slug: &Slug) {
        self.state
            .write()
            .unwrap()
            .slugs
            .insert(slug.as_str().to_string(), AggregateId::new());
    }

    /// Returns the number of active (non-deleted) campaigns.
    pub fn active_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .campaigns
            .values()
            .filter(|c| !c.deleted)
            .count()
    }

    /// Returns true if the campaign exists and is soft-deleted.
    pub fn is_deleted(&self, campaign_id: AggregateId) -> bool {
        self.state
            .read()
            .unwrap()
            .campaigns
            .get(&campaign_id)
            .is_some_and(|c| c.deleted)
    }
}

#[async_trait]
impl CampaignDirectory for InMemoryCampaignDirectory {
    async fn slug_exists(&self, slug: &Slug) -> Result<bool, ServiceError> {
        Ok(self.state.read().unwrap().slugs.contains_key(slug.as_str()))
    }

    async fn create(&self, record: CampaignRecord) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(ServiceError::new("campaign table unavailable"));
        }
        if state.slugs.contains_key(record.slug.as_str()) {
            return Err(ServiceError::new(format!(
                "slug '{}' already taken",
                record.slug
            )));
        }

        state
            .slugs
            .insert(record.slug.as_str().to_string(), record.campaign_id);
        state.campaigns.insert(record.campaign_id, record);
        Ok(())
    }

    async fn soft_delete(
        &self,
        campaign_id: AggregateId,
        _reason: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        if let Some(record) = state.campaigns.get_mut(&campaign_id) {
            record.deleted = true;
            let slug = record.slug.as_str().to_string();
            state.slugs.remove(&slug);
        }
        Ok(())
    }
}
