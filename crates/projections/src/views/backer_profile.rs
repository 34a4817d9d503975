//! Backer profile read model: per-user activity counters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    CampaignCreatedPayload, CampaignSoftDeletedPayload, DonationCompletedPayload, EventType, Money,
};
use event_store::EventRecord;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Activity counters for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackerProfile {
    pub user_id: AggregateId,
    pub campaigns_created: u64,
    pub donations_made: u64,
    pub total_donated: Money,
}

impl BackerProfile {
    fn empty(user_id: AggregateId) -> Self {
        Self {
            user_id,
            campaigns_created: 0,
            donations_made: 0,
            total_donated: Money::zero(),
        }
    }

    fn is_zero(&self) -> bool {
        self.campaigns_created == 0 && self.donations_made == 0
    }
}

/// What one campaign aggregate contributed to the profiles.
///
/// Events aggregate on the campaign, but this view is keyed by user, so
/// per-aggregate rebuild needs to know what to subtract before replaying.
#[derive(Debug, Default)]
struct Contribution {
    /// Owner currently credited with the campaign (None once soft-deleted).
    active_owner: Option<AggregateId>,
    donations: Vec<(AggregateId, Money)>,
}

#[derive(Default)]
struct ViewState {
    profiles: HashMap<AggregateId, BackerProfile>,
    contributions: HashMap<AggregateId, Contribution>,
}

impl ViewState {
    fn profile_mut(&mut self, user_id: AggregateId) -> &mut BackerProfile {
        self.profiles
            .entry(user_id)
            .or_insert_with(|| BackerProfile::empty(user_id))
    }

    fn drop_if_zero(&mut self, user_id: AggregateId) {
        if self.profiles.get(&user_id).is_some_and(|p| p.is_zero()) {
            self.profiles.remove(&user_id);
        }
    }
}

/// Read model view of per-user crowdfunding activity.
#[derive(Clone, Default)]
pub struct BackerProfileView {
    state: Arc<RwLock<ViewState>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl BackerProfileView {
    /// Creates a new empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the profile row for a user.
    pub async fn get(&self, user_id: AggregateId) -> Option<BackerProfile> {
        self.state.read().await.profiles.get(&user_id).cloned()
    }

    /// Number of users with non-zero activity.
    pub async fn len(&self) -> usize {
        self.state.read().await.profiles.len()
    }

    /// Returns true if the view holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.profiles.is_empty()
    }
}

const INTERESTS: [EventType; 3] = [
    EventType::CampaignCreated,
    EventType::CampaignSoftDeleted,
    EventType::DonationCompleted,
];

#[async_trait]
impl Projection for BackerProfileView {
    fn name(&self) -> &'static str {
        "BackerProfileView"
    }

    fn interests(&self) -> &'static [EventType] {
        &INTERESTS
    }

    async fn handle(&self, event: &EventRecord) -> Result<()> {
        let Ok(event_type) = EventType::parse(&event.event_type) else {
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            return Ok(());
        };

        let mut state = self.state.write().await;

        match event_type {
            EventType::CampaignCreated => {
                let data: CampaignCreatedPayload = serde_json::from_value(event.payload.clone())?;
                state.profile_mut(data.owner_id).campaigns_created += 1;
                state
                    .contributions
                    .entry(data.campaign_id)
                    .or_default()
                    .active_owner = Some(data.owner_id);
            }
            EventType::CampaignSoftDeleted => {
                let data: CampaignSoftDeletedPayload =
                    serde_json::from_value(event.payload.clone())?;
                let owner = state
                    .contributions
                    .get_mut(&data.campaign_id)
                    .and_then(|c| c.active_owner.take());
                if let Some(owner) = owner {
                    let profile = state.profile_mut(owner);
                    profile.campaigns_created = profile.campaigns_created.saturating_sub(1);
                    state.drop_if_zero(owner);
                }
            }
            EventType::DonationCompleted => {
                let data: DonationCompletedPayload = serde_json::from_value(event.payload.clone())?;
                let profile = state.profile_mut(data.donor_id);
                profile.donations_made += 1;
                profile.total_donated = profile.total_donated.plus(data.amount);
                state
                    .contributions
                    .entry(data.campaign_id)
                    .or_default()
                    .donations
                    .push((data.donor_id, data.amount));
            }
            _ => {}
        }

        let mut pos = self.position.write().await;
        *pos = pos.advance();

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.profiles.clear();
        state.contributions.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }

    async fn reset_aggregate(&self, aggregate_id: AggregateId) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(contribution) = state.contributions.remove(&aggregate_id) else {
            return Ok(());
        };

        if let Some(owner) = contribution.active_owner {
            let profile = state.profile_mut(owner);
            profile.campaigns_created = profile.campaigns_created.saturating_sub(1);
            state.drop_if_zero(owner);
        }
        for (donor, amount) in contribution.donations {
            let profile = state.profile_mut(donor);
            profile.donations_made = profile.donations_made.saturating_sub(1);
            profile.total_donated = profile.total_donated.minus(amount);
            state.drop_if_zero(donor);
        }
        Ok(())
    }
}
