//! Campaign statistics read model.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    CampaignCreatedPayload, CampaignGoalUpdatedPayload, CampaignSoftDeletedPayload,
    DonationCompletedPayload, DonationRefundedPayload, EventType, Money,
};
use event_store::EventRecord;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Aggregated statistics for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignStats {
    pub campaign_id: AggregateId,
    pub owner_id: AggregateId,
    pub title: String,
    pub goal: Money,
    pub raised: Money,
    pub donation_count: u64,
    pub donors: HashSet<AggregateId>,
    pub deleted: bool,
}

impl CampaignStats {
    /// Number of distinct donors.
    pub fn donor_count(&self) -> usize {
        self.donors.len()
    }

    /// Raised amount as a fraction of the goal, clamped to [0, 1].
    pub fn progress(&self) -> f64 {
        if self.goal.cents() <= 0 {
            return 0.0;
        }
        (self.raised.cents() as f64 / self.goal.cents() as f64).clamp(0.0, 1.0)
    }
}

/// Read model view of per-campaign donation statistics.
#[derive(Clone, Default)]
pub struct CampaignStatsView {
    campaigns: Arc<RwLock<HashMap<AggregateId, CampaignStats>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl CampaignStatsView {
    /// Creates a new empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the stats row for a campaign.
    pub async fn get(&self, campaign_id: AggregateId) -> Option<CampaignStats> {
        self.campaigns.read().await.get(&campaign_id).cloned()
    }

    /// Gets all active (non-deleted) campaign rows.
    pub async fn active(&self) -> Vec<CampaignStats> {
        self.campaigns
            .read()
            .await
            .values()
            .filter(|stats| !stats.deleted)
            .cloned()
            .collect()
    }

    /// Number of rows in the view (including soft-deleted campaigns).
    pub async fn len(&self) -> usize {
        self.campaigns.read().await.len()
    }

    /// Returns true if the view holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.campaigns.read().await.is_empty()
    }
}

const INTERESTS: [EventType; 5] = [
    EventType::CampaignCreated,
    EventType::CampaignGoalUpdated,
    EventType::CampaignSoftDeleted,
    EventType::DonationCompleted,
    EventType::DonationRefunded,
];

#[async_trait]
impl Projection for CampaignStatsView {
    fn name(&self) -> &'static str {
        "CampaignStatsView"
    }

    fn interests(&self) -> &'static [EventType] {
        &INTERESTS
    }

    async fn handle(&self, event: &EventRecord) -> Result<()> {
        let Ok(event_type) = EventType::parse(&event.event_type) else {
            // Outside the vocabulary; catch-up feeds us everything.
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            return Ok(());
        };

        let mut campaigns = self.campaigns.write().await;

        match event_type {
            EventType::CampaignCreated => {
                let data: CampaignCreatedPayload = serde_json::from_value(event.payload.clone())?;
                campaigns.insert(
                    data.campaign_id,
                    CampaignStats {
                        campaign_id: data.campaign_id,
                        owner_id: data.owner_id,
                        title: data.title,
                        goal: data.goal,
                        raised: Money::zero(),
                        donation_count: 0,
                        donors: HashSet::new(),
                        deleted: false,
                    },
                );
            }
            EventType::CampaignGoalUpdated => {
                let data: CampaignGoalUpdatedPayload =
                    serde_json::from_value(event.payload.clone())?;
                if let Some(stats) = campaigns.get_mut(&data.campaign_id) {
                    stats.goal = data.new_goal;
                }
            }
            EventType::CampaignSoftDeleted => {
                let data: CampaignSoftDeletedPayload =
                    serde_json::from_value(event.payload.clone())?;
                if let Some(stats) = campaigns.get_mut(&data.campaign_id) {
                    stats.deleted = true;
                }
            }
            EventType::DonationCompleted => {
                let data: DonationCompletedPayload = serde_json::from_value(event.payload.clone())?;
                if let Some(stats) = campaigns.get_mut(&data.campaign_id) {
                    stats.raised = stats.raised.plus(data.amount);
                    stats.donation_count += 1;
                    stats.donors.insert(data.donor_id);
                }
            }
            EventType::DonationRefunded => {
                let data: DonationRefundedPayload = serde_json::from_value(event.payload.clone())?;
                if let Some(stats) = campaigns.get_mut(&data.campaign_id) {
                    stats.raised = stats.raised.minus(data.amount);
                    stats.donation_count = stats.donation_count.saturating_sub(1);
                }
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
        self.campaigns.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }

    async fn reset_aggregate(&self, aggregate_id: AggregateId) -> Result<()> {
        self.campaigns.write().await.remove(&aggregate_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DomainPayload, Slug};

    fn created(campaign_id: AggregateId, owner_id: AggregateId, goal_cents: i64) -> EventRecord {
        DomainPayload::CampaignCreated(CampaignCreatedPayload {
            campaign_id,
            owner_id,
            slug: Slug::new("river-cleanup").unwrap(),
            title: "River Cleanup".to_string(),
            goal: Money::from_cents(goal_cents),
            category: "environment".to_string(),
        })
        .into_record()
        .unwrap()
    }

    fn donation(campaign_id: AggregateId, donor_id: AggregateId, cents: i64) -> EventRecord {
        DomainPayload::DonationCompleted(DonationCompletedPayload {
            donation_id: AggregateId::new(),
            campaign_id,
            donor_id,
            amount: Money::from_cents(cents),
            currency: "USD".to_string(),
        })
        .into_record()
        .unwrap()
    }

    #[tokio::test]
    async fn donations_accumulate() {
        let view = CampaignStatsView::new();
        let campaign = AggregateId::new();
        let donor_a = AggregateId::new();
        let donor_b = AggregateId::new();

        view.handle(&created(campaign, AggregateId::new(), 100_000))
            .await
            .unwrap();
        view.handle(&donation(campaign, donor_a, 2_500)).await.unwrap();
        view.handle(&donation(campaign, donor_b, 5_000)).await.unwrap();
        view.handle(&donation(campaign, donor_a, 1_000)).await.unwrap();

        let stats = view.get(campaign).await.unwrap();
        assert_eq!(stats.raised, Money::from_cents(8_500));
        assert_eq!(stats.donation_count, 3);
        assert_eq!(stats.donor_count(), 2);
        assert!((stats.progress() - 0.085).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refund_reverses_a_donation() {
        let view = CampaignStatsView::new();
        let campaign = AggregateId::new();
        let donor = AggregateId::new();

        view.handle(&created(campaign, AggregateId::new(), 100_000))
            .await
            .unwrap();
        view.handle(&donation(campaign, donor, 2_500)).await.unwrap();

        let refund = DomainPayload::DonationRefunded(DonationRefundedPayload {
            donation_id: AggregateId::new(),
            campaign_id: campaign,
            donor_id: donor,
            amount: Money::from_cents(2_500),
            reason: "card dispute".to_string(),
        })
        .into_record()
        .unwrap();
        view.handle(&refund).await.unwrap();

        let stats = view.get(campaign).await.unwrap();
        assert_eq!(stats.raised, Money::zero());
        assert_eq!(stats.donation_count, 0);
    }

    #[tokio::test]
    async fn soft_delete_marks_the_row() {
        let view = CampaignStatsView::new();
        let campaign = AggregateId::new();

        view.handle(&created(campaign, AggregateId::new(), 100_000))
            .await
            .unwrap();

        let deleted = DomainPayload::CampaignSoftDeleted(CampaignSoftDeletedPayload {
            campaign_id: campaign,
            reason: "rolled back".to_string(),
        })
        .into_record()
        .unwrap();
        view.handle(&deleted).await.unwrap();

        let stats = view.get(campaign).await.unwrap();
        assert!(stats.deleted);
        assert!(view.active().await.is_empty());
        assert_eq!(view.len().await, 1);
    }

    #[tokio::test]
    async fn goal_update_changes_progress() {
        let view = CampaignStatsView::new();
        let campaign = AggregateId::new();

        view.handle(&created(campaign, AggregateId::new(), 100_000))
            .await
            .unwrap();
        view.handle(&donation(campaign, AggregateId::new(), 50_000))
            .await
            .unwrap();

        let update = DomainPayload::CampaignGoalUpdated(CampaignGoalUpdatedPayload {
            campaign_id: campaign,
            previous_goal: Money::from_cents(100_000),
            new_goal: Money::from_cents(50_000),
        })
        .into_record()
        .unwrap();
        view.handle(&update).await.unwrap();

        let stats = view.get(campaign).await.unwrap();
        assert_eq!(stats.goal, Money::from_cents(50_000));
        assert!((stats.progress() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn donation_for_unknown_campaign_is_ignored() {
        let view = CampaignStatsView::new();

        view.handle(&donation(AggregateId::new(), AggregateId::new(), 1_000))
            .await
            .unwrap();

        assert!(view.is_empty().await);
        assert_eq!(view.position().await.events_processed, 1);
    }

    #[tokio::test]
    async fn reset_aggregate_drops_only_that_row() {
        let view = CampaignStatsView::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        view.handle(&created(first, AggregateId::new(), 100_000))
            .await
            .unwrap();
        view.handle(&created(second, AggregateId::new(), 100_000))
            .await
            .unwrap();

        view.reset_aggregate(first).await.unwrap();

        assert!(view.get(first).await.is_none());
        assert!(view.get(second).await.is_some());
    }
}
