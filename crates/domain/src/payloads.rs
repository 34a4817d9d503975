//! Typed payloads for every event type in the catalog.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventRecord, EventRecordBuilder};
use serde::{Deserialize, Serialize};

use crate::event_type::EventType;
use crate::schema::CURRENT_SCHEMA_VERSION;
use crate::value_objects::{Money, Slug};

/// Payload for `user.registered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegisteredPayload {
    pub user_id: AggregateId,
    pub email: String,
    pub display_name: String,
}

/// Payload for `user.role_promoted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRolePromotedPayload {
    pub user_id: AggregateId,
    pub from_role: String,
    pub to_role: String,
}

/// Payload for `user.role_reverted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleRevertedPayload {
    pub user_id: AggregateId,
    pub from_role: String,
    pub to_role: String,
}

/// Payload for `user.profile_updated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileUpdatedPayload {
    pub user_id: AggregateId,
    /// Names of the profile fields that changed.
    pub changed_fields: Vec<String>,
}

/// Payload for `campaign.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignCreatedPayload {
    pub campaign_id: AggregateId,
    pub owner_id: AggregateId,
    pub slug: Slug,
    pub title: String,
    pub goal: Money,
    pub category: String,
}

/// Payload for `campaign.published`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPublishedPayload {
    pub campaign_id: AggregateId,
    pub published_at: DateTime<Utc>,
}

/// Payload for `campaign.soft_deleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSoftDeletedPayload {
    pub campaign_id: AggregateId,
    pub reason: String,
}

/// Payload for `campaign.goal_updated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignGoalUpdatedPayload {
    pub campaign_id: AggregateId,
    pub previous_goal: Money,
    pub new_goal: Money,
}

/// Payload for `donation.completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationCompletedPayload {
    pub donation_id: AggregateId,
    pub campaign_id: AggregateId,
    pub donor_id: AggregateId,
    pub amount: Money,
    pub currency: String,
}

/// Payload for `donation.refunded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationRefundedPayload {
    pub donation_id: AggregateId,
    pub campaign_id: AggregateId,
    pub donor_id: AggregateId,
    pub amount: Money,
    pub reason: String,
}

/// Payload for `organization.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationCreatedPayload {
    pub organization_id: AggregateId,
    pub owner_id: AggregateId,
    pub name: String,
}

/// Payload for `organization.member_added`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationMemberAddedPayload {
    pub organization_id: AggregateId,
    pub user_id: AggregateId,
    pub role: String,
}

/// Payload for `admin.action_logged`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminActionLoggedPayload {
    pub admin_id: AggregateId,
    pub action: String,
    pub target_id: Option<AggregateId>,
}

/// Payload for `admin.campaign_flagged`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCampaignFlaggedPayload {
    pub campaign_id: AggregateId,
    pub admin_id: AggregateId,
    pub reason: String,
}

/// Closed tagged union over every payload in the catalog.
///
/// The tag is carried by the event record's `event_type` field rather than
/// embedded in the payload JSON, so stored payloads stay exactly the shape
/// their schema documents.
#[derive(Debug, Clone)]
pub enum DomainPayload {
    UserRegistered(UserRegisteredPayload),
    UserRolePromoted(UserRolePromotedPayload),
    UserRoleReverted(UserRoleRevertedPayload),
    UserProfileUpdated(UserProfileUpdatedPayload),
    CampaignCreated(CampaignCreatedPayload),
    CampaignPublished(CampaignPublishedPayload),
    CampaignSoftDeleted(CampaignSoftDeletedPayload),
    CampaignGoalUpdated(CampaignGoalUpdatedPayload),
    DonationCompleted(DonationCompletedPayload),
    DonationRefunded(DonationRefundedPayload),
    OrganizationCreated(OrganizationCreatedPayload),
    OrganizationMemberAdded(OrganizationMemberAddedPayload),
    AdminActionLogged(AdminActionLoggedPayload),
    AdminCampaignFlagged(AdminCampaignFlaggedPayload),
}

impl DomainPayload {
    /// Returns the catalog type of this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            DomainPayload::UserRegistered(_) => EventType::UserRegistered,
            DomainPayload::UserRolePromoted(_) => EventType::UserRolePromoted,
            DomainPayload::UserRoleReverted(_) => EventType::UserRoleReverted,
            DomainPayload::UserProfileUpdated(_) => EventType::UserProfileUpdated,
            DomainPayload::CampaignCreated(_) => EventType::CampaignCreated,
            DomainPayload::CampaignPublished(_) => EventType::CampaignPublished,
            DomainPayload::CampaignSoftDeleted(_) => EventType::CampaignSoftDeleted,
            DomainPayload::CampaignGoalUpdated(_) => EventType::CampaignGoalUpdated,
            DomainPayload::DonationCompleted(_) => EventType::DonationCompleted,
            DomainPayload::DonationRefunded(_) => EventType::DonationRefunded,
            DomainPayload::OrganizationCreated(_) => EventType::OrganizationCreated,
            DomainPayload::OrganizationMemberAdded(_) => EventType::OrganizationMemberAdded,
            DomainPayload::AdminActionLogged(_) => EventType::AdminActionLogged,
            DomainPayload::AdminCampaignFlagged(_) => EventType::AdminCampaignFlagged,
        }
    }

    /// Returns the aggregate this payload concerns.
    pub fn aggregate_id(&self) -> AggregateId {
        match self {
            DomainPayload::UserRegistered(p) => p.user_id,
            DomainPayload::UserRolePromoted(p) => p.user_id,
            DomainPayload::UserRoleReverted(p) => p.user_id,
            DomainPayload::UserProfileUpdated(p) => p.user_id,
            DomainPayload::CampaignCreated(p) => p.campaign_id,
            DomainPayload::CampaignPublished(p) => p.campaign_id,
            DomainPayload::CampaignSoftDeleted(p) => p.campaign_id,
            DomainPayload::CampaignGoalUpdated(p) => p.campaign_id,
            DomainPayload::DonationCompleted(p) => p.campaign_id,
            DomainPayload::DonationRefunded(p) => p.campaign_id,
            DomainPayload::OrganizationCreated(p) => p.organization_id,
            DomainPayload::OrganizationMemberAdded(p) => p.organization_id,
            DomainPayload::AdminActionLogged(p) => p.admin_id,
            DomainPayload::AdminCampaignFlagged(p) => p.campaign_id,
        }
    }

    /// Serializes the inner payload to JSON.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            DomainPayload::UserRegistered(p) => serde_json::to_value(p),
            DomainPayload::UserRolePromoted(p) => serde_json::to_value(p),
            DomainPayload::UserRoleReverted(p) => serde_json::to_value(p),
            DomainPayload::UserProfileUpdated(p) => serde_json::to_value(p),
            DomainPayload::CampaignCreated(p) => serde_json::to_value(p),
            DomainPayload::CampaignPublished(p) => serde_json::to_value(p),
            DomainPayload::CampaignSoftDeleted(p) => serde_json::to_value(p),
            DomainPayload::CampaignGoalUpdated(p) => serde_json::to_value(p),
            DomainPayload::DonationCompleted(p) => serde_json::to_value(p),
            DomainPayload::DonationRefunded(p) => serde_json::to_value(p),
            DomainPayload::OrganizationCreated(p) => serde_json::to_value(p),
            DomainPayload::OrganizationMemberAdded(p) => serde_json::to_value(p),
            DomainPayload::AdminActionLogged(p) => serde_json::to_value(p),
            DomainPayload::AdminCampaignFlagged(p) => serde_json::to_value(p),
        }
    }

    /// Starts an event record builder pre-filled from this payload.
    ///
    /// The caller adds correlation/causation and metadata before `build()`.
    pub fn record_builder(&self) -> Result<EventRecordBuilder, serde_json::Error> {
        Ok(EventRecord::builder()
            .event_type(self.event_type().name())
            .aggregate_id(self.aggregate_id())
            .schema_version(CURRENT_SCHEMA_VERSION)
            .payload_raw(self.to_value()?))
    }

    /// Builds an event record from this payload with default metadata.
    pub fn into_record(self) -> Result<EventRecord, serde_json::Error> {
        Ok(self.record_builder()?.build())
    }
}
