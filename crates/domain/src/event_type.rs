//! The fixed event vocabulary, organized by domain.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The business domain an event type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventDomain {
    User,
    Campaign,
    Donation,
    Organization,
    Admin,
}

impl std::fmt::Display for EventDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventDomain::User => "user",
            EventDomain::Campaign => "campaign",
            EventDomain::Donation => "donation",
            EventDomain::Organization => "organization",
            EventDomain::Admin => "admin",
        };
        write!(f, "{name}")
    }
}

/// Closed vocabulary of domain event types.
///
/// Every variant maps to exactly one dotted name (e.g. "campaign.created")
/// and one typed payload struct. Adding an event type means adding a
/// variant here, a payload, and a catalog registration; there is no
/// dynamic registration of arbitrary type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    UserRegistered,
    UserRolePromoted,
    UserRoleReverted,
    UserProfileUpdated,
    CampaignCreated,
    CampaignPublished,
    CampaignSoftDeleted,
    CampaignGoalUpdated,
    DonationCompleted,
    DonationRefunded,
    OrganizationCreated,
    OrganizationMemberAdded,
    AdminActionLogged,
    AdminCampaignFlagged,
}

impl EventType {
    /// All event types in the catalog.
    pub const ALL: [EventType; 14] = [
        EventType::UserRegistered,
        EventType::UserRolePromoted,
        EventType::UserRoleReverted,
        EventType::UserProfileUpdated,
        EventType::CampaignCreated,
        EventType::CampaignPublished,
        EventType::CampaignSoftDeleted,
        EventType::CampaignGoalUpdated,
        EventType::DonationCompleted,
        EventType::DonationRefunded,
        EventType::OrganizationCreated,
        EventType::OrganizationMemberAdded,
        EventType::AdminActionLogged,
        EventType::AdminCampaignFlagged,
    ];

    /// Returns the dotted wire name of this event type.
    pub fn name(&self) -> &'static str {
        match self {
            EventType::UserRegistered => "user.registered",
            EventType::UserRolePromoted => "user.role_promoted",
            EventType::UserRoleReverted => "user.role_reverted",
            EventType::UserProfileUpdated => "user.profile_updated",
            EventType::CampaignCreated => "campaign.created",
            EventType::CampaignPublished => "campaign.published",
            EventType::CampaignSoftDeleted => "campaign.soft_deleted",
            EventType::CampaignGoalUpdated => "campaign.goal_updated",
            EventType::DonationCompleted => "donation.completed",
            EventType::DonationRefunded => "donation.refunded",
            EventType::OrganizationCreated => "organization.created",
            EventType::OrganizationMemberAdded => "organization.member_added",
            EventType::AdminActionLogged => "admin.action_logged",
            EventType::AdminCampaignFlagged => "admin.campaign_flagged",
        }
    }

    /// Returns the domain this event type belongs to.
    pub fn domain(&self) -> EventDomain {
        match self {
            EventType::UserRegistered
            | EventType::UserRolePromoted
            | EventType::UserRoleReverted
            | EventType::UserProfileUpdated => EventDomain::User,
            EventType::CampaignCreated
            | EventType::CampaignPublished
            | EventType::CampaignSoftDeleted
            | EventType::CampaignGoalUpdated => EventDomain::Campaign,
            EventType::DonationCompleted | EventType::DonationRefunded => EventDomain::Donation,
            EventType::OrganizationCreated | EventType::OrganizationMemberAdded => {
                EventDomain::Organization
            }
            EventType::AdminActionLogged | EventType::AdminCampaignFlagged => EventDomain::Admin,
        }
    }

    /// Parses a dotted wire name into an event type.
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| DomainError::UnknownEventType(name.to_string()))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::parse(s)
    }
}
