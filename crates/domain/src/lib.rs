//! Event schema catalog for the FundlyHub platform.
//!
//! This crate defines the fixed event vocabulary (user.*, campaign.*,
//! donation.*, organization.*, admin.*) as a closed tagged union: every
//! [`EventType`] maps to one typed payload struct, and the
//! [`SchemaCatalog`] validates stored payloads against the registered
//! `(type, version)` pairs. Consumers treat this vocabulary as the wire
//! contract for analytics, notifications, and projection rebuilds.

pub mod error;
pub mod event_type;
pub mod payloads;
pub mod schema;
pub mod value_objects;

pub use error::{DomainError, Result};
pub use event_type::{EventDomain, EventType};
pub use payloads::{
    AdminActionLoggedPayload, AdminCampaignFlaggedPayload, CampaignCreatedPayload,
    CampaignGoalUpdatedPayload, CampaignPublishedPayload, CampaignSoftDeletedPayload,
    DomainPayload, DonationCompletedPayload, DonationRefundedPayload,
    OrganizationCreatedPayload, OrganizationMemberAddedPayload, UserProfileUpdatedPayload,
    UserRegisteredPayload, UserRolePromotedPayload, UserRoleRevertedPayload,
};
pub use schema::{CURRENT_SCHEMA_VERSION, SchemaCatalog};
pub use value_objects::{Money, Slug};
