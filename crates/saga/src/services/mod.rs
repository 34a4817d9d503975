//! Collaborator services the campaign-creation saga drives.
//!
//! Each trait has an in-memory implementation with failure toggles used
//! by the test suites; production wiring supplies adapters over the real
//! platform services.

pub mod counters;
pub mod directory;
pub mod projections;
pub mod roles;

use thiserror::Error;

pub use counters::{InMemoryProfileCounters, ProfileCounterService};
pub use directory::{CampaignDirectory, CampaignRecord, InMemoryCampaignDirectory};
pub use projections::{InMemoryProjectionInitializer, ProjectionInitializer};
pub use roles::{InMemoryRoleService, RoleService};

/// A collaborator service call failed.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    /// Creates a service error from any displayable reason.
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

impl From<ServiceError> for crate::step::StepError {
    fn from(error: ServiceError) -> Self {
        crate::step::StepError::new(error)
    }
}
