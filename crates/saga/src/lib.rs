//! Saga orchestration for the FundlyHub event core.
//!
//! A saga is a multi-step business transaction coordinated without one
//! atomic database transaction: each step has a forward action and (where
//! meaningful) a compensating action that semantically reverses it. The
//! orchestrator drives steps strictly sequentially, persists saga and
//! step state after every transition, publishes a domain event for each
//! completed step, and on failure compensates completed steps in reverse
//! order.
//!
//! The campaign-creation saga is the shipped workflow:
//! 1. validate slug uniqueness (no compensation)
//! 2. create the campaign record (compensation: soft-delete)
//! 3. promote the owner's role (compensation: revert)
//! 4. initialize projections (compensation: remove rows)
//! 5. update profile counters (compensation: decrement)

pub mod campaign_creation;
pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod postgres;
pub mod registry;
pub mod services;
pub mod state;
pub mod step;
pub mod store;

pub use error::SagaError;
pub use instance::{SagaId, SagaInstance, StepRecord};
pub use orchestrator::SagaOrchestrator;
pub use postgres::PostgresSagaStore;
pub use registry::{SagaDefinition, SagaRegistry};
pub use services::{
    CampaignDirectory, CampaignRecord, InMemoryCampaignDirectory, InMemoryProfileCounters,
    InMemoryProjectionInitializer, InMemoryRoleService, ProfileCounterService,
    ProjectionInitializer, RoleService, ServiceError,
};
pub use state::{SagaStatus, StepStatus};
pub use step::{RetryPolicy, SagaContext, SagaStep, StepError, StepOutcome};
pub use store::{InMemorySagaStore, SagaStore};
