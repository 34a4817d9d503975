//! Read models and projections for the FundlyHub query side.
//!
//! Projections consume published events to maintain derived views,
//! decoupled from the write path:
//! - [`Projection`] trait for processing events into read models
//! - [`ProjectionProcessor`] for catch-up and rebuild from the store
//! - [`ProjectionSubscriber`] to attach a projection to the event bus
//! - Two views: per-campaign stats and per-user backer profiles
//!
//! Read models are disposable: any of them can be dropped and rebuilt
//! from the event store, and rebuilding twice yields identical state.

pub mod error;
pub mod processor;
pub mod projection;
pub mod subscriber;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use subscriber::{ProjectionSubscriber, attach};
pub use views::{BackerProfile, BackerProfileView, CampaignStats, CampaignStatsView};
