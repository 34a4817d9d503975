//! Projection processor: catch-up, delivery, and rebuild.

use std::sync::Arc;

use common::AggregateId;
use event_store::{EventRecord, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Feeds events from the store to registered projections.
///
/// Supports catch-up (replay everything a projection has not yet seen),
/// single-event delivery, full rebuild, and per-aggregate rebuild.
pub struct ProjectionProcessor {
    store: Arc<dyn EventStore>,
    projections: Vec<Arc<dyn Projection>>,
}

impl ProjectionProcessor {
    /// Creates a new processor over the given event store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Runs catch-up processing: streams all events from the store and
    /// delivers them to each projection that hasn't already seen them.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut stream = self.store.stream_all().await?;
        let mut event_index: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            event_index += 1;

            for projection in &self.projections {
                let pos = projection.position().await;
                if pos.events_processed < event_index {
                    projection.handle(&event).await?;
                    metrics::counter!("projections_events_processed").increment(1);
                }
            }
        }

        tracing::info!(events_processed = event_index, "catch-up complete");

        Ok(())
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventRecord) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }

    /// Rebuilds one aggregate's derived rows from its event history.
    ///
    /// Replays the aggregate's events in timestamp order onto a cleared
    /// slate; running this twice yields identical read-model rows.
    #[tracing::instrument(skip(self), fields(aggregate_id = %aggregate_id))]
    pub async fn rebuild(&self, aggregate_id: AggregateId) -> Result<()> {
        let events = self.store.events_for_aggregate(aggregate_id).await?;

        for projection in &self.projections {
            projection.reset_aggregate(aggregate_id).await?;
            for event in &events {
                projection.handle(event).await?;
            }
        }

        tracing::info!(events_replayed = events.len(), "aggregate rebuilt");

        Ok(())
    }
}
