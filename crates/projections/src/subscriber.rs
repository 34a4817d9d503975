//! Bus adapter: run a projection as an event handler.

use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{EventBus, EventHandler, HandlerError, Subscription};
use event_store::EventRecord;

use crate::projection::Projection;

/// Wraps a projection so it can subscribe to the event bus.
///
/// Projection errors become handler errors, which the bus absorbs and the
/// idempotency/circuit-breaker middleware observe like any other handler.
pub struct ProjectionSubscriber {
    projection: Arc<dyn Projection>,
}

impl ProjectionSubscriber {
    /// Wraps a projection for bus delivery.
    pub fn new(projection: Arc<dyn Projection>) -> Self {
        Self { projection }
    }
}

#[async_trait]
impl EventHandler for ProjectionSubscriber {
    fn name(&self) -> &str {
        self.projection.name()
    }

    async fn handle(&self, event: &EventRecord) -> Result<(), HandlerError> {
        self.projection
            .handle(event)
            .await
            .map_err(HandlerError::failed)
    }
}

/// Subscribes a projection to the bus for each of its interests.
///
/// Returns the subscriptions; dropping them keeps the handlers attached,
/// unsubscribing detaches them.
pub async fn attach(bus: &EventBus, projection: Arc<dyn Projection>) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();
    for event_type in projection.interests() {
        let handler = Arc::new(ProjectionSubscriber::new(Arc::clone(&projection)));
        subscriptions.push(bus.subscribe(*event_type, handler).await);
    }
    subscriptions
}
