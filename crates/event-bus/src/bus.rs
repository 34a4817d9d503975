//! The event bus: store-first publish with per-subscriber fan-out.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use domain::{DomainPayload, EventType};
use event_store::{EventId, EventRecord, EventStore};
use futures_util::FutureExt;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::error::Result;
use crate::handler::{EventHandler, HandlerError};
use crate::middleware::{
    CircuitBreakerMiddleware, DispatchDecision, IdempotencyMiddleware, LoggingMiddleware,
    Middleware, ValidationMiddleware,
};

/// One queued delivery for a subscriber worker.
struct Delivery {
    event: EventRecord,
    /// Present for batch publishes, which wait for dispatch completion.
    done: Option<oneshot::Sender<()>>,
}

struct SubscriberHandle {
    id: u64,
    handler_name: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

struct BusInner {
    store: Arc<dyn EventStore>,
    middleware: Vec<Arc<dyn Middleware>>,
    subscribers: RwLock<HashMap<&'static str, Vec<SubscriberHandle>>>,
    next_subscription_id: AtomicU64,
}

/// In-process publish/subscribe router over a durable event store.
///
/// Constructed explicitly at startup and shared by cloning (cheap, all
/// clones point at the same state). Publishing appends to the store before
/// any subscriber enqueue; handler execution is asynchronous with respect
/// to the publisher. Each subscriber drains a private FIFO queue, so one
/// handler sees events of a type in publish order and cannot block or
/// fail any other handler.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a bus over the given store with an ordered middleware chain.
    pub fn new(store: Arc<dyn EventStore>, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                store,
                middleware,
                subscribers: RwLock::new(HashMap::new()),
                next_subscription_id: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a bus with the standard middleware chain: logging, schema
    /// validation, idempotent dispatch, circuit breaker.
    pub fn standard(store: Arc<dyn EventStore>) -> Self {
        Self::new(
            store,
            vec![
                Arc::new(LoggingMiddleware::new()),
                Arc::new(ValidationMiddleware::standard()),
                Arc::new(IdempotencyMiddleware::default()),
                Arc::new(CircuitBreakerMiddleware::default()),
            ],
        )
    }

    /// Returns the underlying event store.
    pub fn store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.inner.store)
    }

    /// Registers a handler for one event type.
    ///
    /// Spawns a dedicated worker draining the subscriber's queue. The
    /// returned [`Subscription`] detaches the handler when unsubscribed.
    pub async fn subscribe(
        &self,
        event_type: EventType,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriberHandle {
            id,
            handler_name: handler.name().to_string(),
            tx,
        };

        tokio::spawn(run_worker(self.inner.middleware.clone(), handler, rx));

        let mut subscribers = self.inner.subscribers.write().await;
        subscribers.entry(event_type.name()).or_default().push(handle);

        Subscription {
            bus: Arc::downgrade(&self.inner),
            event_type: event_type.name(),
            id,
        }
    }

    /// Publishes one event.
    ///
    /// Runs the publish middleware (validation failures surface here and
    /// the event is never stored), durably appends, then enqueues the
    /// event for every registered handler of its type. Returns once the
    /// append has succeeded; dispatch completes asynchronously.
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, event_id = %event.event_id)
    )]
    pub async fn publish(&self, event: EventRecord) -> Result<EventId> {
        for middleware in &self.inner.middleware {
            middleware.on_publish(&event).await?;
        }

        self.inner.store.append(event.clone()).await?;
        metrics::counter!("events_published_total").increment(1);

        let event_id = event.event_id;
        self.fan_out(event, &mut None).await;
        Ok(event_id)
    }

    /// Builds a record from a catalog payload and publishes it.
    pub async fn publish_payload(&self, payload: DomainPayload) -> Result<EventId> {
        self.publish(payload.into_record()?).await
    }

    /// Publishes a batch and waits until every delivery has been
    /// dispatched (handled or skipped) by every subscriber.
    #[tracing::instrument(skip(self, events), fields(batch_len = events.len()))]
    pub async fn publish_batch(&self, events: Vec<EventRecord>) -> Result<()> {
        for event in &events {
            for middleware in &self.inner.middleware {
                middleware.on_publish(event).await?;
            }
        }

        let count = events.len();
        self.inner.store.append_batch(events.clone()).await?;
        metrics::counter!("events_published_total").increment(count as u64);

        let mut completions = Some(Vec::new());
        for event in events {
            self.fan_out(event, &mut completions).await;
        }

        for done in completions.unwrap_or_default() {
            // A dropped worker just means the subscriber unsubscribed.
            let _ = done.await;
        }
        Ok(())
    }

    /// Returns how many handlers are registered for an event type.
    pub async fn subscriber_count(&self, event_type: EventType) -> usize {
        self.inner
            .subscribers
            .read()
            .await
            .get(event_type.name())
            .map(|handles| handles.len())
            .unwrap_or(0)
    }

    async fn fan_out(
        &self,
        event: EventRecord,
        completions: &mut Option<Vec<oneshot::Receiver<()>>>,
    ) {
        let subscribers = self.inner.subscribers.read().await;
        let Some(handles) = subscribers.get(event.event_type.as_str()) else {
            return;
        };

        for handle in handles {
            let done = completions.as_mut().map(|receivers| {
                let (tx, rx) = oneshot::channel();
                receivers.push(rx);
                tx
            });
            if handle
                .tx
                .send(Delivery {
                    event: event.clone(),
                    done,
                })
                .is_err()
            {
                // Worker already gone; the handle is pruned on unsubscribe.
                tracing::debug!(
                    handler = %handle.handler_name,
                    event_id = %event.event_id,
                    "subscriber queue closed, delivery dropped"
                );
            }
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    bus: Weak<BusInner>,
    event_type: &'static str,
    id: u64,
}

impl Subscription {
    /// Removes the handler from the bus.
    ///
    /// Deliveries already queued are still dispatched; the worker stops
    /// once its queue drains.
    pub async fn unsubscribe(self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut subscribers = inner.subscribers.write().await;
        if let Some(handles) = subscribers.get_mut(self.event_type) {
            handles.retain(|handle| handle.id != self.id);
            if handles.is_empty() {
                subscribers.remove(self.event_type);
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Drains one subscriber's queue, running the dispatch middleware around
/// every delivery. Handler errors and panics are absorbed here.
async fn run_worker(
    middleware: Vec<Arc<dyn Middleware>>,
    handler: Arc<dyn EventHandler>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
) {
    while let Some(Delivery { event, done }) = rx.recv().await {
        let mut decision = DispatchDecision::Deliver;
        for stage in &middleware {
            if let DispatchDecision::Skip(reason) =
                stage.before_dispatch(handler.name(), &event).await
            {
                decision = DispatchDecision::Skip(reason);
                break;
            }
        }

        match decision {
            DispatchDecision::Skip(reason) => {
                metrics::counter!("event_deliveries_skipped_total").increment(1);
                tracing::debug!(
                    handler = handler.name(),
                    event_id = %event.event_id,
                    reason = reason.as_str(),
                    "delivery skipped"
                );
            }
            DispatchDecision::Deliver => {
                let outcome = match AssertUnwindSafe(handler.handle(&event)).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
                };
                if outcome.is_err() {
                    metrics::counter!("event_handler_failures_total").increment(1);
                }
                for stage in &middleware {
                    stage
                        .after_dispatch(handler.name(), &event, outcome.as_ref().map(|_| ()))
                        .await;
                }
            }
        }

        if let Some(done) = done {
            let _ = done.send(());
        }
    }
}
