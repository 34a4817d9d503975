//! Dedupe of handler invocations by event ID.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use event_store::{EventId, EventRecord};

use crate::handler::HandlerError;
use crate::middleware::{DispatchDecision, Middleware, SkipReason};

/// Configuration for the idempotency middleware.
#[derive(Debug, Clone, Copy)]
pub struct IdempotencyConfig {
    /// Maximum processed IDs remembered per handler; oldest are evicted.
    pub capacity: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Bounded record of event IDs a handler has processed successfully.
#[derive(Debug, Default)]
struct ProcessedIds {
    seen: HashSet<EventId>,
    order: VecDeque<EventId>,
}

impl ProcessedIds {
    fn contains(&self, id: EventId) -> bool {
        self.seen.contains(&id)
    }

    fn insert(&mut self, id: EventId, capacity: usize) {
        if !self.seen.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
    }
}

/// Skips a delivery when `(handler, event id)` was already processed
/// successfully. Failed invocations are not recorded, so a retry after a
/// failure is delivered again; that is the at-least-once contract.
pub struct IdempotencyMiddleware {
    config: IdempotencyConfig,
    processed: Mutex<HashMap<String, ProcessedIds>>,
}

impl IdempotencyMiddleware {
    /// Creates an idempotency middleware with the given config.
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            config,
            processed: Mutex::new(HashMap::new()),
        }
    }

    /// Returns how many IDs are currently remembered for a handler.
    pub fn remembered(&self, handler: &str) -> usize {
        self.processed
            .lock()
            .expect("idempotency lock poisoned")
            .get(handler)
            .map(|p| p.seen.len())
            .unwrap_or(0)
    }
}

impl Default for IdempotencyMiddleware {
    fn default() -> Self {
        Self::new(IdempotencyConfig::default())
    }
}

#[async_trait]
impl Middleware for IdempotencyMiddleware {
    fn name(&self) -> &'static str {
        "idempotency"
    }

    async fn before_dispatch(&self, handler: &str, event: &EventRecord) -> DispatchDecision {
        let processed = self.processed.lock().expect("idempotency lock poisoned");
        match processed.get(handler) {
            Some(ids) if ids.contains(event.event_id) => {
                DispatchDecision::Skip(SkipReason::DuplicateDelivery)
            }
            _ => DispatchDecision::Deliver,
        }
    }

    async fn after_dispatch(
        &self,
        handler: &str,
        event: &EventRecord,
        outcome: std::result::Result<(), &HandlerError>,
    ) {
        if outcome.is_ok() {
            let mut processed = self.processed.lock().expect("idempotency lock poisoned");
            processed
                .entry(handler.to_string())
                .or_default()
                .insert(event.event_id, self.config.capacity);
        }
    }
}
