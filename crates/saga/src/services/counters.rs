//! Profile counters (campaigns created per user).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;

use crate::services::ServiceError;

/// Trait for denormalized profile counters.
#[async_trait]
pub trait ProfileCounterService: Send + Sync {
    /// Increments a user's campaign counter, returning the new value.
    async fn increment_campaigns(&self, user_id: AggregateId) -> Result<u64, ServiceError>;

    /// Decrements a user's campaign counter, returning the new value.
    async fn decrement_campaigns(&self, user_id: AggregateId) -> Result<u64, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCounterState {
    campaigns: HashMap<AggregateId, u64>,
    fail_on_increment: bool,
}

/// In-memory profile counters for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileCounters {
    state: Arc<RwLock<InMemoryCounterState>>,
}

impl InMemoryProfileCounters {
    /// Creates a new counter service with everything at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on the next increment call.
    pub fn set_fail_on_increment(&self, fail: bool) {
        self.state.write().unwrap().fail_on_increment = fail;
    }

    /// Returns a user's campaign counter.
    pub fn campaigns_for(&self, user_id: AggregateId) -> u64 {
        self.state
            .read()
            .unwrap()
            .campaigns
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProfileCounterService for InMemoryProfileCounters {
    async fn increment_campaigns(&self, user_id: AggregateId) -> Result<u64, ServiceError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_increment {
            return Err(ServiceError::new("counter service unavailable"));
        }

        let count = state.campaigns.entry(user_id).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn decrement_campaigns(&self, user_id: AggregateId) -> Result<u64, ServiceError> {
        let mut state = self.state.write().unwrap();
        let count = state.campaigns.entry(user_id).or_insert(0);
        *count = count.saturating_sub(1);
        Ok(*count)
    }
}
