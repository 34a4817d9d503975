//! Saga state persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::instance::{SagaId, SagaInstance, StepRecord};
use crate::state::SagaStatus;

/// Durable store for saga and step rows.
///
/// All writes are single-row upserts keyed by primary ID; there is no
/// cross-row locking, so concurrent saga instances never contend.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts or replaces a saga instance row.
    async fn upsert_instance(&self, instance: &SagaInstance) -> Result<()>;

    /// Inserts or replaces a step row.
    async fn upsert_step(&self, step: &StepRecord) -> Result<()>;

    /// Loads a saga instance by ID.
    async fn get_instance(&self, saga_id: SagaId) -> Result<Option<SagaInstance>>;

    /// Loads a saga's step rows ordered by step number.
    async fn get_steps(&self, saga_id: SagaId) -> Result<Vec<StepRecord>>;

    /// Lists instances with a given status, for dashboards and audits.
    async fn list_by_status(&self, status: SagaStatus) -> Result<Vec<SagaInstance>>;
}

/// In-memory saga store for tests and in-process deployments.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    instances: Arc<RwLock<HashMap<SagaId, SagaInstance>>>,
    steps: Arc<RwLock<HashMap<SagaId, BTreeMap<usize, StepRecord>>>>,
}

impl InMemorySagaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored instances.
    pub async fn instance_count(&self) -> usize {
        self.instances.read().await.len()
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn upsert_instance(&self, instance: &SagaInstance) -> Result<()> {
        self.instances
            .write()
            .await
            .insert(instance.id, instance.clone());
        Ok(())
    }

    async fn upsert_step(&self, step: &StepRecord) -> Result<()> {
        self.steps
            .write()
            .await
            .entry(step.saga_id)
            .or_default()
            .insert(step.step_number, step.clone());
        Ok(())
    }

    async fn get_instance(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        Ok(self.instances.read().await.get(&saga_id).cloned())
    }

    async fn get_steps(&self, saga_id: SagaId) -> Result<Vec<StepRecord>> {
        Ok(self
            .steps
            .read()
            .await
            .get(&saga_id)
            .map(|steps| steps.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_by_status(&self, status: SagaStatus) -> Result<Vec<SagaInstance>> {
        Ok(self
            .instances
            .read()
            .await
            .values()
            .filter(|i| i.status == status)
            .cloned()
            .collect())
    }
}
