//! Drives saga instances: sequential steps, retries, reverse compensation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use common::{AggregateId, CorrelationId};
use event_bus::EventBus;
use event_store::EventId;

use crate::error::{Result, SagaError};
use crate::instance::{SagaId, SagaInstance, StepRecord};
use crate::registry::SagaRegistry;
use crate::step::{RetryPolicy, SagaContext, SagaStep, StepError, StepOutcome};
use crate::store::SagaStore;

struct OrchestratorInner {
    store: Arc<dyn SagaStore>,
    bus: EventBus,
    registry: SagaRegistry,
    retry: RetryPolicy,
    cancellations: Mutex<HashSet<SagaId>>,
}

/// Coordinates multi-step workflows with compensating rollback.
///
/// Steps of one instance run strictly sequentially; each step's context
/// depends on its predecessors' output. Distinct instances share nothing
/// but the durable stores and may run concurrently. Outcomes are absorbed
/// into persisted state: `start` returns the saga ID even when the
/// workflow fails, and callers read the instance back to observe it.
#[derive(Clone)]
pub struct SagaOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl SagaOrchestrator {
    /// Creates an orchestrator with the default retry policy.
    pub fn new(store: Arc<dyn SagaStore>, bus: EventBus, registry: SagaRegistry) -> Self {
        Self::with_retry_policy(store, bus, registry, RetryPolicy::default())
    }

    /// Creates an orchestrator with an explicit retry policy.
    pub fn with_retry_policy(
        store: Arc<dyn SagaStore>,
        bus: EventBus,
        registry: SagaRegistry,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                store,
                bus,
                registry,
                retry,
                cancellations: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Starts a saga and drives it to a terminal state.
    ///
    /// Returns the saga instance ID whether the workflow completed or
    /// failed; only infrastructure problems (unknown saga type, bad
    /// context, persistence or publish failures) surface as errors.
    ///
    /// The saga's own ID is inserted into the context under `saga_id`
    /// before the first step runs.
    #[tracing::instrument(skip(self, initial_context), fields(aggregate_id = %aggregate_id))]
    pub async fn start(
        &self,
        saga_type: &str,
        aggregate_id: AggregateId,
        initial_context: serde_json::Value,
    ) -> Result<SagaId> {
        let definition = self
            .inner
            .registry
            .get(saga_type)
            .ok_or_else(|| SagaError::UnknownSagaType(saga_type.to_string()))?;

        let mut ctx = SagaContext::from_value(initial_context)?;
        let mut instance = SagaInstance::new(saga_type, aggregate_id, serde_json::Map::new());
        ctx.insert("saga_id", serde_json::json!(instance.id));
        instance.data = ctx.to_map();
        self.inner.store.upsert_instance(&instance).await?;

        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();
        let correlation = CorrelationId::from_uuid(instance.id.as_uuid());

        let mut completed: Vec<(Arc<dyn SagaStep>, StepRecord)> = Vec::new();
        let mut last_event_id: Option<EventId> = None;

        for (number, step) in definition.steps().iter().enumerate() {
            if self.take_cancellation(instance.id) {
                tracing::info!(
                    saga_id = %instance.id,
                    step = step.name(),
                    "cancellation honored at step boundary"
                );
                self.compensate(
                    &mut instance,
                    &ctx,
                    &mut completed,
                    format!("cancelled before step '{}'", step.name()),
                )
                .await?;
                self.record_duration(saga_start);
                return Ok(instance.id);
            }

            instance.current_step = number;
            instance.touch();
            self.inner.store.upsert_instance(&instance).await?;

            let mut record = StepRecord::new(instance.id, number, step.name());
            self.inner.store.upsert_step(&record).await?;

            tracing::info!(saga_id = %instance.id, step = step.name(), "saga step started");
            let (attempts, result) = self.execute_with_retries(step.as_ref(), &ctx).await;

            match result {
                Ok(outcome) => {
                    record.mark_completed(attempts);
                    self.inner.store.upsert_step(&record).await?;

                    ctx.merge(outcome.context);
                    instance.data = ctx.to_map();
                    instance.touch();
                    self.inner.store.upsert_instance(&instance).await?;

                    if let Some(payload) = outcome.event {
                        let mut builder = payload
                            .record_builder()?
                            .correlation_id(correlation)
                            .metadata("saga_type", serde_json::json!(saga_type))
                            .metadata("step", serde_json::json!(step.name()));
                        if let Some(cause) = last_event_id {
                            builder = builder.causation_id(cause);
                        }
                        let event_id = self.inner.bus.publish(builder.build()).await?;
                        last_event_id = Some(event_id);
                    }

                    completed.push((Arc::clone(step), record));
                }
                Err(error) => {
                    tracing::warn!(
                        saga_id = %instance.id,
                        step = step.name(),
                        %error,
                        attempts,
                        "saga step failed"
                    );
                    record.mark_failed(attempts, error.to_string());
                    self.inner.store.upsert_step(&record).await?;

                    self.compensate(
                        &mut instance,
                        &ctx,
                        &mut completed,
                        format!("step '{}' failed: {error}", step.name()),
                    )
                    .await?;
                    self.record_duration(saga_start);
                    return Ok(instance.id);
                }
            }
        }

        instance.mark_completed();
        self.inner.store.upsert_instance(&instance).await?;

        self.record_duration(saga_start);
        metrics::counter!("saga_completed").increment(1);
        tracing::info!(saga_id = %instance.id, "saga completed successfully");
        Ok(instance.id)
    }

    /// Marks an instance for no-further-steps.
    ///
    /// Honored only at the next step boundary: a step already executing
    /// finishes or fails on its own. The orchestrator then compensates
    /// completed steps and the saga ends `Failed`.
    pub async fn request_cancel(&self, saga_id: SagaId) -> Result<()> {
        let instance = self
            .inner
            .store
            .get_instance(saga_id)
            .await?
            .ok_or(SagaError::NotFound(saga_id))?;

        if !instance.status.is_terminal() {
            self.inner
                .cancellations
                .lock()
                .expect("cancellation lock poisoned")
                .insert(saga_id);
        }
        Ok(())
    }

    /// Loads a saga instance.
    pub async fn instance(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        self.inner.store.get_instance(saga_id).await
    }

    /// Loads a saga's step rows ordered by step number.
    pub async fn steps(&self, saga_id: SagaId) -> Result<Vec<StepRecord>> {
        self.inner.store.get_steps(saga_id).await
    }

    fn take_cancellation(&self, saga_id: SagaId) -> bool {
        self.inner
            .cancellations
            .lock()
            .expect("cancellation lock poisoned")
            .remove(&saga_id)
    }

    fn record_duration(&self, saga_start: std::time::Instant) {
        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
    }

    async fn execute_with_retries(
        &self,
        step: &dyn SagaStep,
        ctx: &SagaContext,
    ) -> (u32, std::result::Result<StepOutcome, StepError>) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match step.execute(ctx).await {
                Ok(outcome) => return (attempts, Ok(outcome)),
                Err(error) if attempts < self.inner.retry.max_attempts => {
                    tracing::warn!(
                        step = step.name(),
                        attempts,
                        %error,
                        "step attempt failed, retrying"
                    );
                    tokio::time::sleep(self.inner.retry.delay_for(attempts)).await;
                }
                Err(error) => return (attempts, Err(error)),
            }
        }
    }

    async fn compensate_with_retries(
        &self,
        step: &dyn SagaStep,
        ctx: &SagaContext,
    ) -> (u32, std::result::Result<(), StepError>) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match step.compensate(ctx).await {
                Ok(()) => return (attempts, Ok(())),
                Err(error) if attempts < self.inner.retry.max_attempts => {
                    tracing::warn!(
                        step = step.name(),
                        attempts,
                        %error,
                        "compensation attempt failed, retrying"
                    );
                    tokio::time::sleep(self.inner.retry.delay_for(attempts)).await;
                }
                Err(error) => return (attempts, Err(error)),
            }
        }
    }

    /// Runs compensations for completed steps in strictly reverse order,
    /// then marks the saga failed with the original error.
    async fn compensate(
        &self,
        instance: &mut SagaInstance,
        ctx: &SagaContext,
        completed: &mut [(Arc<dyn SagaStep>, StepRecord)],
        reason: String,
    ) -> Result<()> {
        instance.mark_compensating();
        self.inner.store.upsert_instance(instance).await?;

        for (step, record) in completed.iter_mut().rev() {
            if !step.has_compensation() {
                record.mark_compensated();
                self.inner.store.upsert_step(record).await?;
                tracing::debug!(
                    saga_id = %instance.id,
                    step = step.name(),
                    "no compensation registered"
                );
                continue;
            }

            let (attempts, result) = self.compensate_with_retries(step.as_ref(), ctx).await;
            match result {
                Ok(()) => {
                    record.mark_compensated();
                    self.inner.store.upsert_step(record).await?;
                    tracing::info!(saga_id = %instance.id, step = step.name(), "step compensated");
                }
                Err(error) => {
                    // Log-and-continue policy: the rollback keeps going and
                    // the saga still ends failed; this row records the
                    // unresolved inconsistency.
                    record.error_message = Some(format!(
                        "compensation failed after {attempts} attempts: {error}"
                    ));
                    self.inner.store.upsert_step(record).await?;
                    metrics::counter!("saga_compensation_failures_total").increment(1);
                    tracing::error!(
                        saga_id = %instance.id,
                        step = step.name(),
                        %error,
                        "compensation failed, unresolved inconsistency"
                    );
                }
            }
        }

        instance.mark_failed(reason.clone());
        self.inner.store.upsert_instance(instance).await?;
        metrics::counter!("saga_failed").increment(1);
        tracing::warn!(saga_id = %instance.id, reason = %reason, "saga failed");
        Ok(())
    }
}
