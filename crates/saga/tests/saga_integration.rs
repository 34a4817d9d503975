//! End-to-end campaign-creation saga scenarios: happy path, slug
//! rejection, mid-saga failure with reverse compensation, cancellation,
//! and the events left in the store afterwards.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{AggregateId, CorrelationId};
use domain::{Money, Slug};
use event_bus::EventBus;
use event_store::{EventStore, InMemoryEventStore};
use saga::campaign_creation::{self, CampaignCreationInput};
use saga::services::roles::DEFAULT_ROLE;
use saga::{
    CampaignDirectory, InMemoryCampaignDirectory, InMemoryProfileCounters,
    InMemoryProjectionInitializer, InMemoryRoleService, InMemorySagaStore, RetryPolicy,
    RoleService, SagaContext, SagaDefinition, SagaId, SagaOrchestrator, SagaRegistry, SagaStatus,
    SagaStep, ServiceError, StepError, StepOutcome, StepStatus,
};

struct Services {
    directory: Arc<InMemoryCampaignDirectory>,
    roles: Arc<InMemoryRoleService>,
    projections: Arc<InMemoryProjectionInitializer>,
    counters: Arc<InMemoryProfileCounters>,
}

fn setup() -> (SagaOrchestrator, Arc<InMemoryEventStore>, Services) {
    let directory = Arc::new(InMemoryCampaignDirectory::new());
    let roles = Arc::new(InMemoryRoleService::new());
    let projections = Arc::new(InMemoryProjectionInitializer::new());
    let counters = Arc::new(InMemoryProfileCounters::new());

    let mut registry = SagaRegistry::new();
    registry.register(campaign_creation::definition(
        directory.clone(),
        roles.clone(),
        projections.clone(),
        counters.clone(),
    ));

    let event_store = Arc::new(InMemoryEventStore::new());
    let bus = EventBus::standard(event_store.clone());
    let orchestrator = SagaOrchestrator::with_retry_policy(
        Arc::new(InMemorySagaStore::new()),
        bus,
        registry,
        RetryPolicy::no_retries(),
    );

    (
        orchestrator,
        event_store,
        Services {
            directory,
            roles,
            projections,
            counters,
        },
    )
}

fn input() -> CampaignCreationInput {
    CampaignCreationInput {
        campaign_id: AggregateId::new(),
        owner_id: AggregateId::new(),
        slug: Slug::new("save-the-park").unwrap(),
        title: "Save the Park".to_string(),
        goal: Money::from_cents(500_000),
        category: "community".to_string(),
    }
}

#[tokio::test]
async fn happy_path_completes_and_publishes_correlated_events() {
    let (orchestrator, event_store, services) = setup();
    let input = input();

    let saga_id = orchestrator
        .start(
            campaign_creation::SAGA_TYPE,
            input.campaign_id,
            input.context(),
        )
        .await
        .unwrap();

    let instance = orchestrator.instance(saga_id).await.unwrap().unwrap();
    assert_eq!(instance.status, SagaStatus::Completed);
    assert_eq!(instance.aggregate_id, input.campaign_id);

    let steps = orchestrator.steps(saga_id).await.unwrap();
    assert_eq!(steps.len(), 5);
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));

    // Side effects applied
    assert_eq!(services.directory.active_count(), 1);
    assert_eq!(
        services.roles.role_of(input.owner_id),
        campaign_creation::OWNER_ROLE
    );
    assert!(services.projections.has_campaign(input.campaign_id));
    assert_eq!(services.counters.campaigns_for(input.owner_id), 1);

    // Step events share the saga's correlation id and form a causal chain.
    let correlation = CorrelationId::from_uuid(saga_id.as_uuid());
    let events = event_store.events_by_correlation(correlation).await.unwrap();
    let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["campaign.created", "user.role_promoted"]);
    assert_eq!(events[1].causation_id, Some(events[0].event_id));
}

#[tokio::test]
async fn duplicate_slug_fails_fast_with_no_side_effects() {
    let (orchestrator, event_store, services) = setup();
    let input = input();
    services.directory.claim_slug(&input.slug);

    let saga_id = orchestrator
        .start(
            campaign_creation::SAGA_TYPE,
            input.campaign_id,
            input.context(),
        )
        .await
        .unwrap();

    let instance = orchestrator.instance(saga_id).await.unwrap().unwrap();
    assert_eq!(instance.status, SagaStatus::Failed);
    assert!(
        instance
            .error_message
            .as_deref()
            .unwrap()
            .contains("already taken")
    );

    // Step 1 failed; nothing ran, nothing to compensate.
    let steps = orchestrator.steps(saga_id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].step_name, campaign_creation::STEP_VALIDATE_SLUG);
    assert_eq!(steps[0].status, StepStatus::Failed);

    assert_eq!(services.directory.active_count(), 0);
    assert_eq!(services.roles.role_of(input.owner_id), DEFAULT_ROLE);
    assert_eq!(services.counters.campaigns_for(input.owner_id), 0);
    assert_eq!(event_store.event_count().await.unwrap(), 0);
}

/// Directory wrapper that logs compensations into a shared trace.
struct TracingDirectory {
    inner: Arc<InMemoryCampaignDirectory>,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl CampaignDirectory for TracingDirectory {
    async fn slug_exists(&self, slug: &Slug) -> Result<bool, ServiceError> {
        self.inner.slug_exists(slug).await
    }

    async fn create(&self, record: saga::CampaignRecord) -> Result<(), ServiceError> {
        self.inner.create(record).await
    }

    async fn soft_delete(
        &self,
        campaign_id: AggregateId,
        reason: &str,
    ) -> Result<(), ServiceError> {
        self.trace.lock().unwrap().push("soft_delete_campaign");
        self.inner.soft_delete(campaign_id, reason).await
    }
}

/// Role wrapper that logs reverts into a shared trace.
struct TracingRoles {
    inner: Arc<InMemoryRoleService>,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl RoleService for TracingRoles {
    async fn promote(&self, user_id: AggregateId, to_role: &str) -> Result<String, ServiceError> {
        self.inner.promote(user_id, to_role).await
    }

    async fn revert(&self, user_id: AggregateId, to_role: &str) -> Result<(), ServiceError> {
        self.trace.lock().unwrap().push("revert_role");
        self.inner.revert(user_id, to_role).await
    }
}

#[tokio::test]
async fn projection_failure_compensates_in_reverse_order() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let directory = Arc::new(InMemoryCampaignDirectory::new());
    let roles = Arc::new(InMemoryRoleService::new());
    let projections = Arc::new(InMemoryProjectionInitializer::new());
    let counters = Arc::new(InMemoryProfileCounters::new());

    projections.set_fail_on_seed(true);

    let mut registry = SagaRegistry::new();
    registry.register(campaign_creation::definition(
        Arc::new(TracingDirectory {
            inner: directory.clone(),
            trace: trace.clone(),
        }),
        Arc::new(TracingRoles {
            inner: roles.clone(),
            trace: trace.clone(),
        }),
        projections.clone(),
        counters.clone(),
    ));

    let event_store = Arc::new(InMemoryEventStore::new());
    let bus = EventBus::standard(event_store.clone());
    let orchestrator = SagaOrchestrator::with_retry_policy(
        Arc::new(InMemorySagaStore::new()),
        bus,
        registry,
        RetryPolicy::no_retries(),
    );

    let input = input();
    let saga_id = orchestrator
        .start(
            campaign_creation::SAGA_TYPE,
            input.campaign_id,
            input.context(),
        )
        .await
        .unwrap();

    let instance = orchestrator.instance(saga_id).await.unwrap().unwrap();
    assert_eq!(instance.status, SagaStatus::Failed);
    assert!(
        instance
            .error_message
            .as_deref()
            .unwrap()
            .contains(campaign_creation::STEP_INIT_PROJECTIONS)
    );

    // Step 3 compensated before step 2; step 1 had nothing to undo.
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["revert_role", "soft_delete_campaign"]
    );

    let steps = orchestrator.steps(saga_id).await.unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0].status, StepStatus::Compensated);
    assert_eq!(steps[1].status, StepStatus::Compensated);
    assert_eq!(steps[2].status, StepStatus::Compensated);
    assert_eq!(steps[3].status, StepStatus::Failed);

    // No orphaned partial state.
    assert!(directory.is_deleted(input.campaign_id));
    assert_eq!(directory.active_count(), 0);
    assert_eq!(roles.role_of(input.owner_id), DEFAULT_ROLE);
    assert!(!projections.has_campaign(input.campaign_id));
    assert_eq!(counters.campaigns_for(input.owner_id), 0);
}

#[tokio::test]
async fn counter_failure_still_removes_seeded_projections() {
    let (orchestrator, _event_store, services) = setup();
    services.counters.set_fail_on_increment(true);

    let input = input();
    let saga_id = orchestrator
        .start(
            campaign_creation::SAGA_TYPE,
            input.campaign_id,
            input.context(),
        )
        .await
        .unwrap();

    let instance = orchestrator.instance(saga_id).await.unwrap().unwrap();
    assert_eq!(instance.status, SagaStatus::Failed);

    assert!(!services.projections.has_campaign(input.campaign_id));
    assert!(services.directory.is_deleted(input.campaign_id));
    assert_eq!(services.roles.role_of(input.owner_id), DEFAULT_ROLE);
}

#[tokio::test]
async fn compensation_failure_is_logged_and_the_rest_still_runs() {
    struct StubbornStep;

    #[async_trait]
    impl SagaStep for StubbornStep {
        fn name(&self) -> &'static str {
            "stubborn"
        }

        async fn execute(&self, _ctx: &SagaContext) -> Result<StepOutcome, StepError> {
            Ok(StepOutcome::new())
        }

        async fn compensate(&self, _ctx: &SagaContext) -> Result<(), StepError> {
            Err(StepError::new("undo keeps failing"))
        }
    }

    struct RecordingStep {
        undone: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl SagaStep for RecordingStep {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn execute(&self, _ctx: &SagaContext) -> Result<StepOutcome, StepError> {
            Ok(StepOutcome::new())
        }

        async fn compensate(&self, _ctx: &SagaContext) -> Result<(), StepError> {
            *self.undone.lock().unwrap() = true;
            Ok(())
        }
    }

    struct FailingStep;

    #[async_trait]
    impl SagaStep for FailingStep {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn execute(&self, _ctx: &SagaContext) -> Result<StepOutcome, StepError> {
            Err(StepError::new("forward failure"))
        }
    }

    let undone = Arc::new(Mutex::new(false));
    let mut registry = SagaRegistry::new();
    registry.register(
        SagaDefinition::new("double_failure")
            .step(Arc::new(RecordingStep {
                undone: undone.clone(),
            }))
            .step(Arc::new(StubbornStep))
            .step(Arc::new(FailingStep)),
    );

    let bus = EventBus::standard(Arc::new(InMemoryEventStore::new()));
    let orchestrator = SagaOrchestrator::with_retry_policy(
        Arc::new(InMemorySagaStore::new()),
        bus,
        registry,
        RetryPolicy::no_retries(),
    );

    let saga_id = orchestrator
        .start("double_failure", AggregateId::new(), serde_json::json!({}))
        .await
        .unwrap();

    let instance = orchestrator.instance(saga_id).await.unwrap().unwrap();
    // The saga still ends failed with the original step error.
    assert_eq!(instance.status, SagaStatus::Failed);
    assert!(
        instance
            .error_message
            .as_deref()
            .unwrap()
            .contains("forward failure")
    );

    // The failing compensation did not block the earlier step's rollback.
    assert!(*undone.lock().unwrap());

    let steps = orchestrator.steps(saga_id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Compensated);
    // The stubborn step stays completed, its row recording the failure.
    assert_eq!(steps[1].status, StepStatus::Completed);
    assert!(
        steps[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("undo keeps failing")
    );
}

#[tokio::test]
async fn cancellation_is_honored_at_the_next_step_boundary() {
    struct CancelAfterStep {
        orchestrator: Arc<Mutex<Option<SagaOrchestrator>>>,
        done: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl SagaStep for CancelAfterStep {
        fn name(&self) -> &'static str {
            "cancel_after"
        }

        async fn execute(&self, ctx: &SagaContext) -> Result<StepOutcome, StepError> {
            let saga_id: SagaId = ctx.get("saga_id")?;
            let orchestrator = self
                .orchestrator
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| StepError::new("orchestrator not wired"))?;
            orchestrator
                .request_cancel(saga_id)
                .await
                .map_err(StepError::new)?;
            Ok(StepOutcome::new())
        }

        async fn compensate(&self, _ctx: &SagaContext) -> Result<(), StepError> {
            *self.done.lock().unwrap() = true;
            Ok(())
        }
    }

    struct NeverReachedStep {
        ran: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl SagaStep for NeverReachedStep {
        fn name(&self) -> &'static str {
            "never_reached"
        }

        async fn execute(&self, _ctx: &SagaContext) -> Result<StepOutcome, StepError> {
            *self.ran.lock().unwrap() = true;
            Ok(StepOutcome::new())
        }
    }

    let slot = Arc::new(Mutex::new(None));
    let compensated = Arc::new(Mutex::new(false));
    let second_ran = Arc::new(Mutex::new(false));

    let mut registry = SagaRegistry::new();
    registry.register(
        SagaDefinition::new("cancellable")
            .step(Arc::new(CancelAfterStep {
                orchestrator: slot.clone(),
                done: compensated.clone(),
            }))
            .step(Arc::new(NeverReachedStep {
                ran: second_ran.clone(),
            })),
    );

    let bus = EventBus::standard(Arc::new(InMemoryEventStore::new()));
    let orchestrator = SagaOrchestrator::with_retry_policy(
        Arc::new(InMemorySagaStore::new()),
        bus,
        registry,
        RetryPolicy::no_retries(),
    );
    *slot.lock().unwrap() = Some(orchestrator.clone());

    let saga_id = orchestrator
        .start("cancellable", AggregateId::new(), serde_json::json!({}))
        .await
        .unwrap();

    let instance = orchestrator.instance(saga_id).await.unwrap().unwrap();
    assert_eq!(instance.status, SagaStatus::Failed);
    assert!(
        instance
            .error_message
            .as_deref()
            .unwrap()
            .contains("cancelled")
    );

    // The first step finished and was compensated; the second never ran.
    assert!(*compensated.lock().unwrap());
    assert!(!*second_ran.lock().unwrap());
}

#[tokio::test]
async fn concurrent_instances_do_not_interfere() {
    let (orchestrator, _event_store, services) = setup();

    let first = CampaignCreationInput {
        slug: Slug::new("first-campaign").unwrap(),
        ..input()
    };
    let second = CampaignCreationInput {
        slug: Slug::new("second-campaign").unwrap(),
        ..input()
    };

    let (a, b) = tokio::join!(
        orchestrator.start(
            campaign_creation::SAGA_TYPE,
            first.campaign_id,
            first.context(),
        ),
        orchestrator.start(
            campaign_creation::SAGA_TYPE,
            second.campaign_id,
            second.context(),
        ),
    );

    let a = orchestrator.instance(a.unwrap()).await.unwrap().unwrap();
    let b = orchestrator.instance(b.unwrap()).await.unwrap().unwrap();
    assert_eq!(a.status, SagaStatus::Completed);
    assert_eq!(b.status, SagaStatus::Completed);
    assert_eq!(services.directory.active_count(), 2);
}
