//! PostgreSQL saga store integration tests
//!
//! Run with:
//!
//! ```bash
//! cargo test -p saga --test postgres_store -- --test-threads=1
//! ```

use std::sync::Arc;

use common::AggregateId;
use saga::{PostgresSagaStore, SagaInstance, SagaStatus, SagaStore, StepRecord, StepStatus};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/002_create_saga_tables.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresSagaStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE saga_steps, sagas")
        .execute(&pool)
        .await
        .unwrap();

    PostgresSagaStore::new(pool)
}

fn instance() -> SagaInstance {
    let mut data = serde_json::Map::new();
    data.insert("slug".to_string(), serde_json::json!("save-the-park"));
    SagaInstance::new("campaign_creation", AggregateId::new(), data)
}

#[tokio::test]
#[serial]
async fn instance_upsert_roundtrip() {
    let store = get_test_store().await;
    let mut saga = instance();

    store.upsert_instance(&saga).await.unwrap();

    let loaded = store.get_instance(saga.id).await.unwrap().unwrap();
    assert_eq!(loaded.saga_type, "campaign_creation");
    assert_eq!(loaded.status, SagaStatus::Pending);
    assert_eq!(loaded.data["slug"], "save-the-park");

    saga.mark_failed("step 'promote_owner_role' failed: role service unavailable");
    store.upsert_instance(&saga).await.unwrap();

    let loaded = store.get_instance(saga.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, SagaStatus::Failed);
    assert!(loaded.completed_at.is_some());
    assert!(
        loaded
            .error_message
            .as_deref()
            .unwrap()
            .contains("role service unavailable")
    );
}

#[tokio::test]
#[serial]
async fn step_rows_upsert_by_saga_and_number() {
    let store = get_test_store().await;
    let saga = instance();
    store.upsert_instance(&saga).await.unwrap();

    let mut step = StepRecord::new(saga.id, 0, "validate_slug");
    store.upsert_step(&step).await.unwrap();

    step.mark_completed(2);
    store.upsert_step(&step).await.unwrap();

    let steps = store.get_steps(saga.id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert_eq!(steps[0].attempt_count, 2);
    assert!(steps[0].executed_at.is_some());
}

#[tokio::test]
#[serial]
async fn steps_are_ordered_by_number() {
    let store = get_test_store().await;
    let saga = instance();
    store.upsert_instance(&saga).await.unwrap();

    for number in [2usize, 0, 1] {
        let step = StepRecord::new(saga.id, number, format!("step_{number}"));
        store.upsert_step(&step).await.unwrap();
    }

    let steps = store.get_steps(saga.id).await.unwrap();
    let numbers: Vec<_> = steps.iter().map(|s| s.step_number).collect();
    assert_eq!(numbers, vec![0, 1, 2]);
}

#[tokio::test]
#[serial]
async fn list_by_status_filters_instances() {
    let store = get_test_store().await;

    let pending = instance();
    let mut completed = instance();
    completed.mark_completed();

    store.upsert_instance(&pending).await.unwrap();
    store.upsert_instance(&completed).await.unwrap();

    let results = store.list_by_status(SagaStatus::Completed).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, completed.id);

    let results = store.list_by_status(SagaStatus::Compensating).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
#[serial]
async fn unknown_saga_is_absent() {
    let store = get_test_store().await;
    assert!(
        store
            .get_instance(saga::SagaId::new())
            .await
            .unwrap()
            .is_none()
    );
}
