//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, CorrelationId, EventQuery, EventRecord, EventStore, PostgresEventStore,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

#[ctor::ctor]
fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_events_table.sql"
            ))
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn create_test_event(aggregate_id: AggregateId, event_type: &str) -> EventRecord {
    EventRecord::builder()
        .aggregate_id(aggregate_id)
        .event_type(event_type)
        .schema_version("1.0.0")
        .payload_raw(serde_json::json!({"test": true}))
        .build()
}

#[tokio::test]
#[serial]
async fn append_and_retrieve_events() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let event = create_test_event(aggregate_id, "campaign.created");
    assert!(store.append(event).await.unwrap());

    let events = store.events_for_aggregate(aggregate_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "campaign.created");
    assert_eq!(events[0].schema_version, "1.0.0");
}

#[tokio::test]
#[serial]
async fn duplicate_event_id_is_not_stored_twice() {
    let store = get_test_store().await;
    let event = create_test_event(AggregateId::new(), "donation.completed");

    assert!(store.append(event.clone()).await.unwrap());
    assert!(!store.append(event.clone()).await.unwrap());

    let events = store.events_by_type("donation.completed").await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, event.event_id);
}

#[tokio::test]
#[serial]
async fn append_batch_skips_known_ids() {
    let store = get_test_store().await;
    let known = create_test_event(AggregateId::new(), "donation.completed");
    let fresh = create_test_event(AggregateId::new(), "donation.completed");

    store.append(known.clone()).await.unwrap();

    let appended = store.append_batch(vec![known, fresh]).await.unwrap();
    assert_eq!(appended, 1);
    assert_eq!(store.event_count().await.unwrap(), 2);
}

#[tokio::test]
#[serial]
async fn metadata_and_causation_roundtrip() {
    let store = get_test_store().await;
    let correlation = CorrelationId::new();
    let cause = event_store::EventId::new();

    let event = EventRecord::builder()
        .aggregate_id(AggregateId::new())
        .event_type("user.role_promoted")
        .schema_version("1.0.0")
        .correlation_id(correlation)
        .causation_id(cause)
        .metadata("actor", serde_json::json!("saga_orchestrator"))
        .payload_raw(serde_json::json!({"to_role": "campaign_owner"}))
        .build();

    store.append(event.clone()).await.unwrap();

    let events = store.events_by_correlation(correlation).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].causation_id, Some(cause));
    assert_eq!(
        events[0].metadata.get("actor"),
        Some(&serde_json::json!("saga_orchestrator"))
    );
}

#[tokio::test]
#[serial]
async fn query_filters_by_type_and_time() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();
    let base = chrono::Utc::now();

    for (offset, event_type) in [
        (-120i64, "donation.completed"),
        (-60, "donation.completed"),
        (-60, "campaign.created"),
    ] {
        let event = EventRecord::builder()
            .aggregate_id(aggregate_id)
            .event_type(event_type)
            .schema_version("1.0.0")
            .timestamp(base + chrono::Duration::seconds(offset))
            .payload_raw(serde_json::json!({}))
            .build();
        store.append(event).await.unwrap();
    }

    let query = EventQuery::for_event_type("donation.completed")
        .from_timestamp(base - chrono::Duration::seconds(90));
    let results = store.query(query).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].event_type, "donation.completed");
}

#[tokio::test]
#[serial]
async fn query_orders_by_timestamp() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();
    let base = chrono::Utc::now();

    // Insert out of order
    for offset in [30i64, 10, 20] {
        let event = EventRecord::builder()
            .aggregate_id(aggregate_id)
            .event_type("donation.completed")
            .schema_version("1.0.0")
            .timestamp(base + chrono::Duration::seconds(offset))
            .payload_raw(serde_json::json!({"offset": offset}))
            .build();
        store.append(event).await.unwrap();
    }

    let results = store
        .query(EventQuery::for_aggregate(aggregate_id))
        .await
        .unwrap();
    let offsets: Vec<i64> = results
        .iter()
        .map(|e| e.payload["offset"].as_i64().unwrap())
        .collect();
    assert_eq!(offsets, vec![10, 20, 30]);
}

#[tokio::test]
#[serial]
async fn query_limit_and_offset() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();
    let base = chrono::Utc::now();

    for i in 0..5i64 {
        let event = EventRecord::builder()
            .aggregate_id(aggregate_id)
            .event_type("donation.completed")
            .schema_version("1.0.0")
            .timestamp(base + chrono::Duration::seconds(i))
            .payload_raw(serde_json::json!({"i": i}))
            .build();
        store.append(event).await.unwrap();
    }

    let query = EventQuery::for_aggregate(aggregate_id).offset(1).limit(2);
    let results = store.query(query).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].payload["i"], 1);
    assert_eq!(results[1].payload["i"], 2);
}

#[tokio::test]
#[serial]
async fn stream_all_events_in_order() {
    use futures_util::StreamExt;

    let store = get_test_store().await;
    for _ in 0..3 {
        store
            .append(create_test_event(AggregateId::new(), "campaign.created"))
            .await
            .unwrap();
    }

    let stream = store.stream_all().await.unwrap();
    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.is_ok()));
}

#[tokio::test]
#[serial]
async fn event_count_tracks_appends() {
    let store = get_test_store().await;
    assert_eq!(store.event_count().await.unwrap(), 0);

    store
        .append(create_test_event(AggregateId::new(), "campaign.created"))
        .await
        .unwrap();
    assert_eq!(store.event_count().await.unwrap(), 1);
}
