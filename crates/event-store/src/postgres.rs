use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, CorrelationId, EventId, EventQuery, EventRecord, EventStoreError, Result,
    store::{EventStore, EventStream, validate_for_append},
};

/// PostgreSQL-backed event store implementation.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<EventRecord> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventRecord {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            schema_version: row.try_get("schema_version")?,
            timestamp: row.try_get("timestamp")?,
            correlation_id: row
                .try_get::<Option<Uuid>, _>("correlation_id")?
                .map(CorrelationId::from_uuid),
            causation_id: row
                .try_get::<Option<Uuid>, _>("causation_id")?
                .map(EventId::from_uuid),
            metadata,
            payload: row.try_get("payload")?,
        })
    }

    async fn insert_record<'e, E>(executor: E, record: &EventRecord) -> Result<bool>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let metadata_json = serde_json::to_value(&record.metadata)?;

        // ON CONFLICT DO NOTHING makes appends idempotent on event id.
        let result = sqlx::query(
            r#"
            INSERT INTO events (id, event_type, aggregate_id, schema_version, timestamp,
                                correlation_id, causation_id, metadata, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.event_id.as_uuid())
        .bind(&record.event_type)
        .bind(record.aggregate_id.as_uuid())
        .bind(&record.schema_version)
        .bind(record.timestamp)
        .bind(record.correlation_id.map(|id| id.as_uuid()))
        .bind(record.causation_id.map(|id| id.as_uuid()))
        .bind(metadata_json)
        .bind(&record.payload)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, record: EventRecord) -> Result<bool> {
        validate_for_append(std::slice::from_ref(&record))?;

        let appended = Self::insert_record(&self.pool, &record).await?;
        if appended {
            metrics::counter!("event_store_appends_total").increment(1);
        }
        Ok(appended)
    }

    async fn append_batch(&self, records: Vec<EventRecord>) -> Result<usize> {
        validate_for_append(&records)?;

        let mut tx = self.pool.begin().await?;
        let mut appended = 0;
        for record in &records {
            if Self::insert_record(&mut *tx, record).await? {
                appended += 1;
            }
        }
        tx.commit().await?;

        metrics::counter!("event_store_appends_total").increment(appended as u64);
        Ok(appended)
    }

    async fn query(&self, query: EventQuery) -> Result<Vec<EventRecord>> {
        let mut sql = String::from(
            "SELECT id, event_type, aggregate_id, schema_version, timestamp, correlation_id, causation_id, metadata, payload FROM events WHERE 1=1",
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.correlation_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND correlation_id = ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY timestamp ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(correlation) = query.correlation_id {
            sqlx_query = sqlx_query.bind(correlation.as_uuid());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn events_for_aggregate(&self, aggregate_id: AggregateId) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, schema_version, timestamp, correlation_id, causation_id, metadata, payload
            FROM events
            WHERE aggregate_id = $1
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn events_by_type(&self, event_type: &str) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, schema_version, timestamp, correlation_id, causation_id, metadata, payload
            FROM events
            WHERE event_type = $1
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn events_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, schema_version, timestamp, correlation_id, causation_id, metadata, payload
            FROM events
            WHERE correlation_id = $1
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(correlation_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn stream_all(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, schema_version, timestamp, correlation_id, causation_id, metadata, payload
            FROM events
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_record(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn event_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
