//! PostgreSQL-backed saga store.

use async_trait::async_trait;
use common::AggregateId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, SagaError};
use crate::instance::{SagaId, SagaInstance, StepRecord};
use crate::state::{SagaStatus, StepStatus};
use crate::store::SagaStore;

/// PostgreSQL implementation of [`SagaStore`].
///
/// Uses the `sagas` and `saga_steps` tables; every write is a single-row
/// `INSERT ... ON CONFLICT DO UPDATE` keyed by primary ID.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn decode_error(message: String) -> SagaError {
        SagaError::Persistence(sqlx::Error::Decode(message.into()))
    }

    fn row_to_instance(row: PgRow) -> Result<SagaInstance> {
        let status_text: String = row.try_get("status").map_err(SagaError::Persistence)?;
        let status = SagaStatus::parse(&status_text)
            .ok_or_else(|| Self::decode_error(format!("unknown saga status '{status_text}'")))?;
        let data_json: serde_json::Value = row.try_get("data").map_err(SagaError::Persistence)?;
        let data = match data_json {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(Self::decode_error(format!(
                    "saga data is not an object: {other}"
                )));
            }
        };

        Ok(SagaInstance {
            id: SagaId::from_uuid(row.try_get::<Uuid, _>("id")?),
            saga_type: row.try_get("saga_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            status,
            current_step: row.try_get::<i32, _>("current_step")? as usize,
            data,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn row_to_step(row: PgRow) -> Result<StepRecord> {
        let status_text: String = row.try_get("status").map_err(SagaError::Persistence)?;
        let status = StepStatus::parse(&status_text)
            .ok_or_else(|| Self::decode_error(format!("unknown step status '{status_text}'")))?;

        Ok(StepRecord {
            id: row.try_get("id")?,
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            step_number: row.try_get::<i32, _>("step_number")? as usize,
            step_name: row.try_get("step_name")?,
            status,
            attempt_count: row.try_get::<i32, _>("attempt_count")? as u32,
            error_message: row.try_get("error_message")?,
            executed_at: row.try_get("executed_at")?,
            compensated_at: row.try_get("compensated_at")?,
        })
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn upsert_instance(&self, instance: &SagaInstance) -> Result<()> {
        let data_json = serde_json::Value::Object(instance.data.clone());

        sqlx::query(
            r#"
            INSERT INTO sagas (id, saga_type, aggregate_id, status, current_step, data,
                               error_message, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                current_step = EXCLUDED.current_step,
                data = EXCLUDED.data,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(instance.id.as_uuid())
        .bind(&instance.saga_type)
        .bind(instance.aggregate_id.as_uuid())
        .bind(instance.status.as_str())
        .bind(instance.current_step as i32)
        .bind(data_json)
        .bind(&instance.error_message)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .bind(instance.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_step(&self, step: &StepRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_steps (id, saga_id, step_number, step_name, status,
                                    attempt_count, error_message, executed_at, compensated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (saga_id, step_number) DO UPDATE SET
                status = EXCLUDED.status,
                attempt_count = EXCLUDED.attempt_count,
                error_message = EXCLUDED.error_message,
                executed_at = EXCLUDED.executed_at,
                compensated_at = EXCLUDED.compensated_at
            "#,
        )
        .bind(step.id)
        .bind(step.saga_id.as_uuid())
        .bind(step.step_number as i32)
        .bind(&step.step_name)
        .bind(step.status.as_str())
        .bind(step.attempt_count as i32)
        .bind(&step.error_message)
        .bind(step.executed_at)
        .bind(step.compensated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_instance(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        let row = sqlx::query(
            r#"
            SELECT id, saga_type, aggregate_id, status, current_step, data,
                   error_message, created_at, updated_at, completed_at
            FROM sagas
            WHERE id = $1
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_instance).transpose()
    }

    async fn get_steps(&self, saga_id: SagaId) -> Result<Vec<StepRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, saga_id, step_number, step_name, status,
                   attempt_count, error_message, executed_at, compensated_at
            FROM saga_steps
            WHERE saga_id = $1
            ORDER BY step_number ASC
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_step).collect()
    }

    async fn list_by_status(&self, status: SagaStatus) -> Result<Vec<SagaInstance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, saga_type, aggregate_id, status, current_step, data,
                   error_message, created_at, updated_at, completed_at
            FROM sagas
            WHERE status = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_instance).collect()
    }
}
