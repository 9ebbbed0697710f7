use sqlx::Row;

use soberly_core::domain::user::UserId;
use soberly_core::observability::ObservabilityRecord;

use super::{
    decode_error, decode_timestamp, encode_timestamp, ObservabilityRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlObservabilityRepository {
    pool: DbPool,
}

impl SqlObservabilityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ObservabilityRecord, RepositoryError> {
    let record_id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let function_name: String = row.try_get("function_name").map_err(decode_error)?;
    let tools_called: String = row.try_get("tools_called").map_err(decode_error)?;
    let response_summary: String = row.try_get("response_summary").map_err(decode_error)?;
    let response_time_ms: i64 = row.try_get("response_time_ms").map_err(decode_error)?;
    let model_used: String = row.try_get("model_used").map_err(decode_error)?;
    let intervention_triggered: bool =
        row.try_get("intervention_triggered").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    let tools_called = serde_json::from_str::<Vec<String>>(&tools_called)
        .map_err(|error| RepositoryError::Decode(format!("tools_called: {error}")))?;

    Ok(ObservabilityRecord {
        record_id,
        user_id: UserId(user_id),
        function_name,
        tools_called,
        response_summary,
        response_time_ms: u64::try_from(response_time_ms).map_err(|_| {
            RepositoryError::Decode(format!("response_time_ms: {response_time_ms}"))
        })?,
        model_used,
        intervention_triggered,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl ObservabilityRepository for SqlObservabilityRepository {
    async fn append(&self, record: ObservabilityRecord) -> Result<(), RepositoryError> {
        let tools_called = serde_json::to_string(&record.tools_called)
            .map_err(|error| RepositoryError::Decode(format!("tools_called: {error}")))?;

        sqlx::query(
            "INSERT INTO ai_observability_logs (id, user_id, function_name, tools_called,
                                                response_summary, response_time_ms, model_used,
                                                intervention_triggered, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.record_id)
        .bind(record.user_id.as_str())
        .bind(&record.function_name)
        .bind(tools_called)
        .bind(&record.response_summary)
        .bind(i64::try_from(record.response_time_ms).unwrap_or(i64::MAX))
        .bind(&record.model_used)
        .bind(record.intervention_triggered)
        .bind(encode_timestamp(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<ObservabilityRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, function_name, tools_called, response_summary,
                    response_time_ms, model_used, intervention_triggered, created_at
             FROM ai_observability_logs WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}
