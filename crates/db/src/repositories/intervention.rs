use sqlx::Row;

use soberly_core::domain::intervention::{Intervention, InterventionId};
use soberly_core::domain::user::UserId;

use super::{
    decode_error, decode_timestamp, encode_timestamp, InterventionRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlInterventionRepository {
    pool: DbPool,
}

impl SqlInterventionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_intervention(row: &sqlx::sqlite::SqliteRow) -> Result<Intervention, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let intervention_type: String = row.try_get("intervention_type").map_err(decode_error)?;
    let message: Option<String> = row.try_get("message").map_err(decode_error)?;
    let risk_level: Option<String> = row.try_get("risk_level").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(Intervention {
        id: InterventionId(id),
        user_id: UserId(user_id),
        intervention_type,
        message,
        risk_level,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl InterventionRepository for SqlInterventionRepository {
    async fn insert(&self, intervention: Intervention) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO interventions (id, user_id, intervention_type, message, risk_level,
                                        created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&intervention.id.0)
        .bind(intervention.user_id.as_str())
        .bind(&intervention.intervention_type)
        .bind(&intervention.message)
        .bind(&intervention.risk_level)
        .bind(encode_timestamp(intervention.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<Intervention>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, intervention_type, message, risk_level, created_at
             FROM interventions WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_intervention).collect()
    }
}
