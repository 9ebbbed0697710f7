use chrono::{DateTime, Utc};
use sqlx::Row;

use soberly_core::domain::biometrics::{BiometricLog, BiometricLogId};
use soberly_core::domain::user::UserId;

use super::{
    decode_error, decode_timestamp, encode_timestamp, BiometricRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlBiometricRepository {
    pool: DbPool,
}

impl SqlBiometricRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn optional_u32(column: &str, value: Option<i64>) -> Result<Option<u32>, RepositoryError> {
    value
        .map(|raw| {
            u32::try_from(raw).map_err(|_| RepositoryError::Decode(format!("{column}: {raw}")))
        })
        .transpose()
}

fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> Result<BiometricLog, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let sleep_hours: Option<f64> = row.try_get("sleep_hours").map_err(decode_error)?;
    let steps: Option<i64> = row.try_get("steps").map_err(decode_error)?;
    let stress_level: Option<f64> = row.try_get("stress_level").map_err(decode_error)?;
    let heart_rate: Option<i64> = row.try_get("heart_rate").map_err(decode_error)?;
    let logged_at: String = row.try_get("logged_at").map_err(decode_error)?;

    Ok(BiometricLog {
        id: BiometricLogId(id),
        user_id: UserId(user_id),
        sleep_hours,
        steps: optional_u32("steps", steps)?,
        stress_level,
        heart_rate: optional_u32("heart_rate", heart_rate)?,
        logged_at: decode_timestamp("logged_at", &logged_at)?,
    })
}

#[async_trait::async_trait]
impl BiometricRepository for SqlBiometricRepository {
    async fn insert(&self, log: BiometricLog) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO biometric_logs (id, user_id, sleep_hours, steps, stress_level,
                                         heart_rate, logged_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.id.0)
        .bind(log.user_id.as_str())
        .bind(log.sleep_hours)
        .bind(log.steps.map(i64::from))
        .bind(log.stress_level)
        .bind(log.heart_rate.map(i64::from))
        .bind(encode_timestamp(log.logged_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<BiometricLog>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, sleep_hours, steps, stress_level, heart_rate, logged_at
             FROM biometric_logs
             WHERE user_id = ? AND logged_at >= ?
             ORDER BY logged_at DESC",
        )
        .bind(user_id.as_str())
        .bind(encode_timestamp(since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_log).collect()
    }
}
