use sqlx::Row;

use soberly_core::domain::coping::{activity_key, CopingActivity, CopingActivityId};
use soberly_core::domain::user::UserId;

use super::{
    decode_error, decode_timestamp, encode_timestamp, CopingActivityRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlCopingActivityRepository {
    pool: DbPool,
}

impl SqlCopingActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_activity(row: &sqlx::sqlite::SqliteRow) -> Result<CopingActivity, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let activity_name: String = row.try_get("activity_name").map_err(decode_error)?;
    let category: Option<String> = row.try_get("category").map_err(decode_error)?;
    let times_used: i64 = row.try_get("times_used").map_err(decode_error)?;
    let last_used_at: String = row.try_get("last_used_at").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(CopingActivity {
        id: CopingActivityId(id),
        user_id: UserId(user_id),
        activity_name,
        category,
        times_used: u32::try_from(times_used)
            .map_err(|_| RepositoryError::Decode(format!("times_used: {times_used}")))?,
        last_used_at: decode_timestamp("last_used_at", &last_used_at)?,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl CopingActivityRepository for SqlCopingActivityRepository {
    async fn record_use(
        &self,
        activity: CopingActivity,
    ) -> Result<CopingActivity, RepositoryError> {
        let row = sqlx::query(
            "INSERT INTO coping_activities (id, user_id, activity_name, activity_key, category,
                                            times_used, last_used_at, created_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT(user_id, activity_key) DO UPDATE SET
                 times_used = coping_activities.times_used + 1,
                 last_used_at = excluded.last_used_at,
                 category = COALESCE(excluded.category, coping_activities.category)
             RETURNING id, user_id, activity_name, category, times_used, last_used_at, created_at",
        )
        .bind(&activity.id.0)
        .bind(activity.user_id.as_str())
        .bind(activity.activity_name.trim())
        .bind(activity_key(&activity.activity_name))
        .bind(&activity.category)
        .bind(encode_timestamp(activity.last_used_at))
        .bind(encode_timestamp(activity.created_at))
        .fetch_one(&self.pool)
        .await?;

        row_to_activity(&row)
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<CopingActivity>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, activity_name, category, times_used, last_used_at, created_at
             FROM coping_activities
             WHERE user_id = ?
             ORDER BY times_used DESC, activity_key ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_activity).collect()
    }
}
