use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use soberly_core::domain::check_in::{CheckIn, CheckInId, Mood};
use soberly_core::domain::user::UserId;

use super::{decode_error, decode_timestamp, encode_timestamp, CheckInRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCheckInRepository {
    pool: DbPool,
}

impl SqlCheckInRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_check_in(row: &sqlx::sqlite::SqliteRow) -> Result<CheckIn, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let mood: String = row.try_get("mood").map_err(decode_error)?;
    let urge_intensity: Option<i64> = row.try_get("urge_intensity").map_err(decode_error)?;
    let notes: Option<String> = row.try_get("notes").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(CheckIn {
        id: CheckInId(id),
        user_id: UserId(user_id),
        mood: mood
            .parse::<Mood>()
            .map_err(|error| RepositoryError::Decode(format!("mood: {error}")))?,
        urge_intensity: urge_intensity
            .map(|value| {
                u8::try_from(value)
                    .map_err(|_| RepositoryError::Decode(format!("urge_intensity: {value}")))
            })
            .transpose()?,
        notes,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl CheckInRepository for SqlCheckInRepository {
    async fn insert(&self, check_in: CheckIn) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO check_ins (id, user_id, mood, urge_intensity, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&check_in.id.0)
        .bind(check_in.user_id.as_str())
        .bind(check_in.mood.as_str())
        .bind(check_in.urge_intensity.map(i64::from))
        .bind(&check_in.notes)
        .bind(encode_timestamp(check_in.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, mood, urge_intensity, notes, created_at
             FROM check_ins
             WHERE user_id = ? AND created_at >= ?
             ORDER BY created_at DESC",
        )
        .bind(user_id.as_str())
        .bind(encode_timestamp(since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_check_in).collect()
    }

    async fn list_dates(&self, user_id: &UserId) -> Result<Vec<NaiveDate>, RepositoryError> {
        let rows = sqlx::query("SELECT created_at FROM check_ins WHERE user_id = ?")
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let created_at: String = row.try_get("created_at").map_err(decode_error)?;
                Ok(decode_timestamp("created_at", &created_at)?.date_naive())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use soberly_core::domain::check_in::{CheckIn, CheckInId, Mood};
    use soberly_core::domain::user::UserId;

    use super::SqlCheckInRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::CheckInRepository;

    fn check_in(id: &str, user: &str, days_ago: i64, urge: Option<u8>) -> CheckIn {
        let now = Utc.with_ymd_and_hms(2026, 6, 20, 8, 0, 0).single().expect("valid date");
        CheckIn {
            id: CheckInId(id.to_string()),
            user_id: UserId(user.to_string()),
            mood: Mood::Good,
            urge_intensity: urge,
            notes: None,
            created_at: now - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn list_since_filters_window_and_user() {
        let repo = SqlCheckInRepository::new(setup().await);
        repo.insert(check_in("C-1", "user-1", 1, Some(3))).await.expect("insert");
        repo.insert(check_in("C-2", "user-1", 3, Some(6))).await.expect("insert");
        repo.insert(check_in("C-3", "user-1", 10, Some(9))).await.expect("insert");
        repo.insert(check_in("C-4", "user-2", 1, Some(1))).await.expect("insert");

        let since = Utc.with_ymd_and_hms(2026, 6, 13, 8, 0, 0).single().expect("valid date");
        let recent = repo.list_since(&UserId("user-1".to_string()), since).await.expect("list");

        let ids = recent.iter().map(|entry| entry.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["C-1", "C-2"]);
        assert_eq!(recent[0].urge_intensity, Some(3));
    }

    #[tokio::test]
    async fn list_dates_returns_calendar_days() {
        let repo = SqlCheckInRepository::new(setup().await);
        repo.insert(check_in("C-1", "user-1", 0, None)).await.expect("insert");
        repo.insert(check_in("C-2", "user-1", 2, None)).await.expect("insert");

        let mut dates = repo.list_dates(&UserId("user-1".to_string())).await.expect("dates");
        dates.sort();
        assert_eq!(
            dates.iter().map(|date| date.to_string()).collect::<Vec<_>>(),
            vec!["2026-06-18", "2026-06-20"]
        );
    }

    #[tokio::test]
    async fn out_of_range_urge_is_rejected_by_schema() {
        let repo = SqlCheckInRepository::new(setup().await);
        let result = repo.insert(check_in("C-1", "user-1", 0, Some(11))).await;
        assert!(result.is_err());
    }
}
