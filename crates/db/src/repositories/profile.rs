use sqlx::Row;

use soberly_core::domain::profile::Profile;
use soberly_core::domain::user::UserId;

use super::{
    decode_date, decode_error, decode_timestamp, encode_timestamp, ProfileRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, RepositoryError> {
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let display_name: Option<String> = row.try_get("display_name").map_err(decode_error)?;
    let sobriety_start_date: Option<String> =
        row.try_get("sobriety_start_date").map_err(decode_error)?;
    let current_streak: i64 = row.try_get("current_streak").map_err(decode_error)?;
    let longest_streak: i64 = row.try_get("longest_streak").map_err(decode_error)?;
    let last_check_in_date: Option<String> =
        row.try_get("last_check_in_date").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Profile {
        user_id: UserId(user_id),
        display_name,
        sobriety_start_date: sobriety_start_date
            .map(|raw| decode_date("sobriety_start_date", &raw))
            .transpose()?,
        current_streak: u32::try_from(current_streak)
            .map_err(|_| RepositoryError::Decode(format!("current_streak: {current_streak}")))?,
        longest_streak: u32::try_from(longest_streak)
            .map_err(|_| RepositoryError::Decode(format!("longest_streak: {longest_streak}")))?,
        last_check_in_date: last_check_in_date
            .map(|raw| decode_date("last_check_in_date", &raw))
            .transpose()?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, display_name, sobriety_start_date, current_streak, longest_streak,
                    last_check_in_date, updated_at
             FROM profiles WHERE user_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn save(&self, profile: Profile) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO profiles (user_id, display_name, sobriety_start_date, current_streak,
                                   longest_streak, last_check_in_date, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 sobriety_start_date = excluded.sobriety_start_date,
                 current_streak = excluded.current_streak,
                 longest_streak = excluded.longest_streak,
                 last_check_in_date = excluded.last_check_in_date,
                 updated_at = excluded.updated_at",
        )
        .bind(profile.user_id.as_str())
        .bind(&profile.display_name)
        .bind(profile.sobriety_start_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(i64::from(profile.current_streak))
        .bind(i64::from(profile.longest_streak))
        .bind(profile.last_check_in_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(encode_timestamp(profile.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use soberly_core::domain::profile::Profile;
    use soberly_core::domain::user::UserId;

    use super::SqlProfileRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::ProfileRepository;

    #[tokio::test]
    async fn save_and_find_round_trips_dates() {
        let repo = SqlProfileRepository::new(setup().await);
        let mut profile = Profile::new(UserId("user-1".to_string()), Utc::now());
        profile.display_name = Some("Sam".to_string());
        profile.sobriety_start_date = NaiveDate::from_ymd_opt(2026, 1, 15);
        profile.current_streak = 4;
        profile.longest_streak = 9;

        repo.save(profile.clone()).await.expect("save");
        let found = repo.find(&profile.user_id).await.expect("find").expect("should exist");

        assert_eq!(found.sobriety_start_date, profile.sobriety_start_date);
        assert_eq!(found.current_streak, 4);
        assert_eq!(found.longest_streak, 9);
        assert_eq!(found.display_name.as_deref(), Some("Sam"));
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let repo = SqlProfileRepository::new(setup().await);
        let mut profile = Profile::new(UserId("user-1".to_string()), Utc::now());
        repo.save(profile.clone()).await.expect("save");

        profile.current_streak = 2;
        repo.save(profile.clone()).await.expect("upsert");

        let found = repo.find(&profile.user_id).await.expect("find").expect("should exist");
        assert_eq!(found.current_streak, 2);
        assert!(repo.find(&UserId("user-2".to_string())).await.expect("find").is_none());
    }
}
