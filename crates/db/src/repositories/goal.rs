use sqlx::Row;

use soberly_core::domain::goal::{Goal, GoalId, GoalStatus};
use soberly_core::domain::user::UserId;

use super::{
    decode_error, decode_optional_timestamp, decode_timestamp, encode_timestamp, GoalRepository,
    RepositoryError,
};
use crate::DbPool;

const GOAL_COLUMNS: &str = "id, user_id, title, description, target_days, start_date, end_date,
                            status, completed_at, created_at";

pub struct SqlGoalRepository {
    pool: DbPool,
}

impl SqlGoalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_goal(row: &sqlx::sqlite::SqliteRow) -> Result<Goal, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let title: String = row.try_get("title").map_err(decode_error)?;
    let description: Option<String> = row.try_get("description").map_err(decode_error)?;
    let target_days: Option<i64> = row.try_get("target_days").map_err(decode_error)?;
    let start_date: String = row.try_get("start_date").map_err(decode_error)?;
    let end_date: Option<String> = row.try_get("end_date").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let completed_at: Option<String> = row.try_get("completed_at").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    let target_days = target_days
        .map(|days| {
            u32::try_from(days).map_err(|_| RepositoryError::Decode(format!("target_days: {days}")))
        })
        .transpose()?;
    let status = status
        .parse::<GoalStatus>()
        .map_err(|error| RepositoryError::Decode(format!("status: {error}")))?;

    Ok(Goal {
        id: GoalId(id),
        user_id: UserId(user_id),
        title,
        description,
        target_days,
        start_date: decode_timestamp("start_date", &start_date)?,
        end_date: decode_optional_timestamp("end_date", end_date)?,
        status,
        completed_at: decode_optional_timestamp("completed_at", completed_at)?,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl GoalRepository for SqlGoalRepository {
    async fn find(&self, user_id: &UserId, id: &GoalId) -> Result<Option<Goal>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE id = ? AND user_id = ?"
        ))
        .bind(&id.0)
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_goal).transpose()
    }

    async fn list_active(&self, user_id: &UserId) -> Result<Vec<Goal>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals
             WHERE user_id = ? AND status = 'active'
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_goal).collect()
    }

    async fn save(&self, goal: Goal) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO goals (id, user_id, title, description, target_days, start_date,
                                end_date, status, completed_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 target_days = excluded.target_days,
                 end_date = excluded.end_date,
                 status = excluded.status,
                 completed_at = excluded.completed_at
             WHERE goals.user_id = excluded.user_id",
        )
        .bind(&goal.id.0)
        .bind(goal.user_id.as_str())
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(goal.target_days.map(i64::from))
        .bind(encode_timestamp(goal.start_date))
        .bind(goal.end_date.map(encode_timestamp))
        .bind(goal.status.as_str())
        .bind(goal.completed_at.map(encode_timestamp))
        .bind(encode_timestamp(goal.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use soberly_core::domain::goal::{Goal, GoalId, GoalStatus};
    use soberly_core::domain::user::UserId;

    use super::SqlGoalRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::GoalRepository;

    fn goal(id: &str, user: &str, title: &str, offset_secs: i64) -> Goal {
        Goal::start(
            GoalId(id.to_string()),
            UserId(user.to_string()),
            title,
            None,
            Some(30),
            Utc::now() + Duration::seconds(offset_secs),
        )
    }

    #[tokio::test]
    async fn list_active_is_scoped_and_ordered() {
        let repo = SqlGoalRepository::new(setup().await);
        repo.save(goal("G-2", "user-1", "Run a 5k", 10)).await.expect("save");
        repo.save(goal("G-1", "user-1", "Meditate daily", 0)).await.expect("save");
        repo.save(goal("G-3", "user-2", "Someone else", 0)).await.expect("save");

        let active = repo.list_active(&UserId("user-1".to_string())).await.expect("list");
        let ids = active.iter().map(|goal| goal.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["G-1", "G-2"]);
    }

    #[tokio::test]
    async fn completed_goals_leave_the_active_list() {
        let repo = SqlGoalRepository::new(setup().await);
        let user = UserId("user-1".to_string());
        let mut meditate = goal("G-1", "user-1", "Meditate daily", 0);
        repo.save(meditate.clone()).await.expect("save");

        meditate.complete(Utc::now()).expect("complete");
        repo.save(meditate.clone()).await.expect("upsert");

        assert!(repo.list_active(&user).await.expect("list").is_empty());
        let stored = repo.find(&user, &meditate.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, GoalStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn another_user_cannot_overwrite_or_read_a_goal() {
        let repo = SqlGoalRepository::new(setup().await);
        repo.save(goal("G-1", "user-1", "Meditate daily", 0)).await.expect("save");

        let mut hijack = goal("G-1", "user-2", "Hijacked", 0);
        hijack.status = GoalStatus::Completed;
        repo.save(hijack).await.expect("conflicting save is a no-op");

        let owner = UserId("user-1".to_string());
        let stored = repo.find(&owner, &GoalId("G-1".to_string())).await.expect("find");
        assert_eq!(stored.map(|goal| goal.title), Some("Meditate daily".to_string()));
        let foreign = repo
            .find(&UserId("user-2".to_string()), &GoalId("G-1".to_string()))
            .await
            .expect("find");
        assert!(foreign.is_none());
    }
}
