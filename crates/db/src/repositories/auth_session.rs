use chrono::{DateTime, Utc};
use sqlx::Row;

use soberly_core::domain::user::UserId;

use super::{
    decode_error, decode_timestamp, encode_timestamp, AuthSessionRepository, RepositoryError,
};
use crate::auth::AuthSession;
use crate::DbPool;

pub struct SqlAuthSessionRepository {
    pool: DbPool,
}

impl SqlAuthSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuthSessionRepository for SqlAuthSessionRepository {
    async fn insert(&self, session: AuthSession) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO auth_sessions (token_hash, user_id, expires_at, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token_hash)
        .bind(session.user_id.as_str())
        .bind(encode_timestamp(session.expires_at))
        .bind(encode_timestamp(session.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT token_hash, user_id, expires_at, created_at
             FROM auth_sessions WHERE token_hash = ? AND expires_at > ?",
        )
        .bind(token_hash)
        .bind(encode_timestamp(now))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token_hash: String = row.try_get("token_hash").map_err(decode_error)?;
        let user_id: String = row.try_get("user_id").map_err(decode_error)?;
        let expires_at: String = row.try_get("expires_at").map_err(decode_error)?;
        let created_at: String = row.try_get("created_at").map_err(decode_error)?;

        Ok(Some(AuthSession {
            token_hash,
            user_id: UserId(user_id),
            expires_at: decode_timestamp("expires_at", &expires_at)?,
            created_at: decode_timestamp("created_at", &created_at)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use soberly_core::domain::user::UserId;

    use super::SqlAuthSessionRepository;
    use crate::auth::{hash_token, issue_token};
    use crate::repositories::test_support::setup;
    use crate::repositories::AuthSessionRepository;

    #[tokio::test]
    async fn issued_token_resolves_until_expiry() {
        let repo = SqlAuthSessionRepository::new(setup().await);
        let now = Utc::now();
        let (token, session) = issue_token(UserId("user-1".to_string()), Duration::days(1), now);
        repo.insert(session).await.expect("insert");

        let found = repo.find_active(&hash_token(&token), now).await.expect("find");
        assert_eq!(found.map(|session| session.user_id), Some(UserId("user-1".to_string())));

        let expired =
            repo.find_active(&hash_token(&token), now + Duration::days(2)).await.expect("find");
        assert!(expired.is_none());
        assert!(repo.find_active(&hash_token("unknown"), now).await.expect("find").is_none());
    }
}
