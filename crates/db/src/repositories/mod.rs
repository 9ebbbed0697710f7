use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

use soberly_core::domain::biometrics::BiometricLog;
use soberly_core::domain::check_in::CheckIn;
use soberly_core::domain::coping::CopingActivity;
use soberly_core::domain::goal::{Goal, GoalId};
use soberly_core::domain::intervention::Intervention;
use soberly_core::domain::journal::JournalEntry;
use soberly_core::domain::profile::Profile;
use soberly_core::domain::user::UserId;
use soberly_core::observability::ObservabilityRecord;

use crate::auth::AuthSession;
use crate::DbPool;

pub mod auth_session;
pub mod biometric;
pub mod check_in;
pub mod coping;
pub mod goal;
pub mod intervention;
pub mod journal;
pub mod memory;
pub mod observability;
pub mod profile;

pub use auth_session::SqlAuthSessionRepository;
pub use biometric::SqlBiometricRepository;
pub use check_in::SqlCheckInRepository;
pub use coping::SqlCopingActivityRepository;
pub use goal::SqlGoalRepository;
pub use intervention::SqlInterventionRepository;
pub use journal::SqlJournalRepository;
pub use memory::{
    InMemoryAuthSessionRepository, InMemoryBiometricRepository, InMemoryCheckInRepository,
    InMemoryCopingActivityRepository, InMemoryGoalRepository, InMemoryInterventionRepository,
    InMemoryJournalRepository, InMemoryObservabilityRepository, InMemoryProfileRepository,
};
pub use observability::SqlObservabilityRepository;
pub use profile::SqlProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError>;
    async fn save(&self, profile: Profile) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait GoalRepository: Send + Sync {
    async fn find(&self, user_id: &UserId, id: &GoalId) -> Result<Option<Goal>, RepositoryError>;

    /// Active goals in creation order.
    async fn list_active(&self, user_id: &UserId) -> Result<Vec<Goal>, RepositoryError>;

    async fn save(&self, goal: Goal) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CheckInRepository: Send + Sync {
    async fn insert(&self, check_in: CheckIn) -> Result<(), RepositoryError>;

    /// Check-ins created at or after `since`, newest first.
    async fn list_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>, RepositoryError>;

    /// UTC calendar dates of every check-in, unordered and possibly repeated.
    async fn list_dates(&self, user_id: &UserId) -> Result<Vec<NaiveDate>, RepositoryError>;
}

#[async_trait]
pub trait JournalRepository: Send + Sync {
    async fn insert(&self, entry: JournalEntry) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<JournalEntry>, RepositoryError>;
}

#[async_trait]
pub trait CopingActivityRepository: Send + Sync {
    /// Inserts the activity with `times_used = 1`, or bumps the counter of the
    /// existing activity with the same case-folded name. Returns the stored row.
    async fn record_use(
        &self,
        activity: CopingActivity,
    ) -> Result<CopingActivity, RepositoryError>;

    async fn list(&self, user_id: &UserId) -> Result<Vec<CopingActivity>, RepositoryError>;
}

#[async_trait]
pub trait BiometricRepository: Send + Sync {
    async fn insert(&self, log: BiometricLog) -> Result<(), RepositoryError>;

    async fn list_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<BiometricLog>, RepositoryError>;
}

#[async_trait]
pub trait InterventionRepository: Send + Sync {
    async fn insert(&self, intervention: Intervention) -> Result<(), RepositoryError>;
    async fn list(&self, user_id: &UserId) -> Result<Vec<Intervention>, RepositoryError>;
}

#[async_trait]
pub trait ObservabilityRepository: Send + Sync {
    async fn append(&self, record: ObservabilityRecord) -> Result<(), RepositoryError>;
    async fn list(&self, user_id: &UserId) -> Result<Vec<ObservabilityRecord>, RepositoryError>;
}

#[async_trait]
pub trait AuthSessionRepository: Send + Sync {
    async fn insert(&self, session: AuthSession) -> Result<(), RepositoryError>;

    /// The unexpired session for `token_hash`, if any.
    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, RepositoryError>;
}

/// Every store the chat backend talks to, behind shared trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ProfileRepository>,
    pub goals: Arc<dyn GoalRepository>,
    pub check_ins: Arc<dyn CheckInRepository>,
    pub journal: Arc<dyn JournalRepository>,
    pub coping: Arc<dyn CopingActivityRepository>,
    pub biometrics: Arc<dyn BiometricRepository>,
    pub interventions: Arc<dyn InterventionRepository>,
    pub observability: Arc<dyn ObservabilityRepository>,
    pub auth_sessions: Arc<dyn AuthSessionRepository>,
}

impl Repositories {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            profiles: Arc::new(SqlProfileRepository::new(pool.clone())),
            goals: Arc::new(SqlGoalRepository::new(pool.clone())),
            check_ins: Arc::new(SqlCheckInRepository::new(pool.clone())),
            journal: Arc::new(SqlJournalRepository::new(pool.clone())),
            coping: Arc::new(SqlCopingActivityRepository::new(pool.clone())),
            biometrics: Arc::new(SqlBiometricRepository::new(pool.clone())),
            interventions: Arc::new(SqlInterventionRepository::new(pool.clone())),
            observability: Arc::new(SqlObservabilityRepository::new(pool.clone())),
            auth_sessions: Arc::new(SqlAuthSessionRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            profiles: Arc::new(InMemoryProfileRepository::default()),
            goals: Arc::new(InMemoryGoalRepository::default()),
            check_ins: Arc::new(InMemoryCheckInRepository::default()),
            journal: Arc::new(InMemoryJournalRepository::default()),
            coping: Arc::new(InMemoryCopingActivityRepository::default()),
            biometrics: Arc::new(InMemoryBiometricRepository::default()),
            interventions: Arc::new(InMemoryInterventionRepository::default()),
            observability: Arc::new(InMemoryObservabilityRepository::default()),
            auth_sessions: Arc::new(InMemoryAuthSessionRepository::default()),
        }
    }
}

/// Fixed-width UTC timestamps so that text ordering in SQLite matches time ordering.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| decode_timestamp(column, &value)).transpose()
}

pub(crate) fn decode_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{connect_with_settings, migrations, DbPool};

    pub async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }
}
