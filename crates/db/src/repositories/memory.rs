use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use soberly_core::domain::biometrics::BiometricLog;
use soberly_core::domain::check_in::CheckIn;
use soberly_core::domain::coping::{activity_key, CopingActivity};
use soberly_core::domain::goal::{Goal, GoalId};
use soberly_core::domain::intervention::Intervention;
use soberly_core::domain::journal::JournalEntry;
use soberly_core::domain::profile::Profile;
use soberly_core::domain::user::UserId;
use soberly_core::observability::ObservabilityRecord;

use super::{
    AuthSessionRepository, BiometricRepository, CheckInRepository, CopingActivityRepository,
    GoalRepository, InterventionRepository, JournalRepository, ObservabilityRepository,
    ProfileRepository, RepositoryError,
};
use crate::auth::AuthSession;

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<String, Profile>>,
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(user_id.as_str()).cloned())
    }

    async fn save(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id.0.clone(), profile);
        Ok(())
    }
}

/// Keeps insertion order so that `list_active` mirrors creation order.
#[derive(Default)]
pub struct InMemoryGoalRepository {
    goals: RwLock<Vec<Goal>>,
}

#[async_trait::async_trait]
impl GoalRepository for InMemoryGoalRepository {
    async fn find(&self, user_id: &UserId, id: &GoalId) -> Result<Option<Goal>, RepositoryError> {
        let goals = self.goals.read().await;
        Ok(goals.iter().find(|goal| goal.id == *id && goal.user_id == *user_id).cloned())
    }

    async fn list_active(&self, user_id: &UserId) -> Result<Vec<Goal>, RepositoryError> {
        let goals = self.goals.read().await;
        let mut active = goals
            .iter()
            .filter(|goal| goal.user_id == *user_id && goal.is_active())
            .cloned()
            .collect::<Vec<_>>();
        active.sort_by_key(|goal| goal.created_at);
        Ok(active)
    }

    async fn save(&self, goal: Goal) -> Result<(), RepositoryError> {
        let mut goals = self.goals.write().await;
        match goals.iter_mut().find(|existing| existing.id == goal.id) {
            Some(existing) if existing.user_id == goal.user_id => *existing = goal,
            Some(_) => {}
            None => goals.push(goal),
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCheckInRepository {
    check_ins: RwLock<Vec<CheckIn>>,
}

#[async_trait::async_trait]
impl CheckInRepository for InMemoryCheckInRepository {
    async fn insert(&self, check_in: CheckIn) -> Result<(), RepositoryError> {
        let mut check_ins = self.check_ins.write().await;
        check_ins.push(check_in);
        Ok(())
    }

    async fn list_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>, RepositoryError> {
        let check_ins = self.check_ins.read().await;
        let mut matching = check_ins
            .iter()
            .filter(|check_in| check_in.user_id == *user_id && check_in.created_at >= since)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(matching)
    }

    async fn list_dates(&self, user_id: &UserId) -> Result<Vec<NaiveDate>, RepositoryError> {
        let check_ins = self.check_ins.read().await;
        Ok(check_ins
            .iter()
            .filter(|check_in| check_in.user_id == *user_id)
            .map(|check_in| check_in.created_at.date_naive())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryJournalRepository {
    entries: RwLock<Vec<JournalEntry>>,
}

#[async_trait::async_trait]
impl JournalRepository for InMemoryJournalRepository {
    async fn insert(&self, entry: JournalEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<JournalEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut matching = entries
            .iter()
            .filter(|entry| entry.user_id == *user_id)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryCopingActivityRepository {
    activities: RwLock<HashMap<(String, String), CopingActivity>>,
}

#[async_trait::async_trait]
impl CopingActivityRepository for InMemoryCopingActivityRepository {
    async fn record_use(
        &self,
        activity: CopingActivity,
    ) -> Result<CopingActivity, RepositoryError> {
        let mut activities = self.activities.write().await;
        let key = (activity.user_id.0.clone(), activity_key(&activity.activity_name));

        let stored = match activities.get_mut(&key) {
            Some(existing) => {
                existing.times_used += 1;
                existing.last_used_at = activity.last_used_at;
                if activity.category.is_some() {
                    existing.category = activity.category;
                }
                existing.clone()
            }
            None => {
                let inserted = CopingActivity {
                    activity_name: activity.activity_name.trim().to_string(),
                    times_used: 1,
                    ..activity
                };
                activities.insert(key, inserted.clone());
                inserted
            }
        };

        Ok(stored)
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<CopingActivity>, RepositoryError> {
        let activities = self.activities.read().await;
        let mut matching = activities
            .iter()
            .filter(|((owner, _), _)| owner == user_id.as_str())
            .map(|(_, activity)| activity.clone())
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            right
                .times_used
                .cmp(&left.times_used)
                .then_with(|| activity_key(&left.activity_name).cmp(&activity_key(&right.activity_name)))
        });
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryBiometricRepository {
    logs: RwLock<Vec<BiometricLog>>,
}

#[async_trait::async_trait]
impl BiometricRepository for InMemoryBiometricRepository {
    async fn insert(&self, log: BiometricLog) -> Result<(), RepositoryError> {
        let mut logs = self.logs.write().await;
        logs.push(log);
        Ok(())
    }

    async fn list_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<BiometricLog>, RepositoryError> {
        let logs = self.logs.read().await;
        let mut matching = logs
            .iter()
            .filter(|log| log.user_id == *user_id && log.logged_at >= since)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| right.logged_at.cmp(&left.logged_at));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryInterventionRepository {
    interventions: RwLock<Vec<Intervention>>,
}

#[async_trait::async_trait]
impl InterventionRepository for InMemoryInterventionRepository {
    async fn insert(&self, intervention: Intervention) -> Result<(), RepositoryError> {
        let mut interventions = self.interventions.write().await;
        interventions.push(intervention);
        Ok(())
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<Intervention>, RepositoryError> {
        let interventions = self.interventions.read().await;
        Ok(interventions.iter().filter(|entry| entry.user_id == *user_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryObservabilityRepository {
    records: RwLock<Vec<ObservabilityRecord>>,
}

#[async_trait::async_trait]
impl ObservabilityRepository for InMemoryObservabilityRepository {
    async fn append(&self, record: ObservabilityRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<ObservabilityRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|record| record.user_id == *user_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryAuthSessionRepository {
    sessions: RwLock<HashMap<String, AuthSession>>,
}

#[async_trait::async_trait]
impl AuthSessionRepository for InMemoryAuthSessionRepository {
    async fn insert(&self, session: AuthSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(token_hash).filter(|session| !session.is_expired(now)).cloned())
    }
}
