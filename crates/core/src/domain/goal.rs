use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

pub const DEFAULT_TARGET_DAYS: u32 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(DomainError::InvariantViolation(format!("unknown goal status `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub target_days: Option<u32>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: GoalStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// A fresh active goal whose end date is `now + target_days`.
    pub fn start(
        id: GoalId,
        user_id: UserId,
        title: impl Into<String>,
        description: Option<String>,
        target_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        let days = target_days.unwrap_or(DEFAULT_TARGET_DAYS);
        Self {
            id,
            user_id,
            title: title.into(),
            description,
            target_days: Some(days),
            start_date: now,
            end_date: Some(now + Duration::days(i64::from(days))),
            status: GoalStatus::Active,
            completed_at: None,
            created_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    /// Whole days until the end date, rounded up and floored at zero.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let end_date = self.end_date?;
        let seconds = (end_date - now).num_seconds();
        if seconds <= 0 {
            return Some(0);
        }
        Some((seconds + 86_399) / 86_400)
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == GoalStatus::Completed {
            return Err(DomainError::InvariantViolation(format!(
                "goal `{}` is already completed",
                self.id.0
            )));
        }
        self.status = GoalStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }
}
