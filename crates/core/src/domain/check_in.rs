use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

pub const MAX_URGE_INTENSITY: u8 = 10;
pub const TREND_WINDOW_DAYS: i64 = 7;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckInId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Struggling,
    Difficult,
}

impl Mood {
    pub const ALL: [Mood; 5] =
        [Mood::Great, Mood::Good, Mood::Okay, Mood::Struggling, Mood::Difficult];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Great => "great",
            Self::Good => "good",
            Self::Okay => "okay",
            Self::Struggling => "struggling",
            Self::Difficult => "difficult",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Mood::as_str).collect()
    }
}

impl std::str::FromStr for Mood {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "great" => Ok(Self::Great),
            "good" => Ok(Self::Good),
            "okay" | "ok" => Ok(Self::Okay),
            "struggling" => Ok(Self::Struggling),
            "difficult" => Ok(Self::Difficult),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported mood `{other}` (expected great|good|okay|struggling|difficult)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: CheckInId,
    pub user_id: UserId,
    pub mood: Mood,
    pub urge_intensity: Option<u8>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodTrend {
    Improving,
    NeedsAttention,
    InsufficientData,
}

impl MoodTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::NeedsAttention => "needs_attention",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

/// Compares the newest rated check-in in the trailing window with the oldest one.
/// Input order does not matter.
pub fn mood_trend(check_ins: &[CheckIn], now: DateTime<Utc>) -> MoodTrend {
    let window_start = now - Duration::days(TREND_WINDOW_DAYS);
    let mut rated = check_ins
        .iter()
        .filter(|check_in| check_in.created_at >= window_start && check_in.created_at <= now)
        .filter_map(|check_in| check_in.urge_intensity.map(|urge| (check_in.created_at, urge)))
        .collect::<Vec<_>>();

    if rated.len() < 2 {
        return MoodTrend::InsufficientData;
    }

    rated.sort_by_key(|(created_at, _)| *created_at);
    let (_, oldest) = rated[0];
    let (_, newest) = rated[rated.len() - 1];

    if newest < oldest {
        MoodTrend::Improving
    } else {
        MoodTrend::NeedsAttention
    }
}
