use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopingActivityId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopingActivity {
    pub id: CopingActivityId,
    pub user_id: UserId,
    pub activity_name: String,
    pub category: Option<String>,
    pub times_used: u32,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Upsert key for coping activities: trimmed and case-folded.
pub fn activity_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Low,
    Medium,
    High,
    Crisis,
}

impl StressLevel {
    pub const ALL: [StressLevel; 4] =
        [StressLevel::Low, StressLevel::Medium, StressLevel::High, StressLevel::Crisis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Crisis => "crisis",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(StressLevel::as_str).collect()
    }
}

impl std::str::FromStr for StressLevel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "crisis" => Ok(Self::Crisis),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported stress level `{other}` (expected low|medium|high|crisis)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CrisisResource {
    pub name: &'static str,
    pub contact: &'static str,
    pub available: &'static str,
}

pub const CRISIS_RESOURCES: &[CrisisResource] = &[
    CrisisResource {
        name: "988 Suicide & Crisis Lifeline",
        contact: "Call or text 988",
        available: "24/7",
    },
    CrisisResource {
        name: "SAMHSA National Helpline",
        contact: "1-800-662-4357",
        available: "24/7, free and confidential",
    },
    CrisisResource {
        name: "Crisis Text Line",
        contact: "Text HOME to 741741",
        available: "24/7",
    },
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CopingSuggestions {
    pub stress_level: StressLevel,
    pub activities: Vec<&'static str>,
    pub resources: Vec<CrisisResource>,
    pub crisis: bool,
}

/// Fixed suggestions per stress level. Crisis never goes through the model.
pub fn coping_suggestions(level: StressLevel) -> CopingSuggestions {
    let activities: &[&'static str] = match level {
        StressLevel::Low => &[
            "Take a short walk outside",
            "Write three things you are grateful for",
            "Listen to a favourite playlist",
        ],
        StressLevel::Medium => &[
            "Box breathing: 4 seconds in, hold 4, out 4, hold 4",
            "Call or text someone in your support network",
            "Do 10 minutes of light exercise or stretching",
            "Write down what is bothering you in your journal",
        ],
        StressLevel::High => &[
            "5-4-3-2-1 grounding: name 5 things you see, 4 you feel, 3 you hear, 2 you smell, 1 you taste",
            "Deep breathing for 5 minutes",
            "Reach out to your sponsor or a trusted friend right now",
            "Change your environment: step away from triggers",
            "Attend a meeting, in person or online",
        ],
        StressLevel::Crisis => &[
            "Reach out to a crisis line now; you do not have to handle this alone",
            "Move to a safe place and stay with someone you trust",
        ],
    };

    let crisis = level == StressLevel::Crisis;
    CopingSuggestions {
        stress_level: level,
        activities: activities.to_vec(),
        resources: if crisis { CRISIS_RESOURCES.to_vec() } else { Vec::new() },
        crisis,
    }
}

#[cfg(test)]
mod tests {
    use super::{activity_key, coping_suggestions, StressLevel};

    #[test]
    fn crisis_always_includes_hotlines() {
        let suggestions = coping_suggestions(StressLevel::Crisis);
        assert!(suggestions.crisis);
        assert!(suggestions.resources.iter().any(|resource| resource.contact.contains("988")));
    }

    #[test]
    fn non_crisis_levels_have_no_hotlines() {
        for level in [StressLevel::Low, StressLevel::Medium, StressLevel::High] {
            let suggestions = coping_suggestions(level);
            assert!(!suggestions.crisis);
            assert!(suggestions.resources.is_empty());
            assert!(!suggestions.activities.is_empty());
        }
    }

    #[test]
    fn activity_key_ignores_case_and_padding() {
        assert_eq!(activity_key("  Deep Breathing "), activity_key("deep breathing"));
    }
}
