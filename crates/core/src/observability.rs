use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;
use crate::text::truncate_chars;

pub const RESPONSE_SUMMARY_CHARS: usize = 200;

/// One row per chat request, written after the orchestration loop finishes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityRecord {
    pub record_id: String,
    pub user_id: UserId,
    pub function_name: String,
    pub tools_called: Vec<String>,
    pub response_summary: String,
    pub response_time_ms: u64,
    pub model_used: String,
    pub intervention_triggered: bool,
    pub created_at: DateTime<Utc>,
}

impl ObservabilityRecord {
    pub fn new(
        user_id: UserId,
        function_name: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            user_id,
            function_name: function_name.into(),
            tools_called: Vec::new(),
            response_summary: String::new(),
            response_time_ms: 0,
            model_used: model_used.into(),
            intervention_triggered: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_tools(mut self, tools_called: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tools_called = tools_called.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_response(mut self, response: &str, response_time_ms: u64) -> Self {
        self.response_summary = truncate_chars(response, RESPONSE_SUMMARY_CHARS);
        self.response_time_ms = response_time_ms;
        self
    }

    pub fn with_intervention(mut self, intervention_triggered: bool) -> Self {
        self.intervention_triggered = intervention_triggered;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{ObservabilityRecord, RESPONSE_SUMMARY_CHARS};
    use crate::domain::user::UserId;

    #[test]
    fn summary_is_capped_and_fields_are_kept() {
        let record = ObservabilityRecord::new(
            UserId("user-1".to_string()),
            "chat-with-ai",
            "google/gemini-2.5-flash",
        )
        .with_tools(["get_active_goals", "create_check_in"])
        .with_response(&"x".repeat(500), 812)
        .with_intervention(true);

        assert_eq!(record.response_summary.chars().count(), RESPONSE_SUMMARY_CHARS);
        assert_eq!(record.tools_called, vec!["get_active_goals", "create_check_in"]);
        assert_eq!(record.response_time_ms, 812);
        assert!(record.intervention_triggered);
        assert!(!record.record_id.is_empty());
    }
}
