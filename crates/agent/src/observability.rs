use std::sync::Arc;

use tracing::warn;

use soberly_core::domain::user::UserId;
use soberly_core::observability::ObservabilityRecord;
use soberly_db::repositories::ObservabilityRepository;

pub const CHAT_FUNCTION_NAME: &str = "chat-with-ai";

/// Fields of one finished request, before truncation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnSummary<'a> {
    pub user_id: &'a UserId,
    pub function_name: &'a str,
    pub tools_called: &'a [String],
    pub response: &'a str,
    pub response_time_ms: u64,
    pub model_used: &'a str,
    pub intervention_triggered: bool,
}

/// Appends one record per request. Storage failures are logged and dropped.
#[derive(Clone)]
pub struct ObservabilityLogger {
    repository: Arc<dyn ObservabilityRepository>,
}

impl ObservabilityLogger {
    pub fn new(repository: Arc<dyn ObservabilityRepository>) -> Self {
        Self { repository }
    }

    /// Appends one record for a finished turn. The write completes before the reply is
    /// returned; a store failure is logged and never surfaces to the caller.
    pub async fn record(&self, summary: TurnSummary<'_>) {
        let record =
            ObservabilityRecord::new(summary.user_id.clone(), summary.function_name, summary.model_used)
                .with_tools(summary.tools_called.iter().cloned())
                .with_response(summary.response, summary.response_time_ms)
                .with_intervention(summary.intervention_triggered);

        if let Err(error) = self.repository.append(record).await {
            warn!(
                event_name = "chat.observability_failed",
                user_id = %summary.user_id,
                error = %error,
                "failed to persist observability record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use soberly_core::domain::user::UserId;
    use soberly_core::observability::ObservabilityRecord;
    use soberly_db::repositories::{
        InMemoryObservabilityRepository, ObservabilityRepository, RepositoryError,
    };

    use super::{ObservabilityLogger, TurnSummary, CHAT_FUNCTION_NAME};

    struct FailingRepository;

    #[async_trait]
    impl ObservabilityRepository for FailingRepository {
        async fn append(&self, _record: ObservabilityRecord) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn list(&self, _user_id: &UserId) -> Result<Vec<ObservabilityRecord>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    fn summary<'a>(user_id: &'a UserId, tools: &'a [String], response: &'a str) -> TurnSummary<'a> {
        TurnSummary {
            user_id,
            function_name: CHAT_FUNCTION_NAME,
            tools_called: tools,
            response,
            response_time_ms: 420,
            model_used: "llama3.1",
            intervention_triggered: false,
        }
    }

    #[tokio::test]
    async fn record_truncates_the_summary_and_keeps_tool_order() {
        let repository = Arc::new(InMemoryObservabilityRepository::default());
        let logger = ObservabilityLogger::new(repository.clone());
        let user_id = UserId("user-1".to_string());
        let tools = vec!["get_active_goals".to_string(), "create_check_in".to_string()];
        let response = "a".repeat(600);

        logger.record(summary(&user_id, &tools, &response)).await;

        let stored = repository.list(&user_id).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].function_name, CHAT_FUNCTION_NAME);
        assert_eq!(stored[0].tools_called, tools);
        assert_eq!(stored[0].response_summary.len(), 200);
    }

    #[tokio::test]
    async fn storage_failures_are_swallowed() {
        let logger = ObservabilityLogger::new(Arc::new(FailingRepository));
        let user_id = UserId("user-1".to_string());
        logger.record(summary(&user_id, &[], "ok")).await;
    }
}
