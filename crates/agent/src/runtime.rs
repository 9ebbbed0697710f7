//! The bounded model/tool loop behind one chat request.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use soberly_core::config::AppConfig;
use soberly_core::domain::user::UserId;
use soberly_core::errors::{ApplicationError, InterfaceError};
use soberly_db::repositories::Repositories;

use crate::gate::{GateClassifier, HeuristicGate};
use crate::llm::{
    ChatTurn, CompletionClient, CompletionRequest, LlmError, ToolCallRequest, ToolChoice,
};
use crate::observability::{ObservabilityLogger, TurnSummary, CHAT_FUNCTION_NAME};
use crate::prompt::system_prompt;
use crate::sanitize::Sanitizer;
use crate::tools::{ToolExecutor, ToolInvocation, ToolRegistry, ToolResult};

pub const FALLBACK_RESPONSE: &str = "I'm here with you, but I couldn't finish that thought just now. \
Could you tell me a little more, or try again in a moment?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSettings {
    pub model: String,
    /// Maximum number of tool rounds; the model is called at most one more time than this.
    pub max_iterations: u32,
    pub history_window: usize,
    pub max_message_chars: usize,
    pub max_history_chars: usize,
    pub tools_enabled: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_iterations: config.chat.max_iterations,
            history_window: config.chat.history_window,
            max_message_chars: config.chat.max_message_chars,
            max_history_chars: config.chat.max_history_chars,
            tools_enabled: config.chat.tools_enabled,
        }
    }
}

/// A prior turn as the client sent it. Only `user` and `assistant` turns are replayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub user_id: UserId,
    pub message: String,
    pub history: Vec<HistoryTurn>,
    pub correlation_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Answered,
    IterationCap,
    ContinuationFailed,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::IterationCap => "iteration_cap",
            Self::ContinuationFailed => "continuation_failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCallRequest>),
    Done(Termination),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    /// Names of the tools that actually ran, in execution order.
    pub tools_used: Vec<String>,
    pub response_time_ms: u64,
    /// Completed tool rounds.
    pub iterations: u32,
    pub model_calls: u32,
    pub model_used: String,
    pub write_tools_offered: bool,
    pub intervention_triggered: bool,
    pub termination: Termination,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Upstream(#[from] LlmError),
}

impl From<ChatError> for ApplicationError {
    fn from(value: ChatError) -> Self {
        match value {
            ChatError::InvalidInput(message) => Self::InvalidInput(message),
            ChatError::Upstream(error) => error.into(),
        }
    }
}

impl ChatError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        ApplicationError::from(self).into_interface(correlation_id)
    }

    pub fn status_code(&self) -> u16 {
        self.clone().into_interface("").status_code()
    }

    pub fn user_message(&self) -> &'static str {
        self.clone().into_interface("").user_message()
    }
}

pub struct ChatRuntime {
    settings: ChatSettings,
    client: Arc<dyn CompletionClient>,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    sanitizer: Sanitizer,
    gate: Arc<dyn GateClassifier>,
    observability: ObservabilityLogger,
}

impl ChatRuntime {
    pub fn new(
        settings: ChatSettings,
        client: Arc<dyn CompletionClient>,
        repositories: Repositories,
    ) -> Result<Self, regex::Error> {
        let registry = Arc::new(ToolRegistry::standard());
        Ok(Self {
            settings,
            client,
            executor: ToolExecutor::new(registry.clone(), repositories.clone()),
            registry,
            sanitizer: Sanitizer::new()?,
            gate: Arc::new(HeuristicGate::new()?),
            observability: ObservabilityLogger::new(repositories.observability),
        })
    }

    pub fn with_gate(mut self, gate: Arc<dyn GateClassifier>) -> Self {
        self.gate = gate;
        self
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatOutcome, ChatError> {
        self.handle_at(request, Utc::now()).await
    }

    /// Runs one request with `now` as the clock for prompts and stored records.
    pub async fn handle_at(
        &self,
        request: ChatRequest,
        now: DateTime<Utc>,
    ) -> Result<ChatOutcome, ChatError> {
        let started = Instant::now();
        let message = self.sanitizer.sanitize(&request.message, self.settings.max_message_chars);
        if message.is_empty() {
            return Err(ChatError::InvalidInput("message is empty".to_string()));
        }

        let write_enabled =
            self.settings.tools_enabled && self.gate.should_enable_write_tools(&request.message);
        let active = if self.settings.tools_enabled {
            self.registry.active(write_enabled)
        } else {
            self.registry.none()
        };

        info!(
            event_name = "chat.started",
            correlation_id = %request.correlation_id,
            user_id = %request.user_id,
            write_tools = write_enabled,
            history_turns = request.history.len(),
            "chat request started"
        );

        let mut messages = vec![ChatTurn::system(system_prompt(&active, now))];
        messages.extend(self.history_turns(&request.history));
        messages.push(ChatTurn::user(message));

        let mut state = LoopState::AwaitingModel;
        let mut tool_rounds = 0u32;
        let mut model_calls = 0u32;
        let mut tools_used = Vec::new();
        let mut last_content: Option<String> = None;
        let mut model_used = self.settings.model.clone();
        let mut intervention_triggered = false;

        let termination = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    let at_cap = tool_rounds >= self.settings.max_iterations;
                    let tool_choice =
                        if active.is_empty() || at_cap { ToolChoice::None } else { ToolChoice::Auto };
                    let completion = CompletionRequest {
                        model: self.settings.model.clone(),
                        messages: messages.clone(),
                        tools: active.schemas(),
                        tool_choice,
                    };

                    model_calls += 1;
                    match self.client.complete(completion).await {
                        Err(error) if model_calls == 1 => {
                            warn!(
                                event_name = "chat.model_failed",
                                correlation_id = %request.correlation_id,
                                user_id = %request.user_id,
                                error = %error,
                                "first completion call failed"
                            );
                            return Err(ChatError::Upstream(error));
                        }
                        Err(error) => {
                            warn!(
                                event_name = "chat.continuation_failed",
                                correlation_id = %request.correlation_id,
                                user_id = %request.user_id,
                                model_calls,
                                error = %error,
                                "continuation call failed; returning partial answer"
                            );
                            LoopState::Done(Termination::ContinuationFailed)
                        }
                        Ok(response) => {
                            if let Some(model) = &response.model {
                                model_used.clone_from(model);
                            }
                            if let Some(text) = response.text() {
                                last_content = Some(text.to_string());
                            }

                            if response.tool_calls.is_empty() {
                                LoopState::Done(Termination::Answered)
                            } else if at_cap {
                                LoopState::Done(Termination::IterationCap)
                            } else {
                                messages.push(ChatTurn::assistant_with_calls(
                                    response.content.clone().unwrap_or_default(),
                                    response.tool_calls.clone(),
                                ));
                                LoopState::ExecutingTools(response.tool_calls)
                            }
                        }
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    tool_rounds += 1;
                    for call in &calls {
                        let content = match ToolInvocation::prepare(call, &active) {
                            Ok(invocation) => {
                                let result = self
                                    .executor
                                    .execute_invocation(&invocation, &request.user_id, now)
                                    .await;
                                info!(
                                    event_name = "chat.tool_executed",
                                    correlation_id = %request.correlation_id,
                                    user_id = %request.user_id,
                                    tool = %invocation.name,
                                    success = result.success,
                                    "tool executed"
                                );
                                intervention_triggered |= result.intervention;
                                tools_used.push(invocation.name);
                                result.to_json_string()
                            }
                            Err(error) => {
                                warn!(
                                    event_name = "chat.tool_skipped",
                                    correlation_id = %request.correlation_id,
                                    user_id = %request.user_id,
                                    tool = %call.name,
                                    error = %error,
                                    "tool call skipped"
                                );
                                ToolResult::failure(error.to_string()).to_json_string()
                            }
                        };
                        messages.push(ChatTurn::tool(call.id.clone(), content));
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done(reason) => break reason,
            };
        };

        let response = last_content.unwrap_or_else(|| FALLBACK_RESPONSE.to_string());
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.observability
            .record(TurnSummary {
                user_id: &request.user_id,
                function_name: CHAT_FUNCTION_NAME,
                tools_called: &tools_used,
                response: &response,
                response_time_ms,
                model_used: &model_used,
                intervention_triggered,
            })
            .await;

        info!(
            event_name = "chat.completed",
            correlation_id = %request.correlation_id,
            user_id = %request.user_id,
            termination = termination.as_str(),
            tool_rounds,
            model_calls,
            tools = ?tools_used,
            response_time_ms,
            "chat request completed"
        );

        Ok(ChatOutcome {
            response,
            tools_used,
            response_time_ms,
            iterations: tool_rounds,
            model_calls,
            model_used,
            write_tools_offered: active.includes_writes(),
            intervention_triggered,
            termination,
        })
    }

    /// Last `history_window` user/assistant turns, sanitized; empty turns are dropped.
    fn history_turns(&self, history: &[HistoryTurn]) -> Vec<ChatTurn> {
        let replayable = history
            .iter()
            .filter(|turn| {
                matches!(turn.role.trim().to_ascii_lowercase().as_str(), "user" | "assistant")
            })
            .collect::<Vec<_>>();
        let skip = replayable.len().saturating_sub(self.settings.history_window);

        replayable
            .into_iter()
            .skip(skip)
            .filter_map(|turn| {
                let content = self.sanitizer.sanitize(&turn.content, self.settings.max_history_chars);
                if content.is_empty() {
                    return None;
                }
                if turn.role.trim().eq_ignore_ascii_case("assistant") {
                    Some(ChatTurn::assistant(content))
                } else {
                    Some(ChatTurn::user(content))
                }
            })
            .collect()
    }
}
