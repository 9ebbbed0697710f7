//! Chat-completion types and the OpenAI-compatible HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use soberly_core::config::LlmConfig;
use soberly_core::errors::ApplicationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool call exactly as the model emitted it. `arguments` is raw JSON text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatTurn {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), tool_call_id: None, tool_calls: Vec::new() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self { tool_calls: calls, ..Self::plain(Role::Assistant, content) }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_call_id: Some(tool_call_id.into()), ..Self::plain(Role::Tool, content) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    /// OpenAI function-tool schemas for the active tool set.
    pub tools: Vec<Value>,
    pub tool_choice: ToolChoice,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub model: Option<String>,
}

impl CompletionResponse {
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().map(str::trim).filter(|content| !content.is_empty())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("completion API rate limited: {0}")]
    RateLimited(String),
    #[error("completion API credits exhausted: {0}")]
    QuotaExhausted(String),
    #[error("completion API returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("completion API transport failure: {0}")]
    Transport(String),
    #[error("completion API response could not be decoded: {0}")]
    Decode(String),
    #[error("completion client misconfigured: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Maps a non-2xx status to the matching error class.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => Self::RateLimited(body),
            402 => Self::QuotaExhausted(body),
            _ => Self::Upstream { status, body },
        }
    }
}

impl From<LlmError> for ApplicationError {
    fn from(value: LlmError) -> Self {
        match value {
            LlmError::RateLimited(message) => Self::RateLimited(message),
            LlmError::QuotaExhausted(message) => Self::QuotaExhausted(message),
            LlmError::Configuration(message) => Self::Configuration(message),
            other => Self::Integration(other.to_string()),
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Configuration(error.to_string()))?;

        Ok(Self { http, base_url: config.endpoint_base(), api_key: config.api_key.clone() })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = wire_request(&request);
        let mut builder = self.http.post(self.endpoint()).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response =
            builder.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|error| LlmError::Transport(error.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), text));
        }

        parse_completion(&text)
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    arguments: &'a str,
}

/// Tools and `tool_choice` are omitted together when no tool is active, since
/// providers reject a `tool_choice` without tools.
fn wire_request(request: &CompletionRequest) -> WireRequest<'_> {
    let messages = request
        .messages
        .iter()
        .map(|turn| WireMessage {
            role: turn.role.as_str(),
            content: if turn.role == Role::Assistant
                && turn.content.is_empty()
                && !turn.tool_calls.is_empty()
            {
                None
            } else {
                Some(turn.content.as_str())
            },
            tool_call_id: turn.tool_call_id.as_deref(),
            tool_calls: turn
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: &call.id,
                    kind: "function",
                    function: WireFunction { name: &call.name, arguments: &call.arguments },
                })
                .collect(),
        })
        .collect();

    let has_tools = !request.tools.is_empty();
    WireRequest {
        model: &request.model,
        messages,
        tools: has_tools.then_some(request.tools.as_slice()),
        tool_choice: has_tools.then_some(request.tool_choice.as_str()),
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: Option<String>,
    function: WireResponseFunction,
}

#[derive(Deserialize)]
struct WireResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Decodes an OpenAI-style completion body. Argument payloads that arrive as JSON
/// objects instead of strings are re-serialized so downstream parsing sees text.
pub fn parse_completion(body: &str) -> Result<CompletionResponse, LlmError> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|error| LlmError::Decode(error.to_string()))?;
    let Some(choice) = wire.choices.into_iter().next() else {
        return Err(LlmError::Decode("response contained no choices".to_string()));
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, call)| ToolCallRequest {
            id: call.id.filter(|id| !id.is_empty()).unwrap_or_else(|| format!("call_{index}")),
            name: call.function.name,
            arguments: match call.function.arguments {
                Value::String(raw) => raw,
                Value::Null => String::new(),
                other => other.to_string(),
            },
        })
        .collect();

    Ok(CompletionResponse { content: choice.message.content, tool_calls, model: wire.model })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        parse_completion, wire_request, ChatTurn, CompletionRequest, LlmError, ToolCallRequest,
        ToolChoice,
    };
    use soberly_core::errors::ApplicationError;

    #[test]
    fn status_codes_map_to_distinct_errors() {
        assert!(matches!(LlmError::from_status(429, "slow down"), LlmError::RateLimited(_)));
        assert!(matches!(LlmError::from_status(402, "pay up"), LlmError::QuotaExhausted(_)));
        assert!(matches!(
            LlmError::from_status(503, "down"),
            LlmError::Upstream { status: 503, .. }
        ));
    }

    #[test]
    fn llm_errors_map_onto_application_errors() {
        assert!(matches!(
            ApplicationError::from(LlmError::RateLimited("x".into())),
            ApplicationError::RateLimited(_)
        ));
        assert!(matches!(
            ApplicationError::from(LlmError::Transport("reset".into())),
            ApplicationError::Integration(_)
        ));
    }

    #[test]
    fn parses_text_completion() {
        let parsed = parse_completion(
            r#"{"model":"m-1","choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#,
        )
        .expect("parse");
        assert_eq!(parsed.text(), Some("Hi there"));
        assert!(parsed.tool_calls.is_empty());
        assert_eq!(parsed.model.as_deref(), Some("m-1"));
    }

    #[test]
    fn parses_tool_calls_with_string_and_object_arguments() {
        let parsed = parse_completion(
            r#"{"choices":[{"message":{"content":null,"tool_calls":[
                {"id":"call_a","type":"function","function":{"name":"create_goal","arguments":"{\"title\":\"Walk\"}"}},
                {"type":"function","function":{"name":"get_active_goals","arguments":{"x":1}}}
            ]}}]}"#,
        )
        .expect("parse");

        assert_eq!(parsed.text(), None);
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_eq!(parsed.tool_calls[0].arguments, r#"{"title":"Walk"}"#);
        assert_eq!(parsed.tool_calls[1].id, "call_1");
        assert_eq!(parsed.tool_calls[1].arguments, r#"{"x":1}"#);
    }

    #[test]
    fn empty_choices_is_a_decode_error() {
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(LlmError::Decode(_))));
        assert!(matches!(parse_completion("not json"), Err(LlmError::Decode(_))));
    }

    #[test]
    fn wire_request_omits_tools_when_none_are_active() {
        let request = CompletionRequest {
            model: "m-1".to_string(),
            messages: vec![ChatTurn::system("s"), ChatTurn::user("hello")],
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
        };
        let encoded = serde_json::to_value(wire_request(&request)).expect("encode");
        assert!(encoded.get("tools").is_none());
        assert!(encoded.get("tool_choice").is_none());
        assert_eq!(encoded["messages"][1], json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn wire_request_round_trips_tool_turns() {
        let call = ToolCallRequest {
            id: "call_1".to_string(),
            name: "get_active_goals".to_string(),
            arguments: "{}".to_string(),
        };
        let request = CompletionRequest {
            model: "m-1".to_string(),
            messages: vec![
                ChatTurn::assistant_with_calls("", vec![call]),
                ChatTurn::tool("call_1", r#"{"success":true}"#),
            ],
            tools: vec![json!({"type": "function", "function": {"name": "get_active_goals"}})],
            tool_choice: ToolChoice::Auto,
        };
        let encoded = serde_json::to_value(wire_request(&request)).expect("encode");

        assert_eq!(encoded["tool_choice"], "auto");
        assert_eq!(encoded["messages"][0]["content"], serde_json::Value::Null);
        assert_eq!(encoded["messages"][0]["tool_calls"][0]["function"]["name"], "get_active_goals");
        assert_eq!(encoded["messages"][1]["tool_call_id"], "call_1");
    }
}
