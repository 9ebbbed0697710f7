use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use soberly_core::domain::user::UserId;
use soberly_core::errors::DomainError;
use soberly_db::repositories::{Repositories, RepositoryError};

use super::read;
use super::registry::{ActiveToolSet, ParamKind, ToolDefinition, ToolRegistry};
use super::write;
use crate::llm::ToolCallRequest;

/// Structured outcome handed back to the model as a tool-role turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the tool surfaced crisis resources or recorded an intervention.
    #[serde(skip)]
    pub intervention: bool,
}

impl ToolResult {
    pub fn ok(payload: Value) -> Self {
        Self { success: true, payload, message: None, error: None, intervention: false }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            message: None,
            error: Some(error.into()),
            intervention: false,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_intervention(mut self, intervention: bool) -> Self {
        self.intervention = intervention;
        self
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"payload":null,"error":"result could not be encoded"}"#.to_string()
        })
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("tool `{0}` is not available for this turn")]
    NotActive(String),
    #[error("arguments for `{tool}` are not valid JSON: {reason}")]
    MalformedArguments { tool: String, reason: String },
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Arguments after validation: only declared parameters, normalized to their kinds.
pub type ToolArguments = Map<String, Value>;

/// A validated call, ready to run.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolInvocation {
    /// Parses and validates a raw model call against the active tool set.
    pub fn prepare(call: &ToolCallRequest, active: &ActiveToolSet<'_>) -> Result<Self, ToolError> {
        let definition =
            active.get(&call.name).ok_or_else(|| ToolError::NotActive(call.name.clone()))?;

        let raw = call.arguments.trim();
        let parsed = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str::<Value>(raw).map_err(|error| ToolError::MalformedArguments {
                tool: call.name.clone(),
                reason: error.to_string(),
            })?
        };

        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: validate_arguments(definition, &parsed)?,
        })
    }
}

/// Checks required fields, kinds, enums and ranges before any handler runs.
pub fn validate_arguments(
    definition: &ToolDefinition,
    arguments: &Value,
) -> Result<ToolArguments, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool: definition.name.to_string(),
        reason,
    };

    let object = match arguments {
        Value::Object(object) => object.clone(),
        Value::Null => Map::new(),
        other => return Err(invalid(format!("expected a JSON object, got `{other}`"))),
    };

    let mut normalized = Map::new();
    for parameter in &definition.parameters {
        let value = object.get(parameter.name).filter(|value| !is_blank(value));
        let Some(value) = value else {
            if parameter.required {
                return Err(invalid(format!("missing required parameter `{}`", parameter.name)));
            }
            continue;
        };

        let value = match parameter.kind {
            ParamKind::String => match value {
                Value::String(text) => Value::String(text.trim().to_string()),
                Value::Number(number) => Value::String(number.to_string()),
                _ => return Err(invalid(format!("`{}` must be a string", parameter.name))),
            },
            ParamKind::Integer => {
                let number = as_integer(value)
                    .ok_or_else(|| invalid(format!("`{}` must be an integer", parameter.name)))?;
                if parameter.minimum.is_some_and(|minimum| number < minimum)
                    || parameter.maximum.is_some_and(|maximum| number > maximum)
                {
                    return Err(invalid(format!(
                        "`{}` must be between {} and {}",
                        parameter.name,
                        parameter.minimum.unwrap_or(i64::MIN),
                        parameter.maximum.unwrap_or(i64::MAX)
                    )));
                }
                Value::from(number)
            }
            ParamKind::Number => {
                let number = as_number(value)
                    .ok_or_else(|| invalid(format!("`{}` must be a number", parameter.name)))?;
                Value::from(number)
            }
        };

        if let (Some(allowed), Value::String(text)) = (&parameter.allowed_values, &value) {
            let lowered = text.to_lowercase();
            if !allowed.iter().any(|candidate| *candidate == lowered) {
                return Err(invalid(format!(
                    "`{}` must be one of {}",
                    parameter.name,
                    allowed.join("|")
                )));
            }
            normalized.insert(parameter.name.to_string(), Value::String(lowered));
            continue;
        }

        normalized.insert(parameter.name.to_string(), value);
    }

    Ok(normalized)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number.as_f64().filter(|float| float.fract() == 0.0).map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn arg_str<'a>(arguments: &'a ToolArguments, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(Value::as_str)
}

pub(crate) fn arg_i64(arguments: &ToolArguments, name: &str) -> Option<i64> {
    arguments.get(name).and_then(Value::as_i64)
}

/// Everything a handler may touch. Store access is always scoped by `user_id`.
pub struct ToolContext<'a> {
    pub user_id: &'a UserId,
    pub now: DateTime<Utc>,
    pub repositories: &'a Repositories,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        context: &ToolContext<'_>,
        arguments: &ToolArguments,
    ) -> Result<ToolResult, ToolError>;
}

/// Name-to-handler dispatch, registered once at startup.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    handlers: HashMap<&'static str, Box<dyn ToolHandler>>,
    repositories: Repositories,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, repositories: Repositories) -> Self {
        let mut executor = Self { registry, handlers: HashMap::new(), repositories };
        read::register(&mut executor);
        write::register(&mut executor);
        executor
    }

    pub fn register<T>(&mut self, handler: T)
    where
        T: ToolHandler + 'static,
    {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Validates `arguments` against the registry and runs the handler.
    ///
    /// This does not consult the turn's active tool set. Model-issued calls must go
    /// through [`ToolInvocation::prepare`] first so write tools stay behind the gate.
    pub async fn execute(&self, name: &str, arguments: &Value, user_id: &UserId) -> ToolResult {
        self.execute_at(name, arguments, user_id, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        name: &str,
        arguments: &Value,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> ToolResult {
        let Some(definition) = self.registry.get(name) else {
            return self.failure(name, user_id, ToolError::UnknownTool(name.to_string()));
        };
        match validate_arguments(definition, arguments) {
            Ok(validated) => self.run_validated(name, &validated, user_id, now).await,
            Err(error) => self.failure(name, user_id, error),
        }
    }

    /// Runs an invocation already checked by [`ToolInvocation::prepare`].
    pub async fn execute_invocation(
        &self,
        invocation: &ToolInvocation,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> ToolResult {
        self.run_validated(&invocation.name, &invocation.arguments, user_id, now).await
    }

    async fn run_validated(
        &self,
        name: &str,
        arguments: &ToolArguments,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> ToolResult {
        let Some(handler) = self.handlers.get(name) else {
            return self.failure(name, user_id, ToolError::UnknownTool(name.to_string()));
        };

        let context = ToolContext { user_id, now, repositories: &self.repositories };
        match handler.run(&context, arguments).await {
            Ok(result) => result,
            Err(error) => self.failure(name, user_id, error),
        }
    }

    fn failure(&self, name: &str, user_id: &UserId, error: ToolError) -> ToolResult {
        warn!(
            event_name = "tool.failed",
            tool = name,
            user_id = %user_id,
            error = %error,
            "tool execution failed"
        );
        ToolResult::failure(error.to_string())
    }
}
