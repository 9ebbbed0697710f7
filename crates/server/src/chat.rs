use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use soberly_agent::{ChatRequest, ChatRuntime, HistoryTurn};
use soberly_core::errors::{ApplicationError, InterfaceError};

use crate::auth::{bearer_token, IdentityProvider};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct ChatState {
    pub runtime: Arc<ChatRuntime>,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<HistoryTurn>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub tools_used: Vec<String>,
    pub response_time_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatErrorBody {
    pub error: String,
}

type ChatRejection = (StatusCode, Json<ChatErrorBody>);

pub fn router(state: ChatState) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

pub async fn chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatRejection> {
    let correlation_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let token = bearer_token(&headers)
        .map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;
    let user_id = state
        .identity
        .authenticate(token)
        .await
        .map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;

    let Json(body) = body.map_err(|rejection| {
        reject(ApplicationError::InvalidInput(rejection.body_text()), &correlation_id)
    })?;

    let outcome = state
        .runtime
        .handle(ChatRequest {
            user_id,
            message: body.message,
            history: body.conversation_history,
            correlation_id: correlation_id.clone(),
        })
        .await
        .map_err(|error| reject(error.into(), &correlation_id))?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        tools_used: outcome.tools_used,
        response_time_ms: outcome.response_time_ms,
    }))
}

fn reject(error: ApplicationError, correlation_id: &str) -> ChatRejection {
    let interface: InterfaceError = error.into_interface(correlation_id);
    warn!(
        event_name = "chat.request_rejected",
        correlation_id = %interface.correlation_id(),
        status = interface.status_code(),
        error = %interface,
        "chat request rejected"
    );

    let status =
        StatusCode::from_u16(interface.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ChatErrorBody { error: interface.user_message().to_string() }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use soberly_agent::llm::{CompletionClient, CompletionRequest, CompletionResponse, LlmError};
    use soberly_agent::{ChatRuntime, ChatSettings};
    use soberly_core::domain::user::UserId;
    use soberly_db::{issue_token, Repositories};

    use super::{router, ChatState};
    use crate::auth::SessionIdentityProvider;

    struct OneShotClient {
        reply: Mutex<Option<Result<CompletionResponse, LlmError>>>,
    }

    #[async_trait]
    impl CompletionClient for OneShotClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.reply
                .lock()
                .expect("reply lock")
                .take()
                .unwrap_or_else(|| Err(LlmError::Transport("no reply scripted".to_string())))
        }
    }

    async fn state(reply: Result<CompletionResponse, LlmError>) -> (ChatState, String) {
        let repositories = Repositories::in_memory();
        let (token, session) =
            issue_token(UserId("user-1".to_string()), Duration::days(1), Utc::now());
        repositories.auth_sessions.insert(session).await.expect("session");

        let client = Arc::new(OneShotClient { reply: Mutex::new(Some(reply)) });
        let runtime = ChatRuntime::new(ChatSettings::default(), client, repositories.clone())
            .expect("runtime");
        let identity = SessionIdentityProvider::new(repositories.auth_sessions.clone());

        (ChatState { runtime: Arc::new(runtime), identity: Arc::new(identity) }, token)
    }

    fn answer(text: &str) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse { content: Some(text.to_string()), ..CompletionResponse::default() })
    }

    fn post(token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder =
            Request::builder().method("POST").uri("/chat").header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn chat_returns_the_answer_and_tools_used() {
        let (state, token) = state(answer("You're doing great.")).await;
        let response = router(state)
            .oneshot(post(
                Some(&token),
                json!({
                    "message": "How am I doing?",
                    "conversationHistory": [{"role": "user", "content": "hi"}],
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["response"], "You're doing great.");
        assert_eq!(body["tools_used"], json!([]));
        assert!(body["response_time_ms"].is_u64());
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_unauthorized() {
        let (state, _) = state(answer("unused")).await;
        let app = router(state);

        let missing = app.clone().oneshot(post(None, json!({"message": "hi"}))).await.expect("response");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert!(read_json(missing).await["error"].is_string());

        let unknown =
            app.oneshot(post(Some("sbr_nope"), json!({"message": "hi"}))).await.expect("response");
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_message_is_a_bad_request() {
        let (state, token) = state(answer("unused")).await;
        let response = router(state)
            .oneshot(post(Some(&token), json!({"message": "   system:  "})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_limits_keep_their_status_codes() {
        let (state, token) = state(Err(LlmError::RateLimited("slow down".to_string()))).await;
        let response = router(state)
            .oneshot(post(Some(&token), json!({"message": "hello"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(read_json(response).await["error"], "Rate limits exceeded, please try again later.");

        let (state, token) = self::state(Err(LlmError::QuotaExhausted("credits".to_string()))).await;
        let response = router(state)
            .oneshot(post(Some(&token), json!({"message": "hello"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn generic_upstream_failure_is_internal() {
        let (state, token) =
            state(Err(LlmError::Upstream { status: 503, body: "down".to_string() })).await;
        let response = router(state)
            .oneshot(post(Some(&token), json!({"message": "hello"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
