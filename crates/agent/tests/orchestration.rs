use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use soberly_agent::llm::{
    CompletionClient, CompletionRequest, CompletionResponse, LlmError, Role, ToolCallRequest,
    ToolChoice,
};
use soberly_agent::runtime::FALLBACK_RESPONSE;
use soberly_agent::tools::registry::{
    COMPLETE_GOAL, CREATE_CHECK_IN, CREATE_GOAL, GET_ACTIVE_GOALS, LOG_COPING_ACTIVITY,
    SUGGEST_COPING_ACTIVITIES,
};
use soberly_agent::{
    ChatError, ChatRequest, ChatRuntime, ChatSettings, HistoryTurn, ReadOnlyGate, Termination,
};
use soberly_core::domain::user::UserId;
use soberly_db::repositories::Repositories;

/// Replays scripted replies in order, then repeats `fallback` forever.
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    fallback: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<CompletionResponse, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn repeating(reply: CompletionResponse) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().expect("requests lock").push(request);
        let next = self.replies.lock().expect("replies lock").pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(LlmError::Transport("script exhausted".to_string())),
        }
    }
}

fn text(content: &str) -> Result<CompletionResponse, LlmError> {
    Ok(CompletionResponse { content: Some(content.to_string()), ..CompletionResponse::default() })
}

fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest { id: id.to_string(), name: name.to_string(), arguments: arguments.to_string() }
}

fn calls(content: Option<&str>, calls: Vec<ToolCallRequest>) -> CompletionResponse {
    CompletionResponse {
        content: content.map(str::to_string),
        tool_calls: calls,
        model: Some("scripted-model".to_string()),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).single().expect("valid date")
}

fn user() -> UserId {
    UserId("user-1".to_string())
}

fn request(message: &str) -> ChatRequest {
    ChatRequest {
        user_id: user(),
        message: message.to_string(),
        history: Vec::new(),
        correlation_id: "req-test".to_string(),
    }
}

fn runtime(client: Arc<ScriptedClient>, repositories: &Repositories) -> ChatRuntime {
    ChatRuntime::new(ChatSettings::default(), client, repositories.clone()).expect("runtime")
}

fn tool_names(request: &CompletionRequest) -> Vec<String> {
    request
        .tools
        .iter()
        .filter_map(|tool| tool["function"]["name"].as_str().map(str::to_string))
        .collect()
}

fn tool_turns(request: &CompletionRequest) -> Vec<Value> {
    request
        .messages
        .iter()
        .filter(|turn| turn.role == Role::Tool)
        .map(|turn| serde_json::from_str(&turn.content).expect("tool turn is JSON"))
        .collect()
}

#[tokio::test]
async fn loop_stops_at_the_iteration_cap() {
    let repositories = Repositories::in_memory();
    let client =
        ScriptedClient::repeating(calls(Some("Checking."), vec![call("c", GET_ACTIVE_GOALS, "{}")]));
    let outcome = runtime(client.clone(), &repositories)
        .handle_at(request("How are my goals going?"), now())
        .await
        .expect("outcome");

    let settings = ChatSettings::default();
    assert_eq!(outcome.termination, Termination::IterationCap);
    assert_eq!(outcome.iterations, settings.max_iterations);
    assert_eq!(outcome.model_calls, settings.max_iterations + 1);
    assert_eq!(outcome.tools_used.len(), settings.max_iterations as usize);
    assert_eq!(outcome.response, "Checking.");

    let requests = client.requests();
    assert_eq!(requests.len(), settings.max_iterations as usize + 1);
    assert!(requests[..requests.len() - 1].iter().all(|request| request.tool_choice == ToolChoice::Auto));
    assert_eq!(requests.last().map(|request| request.tool_choice), Some(ToolChoice::None));
}

#[tokio::test]
async fn many_calls_per_round_still_respect_the_cap() {
    let repositories = Repositories::in_memory();
    let burst = (0..4).map(|index| call(&format!("c{index}"), GET_ACTIVE_GOALS, "")).collect();
    let client = ScriptedClient::repeating(calls(None, burst));
    let settings = ChatSettings { max_iterations: 2, ..ChatSettings::default() };
    let outcome = ChatRuntime::new(settings, client.clone(), repositories)
        .expect("runtime")
        .handle_at(request("Show me everything"), now())
        .await
        .expect("outcome");

    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.model_calls, 3);
    assert_eq!(outcome.tools_used.len(), 8);
    assert_eq!(outcome.response, FALLBACK_RESPONSE);
}

#[tokio::test]
async fn malformed_arguments_are_skipped_without_aborting_the_turn() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![
        Ok(calls(
            None,
            vec![call("bad", CREATE_CHECK_IN, "{mood: good"), call("ok", GET_ACTIVE_GOALS, "{}")],
        )),
        text("You have no active goals yet."),
    ]);
    let outcome = runtime(client.clone(), &repositories)
        .handle_at(request("Log a check-in, my mood is good"), now())
        .await
        .expect("outcome");

    assert_eq!(outcome.termination, Termination::Answered);
    assert_eq!(outcome.tools_used, vec![GET_ACTIVE_GOALS.to_string()]);
    assert_eq!(outcome.response, "You have no active goals yet.");

    let second = &client.requests()[1];
    let results = tool_turns(second);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["success"], false);
    assert_eq!(results[1]["success"], true);
    assert!(repositories.check_ins.list_dates(&user()).await.expect("dates").is_empty());
}

#[tokio::test]
async fn vague_stress_message_only_offers_read_tools() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![
        Ok(calls(None, vec![call("w", CREATE_CHECK_IN, r#"{"mood":"struggling"}"#)])),
        text("That sounds heavy. Want to talk about what happened at work?"),
    ]);
    let outcome = runtime(client.clone(), &repositories)
        .handle_at(request("I'm feeling really stressed about work"), now())
        .await
        .expect("outcome");

    assert!(!outcome.write_tools_offered);
    assert!(outcome.tools_used.is_empty());

    let first = &client.requests()[0];
    let offered = tool_names(first);
    assert!(offered.contains(&SUGGEST_COPING_ACTIVITIES.to_string()));
    assert!(!offered.contains(&CREATE_CHECK_IN.to_string()));

    let refused = tool_turns(&client.requests()[1]);
    assert_eq!(refused[0]["success"], false);
    assert!(repositories.check_ins.list_dates(&user()).await.expect("dates").is_empty());
}

#[tokio::test]
async fn explicit_goal_request_creates_the_goal() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![
        Ok(calls(
            None,
            vec![call("g", CREATE_GOAL, r#"{"title":"Meditate daily","target_days":14}"#)],
        )),
        text("Done! Your 14-day meditation goal is set."),
    ]);
    let outcome = runtime(client.clone(), &repositories)
        .handle_at(request("Create a goal: meditate daily for 14 days"), now())
        .await
        .expect("outcome");

    assert!(outcome.write_tools_offered);
    assert_eq!(outcome.tools_used, vec![CREATE_GOAL.to_string()]);

    let goals = repositories.goals.list_active(&user()).await.expect("goals");
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].title, "Meditate daily");
    assert_eq!(goals[0].end_date, Some(now() + Duration::days(14)));
}

#[tokio::test]
async fn tools_in_one_response_run_in_emitted_order() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![
        Ok(calls(
            None,
            vec![
                call("a", CREATE_GOAL, r#"{"title":"Exercise daily"}"#),
                call("b", CREATE_GOAL, r#"{"title":"Read a book"}"#),
                call("c", COMPLETE_GOAL, r#"{"goal_title":"exercise"}"#),
            ],
        )),
        text("Nice work finishing your exercise goal."),
    ]);
    let outcome = runtime(client, &repositories)
        .handle_at(request("Please create a goal to exercise daily and then complete it"), now())
        .await
        .expect("outcome");

    assert_eq!(outcome.tools_used, vec![CREATE_GOAL, CREATE_GOAL, COMPLETE_GOAL]);
    let remaining = repositories.goals.list_active(&user()).await.expect("goals");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Read a book");
}

#[tokio::test]
async fn rate_limit_on_the_first_call_is_a_hard_error() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![Err(LlmError::RateLimited("slow down".to_string()))]);
    let error = runtime(client, &repositories)
        .handle_at(request("Hi there"), now())
        .await
        .expect_err("first call failure propagates");

    assert!(matches!(error, ChatError::Upstream(LlmError::RateLimited(_))));
    assert_eq!(error.status_code(), 429);
    assert!(repositories.observability.list(&user()).await.expect("records").is_empty());
}

#[tokio::test]
async fn rate_limit_on_a_continuation_returns_the_partial_answer() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![
        Ok(calls(Some("Let me look at your goals."), vec![call("g", GET_ACTIVE_GOALS, "{}")])),
        Err(LlmError::RateLimited("slow down".to_string())),
    ]);
    let outcome = runtime(client, &repositories)
        .handle_at(request("What goals do I have?"), now())
        .await
        .expect("partial outcome");

    assert_eq!(outcome.termination, Termination::ContinuationFailed);
    assert_eq!(outcome.response, "Let me look at your goals.");
    assert_eq!(outcome.tools_used, vec![GET_ACTIVE_GOALS.to_string()]);
}

#[tokio::test]
async fn continuation_failure_without_content_uses_the_fallback() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![
        Ok(calls(None, vec![call("g", GET_ACTIVE_GOALS, "{}")])),
        Err(LlmError::Upstream { status: 500, body: "boom".to_string() }),
    ]);
    let outcome = runtime(client, &repositories)
        .handle_at(request("What goals do I have?"), now())
        .await
        .expect("fallback outcome");

    assert_eq!(outcome.response, FALLBACK_RESPONSE);
}

#[tokio::test]
async fn empty_message_after_sanitizing_is_rejected_before_the_model() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![text("unused")]);
    let error = runtime(client.clone(), &repositories)
        .handle_at(request("  system: <|im_start|> [INST]  "), now())
        .await
        .expect_err("invalid input");

    assert!(matches!(error, ChatError::InvalidInput(_)));
    assert_eq!(error.status_code(), 400);
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn disabled_tools_send_no_schemas_and_tool_choice_none() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![text("Hello!")]);
    let settings = ChatSettings { tools_enabled: false, ..ChatSettings::default() };
    let outcome = ChatRuntime::new(settings, client.clone(), repositories)
        .expect("runtime")
        .handle_at(request("log a check-in"), now())
        .await
        .expect("outcome");

    assert_eq!(outcome.termination, Termination::Answered);
    let first = &client.requests()[0];
    assert!(first.tools.is_empty());
    assert_eq!(first.tool_choice, ToolChoice::None);
}

#[tokio::test]
async fn history_and_prompt_frame_the_current_message() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![text("Glad to hear it.")]);
    let mut chat = request("Today went well");
    chat.history = vec![
        HistoryTurn { role: "user".to_string(), content: "Hi".to_string() },
        HistoryTurn { role: "assistant".to_string(), content: "Hello! How are you?".to_string() },
    ];
    runtime(client.clone(), &repositories).handle_at(chat, now()).await.expect("outcome");

    let messages = &client.requests()[0].messages;
    let roles = messages.iter().map(|turn| turn.role).collect::<Vec<_>>();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    assert_eq!(messages[3].content, "Today went well");
}

#[tokio::test]
async fn each_request_appends_one_observability_record() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![
        Ok(calls(None, vec![call("s", SUGGEST_COPING_ACTIVITIES, r#"{"stress_level":"crisis"}"#)])),
        text("Please reach out to 988 right now. You are not alone."),
    ]);
    let outcome = runtime(client, &repositories)
        .handle_at(request("I don't feel safe tonight"), now())
        .await
        .expect("outcome");
    assert!(outcome.intervention_triggered);

    let records = repositories.observability.list(&user()).await.expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].function_name, "chat-with-ai");
    assert_eq!(records[0].tools_called, vec![SUGGEST_COPING_ACTIVITIES.to_string()]);
    assert_eq!(records[0].model_used, "scripted-model");
    assert!(records[0].intervention_triggered);
}

#[tokio::test]
async fn coping_activity_logged_in_two_requests_is_counted_twice() {
    let repositories = Repositories::in_memory();
    for _ in 0..2 {
        let client = ScriptedClient::new(vec![
            Ok(calls(
                None,
                vec![call("a", LOG_COPING_ACTIVITY, r#"{"activity_name":"Deep breathing"}"#)],
            )),
            text("Logged it."),
        ]);
        runtime(client, &repositories)
            .handle_at(request("Please log activity: deep breathing"), now())
            .await
            .expect("outcome");
    }

    let activities = repositories.coping.list(&user()).await.expect("activities");
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].times_used, 2);
}

#[tokio::test]
async fn replaced_gate_can_withhold_write_tools() {
    let repositories = Repositories::in_memory();
    let client = ScriptedClient::new(vec![text("What would you like the goal to be?")]);
    runtime(client.clone(), &repositories)
        .with_gate(Arc::new(ReadOnlyGate))
        .handle_at(request("Create a goal: meditate daily for 14 days"), now())
        .await
        .expect("outcome");

    assert!(!tool_names(&client.requests()[0]).contains(&CREATE_GOAL.to_string()));
}
