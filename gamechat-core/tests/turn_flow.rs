//! End-to-end turn tests with a scripted LLM and a scripted game provider.
//!
//! These tests exercise the full path from an inbound request to the stored
//! history and the interaction log, without network access.

use gamechat_core::testing::{
    rawg_details, rawg_game, rawg_search, FailingSink, ScriptedModel, ScriptedProvider,
};
use gamechat_core::{
    ChatConfig, ChatRequest, ChatService, ErrorKind, GameDataError, MemorySink, Role,
};
use serde_json::json;
use std::sync::Arc;

struct Setup {
    service: ChatService,
    model: Arc<ScriptedModel>,
    provider: Arc<ScriptedProvider>,
    sink: Arc<MemorySink>,
}

fn setup(model: ScriptedModel, provider: ScriptedProvider) -> Setup {
    let model = Arc::new(model);
    let provider = Arc::new(provider);
    let sink = Arc::new(MemorySink::new());
    let service = ChatService::new(
        &ChatConfig::new(),
        model.clone(),
        provider.clone(),
        Some(sink.clone()),
    );
    Setup {
        service,
        model,
        provider,
        sink,
    }
}

fn roles(setup: &Setup, session: &str) -> Vec<Role> {
    setup
        .service
        .history(session, None)
        .iter()
        .map(|m| m.role)
        .collect()
}

// =============================================================================
// MESSAGE COUNTS
// =============================================================================

#[tokio::test]
async fn test_turns_append_two_or_four_messages() {
    let halo = rawg_game(2, "Halo: Combat Evolved", "2001-11-15", &["Xbox", "PC"]);
    let s = setup(
        ScriptedModel::new()
            .then_text("Hi! Ask me about any game.")
            .then_lookup("Halo")
            .then_text("Halo: Combat Evolved launched in 2001 for Xbox and PC."),
        ScriptedProvider::new()
            .then_ok(rawg_search(vec![halo.clone()]))
            .then_ok(rawg_details(halo, "The first Master Chief story.")),
    );

    let greeting = s.service.handle(ChatRequest::new("s1", "hello")).await;
    assert_eq!(greeting.final_text(), Some("Hi! Ask me about any game."));
    assert_eq!(s.service.history("s1", None).len(), 2);

    let answer = s.service.handle(ChatRequest::new("s1", "When did Halo come out?")).await;
    assert_eq!(
        answer.final_text(),
        Some("Halo: Combat Evolved launched in 2001 for Xbox and PC.")
    );
    assert_eq!(
        roles(&s, "s1"),
        vec![
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant
        ]
    );

    let entries = s.sink.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].tool_call.is_none());
    let tool_call = entries[1].tool_call.as_ref().unwrap();
    assert_eq!(tool_call.name, "lookup_game");
    assert_eq!(tool_call.arguments["game_name"], "Halo");
    let payload = entries[1].tool_result.as_ref().unwrap().payload.as_ref().unwrap();
    assert_eq!(payload.title, "Halo: Combat Evolved");
    assert_eq!(payload.summary, "The first Master Chief story.");
}

#[tokio::test]
async fn test_history_matches_append_order_across_turns() {
    let s = setup(
        ScriptedModel::new().then_text("a1").then_text("a2").then_text("a3"),
        ScriptedProvider::new(),
    );

    for question in ["q1", "q2", "q3"] {
        s.service.handle(ChatRequest::new("s", question)).await;
    }

    let contents: Vec<String> = s
        .service
        .history("s", None)
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["q1", "a1", "q2", "a2", "q3", "a3"]);
}

// =============================================================================
// RETRY POLICY
// =============================================================================

#[tokio::test]
async fn test_search_timeout_then_success_is_retried() {
    let hades = rawg_game(7, "Hades", "2020-09-17", &["PC", "Nintendo Switch"]);
    let s = setup(
        ScriptedModel::new()
            .then_lookup("Hades")
            .then_text("Hades is on PC and Switch."),
        ScriptedProvider::new()
            .then_err(GameDataError::Upstream("request timed out after 10s".into()))
            .then_ok(rawg_search(vec![hades.clone()]))
            .then_ok(hades),
    );

    let response = s.service.handle(ChatRequest::new("s", "Hades platforms?")).await;
    assert_eq!(response.final_text(), Some("Hades is on PC and Switch."));
    assert_eq!(s.provider.call_count(), 3);

    let result = s.sink.entries()[0].tool_result.clone().unwrap();
    assert!(result.success);
    assert_eq!(result.payload.unwrap().platforms, vec!["PC", "Nintendo Switch"]);
}

#[tokio::test]
async fn test_two_timeouts_surface_upstream_error_to_the_llm() {
    let s = setup(
        ScriptedModel::new()
            .then_lookup("Halo")
            .then_text("The game database is not responding right now."),
        ScriptedProvider::new()
            .then_err(GameDataError::Upstream("request timed out after 10s".into()))
            .then_err(GameDataError::Upstream("request timed out after 10s".into())),
    );

    let response = s.service.handle(ChatRequest::new("s", "Halo?")).await;
    assert_eq!(
        response.final_text(),
        Some("The game database is not responding right now.")
    );
    assert_eq!(s.provider.call_count(), 2);

    let history = s.service.history("s", None);
    assert_eq!(history.len(), 4);
    let tool_result = history[2].tool_result.as_ref().unwrap();
    assert!(!tool_result.success);
    assert_eq!(tool_result.error.as_ref().unwrap().kind, ErrorKind::UpstreamError);

    // The failure reaches the model as the tool's answer.
    let second_request = &s.model.requests()[1];
    let tool_message = second_request.messages.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    assert!(tool_message.content.contains("upstream_error"));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let s = setup(
        ScriptedModel::new()
            .then_lookup("zzzqqqnonexistent")
            .then_text("I couldn't find that game."),
        ScriptedProvider::new().then_ok(rawg_search(vec![])),
    );

    s.service.handle(ChatRequest::new("s", "zzzqqqnonexistent?")).await;
    assert_eq!(s.provider.call_count(), 1);
    let result = s.sink.entries()[0].tool_result.clone().unwrap();
    assert_eq!(result.error.unwrap().kind, ErrorKind::NotFound);
}

// =============================================================================
// ROUTER FAILURES
// =============================================================================

#[tokio::test]
async fn test_unknown_tool_becomes_tool_error() {
    let s = setup(
        ScriptedModel::new()
            .then_tool_call("rawg_popular", json!({"year": 2020}))
            .then_text("I can only look up specific games."),
        ScriptedProvider::new(),
    );

    let response = s.service.handle(ChatRequest::new("s", "Top games of 2020?")).await;
    assert_eq!(response.final_text(), Some("I can only look up specific games."));
    assert_eq!(s.provider.call_count(), 0);

    let history = s.service.history("s", None);
    assert_eq!(history.len(), 4);
    assert_eq!(
        history[2].tool_result.as_ref().unwrap().error.as_ref().unwrap().kind,
        ErrorKind::UnknownTool
    );
}

#[tokio::test]
async fn test_answer_quoting_tool_shaped_json_is_final() {
    let answer = r#"A Minecraft loot entry looks like {"tool": "diamond_pickaxe", "count": 1}."#;
    let s = setup(
        ScriptedModel::new().then_text(answer).then_text("unused"),
        ScriptedProvider::new(),
    );

    let response = s.service.handle(ChatRequest::new("s", "What does loot JSON look like?")).await;
    assert_eq!(response.final_text(), Some(answer));
    assert_eq!(roles(&s, "s"), vec![Role::User, Role::Assistant]);
    assert_eq!(s.model.call_count(), 1);
}

#[tokio::test]
async fn test_missing_game_name_is_invalid_arguments() {
    let s = setup(
        ScriptedModel::new()
            .then_tool_call("lookup_game", json!({}))
            .then_text("Which game do you mean?"),
        ScriptedProvider::new(),
    );

    s.service.handle(ChatRequest::new("s", "Is it good?")).await;
    assert_eq!(s.provider.call_count(), 0);
    let entry = &s.sink.entries()[0];
    assert_eq!(
        entry.tool_result.as_ref().unwrap().error.as_ref().unwrap().kind,
        ErrorKind::InvalidArguments
    );
    assert_eq!(entry.final_output.as_deref(), Some("Which game do you mean?"));
}

// =============================================================================
// LLM FAILURES
// =============================================================================

#[tokio::test]
async fn test_llm_failure_after_tool_keeps_complete_steps() {
    let celeste = rawg_game(3, "Celeste", "2018-01-25", &["PC"]);
    let s = setup(
        ScriptedModel::new().then_lookup("Celeste").then_error("overloaded"),
        ScriptedProvider::new()
            .then_ok(rawg_search(vec![celeste.clone()]))
            .then_ok(celeste),
    );

    let response = s.service.handle(ChatRequest::new("s", "Celeste?")).await;
    assert_eq!(response.error().unwrap().kind, ErrorKind::LlmError);
    assert_eq!(roles(&s, "s"), vec![Role::User, Role::Assistant, Role::Tool]);

    let entry = &s.sink.entries()[0];
    assert!(entry.tool_result.as_ref().unwrap().success);
    assert_eq!(entry.error.as_ref().unwrap().kind, ErrorKind::LlmError);
    assert!(entry.final_output.is_none());
}

#[tokio::test]
async fn test_clear_then_history_is_empty() {
    let s = setup(ScriptedModel::new().then_text("ok"), ScriptedProvider::new());
    s.service.handle(ChatRequest::new("s", "hi")).await;
    s.service.clear("s").await.unwrap();
    assert!(s.service.history("s", None).is_empty());
    s.service.clear("s").await.unwrap();
    assert!(s.service.history("s", None).is_empty());
}

// =============================================================================
// INTERACTION LOG
// =============================================================================

#[tokio::test]
async fn test_failing_log_sink_does_not_fail_the_turn() {
    let service = ChatService::new(
        &ChatConfig::new(),
        Arc::new(ScriptedModel::new().then_text("Zelda is on Switch.")),
        Arc::new(ScriptedProvider::new()),
        Some(Arc::new(FailingSink)),
    );

    let response = service.handle(ChatRequest::new("s", "Where can I play Zelda?")).await;
    assert_eq!(response.final_text(), Some("Zelda is on Switch."));
    assert_eq!(service.failed_log_writes(), 1);
    assert_eq!(service.history("s", None).len(), 2);
    assert_eq!(service.recent_interactions(5).len(), 1);
}
