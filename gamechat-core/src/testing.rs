//! Testing utilities.
//!
//! Scripted stand-ins for the LLM and the game data provider, so turns can
//! be exercised deterministically without network access:
//! - `ScriptedModel` returns queued responses and records every request
//! - `ScriptedProvider` returns queued payloads or errors and records queries
//! - `FailingSink` rejects every interaction log write

use crate::error::ChatError;
use crate::games::{GameDataError, GameDataProvider, ProviderQuery};
use crate::interaction_log::{LogEntry, LogError, LogSink};
use crate::llm::{LanguageModel, LlmRequest, LlmResponse};
use crate::message::ToolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A language model that replays scripted responses in order.
///
/// Once the script runs out every call fails with `LlmError`.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<LlmResponse, ChatError>>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text answer.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.then(Ok(LlmResponse::from_text(text)))
    }

    /// Queue a response asking for one tool call.
    pub fn then_tool_call(self, name: &str, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            other => [("_raw".to_string(), other)].into_iter().collect(),
        };
        let call = ToolCall::new(ToolCall::generated_id(), name, arguments);
        self.then(Ok(LlmResponse::default().with_tool_call(call)))
    }

    /// Queue a `lookup_game` request for `game_name`.
    pub fn then_lookup(self, game_name: &str) -> Self {
        self.then_tool_call("lookup_game", json!({ "game_name": game_name }))
    }

    /// Queue a model failure.
    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.then(Err(ChatError::LlmError(message.into())))
    }

    pub fn then(self, response: Result<LlmResponse, ChatError>) -> Self {
        lock(&self.script).push_back(response);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, ChatError> {
        lock(&self.requests).push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::LlmError("scripted model has no more responses".into())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A game data provider that replays scripted payloads in order.
///
/// Once the script runs out every query fails with `Upstream`.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Value, GameDataError>>>,
    queries: Mutex<Vec<ProviderQuery>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, body: Value) -> Self {
        lock(&self.script).push_back(Ok(body));
        self
    }

    pub fn then_err(self, error: GameDataError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queries(&self) -> Vec<ProviderQuery> {
        lock(&self.queries).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.queries).len()
    }
}

#[async_trait]
impl GameDataProvider for ScriptedProvider {
    async fn query(&self, query: &ProviderQuery) -> Result<Value, GameDataError> {
        lock(&self.queries).push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Err(GameDataError::Upstream("scripted provider has no more responses".into())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A log sink whose writes always fail.
pub struct FailingSink;

#[async_trait]
impl LogSink for FailingSink {
    async fn append(&self, _entry: &LogEntry) -> Result<(), LogError> {
        Err(LogError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "log file is read-only",
        )))
    }
}

/// A RAWG-shaped game object as returned by search.
pub fn rawg_game(id: u64, name: &str, released: &str, platforms: &[&str]) -> Value {
    let platforms: Vec<Value> = platforms
        .iter()
        .map(|p| json!({ "platform": { "name": p } }))
        .collect();
    json!({
        "id": id,
        "name": name,
        "released": released,
        "rating": 4.2,
        "platforms": platforms,
        "genres": [{ "name": "Action" }],
    })
}

/// A RAWG-shaped search body wrapping `games`.
pub fn rawg_search(games: Vec<Value>) -> Value {
    json!({ "count": games.len(), "results": games })
}

/// A RAWG-shaped detail body: `game` plus a description.
pub fn rawg_details(mut game: Value, description: &str) -> Value {
    if let Value::Object(map) = &mut game {
        map.insert("description_raw".into(), Value::String(description.into()));
    }
    game
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
