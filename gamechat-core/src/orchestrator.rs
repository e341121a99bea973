//! The turn state machine.
//!
//! A turn appends the user message, asks the LLM for a reply, and either
//! finalizes that reply or runs exactly one tool round-trip before asking
//! again. The session's turn lock is held for the whole turn, so turns on
//! one session never interleave while different sessions run in parallel.

use crate::conversation::ConversationStore;
use crate::error::ChatError;
use crate::games::{GameDataClient, GameDataError, GameRecord};
use crate::interaction_log::{InteractionLog, LogEntry};
use crate::llm::{LanguageModel, LlmRequest, LlmResponse};
use crate::message::{Message, Role, ToolCall, ToolResult};
use crate::router::{Decision, RouteError, ToolCallRequest, ToolRouter};
use crate::tools::{ToolInvocation, Toolbox};
use claude::ToolChoice;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Final text used when the model produces nothing usable.
pub const FALLBACK_ANSWER: &str = "Sorry, I don't have an answer for that right now.";

/// Errors that may be retried once.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for GameDataError {
    fn is_transient(&self) -> bool {
        GameDataError::is_transient(self)
    }
}

impl Transient for ChatError {
    fn is_transient(&self) -> bool {
        ChatError::is_transient(self)
    }
}

/// Run `call`, and run it exactly once more if the first failure is transient.
pub async fn with_single_retry<T, E, F, Fut>(operation: &str, mut call: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    match call().await {
        Err(e) if e.is_transient() => {
            tracing::warn!(operation, error = %e, attempt = 1, "transient failure, retrying once");
            call().await
        }
        result => result,
    }
}

/// Per-turn settings taken from [`ChatConfig`](crate::ChatConfig).
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub system_prompt: String,
    pub llm_timeout: Duration,
    pub context_window: Option<usize>,
}

/// What a completed turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub final_text: String,
    pub tool_call: Option<ToolCall>,
    pub tool_result: Option<ToolResult>,
}

/// Drives turns against the store, the LLM and the game data client.
pub struct Orchestrator {
    store: Arc<ConversationStore>,
    model: Arc<dyn LanguageModel>,
    games: GameDataClient,
    log: Arc<InteractionLog>,
    router: ToolRouter,
    settings: TurnSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        model: Arc<dyn LanguageModel>,
        games: GameDataClient,
        log: Arc<InteractionLog>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            store,
            model,
            games,
            log,
            router: ToolRouter::new(),
            settings,
        }
    }

    /// Process one user message to completion.
    ///
    /// Exactly one log entry is written per call, whether the turn succeeds
    /// or fails. A turn abandoned by dropping the future writes none.
    pub async fn run_turn(&self, session_id: &str, user_message: &str) -> Result<TurnOutcome, ChatError> {
        let mut entry = LogEntry::new(session_id, user_message);
        let turn = self.store.lock_turn(session_id).await;
        let result = match &turn {
            Ok(_) => self.drive(session_id, user_message, &mut entry).await,
            Err(e) => Err(e.clone()),
        };

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    session_id,
                    tool = outcome.tool_call.as_ref().map(|c| c.name.as_str()),
                    "turn finalized"
                );
                entry.final_output = Some(outcome.final_text.clone());
            }
            Err(e) => {
                tracing::warn!(session_id, kind = %e.kind(), error = %e, "turn failed");
                entry.error = Some(e.descriptor());
            }
        }
        // Recorded under the turn lock so the log follows history order.
        self.log.record(entry).await;
        drop(turn);
        result
    }

    async fn drive(
        &self,
        session_id: &str,
        user_message: &str,
        entry: &mut LogEntry,
    ) -> Result<TurnOutcome, ChatError> {
        self.store.append(session_id, Message::user(user_message))?;

        let first = self.invoke(session_id, ToolChoice::Auto).await?;
        let (call, preamble, invocation) = match self.router.classify(&first) {
            Ok(Decision::NoToolNeeded(text)) => {
                let final_text = answer_or_fallback(text);
                self.store
                    .append(session_id, Message::assistant(final_text.clone()))?;
                return Ok(TurnOutcome {
                    final_text,
                    tool_call: None,
                    tool_result: None,
                });
            }
            Ok(Decision::ToolCall(ToolCallRequest {
                call,
                invocation,
                preamble,
            })) => (call, preamble, Ok(invocation)),
            Err(RouteError {
                call,
                preamble,
                error,
            }) => {
                tracing::warn!(session_id, tool = %call.name, error = %error, "rejected tool call");
                (call, preamble, Err(error))
            }
        };

        entry.tool_call = Some(call.clone());
        self.store
            .append(session_id, Message::assistant_tool_call(preamble, call.clone()))?;

        let result = match invocation {
            Ok(invocation) => self.execute(session_id, &invocation).await,
            Err(error) => ToolResult::failure(error.descriptor()),
        };
        entry.tool_result = Some(result.clone());
        self.store
            .append(session_id, Message::tool(call.id.clone(), result.clone()))?;

        // The round-trip cap: the follow-up call may not request another tool.
        let second = self.invoke(session_id, ToolChoice::None).await?;
        let final_text = match self.router.classify(&second) {
            Ok(Decision::NoToolNeeded(text)) => text,
            Ok(Decision::ToolCall(ToolCallRequest { call, preamble, .. }))
            | Err(RouteError { call, preamble, .. }) => {
                tracing::warn!(session_id, tool = %call.name, "ignoring tool call after the round-trip");
                preamble
            }
        };
        let final_text = answer_or_fallback(final_text);
        self.store
            .append(session_id, Message::assistant(final_text.clone()))?;

        Ok(TurnOutcome {
            final_text,
            tool_call: Some(call),
            tool_result: Some(result),
        })
    }

    /// One bounded LLM call over the session's current history.
    async fn invoke(&self, session_id: &str, tool_choice: ToolChoice) -> Result<LlmResponse, ChatError> {
        let history = self.store.get_history(session_id, None);
        let request = LlmRequest {
            system: Some(self.settings.system_prompt.clone()),
            messages: context_window(history, self.settings.context_window),
            tools: Toolbox::all(),
            tool_choice,
        };
        tracing::debug!(
            session_id,
            model = self.model.name(),
            messages = request.messages.len(),
            "invoking LLM"
        );

        match tokio::time::timeout(self.settings.llm_timeout, self.model.generate(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(ChatError::LlmError(message))) => Err(ChatError::LlmError(message)),
            Ok(Err(other)) => Err(ChatError::LlmError(other.to_string())),
            Err(_) => Err(ChatError::LlmError(format!(
                "no response within {}s",
                self.settings.llm_timeout.as_secs_f32()
            ))),
        }
    }

    async fn execute(&self, session_id: &str, invocation: &ToolInvocation) -> ToolResult {
        tracing::info!(session_id, tool = invocation.tool_name(), "executing tool");
        match invocation {
            ToolInvocation::LookupGame(args) => self.lookup_game(session_id, &args.game_name).await,
        }
    }

    /// Search for the best match, then enrich it with the full record.
    async fn lookup_game(&self, session_id: &str, game_name: &str) -> ToolResult {
        let found = with_single_retry("search_game", || self.games.search_game(game_name)).await;
        let record = match found {
            Ok(record) => record,
            Err(e) => {
                tracing::info!(session_id, game_name, error = %e, "game lookup failed");
                return ToolResult::failure(ChatError::from(e).descriptor());
            }
        };
        if record.id.is_empty() {
            return ToolResult::success(record);
        }

        match with_single_retry("get_game_details", || self.games.get_game_details(&record.id)).await {
            Ok(details) => ToolResult::success(merge_records(record, details)),
            Err(e) => {
                tracing::debug!(session_id, id = %record.id, error = %e, "keeping search result without details");
                ToolResult::success(record)
            }
        }
    }
}

/// Details win, except where the detail body left a field empty.
fn merge_records(search: GameRecord, details: GameRecord) -> GameRecord {
    GameRecord {
        platforms: if details.platforms.is_empty() {
            search.platforms
        } else {
            details.platforms
        },
        genres: if details.genres.is_empty() {
            search.genres
        } else {
            details.genres
        },
        release_date: details.release_date.or(search.release_date),
        rating: details.rating.or(search.rating),
        summary: if details.summary.is_empty() {
            search.summary
        } else {
            details.summary
        },
        ..details
    }
}

fn answer_or_fallback(text: String) -> String {
    if text.trim().is_empty() {
        FALLBACK_ANSWER.to_string()
    } else {
        text
    }
}

/// Keep at most the last `window` messages, starting at a user message.
///
/// The most recent user message is always kept, even if that exceeds the
/// window.
pub fn context_window(history: Vec<Message>, window: Option<usize>) -> Vec<Message> {
    let Some(window) = window else {
        return history;
    };
    let Some(last_user) = history.iter().rposition(|m| m.role == Role::User) else {
        return history;
    };

    let mut start = history.len().saturating_sub(window).min(last_user);
    while history[start].role != Role::User {
        start += 1;
    }
    history.into_iter().skip(start).collect()
}
