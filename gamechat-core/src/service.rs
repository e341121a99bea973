//! Process-wide chat service.
//!
//! `ChatService` owns the conversation store, the interaction log and the
//! orchestrator for the lifetime of the process. It is created once at
//! startup and dropped (with all sessions) at shutdown.

use crate::config::ChatConfig;
use crate::conversation::ConversationStore;
use crate::error::{ChatError, ErrorDescriptor, ServiceError};
use crate::games::{GameDataClient, GameDataProvider, RawgProvider};
use crate::interaction_log::{InteractionLog, JsonlFileSink, LogEntry, LogSink};
use crate::llm::{ClaudeModel, LanguageModel};
use crate::message::Message;
use crate::orchestrator::{Orchestrator, TurnSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// An inbound chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Omit to start a new session.
    #[serde(default)]
    pub session_id: Option<String>,
    pub user_message: String,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            user_message: user_message.into(),
        }
    }

    /// A request that starts a fresh session.
    pub fn new_session(user_message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            user_message: user_message.into(),
        }
    }
}

/// The reply to a [`ChatRequest`]: final text or an error descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Answer {
        session_id: String,
        final_text: String,
    },
    Error {
        session_id: String,
        error: ErrorDescriptor,
    },
}

impl ChatResponse {
    pub fn session_id(&self) -> &str {
        match self {
            ChatResponse::Answer { session_id, .. } | ChatResponse::Error { session_id, .. } => session_id,
        }
    }

    pub fn final_text(&self) -> Option<&str> {
        match self {
            ChatResponse::Answer { final_text, .. } => Some(final_text),
            ChatResponse::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        match self {
            ChatResponse::Answer { .. } => None,
            ChatResponse::Error { error, .. } => Some(error),
        }
    }
}

pub struct ChatService {
    store: Arc<ConversationStore>,
    log: Arc<InteractionLog>,
    orchestrator: Orchestrator,
}

impl ChatService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        config: &ChatConfig,
        model: Arc<dyn LanguageModel>,
        provider: Arc<dyn GameDataProvider>,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Self {
        let store = Arc::new(ConversationStore::new());
        let log = Arc::new(InteractionLog::new(sink));
        let games = GameDataClient::new(provider).with_page_size(config.page_size);
        let orchestrator = Orchestrator::new(
            store.clone(),
            model,
            games,
            log.clone(),
            TurnSettings {
                system_prompt: config.system_prompt.clone(),
                llm_timeout: config.llm_timeout,
                context_window: config.context_window,
            },
        );

        Self {
            store,
            log,
            orchestrator,
        }
    }

    /// Build the production service: Claude, RAWG and a JSONL log file.
    ///
    /// Requires `ANTHROPIC_API_KEY` and `RAWG_API_KEY`.
    pub async fn from_env() -> Result<Self, ServiceError> {
        let config = ChatConfig::from_env()?;
        Self::from_config(config).await
    }

    /// Like [`ChatService::from_env`] with an already-built config.
    pub async fn from_config(config: ChatConfig) -> Result<Self, ServiceError> {
        let anthropic_key = required_env("ANTHROPIC_API_KEY")?;
        let rawg_key = required_env("RAWG_API_KEY")?;

        let client = claude::Claude::with_timeout(anthropic_key, config.llm_timeout)?;
        let model = ClaudeModel::new(client, &config);
        let provider = RawgProvider::new(rawg_key, config.game_timeout)?.with_base_url(&config.rawg_base_url);

        let sink: Option<Arc<dyn LogSink>> = match &config.log_path {
            Some(path) => {
                let sink = JsonlFileSink::open(path)
                    .await
                    .map_err(|e| ServiceError::Config(format!("cannot open {}: {e}", path.display())))?;
                tracing::info!(path = %sink.path().display(), "writing interaction log");
                Some(Arc::new(sink))
            }
            None => None,
        };

        tracing::info!(model = model.name(), "chat service ready");
        Ok(Self::new(&config, Arc::new(model), Arc::new(provider), sink))
    }

    /// Process one inbound request.
    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        let session_id = request
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        match self
            .orchestrator
            .run_turn(&session_id, &request.user_message)
            .await
        {
            Ok(outcome) => ChatResponse::Answer {
                session_id,
                final_text: outcome.final_text,
            },
            Err(error) => ChatResponse::Error {
                session_id,
                error: error.descriptor(),
            },
        }
    }

    /// Like [`ChatService::handle`], abandoning the turn when `cancel` fires.
    ///
    /// Returns `None` for a cancelled turn. Steps already completed stay in
    /// the history; the interrupted step appends nothing.
    pub async fn handle_cancellable(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Option<ChatResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(session_id = ?request.session_id, "turn cancelled");
                None
            }
            response = self.handle(request.clone()) => Some(response),
        }
    }

    /// A session's history, optionally limited to the last `limit` messages.
    pub fn history(&self, session_id: &str, limit: Option<usize>) -> Vec<Message> {
        self.store.get_history(session_id, limit)
    }

    /// Forget a session's history.
    ///
    /// Waits for any turn in progress on the session to finish first.
    pub async fn clear(&self, session_id: &str) -> Result<(), ChatError> {
        let _turn = self.store.lock_turn(session_id).await?;
        self.store.clear(session_id);
        Ok(())
    }

    /// The last `count` interaction log entries, oldest first.
    pub fn recent_interactions(&self, count: usize) -> Vec<LogEntry> {
        self.log.recent(count)
    }

    /// Interaction log entries the sink failed to persist.
    pub fn failed_log_writes(&self) -> usize {
        self.log.failed_writes()
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Drop every in-memory session. Nothing is persisted.
    pub fn shutdown(self) {
        let sessions = self.store.drain();
        tracing::info!(
            sessions,
            failed_log_writes = self.failed_log_writes(),
            "chat service shut down"
        );
    }
}

fn required_env(name: &'static str) -> Result<String, ServiceError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ServiceError::MissingEnv(name))
}
