//! Conversation core for a video-game aware LLM assistant.
//!
//! This crate provides:
//! - Per-session conversation history with serialized turns
//! - A game data client over the RAWG database
//! - Tool routing for LLM tool-call directives
//! - A turn orchestrator capped at one tool round-trip per turn
//! - A JSON Lines interaction log
//!
//! # Quick Start
//!
//! ```ignore
//! use gamechat_core::{ChatRequest, ChatService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ChatService::from_env().await?;
//!
//!     let response = service
//!         .handle(ChatRequest::new("default", "Is Hades on Switch?"))
//!         .await;
//!     println!("{}", response.final_text().unwrap_or("(no answer)"));
//!
//!     service.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod games;
pub mod interaction_log;
pub mod llm;
pub mod message;
pub mod orchestrator;
pub mod router;
pub mod service;
pub mod testing;
pub mod tools;

// Re-export for convenience
pub use gamechat_macros::Tool;

// Primary public API
pub use config::ChatConfig;
pub use conversation::{ConversationStore, TurnGuard};
pub use error::{ChatError, ErrorDescriptor, ErrorKind, ServiceError};
pub use games::{GameDataClient, GameDataError, GameDataProvider, GameRecord, ProviderQuery, RawgProvider};
pub use interaction_log::{InteractionLog, JsonlFileSink, LogEntry, LogSink, MemorySink};
pub use llm::{ClaudeModel, LanguageModel, LlmRequest, LlmResponse};
pub use message::{Message, Role, ToolCall, ToolResult};
pub use orchestrator::{with_single_retry, Orchestrator, TurnOutcome, TurnSettings};
pub use router::{Decision, RouteError, ToolCallRequest, ToolRouter};
pub use service::{ChatRequest, ChatResponse, ChatService};
pub use testing::{ScriptedModel, ScriptedProvider};
