//! Tools the assistant may call.
//!
//! Only one tool is registered: a game lookup backed by the game data client.

use crate::error::ChatError;
use gamechat_macros::Tool;
use serde::Deserialize;
use serde_json::Value;

/// Look up a video game by title and return its platforms, release date,
/// rating and a short summary. Use this whenever the user asks about a
/// specific game.
#[derive(Debug, Clone, PartialEq, Tool, Deserialize)]
#[tool(name = "lookup_game")]
pub struct LookupGame {
    /// Title of the game, e.g. "Halo" or "The Witcher 3"
    #[tool(non_empty)]
    pub game_name: String,
}

/// A validated tool call, ready to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    LookupGame(LookupGame),
}

impl ToolInvocation {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolInvocation::LookupGame(_) => LookupGame::tool_name(),
        }
    }
}

/// The registered tool set.
pub struct Toolbox;

impl Toolbox {
    /// Tool definitions offered to the LLM.
    pub fn all() -> Vec<claude::Tool> {
        vec![LookupGame::as_tool()]
    }

    pub fn is_registered(name: &str) -> bool {
        name == LookupGame::tool_name()
    }

    /// Resolve a tool name and check its arguments against the tool schema.
    pub fn validate(name: &str, arguments: &Value) -> Result<ToolInvocation, ChatError> {
        if name == LookupGame::tool_name() {
            LookupGame::validate_arguments(arguments)
                .map(ToolInvocation::LookupGame)
                .map_err(|reason| ChatError::InvalidArguments {
                    tool: name.to_string(),
                    reason,
                })
        } else {
            Err(ChatError::UnknownTool(name.to_string()))
        }
    }
}
