//! Conversation messages and the tool payloads embedded in them.

use crate::error::ErrorDescriptor;
use crate::games::GameRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier the tool message echoes back.
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// A call id for directives that did not come with one.
    pub fn generated_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Outcome of executing a tool call.
///
/// Created by the game data client path, consumed once by the orchestrator
/// and then embedded in a tool message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<GameRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl ToolResult {
    pub fn success(record: GameRecord) -> Self {
        Self {
            success: true,
            payload: Some(record),
            error: None,
        }
    }

    pub fn failure(error: ErrorDescriptor) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error),
        }
    }

    /// The JSON text handed to the LLM as the tool's answer.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"success\":false,\"error\":{{\"kind\":\"upstream_error\",\"message\":\"{e}\"}}}}")
        })
    }
}

/// A single entry in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Text content; empty for an assistant message that only requests a tool.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    /// For tool messages, the id of the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_result: None,
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// An assistant message carrying a tool-call descriptor.
    pub fn assistant_tool_call(text: impl Into<String>, call: ToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::new(Role::Assistant, text)
        }
    }

    /// A tool message answering `call_id`.
    pub fn tool(call_id: impl Into<String>, result: ToolResult) -> Self {
        Self {
            content: result.to_content(),
            tool_result: Some(result),
            tool_call_id: Some(call_id.into()),
            ..Self::new(Role::Tool, "")
        }
    }

    pub fn is_tool_request(&self) -> bool {
        self.role == Role::Assistant && self.tool_call.is_some()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.tool_call, &self.tool_result) {
            (Some(call), _) => write!(
                f,
                "[{}] {} -> {}({})",
                self.role,
                self.content,
                call.name,
                Value::Object(call.arguments.clone())
            ),
            (_, Some(result)) if result.success => {
                let title = result.payload.as_ref().map_or("", |r| r.title.as_str());
                write!(f, "[{}] ok: {}", self.role, title)
            }
            (_, Some(result)) => {
                let reason = result.error.as_ref().map_or("", |e| e.message.as_str());
                write!(f, "[{}] error: {}", self.role, reason)
            }
            _ => write!(f, "[{}] {}", self.role, self.content),
        }
    }
}
