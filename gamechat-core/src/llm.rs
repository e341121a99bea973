//! The LLM collaborator.
//!
//! The orchestrator only needs `generate(messages, tools) -> response`;
//! [`ClaudeModel`] provides it over the Anthropic Messages API.

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::message::{Message, Role, ToolCall};
use async_trait::async_trait;
use claude::{Claude, ContentBlock, ToolChoice};
use serde_json::Value;
use std::collections::HashSet;

/// One call to the language model.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<claude::Tool>,
    pub tool_choice: ToolChoice,
}

/// What the model produced: text, tool-call directives, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl LlmResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }
}

/// Capability to generate the next assistant message.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, ChatError>;

    /// Model name for logs.
    fn name(&self) -> &str;
}

/// [`LanguageModel`] backed by Claude.
pub struct ClaudeModel {
    client: Claude,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl ClaudeModel {
    pub fn new(client: Claude, config: &ChatConfig) -> Self {
        let client = match &config.model {
            Some(model) => client.with_model(model),
            None => client,
        };
        Self {
            client,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for ClaudeModel {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, ChatError> {
        let mut claude_request = claude::Request::new(to_claude_messages(&request.messages))
            .with_max_tokens(self.max_tokens)
            .with_tool_choice(request.tool_choice);

        if !request.tools.is_empty() {
            claude_request = claude_request.with_tools(request.tools);
        }
        if let Some(system) = request.system {
            claude_request = claude_request.with_system(system);
        }
        if let Some(temperature) = self.temperature {
            claude_request = claude_request.with_temperature(temperature);
        }

        let response = self.client.complete(claude_request).await?;
        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "claude responded"
        );

        let tool_calls = response
            .tool_uses()
            .into_iter()
            .map(|tool_use| ToolCall {
                id: tool_use.id,
                name: tool_use.name,
                arguments: match tool_use.input {
                    Value::Object(map) => map,
                    // Non-object input still reaches the router so the
                    // schema check can reject it.
                    other => [("_raw".to_string(), other)].into_iter().collect(),
                },
            })
            .collect();

        Ok(LlmResponse {
            text: response.text(),
            tool_calls,
        })
    }

    fn name(&self) -> &str {
        self.client.model()
    }
}

/// Convert session history into Claude's alternating user/assistant shape.
///
/// Tool messages become `tool_result` blocks on the user side. Tool uses
/// without an answer (and answers without a use) are dropped, consecutive
/// same-role messages are merged, and the conversation always starts with
/// the user.
pub fn to_claude_messages(history: &[Message]) -> Vec<claude::Message> {
    let requested: HashSet<&str> = history
        .iter()
        .filter_map(|m| m.tool_call.as_ref().map(|c| c.id.as_str()))
        .collect();
    let answered: HashSet<&str> = history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    let mut out: Vec<claude::Message> = Vec::new();
    for message in history {
        let (role, blocks) = match message.role {
            Role::User => (claude::Role::User, text_block(&message.content)),
            Role::Assistant => {
                let mut blocks = text_block(&message.content);
                if let Some(call) = &message.tool_call {
                    if answered.contains(call.id.as_str()) {
                        blocks.push(ContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: Value::Object(call.arguments.clone()),
                        });
                    }
                }
                (claude::Role::Assistant, blocks)
            }
            Role::Tool => {
                let Some(call_id) = message.tool_call_id.as_deref() else {
                    continue;
                };
                if !requested.contains(call_id) {
                    continue;
                }
                let is_error = message.tool_result.as_ref().is_some_and(|r| !r.success);
                (
                    claude::Role::User,
                    vec![ContentBlock::ToolResult {
                        tool_use_id: call_id.to_string(),
                        content: message.content.clone(),
                        is_error,
                    }],
                )
            }
        };

        if blocks.is_empty() {
            continue;
        }
        if out.is_empty() && role == claude::Role::Assistant {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => out.push(claude::Message {
                role,
                content: blocks,
            }),
        }
    }
    out
}

fn text_block(text: &str) -> Vec<ContentBlock> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::Text {
            text: text.to_string(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorDescriptor, ErrorKind};
    use crate::message::ToolResult;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(
            id,
            "lookup_game",
            json!({"game_name": "Halo"}).as_object().cloned().unwrap(),
        )
    }

    fn failed() -> ToolResult {
        ToolResult::failure(ErrorDescriptor {
            kind: ErrorKind::UpstreamError,
            message: "timeout".into(),
        })
    }

    #[test]
    fn test_tool_round_trip_conversion() {
        let history = vec![
            Message::user("Is Halo on PC?"),
            Message::assistant_tool_call("Checking.", call("toolu_1")),
            Message::tool("toolu_1", failed()),
            Message::assistant("I couldn't reach the database."),
        ];

        let messages = to_claude_messages(&history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].role, claude::Role::Assistant);
        assert_eq!(messages[1].content.len(), 2);
        assert!(matches!(
            &messages[1].content[1],
            ContentBlock::ToolUse { id, .. } if id == "toolu_1"
        ));
        assert!(matches!(
            &messages[2].content[0],
            ContentBlock::ToolResult { tool_use_id, is_error: true, .. } if tool_use_id == "toolu_1"
        ));
    }

    #[test]
    fn test_consecutive_user_messages_merge() {
        let history = vec![Message::user("first"), Message::user("second")];
        let messages = to_claude_messages(&history);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.len(), 2);
    }

    #[test]
    fn test_unanswered_tool_use_dropped() {
        let history = vec![
            Message::user("Tell me about Halo"),
            Message::assistant_tool_call("", call("toolu_9")),
            Message::user("never mind"),
        ];
        let messages = to_claude_messages(&history);
        // The empty assistant message vanishes; both user turns merge.
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, claude::Role::User);
    }

    #[test]
    fn test_leading_assistant_and_orphan_results_dropped() {
        let history = vec![
            Message::assistant("hello"),
            Message::tool("toolu_x", failed()),
            Message::user("hi"),
        ];
        let messages = to_claude_messages(&history);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content[0].as_text(), Some("hi"));
    }
}
