//! Tool routing.
//!
//! Decides whether an LLM response is a final answer or a request to call a
//! registered tool, and validates the call before anything is executed.

use crate::error::ChatError;
use crate::llm::LlmResponse;
use crate::message::ToolCall;
use crate::tools::{ToolInvocation, Toolbox};
use serde_json::{Map, Value};

/// Result of classifying one LLM response.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The response is a final answer.
    NoToolNeeded(String),
    /// The response asks for a registered tool with valid arguments.
    ToolCall(ToolCallRequest),
}

/// A validated tool request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub call: ToolCall,
    pub invocation: ToolInvocation,
    /// Text the model produced alongside the call, if any.
    pub preamble: String,
}

/// A tool request that cannot be executed.
///
/// Carries the offending call so the orchestrator can still record it and
/// answer it with a failed tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteError {
    pub call: ToolCall,
    pub preamble: String,
    pub error: ChatError,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolRouter;

impl ToolRouter {
    pub fn new() -> Self {
        Self
    }

    /// Classify a response.
    ///
    /// Native tool calls take precedence over inline JSON directives. Only
    /// the first call is honored; any extras are dropped with a warning.
    pub fn classify(&self, response: &LlmResponse) -> Result<Decision, RouteError> {
        let (call, preamble) = match response.tool_calls.split_first() {
            Some((first, rest)) => {
                if !rest.is_empty() {
                    tracing::warn!(
                        used = %first.name,
                        dropped = rest.len(),
                        "model requested several tool calls; only the first is executed"
                    );
                }
                (first.clone(), response.text.trim().to_string())
            }
            None => match inline_directive(&response.text) {
                Some(found) => found,
                None => return Ok(Decision::NoToolNeeded(response.text.clone())),
            },
        };

        let arguments = Value::Object(call.arguments.clone());
        match Toolbox::validate(&call.name, &arguments) {
            Ok(invocation) => Ok(Decision::ToolCall(ToolCallRequest {
                call,
                invocation,
                preamble,
            })),
            Err(error) => Err(RouteError {
                call,
                preamble,
                error,
            }),
        }
    }
}

/// Find a `{"tool": "...", "arguments": {...}}` object embedded in text.
///
/// Only objects naming a registered tool count; any other JSON is part of
/// the answer. Returns the call and the surrounding text with the directive
/// removed. Arguments may also be given under `args`, or as sibling keys of
/// `tool`.
fn inline_directive(text: &str) -> Option<(ToolCall, String)> {
    let mut found: Option<(ToolCall, usize, usize)> = None;
    let mut extra = 0;

    for (start, _) in text.match_indices('{') {
        if found.as_ref().is_some_and(|(_, _, end)| start < *end) {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        let Some(Ok(Value::Object(object))) = stream.next() else {
            continue;
        };
        let end = start + stream.byte_offset();
        let Some(call) = directive_call(object) else {
            continue;
        };
        if found.is_none() {
            found = Some((call, start, end));
        } else {
            extra += 1;
        }
    }

    let (call, start, end) = found?;
    if extra > 0 {
        tracing::warn!(
            used = %call.name,
            dropped = extra,
            "several inline tool directives; only the first is executed"
        );
    }

    let rest = format!("{}{}", &text[..start], &text[end..]);
    let rest = rest
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();
    Some((call, rest))
}

fn directive_call(mut object: Map<String, Value>) -> Option<ToolCall> {
    let name = match object.remove("tool") {
        Some(Value::String(name)) if Toolbox::is_registered(name.trim()) => name.trim().to_string(),
        _ => return None,
    };

    let arguments = match object.remove("arguments").or_else(|| object.remove("args")) {
        Some(Value::Object(arguments)) => arguments,
        Some(other) => [("_raw".to_string(), other)].into_iter().collect(),
        None => object,
    };

    Some(ToolCall::new(ToolCall::generated_id(), name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tools::LookupGame;
    use serde_json::json;

    fn native(name: &str, arguments: Value) -> ToolCall {
        ToolCall::new(
            "toolu_01",
            name,
            arguments.as_object().cloned().unwrap_or_default(),
        )
    }

    #[test]
    fn test_plain_text_needs_no_tool() {
        let decision = ToolRouter::new()
            .classify(&LlmResponse::from_text("Chess has no release date, friend."))
            .unwrap();
        assert_eq!(
            decision,
            Decision::NoToolNeeded("Chess has no release date, friend.".into())
        );
    }

    #[test]
    fn test_native_tool_call() {
        let response = LlmResponse::from_text("Let me check.")
            .with_tool_call(native("lookup_game", json!({"game_name": "Halo"})));

        match ToolRouter::new().classify(&response).unwrap() {
            Decision::ToolCall(request) => {
                assert_eq!(request.call.id, "toolu_01");
                assert_eq!(request.preamble, "Let me check.");
                assert_eq!(
                    request.invocation,
                    ToolInvocation::LookupGame(LookupGame {
                        game_name: "Halo".into()
                    })
                );
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_only_first_call_is_used() {
        let response = LlmResponse::default()
            .with_tool_call(native("lookup_game", json!({"game_name": "Halo"})))
            .with_tool_call(native("lookup_game", json!({"game_name": "Hades"})));

        let Decision::ToolCall(request) = ToolRouter::new().classify(&response).unwrap() else {
            panic!("expected tool call");
        };
        assert_eq!(request.call.arguments["game_name"], "Halo");
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let response = LlmResponse::default()
            .with_tool_call(native("launch_missiles", json!({"target": "moon"})));
        let err = ToolRouter::new().classify(&response).unwrap_err();
        assert_eq!(err.error.kind(), ErrorKind::UnknownTool);
        assert_eq!(err.call.name, "launch_missiles");
    }

    #[test]
    fn test_invalid_arguments_are_rejected() {
        let response =
            LlmResponse::default().with_tool_call(native("lookup_game", json!({"title": "Halo"})));
        let err = ToolRouter::new().classify(&response).unwrap_err();
        assert_eq!(err.error.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn test_inline_directive() {
        let text = r#"Sure! {"tool": "lookup_game", "arguments": {"game_name": "Celeste"}}"#;
        let Decision::ToolCall(request) = ToolRouter::new()
            .classify(&LlmResponse::from_text(text))
            .unwrap()
        else {
            panic!("expected tool call");
        };
        assert!(request.call.id.starts_with("call_"));
        assert_eq!(request.call.arguments["game_name"], "Celeste");
        assert_eq!(request.preamble, "Sure!");
    }

    #[test]
    fn test_inline_directive_with_flat_arguments() {
        let text = "```json\n{\"tool\": \"lookup_game\", \"game_name\": \"Hades\"}\n```";
        let Decision::ToolCall(request) = ToolRouter::new()
            .classify(&LlmResponse::from_text(text))
            .unwrap()
        else {
            panic!("expected tool call");
        };
        assert_eq!(request.call.arguments["game_name"], "Hades");
        assert!(request.preamble.is_empty());
    }

    #[test]
    fn test_first_of_several_inline_directives() {
        let text = r#"{"tool": "lookup_game", "args": {"game_name": "Doom"}} and {"tool": "lookup_game", "args": {"game_name": "Quake"}}"#;
        let Decision::ToolCall(request) = ToolRouter::new()
            .classify(&LlmResponse::from_text(text))
            .unwrap()
        else {
            panic!("expected tool call");
        };
        assert_eq!(request.call.arguments["game_name"], "Doom");
    }

    #[test]
    fn test_inline_json_naming_unregistered_tool_is_text() {
        let text = r#"A Minecraft loot entry looks like {"tool": "diamond_pickaxe", "count": 1}."#;
        assert_eq!(
            ToolRouter::new()
                .classify(&LlmResponse::from_text(text))
                .unwrap(),
            Decision::NoToolNeeded(text.into())
        );
    }

    #[test]
    fn test_registered_directive_after_unrelated_tool_json() {
        let text = r#"Loot: {"tool": "diamond_pickaxe"} then {"tool": "lookup_game", "game_name": "Minecraft"}"#;
        let Decision::ToolCall(request) = ToolRouter::new()
            .classify(&LlmResponse::from_text(text))
            .unwrap()
        else {
            panic!("expected tool call");
        };
        assert_eq!(request.call.arguments["game_name"], "Minecraft");
        assert_eq!(request.preamble, r#"Loot: {"tool": "diamond_pickaxe"} then"#);
    }

    #[test]
    fn test_json_without_tool_key_is_text() {
        let text = r#"The stats are {"hp": 10}."#;
        assert_eq!(
            ToolRouter::new()
                .classify(&LlmResponse::from_text(text))
                .unwrap(),
            Decision::NoToolNeeded(text.into())
        );
    }
}
