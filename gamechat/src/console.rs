//! Line-oriented chat loop.
//!
//! - Lines starting with `/` are commands (history, log, clear, help, quit)
//! - Everything else is sent to the assistant as a user message

use gamechat_core::{ChatRequest, ChatResponse, ChatService, LogEntry, Message};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const RECENT_LOG_ENTRIES: usize = 10;

/// A parsed console line.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    History(Option<usize>),
    Log(usize),
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
    Chat(&'a str),
}

fn parse(line: &str) -> Option<Input<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Chat(line));
    };

    let mut parts = command.split_whitespace();
    let count = |arg: Option<&str>| arg.and_then(|n| n.parse::<usize>().ok());
    Some(match parts.next() {
        Some("history") => Input::History(count(parts.next())),
        Some("log") => Input::Log(count(parts.next()).unwrap_or(RECENT_LOG_ENTRIES)),
        Some("clear") => Input::Clear,
        Some("help") => Input::Help,
        Some("quit") | Some("exit") => Input::Quit,
        _ => Input::Unknown(line),
    })
}

pub async fn run(service: &ChatService, session_id: &str) -> io::Result<()> {
    println!("=== Game Chat ===");
    println!("Session: {session_id}");
    print_help();
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse(&line) {
            None => continue,
            Some(Input::Quit) => {
                println!("Goodbye!");
                break;
            }
            Some(Input::Help) => print_help(),
            Some(Input::History(limit)) => print_history(&service.history(session_id, limit)),
            Some(Input::Log(count)) => print_log(&service.recent_interactions(count)),
            Some(Input::Clear) => match service.clear(session_id).await {
                Ok(()) => println!("[CLEARED] Conversation history cleared."),
                Err(e) => println!("[ERROR] {e}"),
            },
            Some(Input::Unknown(command)) => {
                println!("[ERROR] Unknown command: {command} (try /help)");
            }
            Some(Input::Chat(text)) => chat(service, session_id, text).await,
        }
    }
    Ok(())
}

/// Send one message; Ctrl-C abandons the turn instead of exiting.
async fn chat(service: &ChatService, session_id: &str, text: &str) {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let response = service
        .handle_cancellable(ChatRequest::new(session_id, text), cancel)
        .await;
    watcher.abort();

    match response {
        Some(ChatResponse::Answer { final_text, .. }) => println!("bot> {final_text}"),
        Some(ChatResponse::Error { error, .. }) => println!("[ERROR] {} ({})", error.message, error.kind),
        None => println!("[CANCELLED]"),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /history [n]  - Show this conversation (last n messages)");
    println!("  /log [n]      - Show recent interaction log entries");
    println!("  /clear        - Forget this conversation");
    println!("  /help         - Show this help");
    println!("  /quit         - Exit");
}

fn print_history(history: &[Message]) {
    if history.is_empty() {
        println!("[HISTORY] No messages yet.");
        return;
    }
    println!("[HISTORY]");
    for message in history {
        println!("  {} {message}", message.timestamp.format("%H:%M:%S"));
    }
}

fn print_log(entries: &[LogEntry]) {
    if entries.is_empty() {
        println!("[LOG] No interactions recorded yet.");
        return;
    }
    println!("[LOG]");
    for entry in entries {
        let tool = entry
            .tool_call
            .as_ref()
            .map(|call| format!(" via {}", call.name))
            .unwrap_or_default();
        let outcome = match (&entry.final_output, &entry.error) {
            (_, Some(error)) => format!("error {}", error.kind),
            (Some(text), None) => truncate(text, 60),
            (None, None) => String::new(),
        };
        println!(
            "  {} [{}] {:?}{tool} -> {outcome}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.session_id,
            truncate(&entry.user_input, 40),
        );
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("   "), None);
        assert_eq!(parse("/quit"), Some(Input::Quit));
        assert_eq!(parse("/exit"), Some(Input::Quit));
        assert_eq!(parse("/history"), Some(Input::History(None)));
        assert_eq!(parse("/history 4"), Some(Input::History(Some(4))));
        assert_eq!(parse("/log"), Some(Input::Log(RECENT_LOG_ENTRIES)));
        assert_eq!(parse("/log 3"), Some(Input::Log(3)));
        assert_eq!(parse("/clear"), Some(Input::Clear));
        assert_eq!(parse("/dance"), Some(Input::Unknown("/dance")));
        assert_eq!(parse(" Is Halo on PC? "), Some(Input::Chat("Is Halo on PC?")));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
