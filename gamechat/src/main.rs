//! Console chat with a video-game aware assistant.
//!
//! ```bash
//! cargo run -p gamechat -- --session my-session
//! ```
//!
//! Diagnostics go to stderr (filter with `RUST_LOG`); the transcript goes to
//! stdout.

mod console;

use gamechat_core::ChatService;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "gamechat=info,gamechat_core=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let session_id = args
        .iter()
        .position(|a| a == "--session")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "default".to_string());

    let service = match ChatService::from_env().await {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Set ANTHROPIC_API_KEY and RAWG_API_KEY in a .env file or the environment.");
            std::process::exit(1);
        }
    };

    tracing::info!(session_id, "starting console");
    let result = console::run(&service, &session_id).await;
    service.shutdown();
    result.map_err(|e| e.into())
}

fn print_help() {
    println!("gamechat - ask an assistant about video games");
    println!();
    println!("USAGE:");
    println!("    gamechat [--session <id>]");
    println!();
    println!("OPTIONS:");
    println!("    --session <id>    Conversation to join (default: \"default\")");
    println!("    -h, --help        Print this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    ANTHROPIC_API_KEY          Claude API key (required)");
    println!("    RAWG_API_KEY               RAWG API key (required)");
    println!("    GAMECHAT_MODEL             Model override");
    println!("    GAMECHAT_LOG_PATH          Interaction log (default logs/interactions.jsonl)");
    println!("    GAMECHAT_HISTORY_WINDOW    Messages of history sent to the model");
    println!("    RUST_LOG                   Diagnostic log filter");
}
