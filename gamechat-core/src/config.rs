//! Service configuration.

use crate::error::ServiceError;
use crate::games::{rawg, DEFAULT_PAGE_SIZE};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default interaction log location, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = "logs/interactions.jsonl";

/// System prompt used unless one is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a friendly video game expert. You answer questions about video games: \
release dates, platforms, genres, ratings and what a game is about.

When the user asks about a specific game, call the lookup_game tool with the \
game's title instead of answering from memory. Use the tool's result to write \
a short, conversational answer. If the lookup fails or finds nothing, say so \
plainly and offer what general knowledge you have, making clear it was not \
verified.

For general gaming chat that is not about one specific title, answer directly \
without calling a tool. Keep answers concise.";

/// Configuration for a [`ChatService`](crate::ChatService).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// System prompt sent with every LLM call.
    pub system_prompt: String,

    /// Model override; the client default is used when unset.
    pub model: Option<String>,

    /// Maximum tokens per LLM response.
    pub max_tokens: usize,

    pub temperature: Option<f32>,

    /// Upper bound on a single LLM call.
    pub llm_timeout: Duration,

    /// Upper bound on a single game data request.
    pub game_timeout: Duration,

    pub rawg_base_url: String,

    /// Search results requested per lookup.
    pub page_size: usize,

    /// Interaction log file. `None` keeps entries in memory only.
    pub log_path: Option<PathBuf>,

    /// Send only the last N messages of history to the LLM.
    pub context_window: Option<usize>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: None,
            max_tokens: 1024,
            temperature: Some(0.7),
            llm_timeout: Duration::from_secs(60),
            game_timeout: Duration::from_secs(10),
            rawg_base_url: rawg::DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            log_path: Some(PathBuf::from(DEFAULT_LOG_PATH)),
            context_window: None,
        }
    }
}

impl ChatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_game_timeout(mut self, timeout: Duration) -> Self {
        self.game_timeout = timeout;
        self
    }

    pub fn with_rawg_base_url(mut self, url: impl Into<String>) -> Self {
        self.rawg_base_url = url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Keep interaction log entries in memory only.
    pub fn without_log_file(mut self) -> Self {
        self.log_path = None;
        self
    }

    pub fn with_context_window(mut self, messages: usize) -> Self {
        self.context_window = Some(messages);
        self
    }

    /// Defaults overlaid with `GAMECHAT_*` and `RAWG_BASE_URL` environment variables.
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ChatConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(model) = var("GAMECHAT_MODEL") {
            config.model = Some(model);
        }
        if let Some(tokens) = parse_var("GAMECHAT_MAX_TOKENS", var("GAMECHAT_MAX_TOKENS"))? {
            config.max_tokens = tokens;
        }
        if let Some(temp) = parse_var("GAMECHAT_TEMPERATURE", var("GAMECHAT_TEMPERATURE"))? {
            config.temperature = Some(temp);
        }
        if let Some(secs) = parse_var("GAMECHAT_LLM_TIMEOUT_SECS", var("GAMECHAT_LLM_TIMEOUT_SECS"))? {
            config.llm_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var("GAMECHAT_GAME_TIMEOUT_SECS", var("GAMECHAT_GAME_TIMEOUT_SECS"))? {
            config.game_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = var("GAMECHAT_LOG_PATH") {
            config.log_path = Some(PathBuf::from(path));
        }
        if let Some(window) = parse_var("GAMECHAT_HISTORY_WINDOW", var("GAMECHAT_HISTORY_WINDOW"))? {
            config.context_window = Some(window);
        }
        if let Some(url) = var("RAWG_BASE_URL") {
            config.rawg_base_url = url;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, ServiceError> {
    value
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| ServiceError::Config(format!("{name} has an invalid value: {raw:?}")))
        })
        .transpose()
}
