//! Game data client.
//!
//! The provider collaborator answers raw JSON queries; this module owns
//! query normalization, best-match selection and mapping provider payloads
//! into [`GameRecord`]s. Calls are never retried here.

mod normalize;
pub mod rawg;

pub use normalize::{normalize_game, normalize_query};
pub use rawg::RawgProvider;

use crate::error::ChatError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Default number of search results requested from the provider.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Errors from game data lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameDataError {
    #[error("no game matches '{0}'")]
    NotFound(String),

    #[error("game data provider is rate limiting requests")]
    RateLimited,

    #[error("game data provider failed: {0}")]
    Upstream(String),
}

impl GameDataError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GameDataError::RateLimited | GameDataError::Upstream(_))
    }
}

impl From<GameDataError> for ChatError {
    fn from(err: GameDataError) -> Self {
        match err {
            GameDataError::NotFound(_) => ChatError::NotFound(err.to_string()),
            GameDataError::RateLimited => ChatError::RateLimited(err.to_string()),
            GameDataError::Upstream(_) => ChatError::UpstreamError(err.to_string()),
        }
    }
}

/// A query understood by a game data provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderQuery {
    /// Title search, results in provider-ranked order.
    Search { name: String, page_size: usize },
    /// Full record for a known identifier.
    Details { id: String },
}

/// External source of game data.
#[async_trait]
pub trait GameDataProvider: Send + Sync {
    /// Run a query and return the provider's raw JSON body.
    async fn query(&self, query: &ProviderQuery) -> Result<Value, GameDataError>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Uniform game record used by tools, messages and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub title: String,
    pub platforms: Vec<String>,
    pub release_date: Option<String>,
    pub rating: Option<f64>,
    pub summary: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Normalizing client over a [`GameDataProvider`].
#[derive(Clone)]
pub struct GameDataClient {
    provider: Arc<dyn GameDataProvider>,
    page_size: usize,
}

impl GameDataClient {
    pub fn new(provider: Arc<dyn GameDataProvider>) -> Self {
        Self {
            provider,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Find the best match for a title.
    ///
    /// An exact case-insensitive title match wins; otherwise the provider's
    /// first result is used.
    pub async fn search_game(&self, name: &str) -> Result<GameRecord, GameDataError> {
        let name = normalize_query(name);
        if name.is_empty() {
            return Err(GameDataError::NotFound(name));
        }

        let body = self
            .provider
            .query(&ProviderQuery::Search {
                name: name.clone(),
                page_size: self.page_size,
            })
            .await?;

        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| GameDataError::Upstream("search response has no results array".into()))?;

        let wanted = name.to_lowercase();
        let best = results
            .iter()
            .find(|game| {
                game.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|title| normalize_query(title).to_lowercase() == wanted)
            })
            .or_else(|| results.first())
            .ok_or_else(|| GameDataError::NotFound(name.clone()))?;

        let record = normalize_game(best)?;
        tracing::debug!(query = %name, title = %record.title, candidates = results.len(), "search matched");
        Ok(record)
    }

    /// Fetch the full record for a known identifier.
    pub async fn get_game_details(&self, id: &str) -> Result<GameRecord, GameDataError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(GameDataError::NotFound(String::new()));
        }

        let body = self
            .provider
            .query(&ProviderQuery::Details { id: id.to_string() })
            .await?;
        normalize_game(&body)
    }
}
