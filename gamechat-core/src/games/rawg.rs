//! RAWG Video Games Database provider.

use super::{GameDataError, GameDataProvider, ProviderQuery};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.rawg.io/api";

/// HTTP provider for the RAWG API.
///
/// Every request carries an explicit timeout and is attempted exactly once.
#[derive(Clone)]
pub struct RawgProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl RawgProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Config(format!("failed to build RAWG client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, query: &ProviderQuery) -> reqwest::RequestBuilder {
        let builder = match query {
            ProviderQuery::Search { name, page_size } => self
                .client
                .get(format!("{}/games", self.base_url))
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("search", name.as_str()),
                    ("search_precise", "true"),
                ])
                .query(&[("page_size", page_size)]),
            ProviderQuery::Details { id } => self
                .client
                .get(format!("{}/games/{id}", self.base_url))
                .query(&[("key", self.api_key.as_str())]),
        };
        builder.timeout(self.timeout)
    }
}

#[async_trait]
impl GameDataProvider for RawgProvider {
    async fn query(&self, query: &ProviderQuery) -> Result<Value, GameDataError> {
        let response = self.request(query).send().await.map_err(|e| {
            if e.is_timeout() {
                GameDataError::Upstream(format!("request timed out after {:?}", self.timeout))
            } else {
                GameDataError::Upstream(format!("request failed: {e}"))
            }
        })?;

        if let Some(err) = classify_status(response.status(), query) {
            return Err(err);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GameDataError::Upstream(format!("malformed response body: {e}")))
    }

    fn name(&self) -> &str {
        "rawg"
    }
}

/// Map an HTTP status to a lookup failure, or `None` on success.
fn classify_status(status: StatusCode, query: &ProviderQuery) -> Option<GameDataError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::NOT_FOUND => GameDataError::NotFound(match query {
            ProviderQuery::Search { name, .. } => name.clone(),
            ProviderQuery::Details { id } => id.clone(),
        }),
        StatusCode::TOO_MANY_REQUESTS => GameDataError::RateLimited,
        other => GameDataError::Upstream(format!("HTTP {other}")),
    })
}
