//! HTTP implementation of [`DetailSource`] against the TMDB v3 REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reelsync_common::TitleKind;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ApiError, DetailSource, EpisodeDetail, FindResult, TitleDetail};
use crate::config::TmdbConfig;
use crate::ratelimit::{ApiRateLimiter, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB detail client.
///
/// Every first attempt waits on the shared [`ApiRateLimiter`]. Retries after
/// a throttling response sleep per the [`RetryPolicy`] and skip the limiter.
/// Lookups and title details use `lookup_retry` (none by default, so the
/// backfill scheduler sees the throttle); episode details use
/// `episode_retry`.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use reelsync::ratelimit::ApiRateLimiter;
/// use reelsync::tmdb::TmdbClient;
///
/// let limiter = Arc::new(ApiRateLimiter::new(Duration::from_millis(25)));
/// let client = TmdbClient::new("api-key", "https://api.themoviedb.org/3", limiter, Duration::from_secs(10));
/// ```
pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<ApiRateLimiter>,
    lookup_retry: RetryPolicy,
    episode_retry: RetryPolicy,
}

impl TmdbClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        limiter: Arc<ApiRateLimiter>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter,
            lookup_retry: RetryPolicy::none(),
            episode_retry: RetryPolicy::none(),
        })
    }

    /// Client with its own limiter and retry policies taken from `config`.
    /// `None` when no API key is configured.
    pub fn from_config(config: &TmdbConfig) -> Result<Option<Self>, ApiError> {
        let Some(api_key) = config.api_key() else {
            return Ok(None);
        };
        let limiter = Arc::new(ApiRateLimiter::new(Duration::from_millis(config.min_interval_ms)));
        let client = Self::new(
            api_key,
            config.base_url.as_str(),
            limiter,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_episode_retry(RetryPolicy::exponential(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
        ));
        Ok(Some(client))
    }

    pub fn with_lookup_retry(mut self, policy: RetryPolicy) -> Self {
        self.lookup_retry = policy;
        self
    }

    pub fn with_episode_retry(mut self, policy: RetryPolicy) -> Self {
        self.episode_retry = policy;
        self
    }

    /// GET `path` and decode the JSON body, retrying throttles per `policy`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        policy: RetryPolicy,
    ) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);
        self.limiter.acquire().await;

        let mut retries = 0u32;
        loop {
            match self.get_once(&url, query).await {
                Err(ApiError::Throttled { retry_after }) if policy.allows_retry(retries) => {
                    let wait = policy.delay(retries, retry_after);
                    retries += 1;
                    warn!(
                        path,
                        retry = retries,
                        wait_ms = wait.as_millis() as u64,
                        "TMDB returned 429, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        debug!(url, "TMDB request");
        let resp = self
            .http
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => resp
                .json::<T>()
                .await
                .map_err(|e| ApiError::Decode(e.to_string())),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(ApiError::Throttled { retry_after })
            }
            status => Err(ApiError::Status(status.as_u16())),
        }
    }
}

#[async_trait]
impl DetailSource for TmdbClient {
    async fn find(&self, imdb_id: &str) -> Result<FindResult, ApiError> {
        self.get_json(
            &format!("/find/{imdb_id}"),
            &[("external_source", "imdb_id")],
            self.lookup_retry,
        )
        .await
    }

    async fn title_detail(&self, kind: TitleKind, tmdb_id: i64) -> Result<TitleDetail, ApiError> {
        let path = match kind {
            TitleKind::Movie => format!("/movie/{tmdb_id}"),
            TitleKind::Show => format!("/tv/{tmdb_id}"),
        };
        self.get_json(&path, &[], self.lookup_retry).await
    }

    async fn episode_detail(
        &self,
        tmdb_id: i64,
        season: i64,
        episode: i64,
    ) -> Result<EpisodeDetail, ApiError> {
        self.get_json(
            &format!("/tv/{tmdb_id}/season/{season}/episode/{episode}"),
            &[],
            self.episode_retry,
        )
        .await
    }
}
