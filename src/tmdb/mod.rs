//! TMDB (The Movie Database) detail API.
//!
//! [`DetailSource`] is the seam the backfill scheduler and the lazy-fetch
//! gate call through; [`TmdbClient`] is the HTTP implementation. Errors are
//! classified into [`ApiError`] so callers can branch on throttling and
//! not-found outcomes without inspecting status codes.

mod client;
mod types;

pub use client::TmdbClient;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use reelsync_common::TitleKind;

/// Outcome classes of a failed detail API call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("throttled (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, ApiError::Throttled { .. })
    }
}

/// Per-item detail lookups.
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Resolve candidates for a catalog id, partitioned by media kind.
    async fn find(&self, imdb_id: &str) -> Result<FindResult, ApiError>;

    /// Full record for a resolved id.
    async fn title_detail(&self, kind: TitleKind, tmdb_id: i64) -> Result<TitleDetail, ApiError>;

    /// One episode of a resolved show.
    async fn episode_detail(
        &self,
        tmdb_id: i64,
        season: i64,
        episode: i64,
    ) -> Result<EpisodeDetail, ApiError>;
}
