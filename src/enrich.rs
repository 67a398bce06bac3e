//! Per-title resolution against the detail API.
//!
//! Shared by the backfill scheduler and the inline enrichment of the lazy
//! gate: resolve the secondary id from the catalog id, fetch the detail
//! record and merge it fill-if-empty. Every outcome except a throttle clears
//! the title's backlog flag.

use std::time::Duration;

use reelsync_common::{ImageRef, Result};
use reelsync_db::models::{BackfillCandidate, Enrichment};
use reelsync_db::pool::DbPool;
use reelsync_db::queries::titles;

use crate::store::with_conn;
use crate::tmdb::{image_url, ApiError, DetailSource, FindCandidate, TitleDetail, POSTER_SIZE, STILL_SIZE};

/// Builds absolute image URLs from the relative paths the API returns.
#[derive(Debug, Clone)]
pub struct ImageUrls {
    base: String,
}

impl ImageUrls {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// A poster reference, or [`ImageRef::NotFound`] when the record has none.
    pub fn poster(&self, path: Option<&str>) -> ImageRef {
        self.resolve(POSTER_SIZE, path)
    }

    pub fn still(&self, path: Option<&str>) -> ImageRef {
        self.resolve(STILL_SIZE, path)
    }

    fn resolve(&self, size: &str, path: Option<&str>) -> ImageRef {
        match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => ImageRef::Resolved(image_url(&self.base, size, path)),
            None => ImageRef::NotFound,
        }
    }
}

pub(crate) fn text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn positive_f64(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

pub(crate) fn positive_i64(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v > 0)
}

/// Values a lookup candidate carries. Runtime only comes from detail records.
pub(crate) fn from_candidate(candidate: &FindCandidate, images: &ImageUrls) -> Enrichment {
    Enrichment {
        tmdb_id: Some(candidate.id),
        image: images.poster(candidate.poster_path.as_deref()),
        original_language: text(candidate.original_language.as_deref()),
        release_date: text(candidate.date()),
        popularity: positive_f64(candidate.popularity),
        origin_country: text(candidate.first_origin_country()),
        runtime_minutes: None,
    }
}

pub(crate) fn from_detail(tmdb_id: i64, detail: &TitleDetail, images: &ImageUrls) -> Enrichment {
    Enrichment {
        tmdb_id: Some(tmdb_id),
        image: images.poster(detail.poster_path.as_deref()),
        original_language: text(detail.original_language.as_deref()),
        release_date: text(detail.date()),
        popularity: positive_f64(detail.popularity),
        origin_country: text(detail.first_origin_country()),
        runtime_minutes: positive_i64(detail.runtime_minutes()),
    }
}

/// What happened to one backlog row.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Detail merged and flag cleared.
    Enriched,
    /// No catalog id to resolve from. Flag cleared.
    NoExternalId,
    /// The lookup returned no candidate. Flag cleared.
    Unresolvable,
    /// The lookup or detail call failed. Flag cleared.
    Failed(ApiError),
    /// The API asked us to slow down. Flag kept for a later page.
    Throttled(Option<Duration>),
}

impl Resolution {
    pub fn keeps_flag(&self) -> bool {
        matches!(self, Resolution::Throttled(_))
    }
}

/// Resolve and enrich one flagged title.
///
/// API outcomes never fail this call; only store errors do.
pub(crate) async fn resolve_title(
    pool: &DbPool,
    source: &dyn DetailSource,
    images: &ImageUrls,
    row: &BackfillCandidate,
) -> Result<Resolution> {
    let id = row.id;
    let Some(imdb_id) = row.imdb_id.as_deref().filter(|s| !s.is_empty()) else {
        with_conn(pool, move |conn| titles::clear_backfill_flag(conn, id)).await?;
        return Ok(Resolution::NoExternalId);
    };

    let (kind, tmdb_id) = match row.tmdb_id {
        Some(tmdb_id) => (row.kind, tmdb_id),
        None => match source.find(imdb_id).await {
            Ok(found) => match found.pick(row.kind) {
                Some((kind, candidate)) => (kind, candidate.id),
                None => {
                    tracing::debug!(imdb_id, "No lookup candidate");
                    with_conn(pool, move |conn| titles::clear_backfill_flag(conn, id)).await?;
                    return Ok(Resolution::Unresolvable);
                }
            },
            Err(ApiError::Throttled { retry_after }) => return Ok(Resolution::Throttled(retry_after)),
            Err(err) => {
                tracing::debug!(imdb_id, error = %err, "Lookup failed");
                with_conn(pool, move |conn| titles::clear_backfill_flag(conn, id)).await?;
                return Ok(Resolution::Failed(err));
            }
        },
    };

    match source.title_detail(kind, tmdb_id).await {
        Ok(detail) => {
            let enrichment = from_detail(tmdb_id, &detail, images);
            with_conn(pool, move |conn| titles::apply_enrichment(conn, id, &enrichment)).await?;
            Ok(Resolution::Enriched)
        }
        Err(ApiError::Throttled { retry_after }) => Ok(Resolution::Throttled(retry_after)),
        Err(err) => {
            tracing::debug!(imdb_id, tmdb_id, error = %err, "Detail call failed");
            with_conn(pool, move |conn| titles::clear_backfill_flag(conn, id)).await?;
            Ok(Resolution::Failed(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poster_joins_base_and_size() {
        let images = ImageUrls::new("https://image.tmdb.org/t/p/");
        assert_eq!(
            images.poster(Some("/abc.jpg")),
            ImageRef::Resolved("https://image.tmdb.org/t/p/w500/abc.jpg".into())
        );
        assert_eq!(
            images.still(Some("/e.jpg")).url(),
            Some("https://image.tmdb.org/t/p/w400/e.jpg")
        );
    }

    #[test]
    fn missing_path_is_not_found() {
        let images = ImageUrls::new("https://img");
        assert_eq!(images.poster(None), ImageRef::NotFound);
        assert_eq!(images.poster(Some("  ")), ImageRef::NotFound);
    }

    #[test]
    fn empty_and_zero_values_are_dropped() {
        let detail = TitleDetail {
            original_language: Some(String::new()),
            popularity: Some(0.0),
            runtime: Some(0),
            release_date: Some("2001-02-03".into()),
            ..Default::default()
        };
        let e = from_detail(9, &detail, &ImageUrls::new("https://img"));
        assert_eq!(e.tmdb_id, Some(9));
        assert_eq!(e.original_language, None);
        assert_eq!(e.popularity, None);
        assert_eq!(e.runtime_minutes, None);
        assert_eq!(e.release_date.as_deref(), Some("2001-02-03"));
        assert_eq!(e.image, ImageRef::NotFound);
    }
}
