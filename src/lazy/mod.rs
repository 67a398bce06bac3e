//! Read-time enrichment of detail views.
//!
//! The gate runs inline when a title or show detail view is requested. It
//! fetches only what is missing, records definitive misses as negative
//! sentinels so repeat views cost nothing, and never fails a view because
//! the detail API did: every fetch error is logged and the view renders with
//! what is stored.

mod episodes;
mod sweep;
mod views;

use std::sync::Arc;

use chrono::TimeDelta;
use dashmap::DashMap;
use reelsync_common::{ImageRef, Result, ShowId, TitleId};
use reelsync_db::models::{BackfillCandidate, Enrichment, Title};
use reelsync_db::pool::DbPool;
use reelsync_db::queries::{episodes as episode_queries, genres, titles};

pub use episodes::EpisodeCounts;
pub use sweep::SweepReport;
pub use views::{group_seasons, EpisodeView, SeasonView, ShowView, TitleView};

use crate::config::LazyConfig;
use crate::enrich::{self, resolve_title, ImageUrls};
use crate::store::with_conn;
use crate::tmdb::{ApiError, DetailSource};

pub struct LazyFetchGate {
    pool: DbPool,
    source: Arc<dyn DetailSource>,
    images: ImageUrls,
    episode_cooldown: TimeDelta,
    concurrency: usize,
    /// Shows whose episode batch is being fetched right now.
    in_flight: DashMap<ShowId, ()>,
}

impl LazyFetchGate {
    pub fn new(pool: DbPool, source: Arc<dyn DetailSource>, images: ImageUrls, config: &LazyConfig) -> Self {
        let hours = i64::try_from(config.episode_cooldown_hours).unwrap_or(i64::MAX);
        Self {
            pool,
            source,
            images,
            episode_cooldown: TimeDelta::try_hours(hours).unwrap_or(TimeDelta::MAX),
            concurrency: config.episode_concurrency.max(1),
            in_flight: DashMap::new(),
        }
    }

    pub fn with_episode_cooldown(mut self, cooldown: TimeDelta) -> Self {
        self.episode_cooldown = cooldown;
        self
    }

    /// Detail view of one title.
    ///
    /// Fails only when the title does not exist or the store is unreachable.
    pub async fn title_view(&self, id: TitleId) -> Result<TitleView> {
        let title = with_conn(&self.pool, move |conn| titles::get_title(conn, id)).await?;
        let title = self.refresh_title(title).await;
        let genres = with_conn(&self.pool, move |conn| genres::title_genre_names(conn, id)).await?;
        Ok(TitleView::new(title, genres))
    }

    /// Detail view of one show with its seasons and episodes.
    pub async fn show_view(&self, id: ShowId) -> Result<ShowView> {
        let show = with_conn(&self.pool, move |conn| episode_queries::get_show(conn, id)).await?;
        let title = self.refresh_title(show.title).await;

        if let Err(err) = self.refresh_episodes(id, &title).await {
            tracing::warn!(show_id = %id, error = %err, "Episode fetch failed");
        }

        let title_id = title.id;
        let (genres, episodes) = with_conn(&self.pool, move |conn| {
            Ok((
                genres::title_genre_names(conn, title_id)?,
                episode_queries::list_show_episodes(conn, id)?,
            ))
        })
        .await?;

        Ok(ShowView {
            show_id: id,
            title: TitleView::new(title, genres),
            seasons: group_seasons(episodes),
        })
    }

    /// Fetch what the title is missing and return the row as stored afterwards.
    async fn refresh_title(&self, title: Title) -> Title {
        match self.try_refresh_title(&title).await {
            Ok(false) => title,
            Ok(true) => {
                let id = title.id;
                match with_conn(&self.pool, move |conn| titles::get_title(conn, id)).await {
                    Ok(fresh) => fresh,
                    Err(err) => {
                        tracing::warn!(title_id = %id, error = %err, "Failed to reload title");
                        title
                    }
                }
            }
            Err(err) => {
                tracing::warn!(title_id = %title.id, error = %err, "Lazy title fetch failed");
                title
            }
        }
    }

    /// Returns whether anything may have been written.
    async fn try_refresh_title(&self, title: &Title) -> Result<bool> {
        let Some(imdb_id) = title.imdb_id.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(false);
        };

        if title.needs_backfill {
            let row = BackfillCandidate {
                id: title.id,
                imdb_id: Some(imdb_id.to_string()),
                tmdb_id: title.tmdb_id,
                kind: title.kind,
            };
            let resolution = resolve_title(&self.pool, self.source.as_ref(), &self.images, &row).await?;
            tracing::debug!(title_id = %title.id, ?resolution, "Inline enrichment");
            return Ok(!resolution.keeps_flag());
        }

        if title.image.is_unresolved() {
            return self.fetch_title_image(title, imdb_id).await;
        }
        Ok(false)
    }

    /// Field-level poster fetch for a title whose image was never checked.
    async fn fetch_title_image(&self, title: &Title, imdb_id: &str) -> Result<bool> {
        let enrichment = match title.tmdb_id {
            Some(tmdb_id) => match self.source.title_detail(title.kind, tmdb_id).await {
                Ok(detail) => enrich::from_detail(tmdb_id, &detail, &self.images),
                Err(ApiError::NotFound) => not_found(),
                Err(err) => {
                    tracing::debug!(imdb_id, tmdb_id, error = %err, "Poster fetch failed");
                    return Ok(false);
                }
            },
            None => match self.source.find(imdb_id).await {
                Ok(found) => match found.pick(title.kind) {
                    Some((kind, candidate)) => {
                        let mut enrichment = enrich::from_candidate(candidate, &self.images);
                        if enrichment.origin_country.is_none() && title.origin_country.is_none() {
                            match self.source.title_detail(kind, candidate.id).await {
                                Ok(detail) => {
                                    enrichment.origin_country = enrich::text(detail.first_origin_country());
                                }
                                Err(err) => {
                                    tracing::debug!(imdb_id, error = %err, "Origin country fetch failed");
                                }
                            }
                        }
                        enrichment
                    }
                    None => not_found(),
                },
                Err(err) => {
                    tracing::debug!(imdb_id, error = %err, "Lookup failed");
                    return Ok(false);
                }
            },
        };

        let id = title.id;
        with_conn(&self.pool, move |conn| titles::apply_enrichment(conn, id, &enrichment)).await?;
        Ok(true)
    }
}

fn not_found() -> Enrichment {
    Enrichment {
        image: ImageRef::NotFound,
        ..Default::default()
    }
}

/// Marks a show's episode batch as in progress; released on drop.
struct InFlight<'a> {
    shows: &'a DashMap<ShowId, ()>,
    id: ShowId,
}

impl<'a> InFlight<'a> {
    fn claim(shows: &'a DashMap<ShowId, ()>, id: ShowId) -> Option<Self> {
        match shows.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self { shows, id })
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.shows.remove(&self.id);
    }
}
