//! Episode-batch fetch for a show detail view.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use reelsync_common::{EpisodeId, ImageRef, Result, ShowId};
use reelsync_db::models::{Episode, EpisodeEnrichment, Title};
use reelsync_db::queries::{episodes as episode_queries, titles};

use super::{InFlight, LazyFetchGate};
use crate::enrich::{self, positive_i64};
use crate::store::with_conn;
use crate::tmdb::{ApiError, EpisodeDetail};

type Fetched = (Episode, std::result::Result<EpisodeDetail, ApiError>);

/// Season whose episodes are tried again under a flat numbering.
const FLAT_SEASON: i64 = 1;

/// Outcome of one show's episode batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EpisodeCounts {
    pub fetched: usize,
    pub missing: usize,
    pub failed: usize,
}

impl EpisodeCounts {
    pub(super) fn add(&mut self, other: EpisodeCounts) {
        self.fetched += other.fetched;
        self.missing += other.missing;
        self.failed += other.failed;
    }
}

impl LazyFetchGate {
    /// Fetch detail for every episode of the show that lacks it, unless the
    /// show was checked within the cooldown window.
    ///
    /// `None` when no batch ran: no secondary id, still cooling down, another
    /// batch for the show in flight, or nothing left to fetch.
    pub(super) async fn refresh_episodes(&self, show_id: ShowId, title: &Title) -> Result<Option<EpisodeCounts>> {
        let Some(tmdb_id) = title.tmdb_id else {
            tracing::debug!(show_id = %show_id, "No secondary id, skipping episodes");
            return Ok(None);
        };

        let now = Utc::now();
        if let Some(checked_at) = title.episodes_checked_at {
            if now.signed_duration_since(checked_at) < self.episode_cooldown {
                return Ok(None);
            }
        }

        let Some(_claim) = InFlight::claim(&self.in_flight, show_id) else {
            tracing::debug!(show_id = %show_id, "Episode fetch already running");
            return Ok(None);
        };

        let episodes = with_conn(&self.pool, move |conn| episode_queries::list_show_episodes(conn, show_id)).await?;
        let offsets = season_offsets(&episodes);
        let targets: Vec<Episode> = episodes
            .into_iter()
            .filter(|e| matches!(e.image, ImageRef::Unresolved | ImageRef::NotFound))
            .collect();
        if targets.is_empty() {
            return Ok(None);
        }
        tracing::info!(show_id = %show_id, tmdb_id, episodes = targets.len(), "Fetching episode details");

        let source = self.source.as_ref();
        let mut results: Vec<Fetched> = stream::iter(targets)
            .map(|episode| async move {
                let outcome = source.episode_detail(tmdb_id, episode.season, episode.episode).await;
                (episode, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let flat = flat_numbered_seasons(&results);
        if !flat.is_empty() {
            let (retry, settled): (Vec<Fetched>, Vec<Fetched>) = results
                .into_iter()
                .partition(|(episode, _)| flat.contains(&episode.season));
            tracing::info!(show_id = %show_id, episodes = retry.len(), seasons = ?flat, "Retrying under flat season numbering");

            let retried: Vec<Fetched> = stream::iter(retry)
                .map(|(episode, first)| {
                    let absolute = offsets.get(&episode.season).copied().unwrap_or(0) + episode.episode;
                    async move {
                        match source.episode_detail(tmdb_id, FLAT_SEASON, absolute).await {
                            Ok(detail) => (episode, Ok(detail)),
                            Err(ApiError::NotFound) => (episode, first),
                            Err(err) => (episode, Err(err)),
                        }
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            results = settled;
            results.extend(retried);
        }

        let mut writes: Vec<(EpisodeId, EpisodeEnrichment)> = Vec::with_capacity(results.len());
        let mut counts = EpisodeCounts::default();
        for (episode, outcome) in results {
            match outcome {
                Ok(detail) => {
                    counts.fetched += 1;
                    writes.push((episode.id, self.episode_enrichment(&detail)));
                }
                Err(ApiError::NotFound) => {
                    counts.missing += 1;
                    writes.push((
                        episode.id,
                        EpisodeEnrichment {
                            image: ImageRef::NotFound,
                            ..Default::default()
                        },
                    ));
                }
                Err(err) => {
                    counts.failed += 1;
                    tracing::debug!(episode_id = %episode.id, season = episode.season, episode = episode.episode, error = %err, "Episode fetch failed");
                }
            }
        }

        let title_id = title.id;
        with_conn(&self.pool, move |conn| {
            for (id, enrichment) in &writes {
                episode_queries::apply_episode_enrichment(conn, *id, enrichment)?;
            }
            titles::touch_episodes_checked(conn, title_id, now)
        })
        .await?;

        tracing::info!(
            show_id = %show_id,
            fetched = counts.fetched,
            missing = counts.missing,
            failed = counts.failed,
            "Episode fetch done"
        );
        Ok(Some(counts))
    }

    fn episode_enrichment(&self, detail: &EpisodeDetail) -> EpisodeEnrichment {
        EpisodeEnrichment {
            image: self.images.still(detail.still_path.as_deref()),
            display_name: enrich::text(detail.name.as_deref()),
            air_date: enrich::text(detail.air_date.as_deref()),
            runtime_minutes: positive_i64(detail.runtime),
            synopsis: enrich::text(detail.overview.as_deref()),
        }
    }
}

/// Number of stored episodes in all seasons before each season.
fn season_offsets(episodes: &[Episode]) -> HashMap<i64, i64> {
    let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
    for episode in episodes {
        *counts.entry(episode.season).or_default() += 1;
    }

    let mut offsets = HashMap::with_capacity(counts.len());
    let mut before = 0;
    for (season, count) in counts {
        offsets.insert(season, before);
        before += count;
    }
    offsets
}

/// Seasons other than the flat season in which every requested episode came
/// back not-found.
fn flat_numbered_seasons(results: &[Fetched]) -> HashSet<i64> {
    let mut all_missing: HashMap<i64, bool> = HashMap::new();
    for (episode, outcome) in results {
        let missing = matches!(outcome, Err(ApiError::NotFound));
        all_missing
            .entry(episode.season)
            .and_modify(|all| *all &= missing)
            .or_insert(missing);
    }
    all_missing
        .into_iter()
        .filter(|&(season, all)| all && season != FLAT_SEASON)
        .map(|(season, _)| season)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsync_common::SeasonId;

    fn episode(season: i64, number: i64) -> Episode {
        Episode {
            id: EpisodeId::from(season * 100 + number),
            season_id: SeasonId::from(season),
            season,
            episode: number,
            imdb_id: None,
            display_name: None,
            image: ImageRef::Unresolved,
            air_date: None,
            runtime_minutes: None,
            synopsis: None,
        }
    }

    #[test]
    fn offsets_count_earlier_seasons() {
        let mut episodes: Vec<Episode> = (1..=24).map(|n| episode(1, n)).collect();
        episodes.extend((1..=24).map(|n| episode(2, n)));
        episodes.extend((1..=3).map(|n| episode(3, n)));

        let offsets = season_offsets(&episodes);
        assert_eq!(offsets[&1], 0);
        assert_eq!(offsets[&2], 24);
        assert_eq!(offsets[&3] + 1, 49);
    }

    #[test]
    fn only_fully_missing_seasons_are_flat() {
        let results: Vec<Fetched> = vec![
            (episode(1, 1), Err(ApiError::NotFound)),
            (episode(2, 1), Err(ApiError::NotFound)),
            (episode(2, 2), Ok(EpisodeDetail::default())),
            (episode(3, 1), Err(ApiError::NotFound)),
            (episode(3, 2), Err(ApiError::NotFound)),
            (episode(4, 1), Err(ApiError::Status(500))),
        ];
        let flat = flat_numbered_seasons(&results);
        assert_eq!(flat, HashSet::from([3]));
    }
}
