//! Offline episode sweep over shows nobody has opened yet.
//!
//! Runs the same per-show batch a show detail view does, one show at a time,
//! so the cooldown, sentinels and flat-season retry behave identically.

use chrono::{DateTime, Utc};
use reelsync_common::Result;
use reelsync_db::queries::episodes as episode_queries;
use serde::Serialize;

use super::{EpisodeCounts, LazyFetchGate};
use crate::store::with_conn;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    /// Shows selected for the sweep.
    pub shows: usize,
    /// Shows whose episode batch ran.
    pub checked: usize,
    /// Shows with nothing to fetch, e.g. no secondary id could be resolved.
    pub skipped: usize,
    pub failed: usize,
    pub episodes: EpisodeCounts,
}

impl LazyFetchGate {
    /// Fetch episode detail for every show that still has unchecked
    /// episodes, most-voted first, up to `limit` shows.
    pub async fn sweep_episodes(&self, limit: Option<usize>) -> Result<SweepReport> {
        let checked_before = Utc::now()
            .checked_sub_signed(self.episode_cooldown)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let shows = with_conn(&self.pool, move |conn| {
            episode_queries::shows_for_episode_sweep(conn, checked_before, limit)
        })
        .await?;

        let mut report = SweepReport {
            shows: shows.len(),
            ..Default::default()
        };
        tracing::info!(shows = report.shows, "Starting episode sweep");

        for (i, show_id) in shows.into_iter().enumerate() {
            if i > 0 && i % PROGRESS_EVERY == 0 {
                tracing::info!(
                    done = i,
                    total = report.shows,
                    checked = report.checked,
                    failed = report.failed,
                    "Episode sweep progress"
                );
            }

            let show = match with_conn(&self.pool, move |conn| episode_queries::get_show(conn, show_id)).await {
                Ok(show) => show,
                Err(err) => {
                    tracing::warn!(show_id = %show_id, error = %err, "Failed to load show");
                    report.failed += 1;
                    continue;
                }
            };
            let title = self.refresh_title(show.title).await;

            match self.refresh_episodes(show_id, &title).await {
                Ok(Some(counts)) => {
                    report.checked += 1;
                    report.episodes.add(counts);
                }
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(show_id = %show_id, error = %err, "Episode sweep failed for show");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            skipped = report.skipped,
            failed = report.failed,
            fetched = report.episodes.fetched,
            missing = report.episodes.missing,
            "Episode sweep done"
        );
        Ok(report)
    }
}
