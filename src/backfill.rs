//! Drains the "needs enrichment" backlog.
//!
//! Pages are re-queried after each one completes: processing clears flags,
//! so the next page is simply the next most-voted flagged rows. The loop
//! ends on an empty page, or after `max_stalled_pages` consecutive pages in
//! which every row was throttled.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reelsync_common::Result;
use reelsync_db::pool::DbPool;
use reelsync_db::queries::titles;
use serde::Serialize;

use crate::config::BackfillConfig;
use crate::enrich::{resolve_title, ImageUrls, Resolution};
use crate::store::with_conn;
use crate::tmdb::DetailSource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub pages: u64,
    pub processed: u64,
    pub enriched: u64,
    /// Rows with no catalog id or no lookup candidate.
    pub cleared_unresolvable: u64,
    /// Rows whose lookup or detail call failed.
    pub cleared_failed: u64,
    /// Throttled rows, left flagged.
    pub throttled: u64,
    /// The loop gave up because pages stopped making progress.
    pub stalled: bool,
}

impl BackfillReport {
    fn record(&mut self, resolution: &Resolution) {
        self.processed += 1;
        match resolution {
            Resolution::Enriched => self.enriched += 1,
            Resolution::NoExternalId | Resolution::Unresolvable => self.cleared_unresolvable += 1,
            Resolution::Failed(_) => self.cleared_failed += 1,
            Resolution::Throttled(_) => self.throttled += 1,
        }
    }
}

pub struct BackfillScheduler {
    pool: DbPool,
    source: Arc<dyn DetailSource>,
    images: ImageUrls,
    workers: usize,
    cooldown: Duration,
    max_stalled_pages: u32,
}

impl BackfillScheduler {
    pub fn new(pool: DbPool, source: Arc<dyn DetailSource>, images: ImageUrls, config: &BackfillConfig) -> Self {
        Self {
            pool,
            source,
            images,
            workers: config.workers.max(1),
            cooldown: Duration::from_secs(config.throttle_cooldown_secs),
            max_stalled_pages: config.max_stalled_pages.max(1),
        }
    }

    /// Override the sleep after a throttling response.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Process flagged rows, `page_size` at a time, until none are left.
    ///
    /// Per-row API failures are absorbed into the report. A store error
    /// aborts the drain.
    pub async fn drain(&self, page_size: usize) -> Result<BackfillReport> {
        let page_size = page_size.max(1);
        let pending = with_conn(&self.pool, titles::count_backfill_pending).await?;
        tracing::info!(pending, page_size, "Starting backfill");

        let mut report = BackfillReport::default();
        let mut stalled_pages = 0u32;

        loop {
            let page = with_conn(&self.pool, move |conn| titles::backfill_page(conn, page_size)).await?;
            if page.is_empty() {
                break;
            }
            report.pages += 1;

            let outcomes: Vec<Result<Resolution>> = stream::iter(page.iter())
                .map(|row| self.process(row))
                .buffer_unordered(self.workers)
                .collect()
                .await;

            let mut progressed = false;
            for outcome in outcomes {
                let resolution = outcome?;
                progressed |= !resolution.keeps_flag();
                report.record(&resolution);
            }

            if report.pages % 10 == 0 {
                tracing::info!(
                    pages = report.pages,
                    processed = report.processed,
                    enriched = report.enriched,
                    "Backfill progress"
                );
            }

            if progressed {
                stalled_pages = 0;
            } else {
                stalled_pages += 1;
                if stalled_pages >= self.max_stalled_pages {
                    tracing::warn!(pages = stalled_pages, "Backfill stalled on throttling, stopping");
                    report.stalled = true;
                    break;
                }
            }
        }

        tracing::info!(
            pages = report.pages,
            enriched = report.enriched,
            cleared_unresolvable = report.cleared_unresolvable,
            cleared_failed = report.cleared_failed,
            throttled = report.throttled,
            "Backfill complete"
        );
        Ok(report)
    }

    async fn process(&self, row: &reelsync_db::models::BackfillCandidate) -> Result<Resolution> {
        let resolution = resolve_title(&self.pool, self.source.as_ref(), &self.images, row).await?;
        if let Resolution::Throttled(retry_after) = &resolution {
            tracing::debug!(title_id = %row.id, ?retry_after, cooldown = ?self.cooldown, "Throttled, cooling down");
            tokio::time::sleep(self.cooldown).await;
        }
        Ok(resolution)
    }
}
