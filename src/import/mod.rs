//! Bulk diff import of the dataset files into the metadata store.
//!
//! Stages run in a fixed order: titles, subtype records, genres, seasons,
//! episodes, ratings. Each stage loads a snapshot of what is stored, scans
//! its file once and writes only inserts and real changes, in batches.

mod batch;
mod episodes;
mod genres;
mod ratings;
mod report;
mod titles;

use std::sync::Arc;

use dashmap::DashMap;
use reelsync_common::Result;
use reelsync_db::pool::DbPool;

pub use ratings::stored_precision;
pub use report::{ImportReport, StageReport};

use crate::config::ImportConfig;
use crate::dataset::DatasetFiles;
use batch::BatchRunner;

const PROGRESS_EVERY: u64 = 100_000;

/// Values carried from the titles scan to later stages of the same import.
#[derive(Debug, Default)]
pub(crate) struct ScanContext {
    /// Episode catalog id to display name.
    pub episode_names: DashMap<String, String>,
    /// Title catalog id to its genre names.
    pub title_genres: DashMap<String, Vec<String>>,
}

pub struct BulkDiffImporter {
    runner: BatchRunner,
}

impl BulkDiffImporter {
    pub fn new(pool: DbPool, config: &ImportConfig) -> Self {
        Self {
            runner: BatchRunner::new(pool, config.workers, config.batch_size),
        }
    }

    /// Import all three files. A store error stops the import at the failing
    /// stage; batches committed before it are kept.
    pub async fn import_from(&self, files: &DatasetFiles) -> Result<ImportReport> {
        let ctx = Arc::new(ScanContext::default());
        let mut report = ImportReport::default();

        tracing::info!(path = %files.basics.display(), "Importing titles");
        let outcome = titles::import_titles(&self.runner, files.basics.clone(), Arc::clone(&ctx)).await?;
        report.titles = outcome.report;
        report.discarded_kinds = outcome.discarded;
        report.unrecognized_kinds = outcome.unrecognized;
        log_stage("titles", &report.titles);
        if !report.unrecognized_kinds.is_empty() {
            tracing::warn!(kinds = ?report.unrecognized_kinds, "Rows with unrecognized kinds were skipped");
        }

        report.subtypes = titles::ensure_subtypes(&self.runner).await?;

        report.genres = genres::import_genres(&self.runner, Arc::clone(&ctx)).await?;
        log_stage("genres", &report.genres);

        tracing::info!(path = %files.episodes.display(), "Importing episodes");
        report.seasons = episodes::import_seasons(&self.runner, files.episodes.clone()).await?;
        report.episodes = episodes::import_episodes(&self.runner, files.episodes.clone(), Arc::clone(&ctx)).await?;
        log_stage("episodes", &report.episodes);
        drop(ctx);

        tracing::info!(path = %files.ratings.display(), "Importing ratings");
        report.ratings = ratings::import_ratings(&self.runner, files.ratings.clone()).await?;
        log_stage("ratings", &report.ratings);

        let totals = report.totals();
        tracing::info!(
            inserted = totals.inserted,
            updated = totals.updated,
            unchanged = totals.unchanged,
            "Import complete"
        );
        Ok(report)
    }
}

fn log_stage(stage: &str, report: &StageReport) {
    tracing::info!(
        stage,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        skipped = report.skipped,
        errors = report.errors,
        "Stage complete"
    );
}
