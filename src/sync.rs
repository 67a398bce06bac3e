//! One full sync: download, fingerprint, import when changed, backfill.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reelsync_db::pool::DbPool;
use serde::Serialize;

use crate::backfill::{BackfillReport, BackfillScheduler};
use crate::config::Config;
use crate::dataset::{download_all, ChangeDecision, ChangeDetector, DatasetDownloader, DatasetFiles};
use crate::enrich::ImageUrls;
use crate::import::{BulkDiffImporter, ImportReport};
use crate::tmdb::{DetailSource, TmdbClient};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Import even when the fingerprint matches the last import.
    pub force: bool,
    /// Use the files already in the dataset directory.
    pub skip_download: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub fingerprint: String,
    pub decision: String,
    pub import: Option<ImportReport>,
    pub backfill: Option<BackfillReport>,
}

pub async fn run_sync(config: &Config, pool: DbPool, options: SyncOptions) -> Result<SyncSummary> {
    let files = if options.skip_download {
        let files = DatasetFiles::for_config(&config.dataset)?;
        if !files.missing().is_empty() {
            anyhow::bail!("Dataset files missing: {:?}", files.missing());
        }
        files
    } else {
        let downloader = DatasetDownloader::new(Duration::from_secs(config.dataset.connect_timeout_secs))?;
        download_all(&config.dataset, &downloader)
            .await
            .context("Dataset download failed")?
    };

    let detector = Arc::new(ChangeDetector::new(pool.clone()));
    let outcome = {
        let detector = Arc::clone(&detector);
        let paths = files.all();
        let force = options.force;
        tokio::task::spawn_blocking(move || detector.detect(&paths, force))
            .await
            .context("Fingerprint task panicked")??
    };

    let import = if outcome.needs_import() {
        let importer = BulkDiffImporter::new(pool.clone(), &config.import);
        let report = importer.import_from(&files).await.context("Import failed")?;

        let fingerprint = outcome.fingerprint.clone();
        tokio::task::spawn_blocking(move || detector.commit(&fingerprint))
            .await
            .context("Checkpoint task panicked")??;
        Some(report)
    } else {
        tracing::info!("Dataset unchanged since last import, skipping");
        None
    };

    let backfill = if config.backfill.enabled {
        match TmdbClient::from_config(&config.tmdb)? {
            Some(client) => {
                let source: Arc<dyn DetailSource> = Arc::new(client);
                let scheduler = BackfillScheduler::new(
                    pool,
                    source,
                    ImageUrls::new(config.tmdb.image_base_url.as_str()),
                    &config.backfill,
                );
                Some(scheduler.drain(config.backfill.page_size).await?)
            }
            None => {
                tracing::info!("No TMDB API key configured, skipping backfill");
                None
            }
        }
    } else {
        None
    };

    Ok(SyncSummary {
        fingerprint: outcome.fingerprint,
        decision: decision_label(outcome.decision).to_string(),
        import,
        backfill,
    })
}

fn decision_label(decision: ChangeDecision) -> &'static str {
    match decision {
        ChangeDecision::Unchanged => "unchanged",
        ChangeDecision::Changed => "changed",
        ChangeDecision::Forced => "forced",
    }
}
