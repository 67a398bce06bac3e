//! The bulk dataset: download, change detection and line-oriented decoding.

pub mod download;
pub mod fingerprint;
pub mod reader;
pub mod records;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use download::{DatasetDownloader, DownloadOutcome};
pub use fingerprint::{ChangeDecision, ChangeDetector, DetectOutcome};

use crate::config::DatasetConfig;

/// Local paths of the three dataset files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    /// Titles with kind, names, years, runtime and genres.
    pub basics: PathBuf,
    /// Episode to show/season/episode cross references.
    pub episodes: PathBuf,
    /// Average score and vote count per title.
    pub ratings: PathBuf,
}

impl DatasetFiles {
    /// Where each configured URL lands inside `dir`.
    pub fn for_config(config: &DatasetConfig) -> Result<Self> {
        let in_dir = |url: &str| -> Result<PathBuf> {
            let name = download::file_name_from_url(url)
                .with_context(|| format!("dataset URL has no file name: {url}"))?;
            Ok(config.dir.join(name))
        };
        Ok(Self {
            basics: in_dir(&config.basics_url)?,
            episodes: in_dir(&config.episodes_url)?,
            ratings: in_dir(&config.ratings_url)?,
        })
    }

    pub fn all(&self) -> Vec<PathBuf> {
        vec![
            self.basics.clone(),
            self.episodes.clone(),
            self.ratings.clone(),
        ]
    }

    pub fn missing(&self) -> Vec<&Path> {
        [&self.basics, &self.episodes, &self.ratings]
            .into_iter()
            .filter(|p| !p.exists())
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Download every dataset file. Any failure aborts: a partially refreshed
/// dataset is never imported.
pub async fn download_all(config: &DatasetConfig, downloader: &DatasetDownloader) -> Result<DatasetFiles> {
    let files = DatasetFiles::for_config(config)?;
    tokio::fs::create_dir_all(&config.dir)
        .await
        .with_context(|| format!("failed to create dataset dir {}", config.dir.display()))?;

    for (url, dest) in [
        (&config.basics_url, &files.basics),
        (&config.episodes_url, &files.episodes),
        (&config.ratings_url, &files.ratings),
    ] {
        downloader.fetch(url, dest).await?;
    }
    Ok(files)
}
