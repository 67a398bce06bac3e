//! Shared helpers for integration tests.
//!
//! Provides a file-backed pool in a temp dir, a gzip dataset writer, and
//! [`FakeSource`], a scripted [`DetailSource`] that counts its calls.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reelsync::config::DatasetConfig;
use reelsync::dataset::DatasetFiles;
use reelsync::tmdb::{ApiError, DetailSource, EpisodeDetail, FindResult, TitleDetail};
use reelsync_common::TitleKind;
use reelsync_db::pool::{init_pool, DbPool};
use tempfile::TempDir;

pub const BASICS_HEADER: &str =
    "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres";
pub const EPISODES_HEADER: &str = "tconst\tparentTconst\tseasonNumber\tepisodeNumber";
pub const RATINGS_HEADER: &str = "tconst\taverageRating\tnumVotes";

/// A pool over a SQLite file inside a fresh temp dir.
pub fn file_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reelsync.db");
    let pool = init_pool(path.to_str().unwrap()).unwrap();
    (dir, pool)
}

/// Write `lines` gzip-compressed, one per line, to `dir/name`.
pub fn write_gz(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::fast());
    for line in lines {
        writeln!(encoder, "{line}").unwrap();
    }
    encoder.finish().unwrap();
    path
}

/// Write the three dataset files (headers added) where the default config
/// expects them inside `dir`.
pub fn write_dataset(dir: &Path, basics: &[&str], episodes: &[&str], ratings: &[&str]) -> DatasetFiles {
    let config = dataset_config(dir);
    let files = DatasetFiles::for_config(&config).unwrap();

    let with_header = |header: &'static str, rows: &[&str]| -> Vec<String> {
        std::iter::once(header.to_string())
            .chain(rows.iter().map(|r| r.to_string()))
            .collect()
    };
    for (path, header, rows) in [
        (&files.basics, BASICS_HEADER, basics),
        (&files.episodes, EPISODES_HEADER, episodes),
        (&files.ratings, RATINGS_HEADER, ratings),
    ] {
        let lines = with_header(header, rows);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        write_gz(path.parent().unwrap(), path.file_name().unwrap().to_str().unwrap(), &refs);
    }
    files
}

pub fn dataset_config(dir: &Path) -> DatasetConfig {
    DatasetConfig {
        dir: dir.to_path_buf(),
        ..DatasetConfig::default()
    }
}

/// Run one statement and return the first column of the first row.
pub fn scalar<T: rusqlite::types::FromSql>(pool: &DbPool, sql: &str) -> T {
    pool.get().unwrap().query_row(sql, [], |row| row.get(0)).unwrap()
}

pub fn exec(pool: &DbPool, sql: &str) {
    pool.get().unwrap().execute_batch(sql).unwrap();
}

// ---------------------------------------------------------------------------
// Scripted detail source
// ---------------------------------------------------------------------------

/// Unscripted calls answer [`ApiError::NotFound`].
#[derive(Default)]
pub struct FakeSource {
    finds: HashMap<String, Result<FindResult, ApiError>>,
    details: HashMap<(TitleKind, i64), Result<TitleDetail, ApiError>>,
    episodes: HashMap<(i64, i64, i64), Result<EpisodeDetail, ApiError>>,
    episode_delay: Option<Duration>,

    pub find_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub episode_calls: AtomicUsize,
    pub find_log: Mutex<Vec<String>>,
    pub detail_log: Mutex<Vec<(TitleKind, i64)>>,
    pub episode_log: Mutex<Vec<(i64, i64, i64)>>,
    /// Episode calls currently awaiting an answer, and the most ever seen.
    pub episodes_in_flight: AtomicUsize,
    pub peak_episodes_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_find(mut self, imdb_id: &str, result: Result<FindResult, ApiError>) -> Self {
        self.finds.insert(imdb_id.to_string(), result);
        self
    }

    pub fn with_detail(mut self, kind: TitleKind, tmdb_id: i64, result: Result<TitleDetail, ApiError>) -> Self {
        self.details.insert((kind, tmdb_id), result);
        self
    }

    pub fn with_episode(
        mut self,
        tmdb_id: i64,
        season: i64,
        episode: i64,
        result: Result<EpisodeDetail, ApiError>,
    ) -> Self {
        self.episodes.insert((tmdb_id, season, episode), result);
        self
    }

    /// Hold every episode answer for `delay` so concurrent calls overlap.
    pub fn with_episode_delay(mut self, delay: Duration) -> Self {
        self.episode_delay = Some(delay);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
            + self.detail_calls.load(Ordering::SeqCst)
            + self.episode_calls.load(Ordering::SeqCst)
    }

    pub fn episode_requests(&self) -> Vec<(i64, i64, i64)> {
        let mut log = self.episode_log.lock().unwrap().clone();
        log.sort_unstable();
        log
    }
}

#[async_trait]
impl DetailSource for FakeSource {
    async fn find(&self, imdb_id: &str) -> Result<FindResult, ApiError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.find_log.lock().unwrap().push(imdb_id.to_string());
        self.finds.get(imdb_id).cloned().unwrap_or(Err(ApiError::NotFound))
    }

    async fn title_detail(&self, kind: TitleKind, tmdb_id: i64) -> Result<TitleDetail, ApiError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.detail_log.lock().unwrap().push((kind, tmdb_id));
        self.details
            .get(&(kind, tmdb_id))
            .cloned()
            .unwrap_or(Err(ApiError::NotFound))
    }

    async fn episode_detail(&self, tmdb_id: i64, season: i64, episode: i64) -> Result<EpisodeDetail, ApiError> {
        self.episode_calls.fetch_add(1, Ordering::SeqCst);
        self.episode_log.lock().unwrap().push((tmdb_id, season, episode));

        let now = self.episodes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_episodes_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.episode_delay {
            tokio::time::sleep(delay).await;
        }
        self.episodes_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.episodes
            .get(&(tmdb_id, season, episode))
            .cloned()
            .unwrap_or(Err(ApiError::NotFound))
    }
}
