use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub backfill: BackfillConfig,

    #[serde(default)]
    pub lazy: LazyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file of the metadata store
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelsync.db")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Directory the dataset files are downloaded into
    #[serde(default = "default_dataset_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_basics_url")]
    pub basics_url: String,

    #[serde(default = "default_episodes_url")]
    pub episodes_url: String,

    #[serde(default = "default_ratings_url")]
    pub ratings_url: String,

    /// Connect timeout for dataset downloads
    #[serde(default = "default_download_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dir: default_dataset_dir(),
            basics_url: default_basics_url(),
            episodes_url: default_episodes_url(),
            ratings_url: default_ratings_url(),
            connect_timeout_secs: default_download_timeout(),
        }
    }
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("./imdb_data")
}

fn default_basics_url() -> String {
    "https://datasets.imdbws.com/title.basics.tsv.gz".to_string()
}

fn default_episodes_url() -> String {
    "https://datasets.imdbws.com/title.episode.tsv.gz".to_string()
}

fn default_ratings_url() -> String {
    "https://datasets.imdbws.com/title.ratings.tsv.gz".to_string()
}

fn default_download_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Rows per insert/update statement batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batches written concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
        }
    }
}

fn default_batch_size() -> usize {
    5000
}

fn default_workers() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// API key. Overridden by the `TMDB_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_tmdb_base_url")]
    pub base_url: String,

    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    /// Minimum spacing between calls across the whole process (default: 25 ms, ~40 req/s)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries for a throttled episode lookup
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff, doubled on each further retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_tmdb_base_url(),
            image_base_url: default_image_base_url(),
            min_interval_ms: default_min_interval_ms(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl TmdbConfig {
    /// The configured key, if it is non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_image_base_url() -> String {
    "https://image.tmdb.org/t/p".to_string()
}

fn default_min_interval_ms() -> u64 {
    25
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackfillConfig {
    /// Run the backfill after each sync
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Rows of one page resolved concurrently
    #[serde(default = "default_backfill_workers")]
    pub workers: usize,

    /// Sleep after a throttling response
    #[serde(default = "default_throttle_cooldown")]
    pub throttle_cooldown_secs: u64,

    /// Stop after this many consecutive pages that cleared no flag
    #[serde(default = "default_max_stalled_pages")]
    pub max_stalled_pages: u32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_size: default_page_size(),
            workers: default_backfill_workers(),
            throttle_cooldown_secs: default_throttle_cooldown(),
            max_stalled_pages: default_max_stalled_pages(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    100
}

fn default_backfill_workers() -> usize {
    4
}

fn default_throttle_cooldown() -> u64 {
    5
}

fn default_max_stalled_pages() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LazyConfig {
    /// Minimum time between episode checks of one show
    #[serde(default = "default_episode_cooldown")]
    pub episode_cooldown_hours: u64,

    /// Concurrent episode lookups per detail view
    #[serde(default = "default_episode_concurrency")]
    pub episode_concurrency: usize,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self {
            episode_cooldown_hours: default_episode_cooldown(),
            episode_concurrency: default_episode_concurrency(),
        }
    }
}

fn default_episode_cooldown() -> u64 {
    24
}

fn default_episode_concurrency() -> usize {
    5
}
