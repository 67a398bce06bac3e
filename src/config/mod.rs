mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

pub const API_KEY_ENV: &str = "TMDB_API_KEY";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./reelsync.toml",
        "~/.config/reelsync/config.toml",
        "/etc/reelsync/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env(&mut config);
    Ok(config)
}

fn apply_env(config: &mut Config) {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.tmdb.api_key = Some(key);
        }
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.import.batch_size == 0 {
        anyhow::bail!("import.batch_size cannot be 0");
    }
    if config.import.workers == 0 {
        anyhow::bail!("import.workers cannot be 0");
    }
    if config.backfill.page_size == 0 {
        anyhow::bail!("backfill.page_size cannot be 0");
    }
    if config.backfill.workers == 0 {
        anyhow::bail!("backfill.workers cannot be 0");
    }
    if config.lazy.episode_concurrency == 0 {
        anyhow::bail!("lazy.episode_concurrency cannot be 0");
    }

    for url in [
        &config.dataset.basics_url,
        &config.dataset.episodes_url,
        &config.dataset.ratings_url,
    ] {
        if crate::dataset::download::file_name_from_url(url).is_none() {
            anyhow::bail!("Dataset URL has no file name: {url}");
        }
    }

    if config.backfill.enabled && config.tmdb.api_key().is_none() {
        tracing::warn!("Backfill is enabled but no TMDB API key is configured; it will be skipped");
    }

    Ok(())
}
