mod cli;

use reelsync::{
    backfill::BackfillScheduler,
    config,
    dataset::{ChangeDetector, DatasetFiles},
    enrich::ImageUrls,
    genre_review,
    lazy::LazyFetchGate,
    sync::{run_sync, SyncOptions},
    tmdb::{DetailSource, TmdbClient},
};
use reelsync_common::{ShowId, TitleId};
use reelsync_db::pool::{get_conn, init_pool, DbPool};
use reelsync_db::queries::titles;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, GenreAction, ShowAction};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelsync=trace,reelsync_db=debug,reelsync_common=debug".to_string()
        } else {
            "reelsync=info,reelsync_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Sync { force, skip_download } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let pool = open_pool(&config)?;
            let rt = tokio::runtime::Runtime::new()?;
            let summary = rt.block_on(run_sync(&config, pool, SyncOptions { force, skip_download }))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Backfill { page_size } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let pool = open_pool(&config)?;
            let source = detail_source(&config)?;
            let scheduler = BackfillScheduler::new(
                pool,
                source,
                ImageUrls::new(config.tmdb.image_base_url.as_str()),
                &config.backfill,
            );
            let rt = tokio::runtime::Runtime::new()?;
            let report = rt.block_on(scheduler.drain(page_size.unwrap_or(config.backfill.page_size)))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Fingerprint => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let pool = open_pool(&config)?;
            fingerprint(&config, pool)
        }
        Commands::Title { id } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let pool = open_pool(&config)?;
            let title_id = resolve_title_id(&pool, &id)?;
            let gate = lazy_gate(&config, pool)?;
            let rt = tokio::runtime::Runtime::new()?;
            let view = rt.block_on(gate.title_view(title_id))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Commands::Show { id } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let pool = open_pool(&config)?;
            let gate = lazy_gate(&config, pool)?;
            let rt = tokio::runtime::Runtime::new()?;
            let view = rt.block_on(gate.show_view(ShowId::from(id))).map_err(|e| {
                if e.is_not_found() {
                    anyhow::anyhow!("No show with id {id}")
                } else {
                    e.into()
                }
            })?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Commands::Shows { action } => match action {
            ShowAction::SyncEpisodes { limit } => {
                let config = config::load_config_or_default(cli.config.as_deref())?;
                let pool = open_pool(&config)?;
                let gate = lazy_gate(&config, pool)?;
                let rt = tokio::runtime::Runtime::new()?;
                let report = rt.block_on(gate.sweep_episodes(limit))?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
        },
        Commands::Genres { action } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let pool = open_pool(&config)?;
            let conn = get_conn(&pool)?;
            match action {
                GenreAction::Export { file, limit, filter } => {
                    let count = genre_review::export_review(&conn, &file, limit, &filter)?;
                    println!("Exported {} titles to {}", count, file.display());
                }
                GenreAction::Import { file } => {
                    let summary = genre_review::import_review(&conn, &file)?;
                    println!(
                        "{} titles reviewed, {} genres assigned, {} with none",
                        summary.titles, summary.assigned, summary.skipped
                    );
                }
            }
            Ok(())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("reelsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_pool(config: &config::Config) -> Result<DbPool> {
    let path = shellexpand::tilde(&config.database.path.to_string_lossy()).into_owned();
    tracing::info!("Opening database at {}", path);
    init_pool(&path).with_context(|| format!("Failed to open database {path}"))
}

fn detail_source(config: &config::Config) -> Result<Arc<dyn DetailSource>> {
    let client = TmdbClient::from_config(&config.tmdb)?.with_context(|| {
        format!("No TMDB API key configured (set tmdb.api_key or {})", config::API_KEY_ENV)
    })?;
    Ok(Arc::new(client))
}

fn lazy_gate(config: &config::Config, pool: DbPool) -> Result<LazyFetchGate> {
    Ok(LazyFetchGate::new(
        pool,
        detail_source(config)?,
        ImageUrls::new(config.tmdb.image_base_url.as_str()),
        &config.lazy,
    ))
}

fn resolve_title_id(pool: &DbPool, id: &str) -> Result<TitleId> {
    if id.starts_with("tt") {
        let conn = get_conn(pool)?;
        let title = titles::find_title_by_imdb(&conn, id)?
            .with_context(|| format!("No title with IMDb id {id}"))?;
        return Ok(title.id);
    }
    id.parse::<TitleId>()
        .with_context(|| format!("Invalid title id: {id}"))
}

fn fingerprint(config: &config::Config, pool: DbPool) -> Result<()> {
    let files = DatasetFiles::for_config(&config.dataset)?;
    let missing = files.missing();
    if !missing.is_empty() {
        anyhow::bail!("Dataset files missing: {:?}", missing);
    }

    let outcome = ChangeDetector::new(pool).detect(&files.all(), false)?;
    println!("Fingerprint: {}", outcome.fingerprint);
    println!(
        "Last import: {}",
        outcome.previous.as_deref().unwrap_or("none")
    );
    if outcome.needs_import() {
        println!("Dataset changed, the next sync will import");
    } else {
        println!("Dataset unchanged");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            config::validate_config(&config)?;
            print_summary(&config);
        }
    }

    Ok(())
}

fn print_summary(config: &config::Config) {
    println!("  Database: {}", config.database.path.display());
    println!("  Dataset dir: {}", config.dataset.dir.display());
    println!(
        "  Import: batch size {}, {} workers",
        config.import.batch_size, config.import.workers
    );
    println!(
        "  TMDB key: {}",
        if config.tmdb.api_key().is_some() { "configured" } else { "missing" }
    );
    println!(
        "  Backfill: {} (page size {})",
        if config.backfill.enabled { "enabled" } else { "disabled" },
        config.backfill.page_size
    );
    println!(
        "  Episode cooldown: {}h",
        config.lazy.episode_cooldown_hours
    );
}
