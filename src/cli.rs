use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelsync")]
#[command(author, version, about = "Keeps a movie/TV metadata store in sync with the IMDb datasets and TMDB")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the datasets, import them if they changed, then backfill
    Sync {
        /// Import even if the dataset fingerprint is unchanged
        #[arg(long)]
        force: bool,

        /// Use the dataset files already on disk
        #[arg(long)]
        skip_download: bool,
    },

    /// Drain the enrichment backlog only
    Backfill {
        /// Rows per page (defaults to the configured page size)
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Print the fingerprint of the local dataset files
    Fingerprint,

    /// Show a title detail view as JSON, fetching missing fields
    Title {
        /// Title id or IMDb id (tt...)
        id: String,
    },

    /// Show a show detail view with its episodes as JSON
    Show {
        /// Show id
        id: i64,
    },

    /// Show maintenance
    Shows {
        #[command(subcommand)]
        action: ShowAction,
    },

    /// Custom genre review
    Genres {
        #[command(subcommand)]
        action: GenreAction,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ShowAction {
    /// Fetch episode detail for shows that still have unchecked episodes
    SyncEpisodes {
        /// Maximum number of shows (all when omitted)
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum GenreAction {
    /// Write unreviewed titles to a review file
    Export {
        file: PathBuf,

        /// Maximum number of titles
        #[arg(long, default_value = "500")]
        limit: usize,

        /// Only titles with any of these dataset genres (comma-separated)
        #[arg(long, value_delimiter = ',')]
        filter: Vec<String>,
    },

    /// Apply an edited review file
    Import { file: PathBuf },
}
