//! Rust models matching the database schema.
//!
//! Snapshot structs are the minimal column sets the importer diffs against.
//! Full row structs back the detail views and the enrichment paths. Image
//! columns are decoded into [`ImageRef`] as rows are read.

use chrono::{DateTime, Utc};
use reelsync_common::{EpisodeId, ImageRef, SeasonId, ShowId, TitleId, TitleKind};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Importer snapshots and batch rows
// ---------------------------------------------------------------------------

/// Mutable dataset-derived columns of an existing title.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleSnapshot {
    pub id: TitleId,
    pub kind: TitleKind,
    pub display_name: String,
    pub original_title: Option<String>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub runtime_minutes: Option<i64>,
}

/// A title to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTitle {
    pub imdb_id: String,
    pub kind: TitleKind,
    pub display_name: String,
    pub original_title: Option<String>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub runtime_minutes: Option<i64>,
}

/// New values for an existing title. `runtime_minutes = None` keeps the
/// stored runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleUpdate {
    pub id: TitleId,
    pub display_name: String,
    pub original_title: Option<String>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub runtime_minutes: Option<i64>,
}

/// Stored rating signals of a title.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSnapshot {
    pub id: TitleId,
    pub average_rating: Option<f64>,
    pub num_votes: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub id: TitleId,
    pub average_rating: f64,
    pub num_votes: i64,
}

/// Existing episode keyed by `(season_id, episode)` in the snapshot map.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSnapshot {
    pub id: EpisodeId,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub season_id: SeasonId,
    pub episode: i64,
    pub imdb_id: String,
    pub display_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// A row waiting in the enrichment backlog.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillCandidate {
    pub id: TitleId,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<i64>,
    pub kind: TitleKind,
}

/// Values learned from the detail API, merged with a fill-if-empty policy.
///
/// `None` fields and [`ImageRef::Unresolved`] leave the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub tmdb_id: Option<i64>,
    pub image: ImageRef,
    pub original_language: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub origin_country: Option<String>,
    pub runtime_minutes: Option<i64>,
}

/// Values learned from the episode detail API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeEnrichment {
    pub image: ImageRef,
    pub display_name: Option<String>,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<i64>,
    pub synopsis: Option<String>,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// Full title row.
#[derive(Debug, Clone, PartialEq)]
pub struct Title {
    pub id: TitleId,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<i64>,
    pub kind: TitleKind,
    pub display_name: String,
    pub original_title: Option<String>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub runtime_minutes: Option<i64>,
    pub average_rating: Option<f64>,
    pub num_votes: Option<i64>,
    pub original_language: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub origin_country: Option<String>,
    pub image: ImageRef,
    pub needs_backfill: bool,
    pub episodes_checked_at: Option<DateTime<Utc>>,
}

/// Episode row joined with its season number.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: EpisodeId,
    pub season_id: SeasonId,
    pub season: i64,
    pub episode: i64,
    pub imdb_id: Option<String>,
    pub display_name: Option<String>,
    pub image: ImageRef,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<i64>,
    pub synopsis: Option<String>,
}

/// A show with its title row.
#[derive(Debug, Clone, PartialEq)]
pub struct Show {
    pub id: ShowId,
    pub title: Title,
}

/// A title awaiting custom genre review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewCandidate {
    pub id: TitleId,
    pub display_name: String,
    pub kind: TitleKind,
    pub start_year: Option<i64>,
    pub num_votes: Option<i64>,
    pub average_rating: Option<f64>,
    pub original_language: Option<String>,
    pub origin_country: Option<String>,
    pub genres: Vec<String>,
}
