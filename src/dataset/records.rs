//! Row layouts of the three bulk dataset files and the kind-token mapping.

use reelsync_common::TitleKind;

/// Placeholder the dataset uses for a null field.
pub const NULL_TOKEN: &str = "\\N";

/// Where a kind token from the basics file is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Imported as a top-level title.
    Title(TitleKind),
    /// An episode row; only its display name is kept, for the episode pass.
    Child,
    /// A known token that is deliberately not imported.
    Discarded,
    /// A token outside the known vocabulary. Counted and reported.
    Unrecognized,
}

/// Total mapping from kind token to [`SourceKind`].
pub fn classify_kind(token: &str) -> SourceKind {
    match token {
        "movie" | "tvMovie" => SourceKind::Title(TitleKind::Movie),
        "tvSeries" | "tvMiniSeries" => SourceKind::Title(TitleKind::Show),
        "tvEpisode" => SourceKind::Child,
        "short" | "tvShort" | "tvSpecial" | "tvPilot" | "video" | "videoGame" => {
            SourceKind::Discarded
        }
        _ => SourceKind::Unrecognized,
    }
}

fn nullable(field: &str) -> Option<&str> {
    if field == NULL_TOKEN || field.is_empty() {
        None
    } else {
        Some(field)
    }
}

fn nullable_int(field: &str) -> Option<i64> {
    nullable(field).and_then(|v| v.parse().ok())
}

/// `tconst titleType primaryTitle originalTitle isAdult startYear endYear
/// runtimeMinutes genres`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicsRow<'a> {
    pub id: &'a str,
    pub kind_token: &'a str,
    pub primary_title: &'a str,
    pub original_title: Option<&'a str>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub runtime_minutes: Option<i64>,
    pub genres: Vec<&'a str>,
}

pub const BASICS_FIELDS: usize = 9;

impl<'a> BasicsRow<'a> {
    /// `None` when the line is malformed.
    pub fn parse(fields: &[&'a str]) -> Option<Self> {
        if fields.len() != BASICS_FIELDS || fields[0].is_empty() {
            return None;
        }
        let genres = nullable(fields[8])
            .map(|g| g.split(',').map(str::trim).filter(|g| !g.is_empty()).collect())
            .unwrap_or_default();
        Some(Self {
            id: fields[0],
            kind_token: fields[1],
            primary_title: fields[2],
            original_title: nullable(fields[3]),
            start_year: nullable_int(fields[5]),
            end_year: nullable_int(fields[6]),
            runtime_minutes: nullable_int(fields[7]),
            genres,
        })
    }
}

/// `tconst parentTconst seasonNumber episodeNumber`
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow<'a> {
    pub id: &'a str,
    pub parent_id: &'a str,
    pub season: Option<i64>,
    pub episode: Option<i64>,
}

pub const EPISODE_FIELDS: usize = 4;

impl<'a> EpisodeRow<'a> {
    pub fn parse(fields: &[&'a str]) -> Option<Self> {
        if fields.len() != EPISODE_FIELDS || fields[0].is_empty() || fields[1].is_empty() {
            return None;
        }
        Some(Self {
            id: fields[0],
            parent_id: fields[1],
            season: nullable_int(fields[2]),
            episode: nullable_int(fields[3]),
        })
    }
}

/// `tconst averageRating numVotes`
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow<'a> {
    pub id: &'a str,
    pub average_rating: f64,
    pub num_votes: i64,
}

pub const RATING_FIELDS: usize = 3;

impl<'a> RatingRow<'a> {
    pub fn parse(fields: &[&'a str]) -> Option<Self> {
        if fields.len() != RATING_FIELDS || fields[0].is_empty() {
            return None;
        }
        Some(Self {
            id: fields[0],
            average_rating: fields[1].parse().ok()?,
            num_votes: fields[2].parse().ok()?,
        })
    }
}
