//! Sentinel-free detail views handed to the rendering layer.

use reelsync_common::{EpisodeId, ShowId, TitleId, TitleKind};
use reelsync_db::models::{Episode, Title};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleView {
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
    /// `None` both when never checked and when checked with no result.
    pub image_url: Option<String>,
    pub genres: Vec<String>,
}

impl TitleView {
    pub fn new(title: Title, genres: Vec<String>) -> Self {
        Self {
            id: title.id,
            imdb_id: title.imdb_id,
            tmdb_id: title.tmdb_id,
            kind: title.kind,
            display_name: title.display_name,
            original_title: title.original_title,
            start_year: title.start_year,
            end_year: title.end_year,
            runtime_minutes: title.runtime_minutes,
            average_rating: title.average_rating,
            num_votes: title.num_votes,
            original_language: title.original_language,
            release_date: title.release_date,
            popularity: title.popularity,
            origin_country: title.origin_country,
            image_url: title.image.into_url(),
            genres,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeView {
    pub id: EpisodeId,
    pub episode: i64,
    pub imdb_id: Option<String>,
    pub display_name: Option<String>,
    pub image_url: Option<String>,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<i64>,
    pub synopsis: Option<String>,
}

impl From<Episode> for EpisodeView {
    fn from(e: Episode) -> Self {
        Self {
            id: e.id,
            episode: e.episode,
            imdb_id: e.imdb_id,
            display_name: e.display_name,
            image_url: e.image.into_url(),
            air_date: e.air_date,
            runtime_minutes: e.runtime_minutes,
            synopsis: e.synopsis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonView {
    pub season: i64,
    pub episodes: Vec<EpisodeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowView {
    pub show_id: ShowId,
    pub title: TitleView,
    pub seasons: Vec<SeasonView>,
}

/// Group episodes already ordered by season then episode number.
pub fn group_seasons(episodes: Vec<Episode>) -> Vec<SeasonView> {
    let mut seasons: Vec<SeasonView> = Vec::new();
    for episode in episodes {
        match seasons.last_mut() {
            Some(current) if current.season == episode.season => {
                current.episodes.push(episode.into());
            }
            _ => seasons.push(SeasonView {
                season: episode.season,
                episodes: vec![episode.into()],
            }),
        }
    }
    seasons
}
