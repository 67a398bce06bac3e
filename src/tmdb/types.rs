//! TMDB response types and image URL helpers.

use reelsync_common::TitleKind;
use serde::{Deserialize, Deserializer};

/// Size segment for title posters.
pub const POSTER_SIZE: &str = "w500";

/// Size segment for episode stills.
pub const STILL_SIZE: &str = "w400";

/// Arrays arrive as `null` on some records.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response of `/find/{imdb_id}?external_source=imdb_id`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FindResult {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub movie_results: Vec<FindCandidate>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tv_results: Vec<FindCandidate>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FindCandidate {
    pub id: i64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub origin_country: Vec<String>,
}

impl FindCandidate {
    pub fn date(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .or(self.first_air_date.as_deref())
    }

    pub fn first_origin_country(&self) -> Option<&str> {
        self.origin_country.first().map(String::as_str)
    }
}

impl FindResult {
    /// Pick the candidate for a title of `kind`: the first result of that kind,
    /// else the first movie result, else the first tv result. The returned kind
    /// is the list the candidate came from.
    pub fn pick(&self, kind: TitleKind) -> Option<(TitleKind, &FindCandidate)> {
        let preferred = match kind {
            TitleKind::Movie => self.movie_results.first(),
            TitleKind::Show => self.tv_results.first(),
        };
        if let Some(candidate) = preferred {
            return Some((kind, candidate));
        }
        self.movie_results
            .first()
            .map(|c| (TitleKind::Movie, c))
            .or_else(|| self.tv_results.first().map(|c| (TitleKind::Show, c)))
    }

    pub fn is_empty(&self) -> bool {
        self.movie_results.is_empty() && self.tv_results.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProductionCountry {
    pub iso_3166_1: String,
}

/// Response of `/movie/{id}` or `/tv/{id}`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TitleDetail {
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub origin_country: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub production_countries: Vec<ProductionCountry>,
    #[serde(default)]
    pub runtime: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub episode_run_time: Vec<i64>,
}

impl TitleDetail {
    /// `origin_country[0]`, falling back to the first production country.
    pub fn first_origin_country(&self) -> Option<&str> {
        self.origin_country
            .first()
            .map(String::as_str)
            .or_else(|| {
                self.production_countries
                    .first()
                    .map(|c| c.iso_3166_1.as_str())
            })
    }

    pub fn date(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .or(self.first_air_date.as_deref())
    }

    /// Movie runtime, or the first listed episode runtime for shows.
    pub fn runtime_minutes(&self) -> Option<i64> {
        self.runtime.or_else(|| self.episode_run_time.first().copied())
    }
}

/// Response of `/tv/{id}/season/{s}/episode/{e}`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EpisodeDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub still_path: Option<String>,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<i64>,
    #[serde(default)]
    pub overview: Option<String>,
}

/// Combine a relative image path with the image host and a size segment.
pub fn image_url(base: &str, size: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}/{size}{path}")
    } else {
        format!("{base}/{size}/{path}")
    }
}
