//! Core types shared by the store and the sync engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Stored in a title's image column once a lookup found no poster.
pub const TITLE_IMAGE_SENTINEL: &str = "none";

/// Stored in an episode's image column once the episode lookup found nothing.
pub const EPISODE_IMAGE_SENTINEL: &str = "TMDB_NOT_FOUND_DO_NOT_RETRY";

/// The kind of a top-level title. Fixed once a title is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    Movie,
    Show,
}

impl TitleKind {
    /// The value stored in the `titles.type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            TitleKind::Movie => "movie",
            TitleKind::Show => "show",
        }
    }
}

impl fmt::Display for TitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(TitleKind::Movie),
            "show" => Ok(TitleKind::Show),
            other => Err(Error::invalid_input(format!("unknown title kind: {other}"))),
        }
    }
}

/// Which image column a value belongs to. Each scope owns its own negative
/// sentinel so title and episode results can age out independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScope {
    Title,
    Episode,
}

impl ImageScope {
    pub fn sentinel(self) -> &'static str {
        match self {
            ImageScope::Title => TITLE_IMAGE_SENTINEL,
            ImageScope::Episode => EPISODE_IMAGE_SENTINEL,
        }
    }
}

/// Logical state of an image reference.
///
/// The store keeps these in a single nullable text column. Conversion happens
/// only through [`ImageRef::from_column`] and [`ImageRef::to_column`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageRef {
    /// Never checked. Eligible for fetch.
    #[default]
    Unresolved,
    /// An absolute image URL.
    Resolved(String),
    /// Checked and nothing was found.
    NotFound,
}

impl ImageRef {
    /// Decode a stored column value.
    ///
    /// Either sentinel reads as [`ImageRef::NotFound`] regardless of scope, so
    /// a marker can never leak out as a URL.
    pub fn from_column(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => ImageRef::Unresolved,
            Some(v) if v == TITLE_IMAGE_SENTINEL || v == EPISODE_IMAGE_SENTINEL => {
                ImageRef::NotFound
            }
            Some(v) => ImageRef::Resolved(v.to_string()),
        }
    }

    /// Encode for storage in a column of the given scope.
    pub fn to_column(&self, scope: ImageScope) -> Option<String> {
        match self {
            ImageRef::Unresolved => None,
            ImageRef::Resolved(url) => Some(url.clone()),
            ImageRef::NotFound => Some(scope.sentinel().to_string()),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ImageRef::Unresolved)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ImageRef::NotFound)
    }

    /// The URL if resolved. Negative results collapse to `None`.
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Resolved(url) => Some(url),
            _ => None,
        }
    }

    pub fn into_url(self) -> Option<String> {
        match self {
            ImageRef::Resolved(url) => Some(url),
            _ => None,
        }
    }
}
