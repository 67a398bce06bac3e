//! Typed ID wrappers providing compile-time safety for row identifiers.
//!
//! Each ID type is a newtype over the SQLite `INTEGER PRIMARY KEY` of its
//! table, preventing accidental misuse (e.g., passing a `SeasonId` where a
//! `ShowId` is expected).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generate a newtype ID wrapper over `i64`.
///
/// The macro produces a struct with:
/// - `get()` returning the raw row id
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`, `Serialize`, `Deserialize`
/// - `Display` and `FromStr` delegating to the inner integer
/// - `From<i64>` and `Into<i64>` conversions
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(i64);

            impl $name {
                /// Return the raw row id.
                #[must_use]
                pub fn get(self) -> i64 {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = std::num::ParseIntError;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    s.parse::<i64>().map(Self)
                }
            }

            impl From<i64> for $name {
                fn from(id: i64) -> Self {
                    Self(id)
                }
            }

            impl From<$name> for i64 {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

typed_id! {
    /// Identifier for a title (movie or show).
    TitleId,
    /// Identifier for a movie subtype record.
    MovieId,
    /// Identifier for a show subtype record.
    ShowId,
    /// Identifier for a season of a show.
    SeasonId,
    /// Identifier for an episode of a season.
    EpisodeId,
    /// Identifier for a genre.
    GenreId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let id = TitleId::from(17);
        assert_eq!(id.get(), 17);
        assert_eq!(i64::from(id), 17);
        assert_eq!(id.to_string(), "17");
        assert_eq!("17".parse::<TitleId>().unwrap(), id);
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!("tt0000001".parse::<EpisodeId>().is_err());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&ShowId::from(9)).unwrap();
        assert_eq!(json, "9");
    }
}
