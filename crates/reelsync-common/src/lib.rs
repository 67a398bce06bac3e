//! Reelsync-Common: Shared types, constants, and error handling.
//!
//! This crate provides the vocabulary shared by the store and the sync engine:
//!
//! - **Typed IDs**: Integer newtypes for titles, shows, seasons, episodes and genres
//! - **Core Types**: [`TitleKind`] and the three-state [`ImageRef`]
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use reelsync_common::{ImageRef, TitleId, TitleKind, Error, Result};
//!
//! let id = TitleId::from(42);
//! assert_eq!(id.get(), 42);
//!
//! let kind: TitleKind = "show".parse().unwrap();
//! assert_eq!(kind, TitleKind::Show);
//!
//! // Unresolved images are eligible for fetch; negative results are not
//! assert!(ImageRef::Unresolved.is_unresolved());
//! assert!(!ImageRef::NotFound.is_unresolved());
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("title"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
