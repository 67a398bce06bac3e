//! reelsync - keeps a movie/TV metadata store in sync with the IMDb bulk
//! datasets and enriches it from TMDB.
//!
//! This library crate exposes the core functionality for integration testing.

pub mod backfill;
pub mod config;
pub mod dataset;
pub mod enrich;
pub mod genre_review;
pub mod import;
pub mod lazy;
pub mod ratelimit;
pub mod sync;
pub mod tmdb;

mod store;
