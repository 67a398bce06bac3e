//! Database query operations.
//!
//! Each submodule groups the queries for one area of the store. Bulk writers
//! take a slice of rows and issue one multi-row statement per chunk, so the
//! number of round trips tracks the batch count rather than the row count.

pub mod checkpoints;
pub mod episodes;
pub mod genres;
pub mod reviews;
pub mod titles;

mod batch;
