//! Ratings stage: refresh average score and vote count of known titles.

use std::path::PathBuf;

use reelsync_common::Result;
use reelsync_db::models::RatingUpdate;
use reelsync_db::pool::get_conn;
use reelsync_db::queries::titles;

use super::batch::{BatchRunner, BatchSink, Batcher, Written};
use super::report::StageReport;
use crate::dataset::reader::{scan_tsv, Flow};
use crate::dataset::records::{RatingRow, RATING_FIELDS};

const RATINGS_PROGRESS_EVERY: u64 = 500_000;

/// The value a rating has once stored.
///
/// Ratings are kept at single precision, so the incoming value is rounded the
/// same way before comparing it with the stored one.
pub fn stored_precision(value: f64) -> f64 {
    f64::from(value as f32)
}

pub(super) async fn import_ratings(runner: &BatchRunner, path: PathBuf) -> Result<StageReport> {
    let pool = runner.pool().clone();
    let batch_size = runner.batch_size();

    let produce = move |sink: BatchSink<Vec<RatingUpdate>>| -> Result<StageReport> {
        let snapshot = titles::load_rating_snapshot(&*get_conn(&pool)?)?;

        let mut report = StageReport::default();
        let mut pending = Batcher::new(batch_size);
        let mut seen = 0u64;

        let stats = scan_tsv(&path, RATING_FIELDS, |fields| {
            seen += 1;
            if seen % RATINGS_PROGRESS_EVERY == 0 {
                tracing::info!(rows = seen, "Scanning ratings");
            }
            let Some(row) = RatingRow::parse(fields) else {
                report.errors += 1;
                return Flow::Continue;
            };
            let Some(existing) = snapshot.get(row.id) else {
                report.skipped += 1;
                return Flow::Continue;
            };

            let average_rating = stored_precision(row.average_rating);
            if existing.average_rating == Some(average_rating) && existing.num_votes == Some(row.num_votes) {
                report.unchanged += 1;
                return Flow::Continue;
            }
            let update = RatingUpdate {
                id: existing.id,
                average_rating,
                num_votes: row.num_votes,
            };
            match pending.push(update) {
                Some(full) => sink.send(full),
                None => Flow::Continue,
            }
        })?;
        report.errors += stats.malformed;

        if !stats.stopped {
            if let Some(rest) = pending.finish() {
                sink.send(rest);
            }
        }
        Ok(report)
    };

    let apply = |conn: &rusqlite::Connection, updates: Vec<RatingUpdate>| -> Result<Written> {
        Ok(Written::updated(titles::update_ratings(conn, &updates)?))
    };

    let (mut report, written) = runner.run("ratings", produce, apply).await?;
    report.record(written);
    Ok(report)
}
