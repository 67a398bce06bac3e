//! Genres stage: add title/genre links collected during the titles scan.
//!
//! Links are only ever added. A genre that disappears from a title's dataset
//! row keeps its stored link.

use std::collections::BTreeSet;
use std::sync::Arc;

use reelsync_common::{GenreId, Result, TitleId};
use reelsync_db::pool::get_conn;
use reelsync_db::queries::{genres, titles};

use super::batch::{BatchRunner, BatchSink, Batcher, Written};
use super::report::StageReport;
use super::ScanContext;
use crate::dataset::reader::Flow;

#[derive(Debug, Default)]
struct GenreScan {
    created: u64,
    unchanged: u64,
    skipped: u64,
}

pub(super) async fn import_genres(runner: &BatchRunner, ctx: Arc<ScanContext>) -> Result<StageReport> {
    let pool = runner.pool().clone();
    let batch_size = runner.batch_size();

    let produce = move |sink: BatchSink<Vec<(TitleId, GenreId)>>| -> Result<GenreScan> {
        let conn = get_conn(&pool)?;

        let names: BTreeSet<String> = ctx
            .title_genres
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        let names: Vec<String> = names.into_iter().collect();
        let created = genres::upsert_genres(&conn, &names)? as u64;

        let genre_ids = genres::load_genre_ids(&conn)?;
        let title_ids = titles::load_title_ids(&conn)?;
        let existing = genres::load_title_genres(&conn)?;
        drop(conn);

        let mut scan = GenreScan { created, ..Default::default() };
        let mut pending = Batcher::new(batch_size);

        for entry in ctx.title_genres.iter() {
            let Some(&title_id) = title_ids.get(entry.key()) else {
                scan.skipped += 1;
                continue;
            };
            for name in entry.value() {
                let Some(&genre_id) = genre_ids.get(name) else {
                    scan.skipped += 1;
                    continue;
                };
                if existing.contains(&(title_id, genre_id)) {
                    scan.unchanged += 1;
                } else if let Some(full) = pending.push((title_id, genre_id)) {
                    if sink.send(full) == Flow::Stop {
                        return Ok(scan);
                    }
                }
            }
        }
        if let Some(rest) = pending.finish() {
            sink.send(rest);
        }
        Ok(scan)
    };

    let apply = |conn: &rusqlite::Connection, pairs: Vec<(TitleId, GenreId)>| -> Result<Written> {
        Ok(Written::inserted(genres::insert_title_genres(conn, &pairs)?))
    };

    let (scan, written) = runner.run("genres", produce, apply).await?;
    tracing::info!(new_genres = scan.created, links = written.inserted, "Genre links imported");

    let mut report = StageReport {
        unchanged: scan.unchanged,
        skipped: scan.skipped,
        ..Default::default()
    };
    report.record(written);
    Ok(report)
}
