//! Titles stage: diff the basics file against stored titles.
//!
//! The same pass routes episode rows' display names and every title's genre
//! tokens into the [`ScanContext`] for the later stages.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use reelsync_common::Result;
use reelsync_db::models::{NewTitle, TitleSnapshot, TitleUpdate};
use reelsync_db::pool::get_conn;
use reelsync_db::queries::titles;

use super::batch::{BatchRunner, BatchSink, Batcher, Written};
use super::report::StageReport;
use super::{ScanContext, PROGRESS_EVERY};
use crate::dataset::reader::{scan_tsv, Flow};
use crate::dataset::records::{classify_kind, BasicsRow, SourceKind, BASICS_FIELDS};

enum TitleBatch {
    Insert(Vec<NewTitle>),
    Update(Vec<TitleUpdate>),
}

#[derive(Debug, Default)]
pub(super) struct TitleScan {
    pub unchanged: u64,
    pub malformed: u64,
    pub discarded: BTreeMap<String, u64>,
    pub unrecognized: BTreeMap<String, u64>,
}

pub(super) struct TitleOutcome {
    pub report: StageReport,
    pub discarded: BTreeMap<String, u64>,
    pub unrecognized: BTreeMap<String, u64>,
}

pub(super) async fn import_titles(
    runner: &BatchRunner,
    path: PathBuf,
    ctx: Arc<ScanContext>,
) -> Result<TitleOutcome> {
    let pool = runner.pool().clone();
    let batch_size = runner.batch_size();

    let produce = move |sink: BatchSink<TitleBatch>| -> Result<TitleScan> {
        let snapshot = titles::load_title_snapshot(&*get_conn(&pool)?)?;
        tracing::info!(existing = snapshot.len(), "Loaded title snapshot");

        let mut scan = TitleScan::default();
        let mut inserts = Batcher::new(batch_size);
        let mut updates = Batcher::new(batch_size);
        let mut seen = 0u64;

        let stats = scan_tsv(&path, BASICS_FIELDS, |fields| {
            seen += 1;
            if seen % PROGRESS_EVERY == 0 {
                tracing::info!(rows = seen, "Scanning titles");
            }
            let Some(row) = BasicsRow::parse(fields) else {
                scan.malformed += 1;
                return Flow::Continue;
            };

            let kind = match classify_kind(row.kind_token) {
                SourceKind::Title(kind) => kind,
                SourceKind::Child => {
                    ctx.episode_names
                        .insert(row.id.to_string(), row.primary_title.to_string());
                    return Flow::Continue;
                }
                SourceKind::Discarded => {
                    *scan.discarded.entry(row.kind_token.to_string()).or_default() += 1;
                    return Flow::Continue;
                }
                SourceKind::Unrecognized => {
                    let count = scan.unrecognized.entry(row.kind_token.to_string()).or_default();
                    if *count == 0 {
                        tracing::warn!(token = row.kind_token, id = row.id, "Unrecognized title kind");
                    }
                    *count += 1;
                    return Flow::Continue;
                }
            };

            if !row.genres.is_empty() {
                ctx.title_genres.insert(
                    row.id.to_string(),
                    row.genres.iter().map(|g| g.to_string()).collect(),
                );
            }

            match snapshot.get(row.id) {
                Some(existing) => {
                    if existing.kind != kind {
                        tracing::debug!(id = row.id, stored = %existing.kind, incoming = %kind, "Ignoring kind change");
                    }
                    match diff_title(existing, &row) {
                        Some(update) => {
                            if let Some(full) = updates.push(update) {
                                return sink.send(TitleBatch::Update(full));
                            }
                        }
                        None => scan.unchanged += 1,
                    }
                }
                None => {
                    let new = NewTitle {
                        imdb_id: row.id.to_string(),
                        kind,
                        display_name: row.primary_title.to_string(),
                        original_title: row.original_title.map(str::to_string),
                        start_year: row.start_year,
                        end_year: row.end_year,
                        runtime_minutes: row.runtime_minutes,
                    };
                    if let Some(full) = inserts.push(new) {
                        return sink.send(TitleBatch::Insert(full));
                    }
                }
            }
            Flow::Continue
        })?;
        scan.malformed += stats.malformed;

        if !stats.stopped {
            if let Some(rest) = inserts.finish() {
                sink.send(TitleBatch::Insert(rest));
            }
            if let Some(rest) = updates.finish() {
                sink.send(TitleBatch::Update(rest));
            }
        }
        Ok(scan)
    };

    let apply = |conn: &rusqlite::Connection, batch: TitleBatch| -> Result<Written> {
        match batch {
            TitleBatch::Insert(rows) => Ok(Written::inserted(titles::insert_titles(conn, &rows)?.len())),
            TitleBatch::Update(rows) => Ok(Written::updated(titles::update_titles(conn, &rows)?)),
        }
    };

    let (scan, written) = runner.run("titles", produce, apply).await?;

    let mut report = StageReport {
        unchanged: scan.unchanged,
        errors: scan.malformed,
        ..Default::default()
    };
    report.record(written);
    Ok(TitleOutcome {
        report,
        discarded: scan.discarded,
        unrecognized: scan.unrecognized,
    })
}

/// Create the subtype record for every title that lacks one.
pub(super) async fn ensure_subtypes(runner: &BatchRunner) -> Result<StageReport> {
    let (movies, shows) = runner.with_conn(titles::ensure_subtypes).await?;
    tracing::info!(movies, shows, "Subtype records created");
    Ok(StageReport {
        inserted: (movies + shows) as u64,
        ..Default::default()
    })
}

/// The update for `existing`, or `None` when nothing dataset-derived changed.
///
/// A null runtime in the dataset keeps the stored runtime, so it never counts
/// as a change on its own.
fn diff_title(existing: &TitleSnapshot, row: &BasicsRow<'_>) -> Option<TitleUpdate> {
    let runtime_changed = row
        .runtime_minutes
        .is_some_and(|runtime| existing.runtime_minutes != Some(runtime));
    let changed = existing.display_name != row.primary_title
        || existing.original_title.as_deref() != row.original_title
        || existing.start_year != row.start_year
        || existing.end_year != row.end_year
        || runtime_changed;

    changed.then(|| TitleUpdate {
        id: existing.id,
        display_name: row.primary_title.to_string(),
        original_title: row.original_title.map(str::to_string),
        start_year: row.start_year,
        end_year: row.end_year,
        runtime_minutes: row.runtime_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsync_common::{TitleId, TitleKind};

    fn snapshot() -> TitleSnapshot {
        TitleSnapshot {
            id: TitleId::from(7),
            kind: TitleKind::Movie,
            display_name: "Heat".to_string(),
            original_title: Some("Heat".to_string()),
            start_year: Some(1995),
            end_year: None,
            runtime_minutes: Some(170),
        }
    }

    fn row<'a>(fields: &'a [&'a str]) -> BasicsRow<'a> {
        BasicsRow::parse(fields).unwrap()
    }

    #[test]
    fn identical_row_is_unchanged() {
        let fields = ["tt1", "movie", "Heat", "Heat", "0", "1995", "\\N", "170", "Crime"];
        assert!(diff_title(&snapshot(), &row(&fields)).is_none());
    }

    #[test]
    fn null_runtime_is_not_a_change() {
        let fields = ["tt1", "movie", "Heat", "Heat", "0", "1995", "\\N", "\\N", "Crime"];
        assert!(diff_title(&snapshot(), &row(&fields)).is_none());
    }

    #[test]
    fn renamed_row_produces_update() {
        let fields = ["tt1", "movie", "Heat (1995)", "Heat", "0", "1995", "\\N", "\\N", "Crime"];
        let update = diff_title(&snapshot(), &row(&fields)).unwrap();
        assert_eq!(update.id, TitleId::from(7));
        assert_eq!(update.display_name, "Heat (1995)");
        assert_eq!(update.runtime_minutes, None);
    }
}
