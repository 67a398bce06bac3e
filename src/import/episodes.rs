//! Episodes stage, in two passes over the episodes file.
//!
//! The first pass creates every missing `(show, season)` record. The second
//! pass reconciles episodes against a snapshot reloaded after the first, so
//! an episode is never written before its season exists. Malformed lines are
//! counted by the second pass only.
//!
//! The dataset can carry several episodes on one `(season, number)` key. The
//! first row in file order owns the key; later ones are skipped.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use reelsync_common::{EpisodeId, Result, SeasonId, ShowId};
use reelsync_db::models::NewEpisode;
use reelsync_db::pool::get_conn;
use reelsync_db::queries::episodes;

use super::batch::{BatchRunner, BatchSink, Batcher, Written};
use super::report::StageReport;
use super::{ScanContext, PROGRESS_EVERY};
use crate::dataset::reader::{scan_tsv, Flow};
use crate::dataset::records::{EpisodeRow, EPISODE_FIELDS};

// ---------------------------------------------------------------------------
// Pass 1: seasons
// ---------------------------------------------------------------------------

pub(super) async fn import_seasons(runner: &BatchRunner, path: PathBuf) -> Result<StageReport> {
    let pool = runner.pool().clone();
    let batch_size = runner.batch_size();

    let produce = move |sink: BatchSink<Vec<(ShowId, i64)>>| -> Result<StageReport> {
        let (shows, mut known) = {
            let conn = get_conn(&pool)?;
            let shows = episodes::load_show_ids(&conn)?;
            let known: HashSet<(ShowId, i64)> = episodes::load_seasons(&conn)?.into_keys().collect();
            (shows, known)
        };

        let report = StageReport::default();
        let mut pending = Batcher::new(batch_size);

        let stats = scan_tsv(&path, EPISODE_FIELDS, |fields| {
            let Some(row) = EpisodeRow::parse(fields) else {
                return Flow::Continue;
            };
            let (Some(&show), Some(season)) = (shows.get(row.parent_id), row.season) else {
                return Flow::Continue;
            };
            if known.insert((show, season)) {
                if let Some(full) = pending.push((show, season)) {
                    return sink.send(full);
                }
            }
            Flow::Continue
        })?;

        if !stats.stopped {
            if let Some(rest) = pending.finish() {
                sink.send(rest);
            }
        }
        Ok(report)
    };

    let apply = |conn: &rusqlite::Connection, seasons: Vec<(ShowId, i64)>| -> Result<Written> {
        Ok(Written::inserted(episodes::insert_seasons(conn, &seasons)?.len()))
    };

    let (mut report, written) = runner.run("seasons", produce, apply).await?;
    report.record(written);
    tracing::info!(created = report.inserted, "Seasons imported");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Pass 2: episodes
// ---------------------------------------------------------------------------

enum EpisodeBatch {
    Insert(Vec<NewEpisode>),
    Rename(Vec<(EpisodeId, Option<String>)>),
}

pub(super) async fn import_episodes(
    runner: &BatchRunner,
    path: PathBuf,
    ctx: Arc<ScanContext>,
) -> Result<StageReport> {
    let pool = runner.pool().clone();
    let batch_size = runner.batch_size();

    let produce = move |sink: BatchSink<EpisodeBatch>| -> Result<StageReport> {
        let (shows, seasons, snapshot) = {
            let conn = get_conn(&pool)?;
            (
                episodes::load_show_ids(&conn)?,
                episodes::load_seasons(&conn)?,
                episodes::load_episode_snapshot(&conn)?,
            )
        };
        tracing::info!(seasons = seasons.len(), existing = snapshot.len(), "Loaded episode snapshot");

        let mut report = StageReport::default();
        let mut inserts = Batcher::new(batch_size);
        let mut renames = Batcher::new(batch_size);
        let mut claimed: HashSet<(SeasonId, i64)> = HashSet::new();
        let mut seen = 0u64;

        let stats = scan_tsv(&path, EPISODE_FIELDS, |fields| {
            seen += 1;
            if seen % PROGRESS_EVERY == 0 {
                tracing::info!(rows = seen, "Scanning episodes");
            }
            let Some(row) = EpisodeRow::parse(fields) else {
                report.errors += 1;
                return Flow::Continue;
            };
            let Some(&show) = shows.get(row.parent_id) else {
                report.skipped += 1;
                return Flow::Continue;
            };
            let (Some(season), Some(number)) = (row.season, row.episode) else {
                report.skipped += 1;
                return Flow::Continue;
            };
            let Some(&season_id) = seasons.get(&(show, season)) else {
                report.skipped += 1;
                return Flow::Continue;
            };
            if !claimed.insert((season_id, number)) {
                tracing::debug!(episode = row.id, season, number, "Duplicate episode number, skipping");
                report.skipped += 1;
                return Flow::Continue;
            }

            let name = ctx.episode_names.get(row.id).map(|n| n.value().clone());
            match snapshot.get(&(season_id, number)) {
                Some(existing) => match name {
                    Some(name) if existing.display_name.as_deref() != Some(name.as_str()) => {
                        if let Some(full) = renames.push((existing.id, Some(name))) {
                            return sink.send(EpisodeBatch::Rename(full));
                        }
                    }
                    _ => report.unchanged += 1,
                },
                None => {
                    let new = NewEpisode {
                        season_id,
                        episode: number,
                        imdb_id: row.id.to_string(),
                        display_name: name,
                    };
                    if let Some(full) = inserts.push(new) {
                        return sink.send(EpisodeBatch::Insert(full));
                    }
                }
            }
            Flow::Continue
        })?;
        report.errors += stats.malformed;

        if !stats.stopped {
            if let Some(rest) = inserts.finish() {
                sink.send(EpisodeBatch::Insert(rest));
            }
            if let Some(rest) = renames.finish() {
                sink.send(EpisodeBatch::Rename(rest));
            }
        }
        Ok(report)
    };

    let apply = |conn: &rusqlite::Connection, batch: EpisodeBatch| -> Result<Written> {
        match batch {
            EpisodeBatch::Insert(rows) => Ok(Written::inserted(episodes::insert_episodes(conn, &rows)?)),
            EpisodeBatch::Rename(rows) => Ok(Written::updated(episodes::update_episode_names(conn, &rows)?)),
        }
    };

    let (mut report, written) = runner.run("episodes", produce, apply).await?;
    report.record(written);
    Ok(report)
}
