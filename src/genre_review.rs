//! Custom genre review: export unreviewed titles to an editable text file,
//! then import the edited file as genre assignments.
//!
//! File format, one block per title:
//!
//! ```text
//! [42] Love Island (2015) | show | 12K votes | 5.1 | en/GB | Game-Show, Reality-TV
//! GENRES: Dating
//! ```
//!
//! `none` or an empty `GENRES:` line marks the title reviewed without
//! assigning anything.

use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use reelsync_common::{GenreId, TitleId};
use reelsync_db::models::ReviewCandidate;
use reelsync_db::queries::{genres, reviews};
use rusqlite::Connection;
use serde::Serialize;

/// Genres the review assigns on top of the dataset's own.
pub const CUSTOM_GENRES: &[&str] = &["Dating", "Cooking"];

/// Write up to `limit` unreviewed titles to `path`. Returns how many.
pub fn export_review(conn: &Connection, path: &Path, limit: usize, filter: &[String]) -> Result<usize> {
    let custom = genres::ensure_custom_genres(conn, CUSTOM_GENRES)?;
    let mut custom_names: Vec<&str> = custom.keys().map(String::as_str).collect();
    custom_names.sort_unstable();

    if !filter.is_empty() {
        tracing::info!(genres = %filter.join(", "), "Filtering by dataset genres");
    }
    let candidates = reviews::unreviewed_titles(conn, limit, filter)?;
    if candidates.is_empty() {
        tracing::info!("No unreviewed titles found");
        return Ok(0);
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_review(&mut out, &candidates, &custom_names, Utc::now().date_naive(), path)
        .and_then(|()| out.flush())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(titles = candidates.len(), path = %path.display(), "Exported genre review");
    Ok(candidates.len())
}

fn write_review<W: Write>(
    out: &mut W,
    candidates: &[ReviewCandidate],
    custom_names: &[&str],
    generated: NaiveDate,
    path: &Path,
) -> std::io::Result<()> {
    writeln!(out, "# reelsync custom genre review")?;
    writeln!(
        out,
        "# Generated: {generated} | {} titles | Custom genres: {}",
        candidates.len(),
        custom_names.join(", ")
    )?;
    writeln!(out, "# Edit GENRES lines. Use \"none\" or leave empty to skip.")?;
    writeln!(out, "# Import: reelsync genres import {}", path.display())?;
    writeln!(out)?;

    for c in candidates {
        writeln!(out, "{}", header_line(c))?;
        writeln!(out, "GENRES:")?;
        writeln!(out)?;
    }
    Ok(())
}

fn header_line(c: &ReviewCandidate) -> String {
    let year = c.start_year.map_or_else(|| "????".to_string(), |y| y.to_string());
    let lang = c.original_language.as_deref().unwrap_or("");
    let lang_country = match c.origin_country.as_deref().filter(|s| !s.is_empty()) {
        Some(country) => format!("{lang}/{country}"),
        None => lang.to_string(),
    };
    let genres = if c.genres.is_empty() {
        String::new()
    } else {
        format!(" | {}", c.genres.join(", "))
    };
    format!(
        "[{}] {} ({year}) | {} | {} votes | {:.1} | {lang_country}{genres}",
        c.id,
        c.display_name,
        c.kind,
        format_votes(c.num_votes.unwrap_or(0)),
        c.average_rating.unwrap_or(0.0),
    )
}

fn format_votes(n: i64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.0}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// One reviewed title parsed from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEntry {
    pub title_id: TitleId,
    /// Empty when the reviewer chose none.
    pub genres: Vec<String>,
}

/// Parse an edited review file. A `GENRES:` line applies to the closest
/// preceding `[id]` line; an id without a `GENRES:` line is ignored.
pub fn parse_review(text: &str) -> Vec<ReviewEntry> {
    let mut entries = Vec::new();
    let mut current: Option<TitleId> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            current = rest
                .split_once(']')
                .and_then(|(id, _)| match id.trim().parse::<TitleId>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!(id, "Invalid title id in review file, skipping");
                        None
                    }
                });
            continue;
        }

        if let Some(rest) = line.strip_prefix("GENRES:") {
            let Some(title_id) = current.take() else {
                continue;
            };
            let rest = rest.trim();
            let genres = if rest.eq_ignore_ascii_case("none") {
                Vec::new()
            } else {
                rest.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            };
            entries.push(ReviewEntry { title_id, genres });
        }
    }
    entries
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewImportSummary {
    pub titles: usize,
    pub assigned: usize,
    /// Titles reviewed with no genre.
    pub skipped: usize,
    pub unknown_genres: usize,
}

/// Apply an edited review file.
pub fn import_review(conn: &Connection, path: &Path) -> Result<ReviewImportSummary> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let custom = genres::ensure_custom_genres(conn, CUSTOM_GENRES)?;
    let by_lowercase: HashMap<String, GenreId> = custom
        .iter()
        .map(|(name, id)| (name.to_lowercase(), *id))
        .collect();

    let mut summary = ReviewImportSummary::default();
    for entry in parse_review(&text) {
        if let Err(err) = reviews::record_review(conn, entry.title_id) {
            tracing::warn!(title_id = %entry.title_id, error = %err, "Failed to record review");
            continue;
        }
        summary.titles += 1;

        if entry.genres.is_empty() {
            summary.skipped += 1;
            continue;
        }
        for name in &entry.genres {
            let genre_id = custom
                .get(name)
                .or_else(|| by_lowercase.get(&name.to_lowercase()));
            let Some(&genre_id) = genre_id else {
                tracing::warn!(genre = %name, title_id = %entry.title_id, "Unknown genre, skipping");
                summary.unknown_genres += 1;
                continue;
            };
            match reviews::assign_genre(conn, entry.title_id, genre_id) {
                Ok(_) => summary.assigned += 1,
                Err(err) => {
                    tracing::warn!(genre = %name, title_id = %entry.title_id, error = %err, "Failed to assign genre");
                }
            }
        }
    }

    tracing::info!(
        titles = summary.titles,
        assigned = summary.assigned,
        skipped = summary.skipped,
        "Genre review imported"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsync_common::TitleKind;
    use reelsync_db::models::NewTitle;
    use reelsync_db::pool::init_memory_pool;
    use reelsync_db::queries::titles;

    #[test]
    fn votes_are_abbreviated() {
        assert_eq!(format_votes(999), "999");
        assert_eq!(format_votes(12_345), "12K");
        assert_eq!(format_votes(2_500_000), "2.5M");
    }

    #[test]
    fn header_line_layout() {
        let candidate = ReviewCandidate {
            id: TitleId::from(42),
            display_name: "Love Island".into(),
            kind: TitleKind::Show,
            start_year: Some(2015),
            num_votes: Some(12_000),
            average_rating: Some(5.1),
            original_language: Some("en".into()),
            origin_country: Some("GB".into()),
            genres: vec!["Game-Show".into(), "Reality-TV".into()],
        };
        assert_eq!(
            header_line(&candidate),
            "[42] Love Island (2015) | show | 12K votes | 5.1 | en/GB | Game-Show, Reality-TV"
        );
    }

    #[test]
    fn parse_pairs_ids_with_genre_lines() {
        let text = "# comment\n\n[1] A (2000) | movie\nGENRES: Dating, cooking\n\n\
                    [2] B (2001) | show\nGENRES: none\n[3] C\n[x] bad\nGENRES: Dating\n[4] D\nGENRES:\n";
        let entries = parse_review(text);
        assert_eq!(
            entries,
            vec![
                ReviewEntry { title_id: TitleId::from(1), genres: vec!["Dating".into(), "cooking".into()] },
                ReviewEntry { title_id: TitleId::from(2), genres: vec![] },
                ReviewEntry { title_id: TitleId::from(4), genres: vec![] },
            ]
        );
    }

    #[test]
    fn export_then_import_assigns_custom_genres() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let ids = titles::insert_titles(
            &conn,
            &[NewTitle {
                imdb_id: "tt01".into(),
                kind: TitleKind::Show,
                display_name: "Love Island".into(),
                original_title: None,
                start_year: Some(2015),
                end_year: None,
                runtime_minutes: None,
            }],
        )
        .unwrap();
        let title_id = ids[0].1;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.txt");
        assert_eq!(export_review(&conn, &path, 10, &[]).unwrap(), 1);

        let exported = std::fs::read_to_string(&path).unwrap();
        assert!(exported.contains(&format!("[{title_id}] Love Island (2015)")));
        let edited = exported.replacen("GENRES:", "GENRES: dating, Knitting", 1);
        std::fs::write(&path, edited).unwrap();

        let summary = import_review(&conn, &path).unwrap();
        assert_eq!(summary.titles, 1);
        assert_eq!(summary.assigned, 1);
        assert_eq!(summary.unknown_genres, 1);
        assert_eq!(
            reelsync_db::queries::genres::title_genre_names(&conn, title_id).unwrap(),
            vec!["Dating".to_string()]
        );

        // Reviewed titles are not exported again.
        assert_eq!(export_review(&conn, &path, 10, &[]).unwrap(), 0);
    }
}
