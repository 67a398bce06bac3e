//! Title queries: importer snapshots and batch writes, the enrichment
//! backlog, and single-row reads for detail views.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reelsync_common::{
    Error, ImageRef, ImageScope, Result, TitleId, TitleKind, EPISODE_IMAGE_SENTINEL,
    TITLE_IMAGE_SENTINEL,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};

use super::batch::{self, Assign};
use crate::models::{
    BackfillCandidate, Enrichment, NewTitle, RatingSnapshot, RatingUpdate, Title, TitleSnapshot,
    TitleUpdate,
};

const TITLE_COLUMNS: &str = "id, imdb_id, tmdb_id, type, display_name, original_title,
     start_year, end_year, runtime_minutes, average_rating, num_votes,
     original_language, release_date, tmdb_popularity, origin_country, image_url,
     needs_backfill_tmdb, episodes_checked_at";

pub(crate) fn kind_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<TitleKind> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn row_to_title(row: &Row<'_>) -> rusqlite::Result<Title> {
    let image: Option<String> = row.get(15)?;
    let checked: Option<String> = row.get(17)?;
    Ok(Title {
        id: TitleId::from(row.get::<_, i64>(0)?),
        imdb_id: row.get(1)?,
        tmdb_id: row.get(2)?,
        kind: kind_at(row, 3)?,
        display_name: row.get(4)?,
        original_title: row.get(5)?,
        start_year: row.get(6)?,
        end_year: row.get(7)?,
        runtime_minutes: row.get(8)?,
        average_rating: row.get(9)?,
        num_votes: row.get(10)?,
        original_language: row.get(11)?,
        release_date: row.get(12)?,
        popularity: row.get(13)?,
        origin_country: row.get(14)?,
        image: ImageRef::from_column(image.as_deref()),
        needs_backfill: row.get(16)?,
        // An unparseable timestamp reads as never checked.
        episodes_checked_at: checked
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Load every title's dataset-derived columns, keyed by catalog id.
pub fn load_title_snapshot(conn: &Connection) -> Result<HashMap<String, TitleSnapshot>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, imdb_id, type, display_name, original_title,
                    start_year, end_year, runtime_minutes
             FROM titles WHERE imdb_id IS NOT NULL",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                TitleSnapshot {
                    id: TitleId::from(row.get::<_, i64>(0)?),
                    kind: kind_at(row, 2)?,
                    display_name: row.get(3)?,
                    original_title: row.get(4)?,
                    start_year: row.get(5)?,
                    end_year: row.get(6)?,
                    runtime_minutes: row.get(7)?,
                },
            ))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Map every catalog id to its title id.
pub fn load_title_ids(conn: &Connection) -> Result<HashMap<String, TitleId>> {
    let mut stmt = conn
        .prepare("SELECT imdb_id, id FROM titles WHERE imdb_id IS NOT NULL")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, TitleId::from(row.get::<_, i64>(1)?)))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Insert new titles and return the generated id for each catalog id.
///
/// Rows whose catalog id already exists are skipped, so re-running a batch
/// after a partial failure inserts nothing twice.
pub fn insert_titles(conn: &Connection, titles: &[NewTitle]) -> Result<Vec<(String, TitleId)>> {
    let rows: Vec<Vec<Value>> = titles
        .iter()
        .map(|t| {
            vec![
                Value::Text(t.imdb_id.clone()),
                Value::Text(t.kind.as_str().to_string()),
                Value::Text(t.display_name.clone()),
                batch::text(&t.original_title),
                batch::int(t.start_year),
                batch::int(t.end_year),
                batch::int(t.runtime_minutes),
            ]
        })
        .collect();

    batch::insert_returning(
        conn,
        "INSERT INTO titles (imdb_id, type, display_name, original_title,
                             start_year, end_year, runtime_minutes) VALUES",
        "ON CONFLICT(imdb_id) DO NOTHING RETURNING id, imdb_id",
        7,
        &rows,
        |row| Ok((row.get::<_, String>(1)?, TitleId::from(row.get::<_, i64>(0)?))),
    )
}

/// Apply dataset changes to existing titles. The type column is never written.
pub fn update_titles(conn: &Connection, updates: &[TitleUpdate]) -> Result<usize> {
    const ASSIGNS: &[Assign] = &[
        Assign { column: "display_name", keep_on_null: false },
        Assign { column: "original_title", keep_on_null: false },
        Assign { column: "start_year", keep_on_null: false },
        Assign { column: "end_year", keep_on_null: false },
        Assign { column: "runtime_minutes", keep_on_null: true },
    ];

    let rows: Vec<(i64, Vec<Value>)> = updates
        .iter()
        .map(|u| {
            (
                u.id.get(),
                vec![
                    Value::Text(u.display_name.clone()),
                    batch::text(&u.original_title),
                    batch::int(u.start_year),
                    batch::int(u.end_year),
                    batch::int(u.runtime_minutes),
                ],
            )
        })
        .collect();

    batch::case_update(
        conn,
        "titles",
        "id",
        ASSIGNS,
        "updated_at = datetime('now')",
        &rows,
    )
}

/// Create the missing movie/show subtype record for every title.
///
/// Returns `(movies_created, shows_created)`.
pub fn ensure_subtypes(conn: &Connection) -> Result<(usize, usize)> {
    let movies = conn
        .execute(
            "INSERT INTO movies (title_id)
             SELECT t.id FROM titles t
             WHERE t.type = 'movie'
               AND NOT EXISTS (SELECT 1 FROM movies m WHERE m.title_id = t.id)",
            [],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let shows = conn
        .execute(
            "INSERT INTO shows (title_id)
             SELECT t.id FROM titles t
             WHERE t.type = 'show'
               AND NOT EXISTS (SELECT 1 FROM shows s WHERE s.title_id = t.id)",
            [],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok((movies, shows))
}

/// Load stored rating signals keyed by catalog id.
pub fn load_rating_snapshot(conn: &Connection) -> Result<HashMap<String, RatingSnapshot>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, imdb_id, average_rating, num_votes
             FROM titles WHERE imdb_id IS NOT NULL",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                RatingSnapshot {
                    id: TitleId::from(row.get::<_, i64>(0)?),
                    average_rating: row.get(2)?,
                    num_votes: row.get(3)?,
                },
            ))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn update_ratings(conn: &Connection, updates: &[RatingUpdate]) -> Result<usize> {
    const ASSIGNS: &[Assign] = &[
        Assign { column: "average_rating", keep_on_null: false },
        Assign { column: "num_votes", keep_on_null: false },
    ];

    let rows: Vec<(i64, Vec<Value>)> = updates
        .iter()
        .map(|u| {
            (
                u.id.get(),
                vec![Value::Real(u.average_rating), Value::Integer(u.num_votes)],
            )
        })
        .collect();

    batch::case_update(conn, "titles", "id", ASSIGNS, "", &rows)
}

// ---------------------------------------------------------------------------
// Enrichment backlog
// ---------------------------------------------------------------------------

/// Fetch one page of titles still flagged for enrichment, most-voted first.
pub fn backfill_page(conn: &Connection, limit: usize) -> Result<Vec<BackfillCandidate>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, imdb_id, tmdb_id, type FROM titles
             WHERE needs_backfill_tmdb = 1
             ORDER BY num_votes DESC NULLS LAST, id
             LIMIT :limit",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::named_params! { ":limit": limit as i64 }, |row| {
            Ok(BackfillCandidate {
                id: TitleId::from(row.get::<_, i64>(0)?),
                imdb_id: row.get(1)?,
                tmdb_id: row.get(2)?,
                kind: kind_at(row, 3)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn count_backfill_pending(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM titles WHERE needs_backfill_tmdb = 1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Drop a title from the enrichment backlog without touching any other field.
pub fn clear_backfill_flag(conn: &Connection, id: TitleId) -> Result<()> {
    conn.execute(
        "UPDATE titles SET needs_backfill_tmdb = 0, updated_at = datetime('now')
         WHERE id = :id",
        rusqlite::named_params! { ":id": id.get() },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Merge enrichment values into a title and clear its backlog flag.
///
/// Fill-if-empty: a column is written only while it holds NULL, an empty
/// string or zero. The secondary id is written only while NULL. A real image
/// URL may replace a negative sentinel. A negative result is recorded only
/// over an unresolved image.
pub fn apply_enrichment(conn: &Connection, id: TitleId, e: &Enrichment) -> Result<()> {
    let image = e.image.to_column(ImageScope::Title);
    let image_is_real = matches!(e.image, ImageRef::Resolved(_));

    conn.execute(
        "UPDATE titles SET
            tmdb_id = COALESCE(tmdb_id, :tmdb_id),
            image_url = CASE
                WHEN :image_url IS NULL THEN image_url
                WHEN image_url IS NULL OR image_url = '' THEN :image_url
                WHEN :image_is_real = 1 AND image_url IN (:title_sentinel, :episode_sentinel)
                    THEN :image_url
                ELSE image_url
            END,
            original_language = COALESCE(NULLIF(original_language, ''), :original_language),
            release_date = COALESCE(NULLIF(release_date, ''), :release_date),
            tmdb_popularity = COALESCE(NULLIF(tmdb_popularity, 0), :popularity),
            origin_country = COALESCE(NULLIF(origin_country, ''), :origin_country),
            runtime_minutes = COALESCE(NULLIF(runtime_minutes, 0), :runtime_minutes),
            needs_backfill_tmdb = 0,
            updated_at = datetime('now')
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.get(),
            ":tmdb_id": e.tmdb_id,
            ":image_url": image,
            ":image_is_real": image_is_real,
            ":title_sentinel": TITLE_IMAGE_SENTINEL,
            ":episode_sentinel": EPISODE_IMAGE_SENTINEL,
            ":original_language": e.original_language,
            ":release_date": e.release_date,
            ":popularity": e.popularity,
            ":origin_country": e.origin_country,
            ":runtime_minutes": e.runtime_minutes,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub fn get_title(conn: &Connection, id: TitleId) -> Result<Title> {
    conn.query_row(
        &format!("SELECT {TITLE_COLUMNS} FROM titles WHERE id = :id"),
        rusqlite::named_params! { ":id": id.get() },
        row_to_title,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))?
    .ok_or_else(|| Error::not_found(format!("title {id}")))
}

pub fn find_title_by_imdb(conn: &Connection, imdb_id: &str) -> Result<Option<Title>> {
    conn.query_row(
        &format!("SELECT {TITLE_COLUMNS} FROM titles WHERE imdb_id = :imdb_id"),
        rusqlite::named_params! { ":imdb_id": imdb_id },
        row_to_title,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Record that a show's episodes were checked at `at`.
pub fn touch_episodes_checked(conn: &Connection, id: TitleId, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE titles SET episodes_checked_at = :at WHERE id = :id",
        rusqlite::named_params! { ":id": id.get(), ":at": at.to_rfc3339() },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}
