//! Custom genre review bookkeeping.

use reelsync_common::{Error, GenreId, Result, TitleId};
use rusqlite::types::Value;
use rusqlite::Connection;

use super::titles::kind_at;
use crate::models::ReviewCandidate;

/// Titles without a review record, most-voted first.
///
/// When `with_any_genre` is non-empty only titles carrying at least one of
/// those genres are returned.
pub fn unreviewed_titles(
    conn: &Connection,
    limit: usize,
    with_any_genre: &[String],
) -> Result<Vec<ReviewCandidate>> {
    let mut params: Vec<Value> = with_any_genre.iter().map(|g| Value::Text(g.clone())).collect();
    let genre_filter = if with_any_genre.is_empty() {
        String::new()
    } else {
        format!(
            "AND EXISTS (SELECT 1 FROM title_genres tg2 JOIN genres g2 ON g2.id = tg2.genre_id
                         WHERE tg2.title_id = t.id AND g2.name IN ({}))",
            vec!["?"; with_any_genre.len()].join(", ")
        )
    };
    params.push(Value::Integer(limit as i64));

    let sql = format!(
        "SELECT t.id, t.display_name, t.type, t.start_year, t.num_votes, t.average_rating,
                t.original_language, t.origin_country,
                (SELECT group_concat(name, ', ') FROM (
                    SELECT g.name FROM title_genres tg JOIN genres g ON g.id = tg.genre_id
                    WHERE tg.title_id = t.id ORDER BY g.name))
         FROM titles t
         WHERE NOT EXISTS (SELECT 1 FROM custom_genre_reviews cr WHERE cr.title_id = t.id)
         {genre_filter}
         ORDER BY t.num_votes DESC NULLS LAST, t.id
         LIMIT ?"
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            let genres: Option<String> = row.get(8)?;
            Ok(ReviewCandidate {
                id: TitleId::from(row.get::<_, i64>(0)?),
                display_name: row.get(1)?,
                kind: kind_at(row, 2)?,
                start_year: row.get(3)?,
                num_votes: row.get(4)?,
                average_rating: row.get(5)?,
                original_language: row.get(6)?,
                origin_country: row.get(7)?,
                genres: genres
                    .map(|g| g.split(", ").map(str::to_string).collect())
                    .unwrap_or_default(),
            })
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Mark a title as reviewed. Returns false if it already was.
pub fn record_review(conn: &Connection, title_id: TitleId) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO custom_genre_reviews (title_id) VALUES (:title_id)
             ON CONFLICT DO NOTHING",
            rusqlite::named_params! { ":title_id": title_id.get() },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(inserted > 0)
}

/// Attach a genre to a title. Returns false if the pair already existed.
pub fn assign_genre(conn: &Connection, title_id: TitleId, genre_id: GenreId) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO title_genres (title_id, genre_id) VALUES (:title_id, :genre_id)
             ON CONFLICT DO NOTHING",
            rusqlite::named_params! { ":title_id": title_id.get(), ":genre_id": genre_id.get() },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(inserted > 0)
}
