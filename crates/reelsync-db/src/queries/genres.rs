//! Genre and title/genre membership queries.

use std::collections::{HashMap, HashSet};

use reelsync_common::{Error, GenreId, Result, TitleId};
use rusqlite::types::Value;
use rusqlite::Connection;

use super::batch;

/// Insert genre names that do not exist yet. Returns how many were created.
pub fn upsert_genres(conn: &Connection, names: &[String]) -> Result<usize> {
    let rows: Vec<Vec<Value>> = names.iter().map(|n| vec![Value::Text(n.clone())]).collect();
    batch::insert_many(
        conn,
        "INSERT INTO genres (name) VALUES",
        "ON CONFLICT(name) DO NOTHING",
        1,
        &rows,
    )
}

pub fn load_genre_ids(conn: &Connection) -> Result<HashMap<String, GenreId>> {
    let mut stmt = conn
        .prepare("SELECT name, id FROM genres")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, GenreId::from(row.get::<_, i64>(1)?)))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Load every existing membership pair.
pub fn load_title_genres(conn: &Connection) -> Result<HashSet<(TitleId, GenreId)>> {
    let mut stmt = conn
        .prepare("SELECT title_id, genre_id FROM title_genres")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                TitleId::from(row.get::<_, i64>(0)?),
                GenreId::from(row.get::<_, i64>(1)?),
            ))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashSet<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn insert_title_genres(conn: &Connection, pairs: &[(TitleId, GenreId)]) -> Result<usize> {
    let rows: Vec<Vec<Value>> = pairs
        .iter()
        .map(|(t, g)| vec![Value::Integer(t.get()), Value::Integer(g.get())])
        .collect();
    batch::insert_many(
        conn,
        "INSERT INTO title_genres (title_id, genre_id) VALUES",
        "ON CONFLICT DO NOTHING",
        2,
        &rows,
    )
}

/// Genre names of one title, alphabetical.
pub fn title_genre_names(conn: &Connection, title_id: TitleId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT g.name FROM title_genres tg
             JOIN genres g ON g.id = tg.genre_id
             WHERE tg.title_id = :title_id
             ORDER BY g.name",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::named_params! { ":title_id": title_id.get() }, |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Create the given genres flagged as custom (or flag existing ones) and
/// return the id of every custom genre.
pub fn ensure_custom_genres(conn: &Connection, names: &[&str]) -> Result<HashMap<String, GenreId>> {
    for name in names {
        conn.execute(
            "INSERT INTO genres (name, is_custom) VALUES (:name, 1)
             ON CONFLICT(name) DO UPDATE SET is_custom = 1",
            rusqlite::named_params! { ":name": name },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    }

    let mut stmt = conn
        .prepare("SELECT name, id FROM genres WHERE is_custom = 1 ORDER BY name")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, GenreId::from(row.get::<_, i64>(1)?)))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}
