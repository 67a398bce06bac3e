//! Embedded schema migrations.
//!
//! Each migration runs in its own transaction and is recorded in
//! `schema_migrations`; a database is brought up to date by applying every
//! migration newer than the highest recorded version.

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration {version} ({name}) failed: {reason}")]
    Failed {
        version: u32,
        name: &'static str,
        reason: String,
    },
}

/// `(version, name, sql)`, ascending by version.
const MIGRATIONS: &[(u32, &str, &str)] = &[
    (1, "initial", include_str!("001_initial.sql")),
    (2, "review_indexes", include_str!("002_review_indexes.sql")),
];

fn ensure_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
}

/// Highest applied version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32, MigrationError> {
    ensure_table(conn)?;
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |&(version, _, _)| version)
}

/// Apply pending migrations and return how many ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    let from = current_version(conn)?;

    let pending = MIGRATIONS.iter().filter(|&&(version, _, _)| version > from);
    let mut applied = 0;
    for &(version, name, sql) in pending {
        let failed = |e: rusqlite::Error| MigrationError::Failed {
            version,
            name,
            reason: e.to_string(),
        };

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![version, name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        applied += 1;
        tracing::info!(version, name, "Applied migration");
    }

    if applied == 0 {
        tracing::debug!(version = from, "Schema up to date");
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_are_applied_once() {
        let conn = Connection::open_in_memory().unwrap();

        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn test_versions_ascend() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_store_tables_exist() {
        let conn = migrated();
        for table in [
            "titles",
            "movies",
            "shows",
            "show_seasons",
            "show_episodes",
            "genres",
            "title_genres",
            "sync_state",
            "custom_genre_reviews",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_title_type_is_checked() {
        let conn = migrated();
        let result = conn.execute(
            "INSERT INTO titles (imdb_id, type, display_name) VALUES ('tt1', 'tvEpisode', 'x')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_titles_start_flagged() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO titles (imdb_id, type, display_name) VALUES ('tt1', 'movie', 'x')",
            [],
        )
        .unwrap();
        let flag: i64 = conn
            .query_row("SELECT needs_backfill_tmdb FROM titles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(flag, 1);
    }
}
