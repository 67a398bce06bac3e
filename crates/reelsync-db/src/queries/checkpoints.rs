//! Generic key/value sync checkpoints.

use rusqlite::{Connection, OptionalExtension};
use reelsync_common::{Error, Result};

/// Read a checkpoint value.
pub fn get_checkpoint(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM sync_state WHERE key = :key",
        rusqlite::named_params! { ":key": key },
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Create or replace a checkpoint value.
pub fn set_checkpoint(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_state (key, value, updated_at)
         VALUES (:key, :value, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::named_params! { ":key": key, ":value": value },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}
