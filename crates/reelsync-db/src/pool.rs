//! r2d2 connection pool over SQLite.
//!
//! Every connection gets a busy timeout and foreign keys; file-backed pools
//! also run in WAL mode so the importer's concurrent batch writers and the
//! readers of the detail views do not block each other. Pending migrations
//! run when the pool is built.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use reelsync_common::{Error, Result};

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Batch writers wait on each other rather than fail with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Matches the importer's default worker count plus a reader.
const POOL_SIZE: u32 = 9;

/// Open (creating if needed) the store at `db_path` and migrate it.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
    });
    build(manager)
}

/// A private shared-cache in-memory store, unique per call.
///
/// Connections of one pool see the same data. Concurrent writers on a
/// shared-cache database get `SQLITE_LOCKED` instead of waiting, so tests of
/// the concurrent importer use a file pool in a temp dir instead.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let uri = format!(
        "file:reelsync_mem_{}?mode=memory&cache=shared",
        NEXT.fetch_add(1, Ordering::Relaxed)
    );

    let manager = SqliteConnectionManager::file(uri).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    build(manager)
}

fn build(manager: SqliteConnectionManager) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {e}")))?;

    let applied = migrations::run_migrations(&*get_conn(&pool)?)
        .map_err(|e| Error::database(format!("Failed to run migrations: {e}")))?;
    if applied > 0 {
        tracing::info!(applied, version = migrations::latest_version(), "Store schema migrated");
    }
    Ok(pool)
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {e}")))
}
