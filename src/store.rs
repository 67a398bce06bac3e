//! Running store queries from async code.

use reelsync_common::{Error, Result};
use reelsync_db::pool::{get_conn, DbPool};
use rusqlite::Connection;

/// Run `f` on a pooled connection on the blocking thread pool.
pub(crate) async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = get_conn(&pool)?;
        f(&conn)
    })
    .await
    .map_err(|e| Error::internal(format!("spawn_blocking join error: {e}")))?
}
