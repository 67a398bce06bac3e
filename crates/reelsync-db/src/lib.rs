//! Reelsync-DB: Database schema, migrations, and query operations
//!
//! SQLite access for the reelsync metadata store using rusqlite and r2d2
//! connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use reelsync_db::pool::{init_pool, get_conn};
//! use reelsync_db::queries::checkpoints;
//!
//! let pool = init_pool("reelsync.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let fingerprint = checkpoints::get_checkpoint(&conn, "imdb_files_hash").unwrap();
//! println!("Last imported: {:?}", fingerprint);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
