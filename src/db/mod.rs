// src/db/mod.rs

//! Database layer for migradir
//!
//! Connection plumbing (open/init with the engine's pragma setup) and the
//! bookkeeping store that tracks the current version and migration history
//! of every managed schema.

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

pub mod bookkeeping;

/// Initialize a new database file at the specified path.
///
/// Creates the file and parent directories and applies the engine's
/// pragmas. This is idempotent - calling it on an existing database is
/// safe. Bookkeeping tables are not created here; the bootstrap migration
/// owns them.
pub fn init(db_path: &str) -> Result<()> {
    debug!("Initializing database at: {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;

    // Set pragmas for better performance and reliability
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    info!("Database initialized successfully");
    Ok(())
}

/// Open an existing database.
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::DatabaseNotFound(db_path.to_string()));
    }

    let conn = Connection::open(db_path)?;

    // Set pragmas
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}
