// src/driver.rs

//! Driver adapters
//!
//! The engine speaks plain SQL; everything dialect-specific goes through
//! this narrow trait. A driver supplies its identifier (which doubles as
//! the schema directory name it selects), the SQL literal for "now" used
//! in log inserts, classification of "table does not exist" errors (the
//! bookkeeping store must treat those as "absent" during bootstrap), and a
//! hook for per-driver transaction quirks.

use crate::error::Result;
use rusqlite::Connection;

/// Dialect-specific knobs consumed by the migration core.
pub trait Driver {
    /// Identifier of this driver, e.g. `sqlite`. Also the name of the
    /// per-driver script directory under a schema root.
    fn name(&self) -> &str;

    /// SQL literal producing the current timestamp, spliced into the
    /// `schema_log` insert.
    fn now_literal(&self) -> String;

    /// Whether `err` means a referenced table does not exist. Used to map
    /// bookkeeping reads on a pristine database to "absent" instead of an
    /// error.
    fn is_missing_table(&self, err: &rusqlite::Error) -> bool;

    /// Per-driver setup executed right after a migration transaction is
    /// opened. The default does nothing.
    fn prepare_run(&self, conn: &Connection) -> Result<()> {
        let _ = conn;
        Ok(())
    }
}

/// Driver adapter for SQLite connections.
#[derive(Debug, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn now_literal(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }

    fn is_missing_table(&self, err: &rusqlite::Error) -> bool {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(message)) => {
                message.starts_with("no such table")
            }
            _ => false,
        }
    }
}

/// Infer the driver for a connection handle. The shipped handle type is
/// rusqlite, so this is always the SQLite adapter; callers with another
/// dialect's directory layout pass their own [`Driver`] explicitly.
pub fn infer(conn: &Connection) -> Box<dyn Driver> {
    let _ = conn;
    Box::new(SqliteDriver)
}
