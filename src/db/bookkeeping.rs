// src/db/bookkeeping.rs

//! Bookkeeping store
//!
//! Two engine-owned tables record migration state for every managed
//! schema, the engine's own included:
//!
//! - `schema_version(schema TEXT PRIMARY KEY, version TEXT NOT NULL)` -
//!   current version per schema; a row exists iff the schema is installed.
//! - `schema_log(schema, from_version, to_version, at)` - append-only
//!   transition history.
//!
//! Reads here never mutate, and tolerate the tables not existing yet: the
//! tables are created by the engine schema's own install scripts, so the
//! very first bootstrap call sees a database without them and must report
//! "absent" rather than raise. Writes are never executed here either -
//! [`record_transition`] returns statement text for the executor to run
//! inside the migration transaction, which is what makes a version bump
//! atomic with the scripts that earn it.

use crate::driver::Driver;
use crate::error::Result;
use crate::version::Version;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

/// One row of `schema_log`, newest last.
#[derive(Debug, Clone, Serialize)]
pub struct LogRow {
    pub schema: String,
    pub from_version: Option<String>,
    pub to_version: String,
    pub at: String,
}

/// Quote a string as a SQL literal, doubling embedded quotes.
fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// The recorded current version of `schema`, or `None` when the schema is
/// absent - including when the bookkeeping tables themselves do not exist
/// yet (bootstrap).
pub fn current_version(
    conn: &Connection,
    driver: &dyn Driver,
    schema: &str,
) -> Result<Option<Version>> {
    let lookup = conn
        .query_row(
            "SELECT version FROM schema_version WHERE schema = ?1",
            [schema],
            |row| row.get::<_, String>(0),
        )
        .optional();

    match lookup {
        Ok(Some(text)) => Ok(Some(Version::parse(&text)?)),
        Ok(None) => Ok(None),
        Err(e) if driver.is_missing_table(&e) => {
            debug!("bookkeeping tables missing, treating {} as absent", schema);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Statements recording the transition `from -> to` for `schema`: one
/// `schema_version` write (INSERT when the schema was absent, DELETE when
/// `to` is zero, UPDATE otherwise) plus one `schema_log` append.
///
/// Nothing is executed; the executor interleaves these into the migration
/// transaction after the edge's scripts.
pub fn record_transition(
    driver: &dyn Driver,
    schema: &str,
    from: &Version,
    to: &Version,
) -> Vec<String> {
    let schema_lit = quote_literal(schema);
    let mut statements = Vec::with_capacity(2);

    if to.is_zero() {
        statements.push(format!(
            "DELETE FROM schema_version WHERE schema = {schema_lit}"
        ));
    } else if from.is_zero() {
        statements.push(format!(
            "INSERT INTO schema_version (schema, version) VALUES ({schema_lit}, {})",
            quote_literal(to.as_str())
        ));
    } else {
        statements.push(format!(
            "UPDATE schema_version SET version = {} WHERE schema = {schema_lit}",
            quote_literal(to.as_str())
        ));
    }

    let from_lit = if from.is_zero() {
        "NULL".to_string()
    } else {
        quote_literal(from.as_str())
    };
    statements.push(format!(
        "INSERT INTO schema_log (schema, from_version, to_version, at) VALUES ({schema_lit}, {from_lit}, {}, {})",
        quote_literal(to.as_str()),
        driver.now_literal()
    ));

    statements
}

/// Statement removing the `schema_version` row for `schema` without
/// touching `schema_log` (the audit trail outlives the record).
pub fn drop_schema_record(schema: &str) -> Vec<String> {
    vec![format!(
        "DELETE FROM schema_version WHERE schema = {}",
        quote_literal(schema)
    )]
}

/// Names of every schema currently recorded as installed. Missing tables
/// mean nothing is installed.
pub fn installed_schemas(conn: &Connection, driver: &dyn Driver) -> Result<Vec<String>> {
    collect_rows(
        conn,
        driver,
        "SELECT schema FROM schema_version ORDER BY schema",
        [],
        |row| row.get(0),
    )
}

/// `(schema, version)` pairs for every installed schema.
pub fn installed_versions(
    conn: &Connection,
    driver: &dyn Driver,
) -> Result<Vec<(String, String)>> {
    collect_rows(
        conn,
        driver,
        "SELECT schema, version FROM schema_version ORDER BY schema",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

/// The transition history, oldest first, optionally filtered to one
/// schema.
pub fn history(
    conn: &Connection,
    driver: &dyn Driver,
    schema: Option<&str>,
) -> Result<Vec<LogRow>> {
    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogRow> {
        Ok(LogRow {
            schema: row.get(0)?,
            from_version: row.get(1)?,
            to_version: row.get(2)?,
            at: row.get(3)?,
        })
    }

    match schema {
        Some(name) => collect_rows(
            conn,
            driver,
            "SELECT schema, from_version, to_version, at FROM schema_log WHERE schema = ?1 ORDER BY at",
            [name],
            map_row,
        ),
        None => collect_rows(
            conn,
            driver,
            "SELECT schema, from_version, to_version, at FROM schema_log ORDER BY at, schema",
            [],
            map_row,
        ),
    }
}

fn collect_rows<T, P, F>(
    conn: &Connection,
    driver: &dyn Driver,
    sql: &str,
    params: P,
    map_row: F,
) -> Result<Vec<T>>
where
    P: rusqlite::Params,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) if driver.is_missing_table(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let rows = stmt
        .query_map(params, map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
