// src/bootstrap.rs

//! Self-hosting bootstrap
//!
//! The engine records its bookkeeping tables under the reserved schema
//! name `migration-directories` and migrates that schema with the same
//! machinery as any user schema. The cycle is broken in the store:
//! `current_version` reports "absent" when the tables do not exist yet,
//! and the very first install statement of the engine schema creates
//! them before any bookkeeping INSERT runs.
//!
//! The engine schema's scripts ship embedded in the crate (and as data
//! files under `schemas/`); an on-disk copy under `<base>` takes
//! precedence when present, which is how a future engine version with its
//! own transition directories would roll this schema forward.

use crate::db::bookkeeping;
use crate::discover::{ScriptFile, SchemaLayout};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::executor::{self, Step};
use crate::graph::{Edge, MigrationGraph};
use crate::version::Version;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Reserved schema name under which the engine tracks itself.
pub const ENGINE_SCHEMA: &str = "migration-directories";

/// Version of the engine schema this build requires.
const ENGINE_VERSION: &str = "0.01";

const INSTALL_SCRIPTS: &[(&str, &str)] = &[
    (
        "100_schema_version.sql",
        "CREATE TABLE schema_version (\n    schema TEXT PRIMARY KEY,\n    version TEXT NOT NULL\n);\n",
    ),
    (
        "110_schema_log.sql",
        "CREATE TABLE schema_log (\n    schema TEXT NOT NULL,\n    from_version TEXT,\n    to_version TEXT NOT NULL,\n    at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n);\n",
    ),
];

const REMOVE_SCRIPTS: &[(&str, &str)] = &[(
    "100_drop_tables.sql",
    "DROP TABLE schema_log;\nDROP TABLE schema_version;\n",
)];

/// The engine schema version this build of the crate requires.
pub fn required_version() -> Version {
    Version::parse(ENGINE_VERSION).expect("engine version constant is well-formed")
}

fn embedded_scripts(scripts: &[(&str, &str)]) -> Vec<ScriptFile> {
    scripts
        .iter()
        .map(|(name, body)| ScriptFile {
            name: (*name).to_string(),
            body: (*body).to_string(),
        })
        .collect()
}

/// The on-disk layout for the engine schema under `base`, when one exists
/// and has scripts for this driver.
fn on_disk_layout(base: Option<&Path>, driver: &dyn Driver) -> Result<Option<SchemaLayout>> {
    let Some(base) = base else { return Ok(None) };
    let root = base.join(ENGINE_SCHEMA);
    if !root.is_dir() {
        return Ok(None);
    }
    let layout = SchemaLayout::scan(&root, driver.name())?;
    Ok(layout.has_scripts().then_some(layout))
}

fn resolved_steps(
    layout: &SchemaLayout,
    driver: &dyn Driver,
    from: &Version,
    to: &Version,
) -> Result<Vec<Step>> {
    let graph = MigrationGraph::new(layout.edges());
    graph
        .plan(from, to)?
        .into_iter()
        .map(|edge| {
            let scripts = layout.resolve(&edge.dir_name)?;
            // The edge that takes the engine schema to zero drops the
            // bookkeeping tables themselves; a record written after its
            // scripts would target a just-dropped table.
            let bookkeeping = if edge.to.is_zero() {
                Vec::new()
            } else {
                bookkeeping::record_transition(driver, ENGINE_SCHEMA, &edge.from, &edge.to)
            };
            Ok(Step {
                edge,
                scripts,
                bookkeeping,
            })
        })
        .collect()
}

/// Bring the engine's own schema to [`required_version`], installing the
/// bookkeeping tables on a pristine database. Runs in its own
/// transaction. Any failure on this path surfaces as
/// [`Error::BootstrapFailure`].
pub fn ensure_engine_schema(
    conn: &mut Connection,
    driver: &dyn Driver,
    base: Option<&Path>,
) -> Result<()> {
    let target = required_version();
    let current = bookkeeping::current_version(conn, driver, ENGINE_SCHEMA)?
        .unwrap_or_else(Version::zero);

    if current == target {
        debug!("engine schema already at {}", target);
        return Ok(());
    }

    info!("bootstrapping engine schema {} -> {}", current, target);
    migrate_engine_schema(conn, driver, base, &current, &target)
        .map_err(|e| Error::BootstrapFailure(Box::new(e)))
}

fn migrate_engine_schema(
    conn: &mut Connection,
    driver: &dyn Driver,
    base: Option<&Path>,
    current: &Version,
    target: &Version,
) -> Result<()> {
    if let Some(layout) = on_disk_layout(base, driver)? {
        let steps = resolved_steps(&layout, driver, current, target)?;
        return executor::execute(conn, driver, &steps);
    }

    // Embedded fallback covers the fresh-install edge only; anything else
    // needs on-disk transition scripts.
    if !current.is_zero() {
        return Err(Error::NoMigrationPath {
            from: current.to_string(),
            to: target.to_string(),
        });
    }

    let edge = Edge {
        from: Version::zero(),
        to: target.clone(),
        dir_name: ENGINE_VERSION.to_string(),
    };
    let bookkeeping =
        bookkeeping::record_transition(driver, ENGINE_SCHEMA, &edge.from, &edge.to);
    let steps = [Step {
        edge,
        scripts: embedded_scripts(INSTALL_SCRIPTS),
        bookkeeping,
    }];
    executor::execute(conn, driver, &steps)
}

/// Remove the engine schema when no user schema remains recorded.
///
/// Returns whether the engine schema was removed. The removal edge drops
/// the bookkeeping tables themselves, so it runs with bookkeeping writes
/// suppressed - the audit rows necessarily die with the tables.
pub fn remove_engine_schema_if_unused(
    conn: &mut Connection,
    driver: &dyn Driver,
    base: Option<&Path>,
) -> Result<bool> {
    let schemas = bookkeeping::installed_schemas(conn, driver)?;
    if schemas.iter().any(|name| name != ENGINE_SCHEMA) {
        debug!("other schemas remain, keeping engine schema");
        return Ok(false);
    }

    let Some(current) = bookkeeping::current_version(conn, driver, ENGINE_SCHEMA)? else {
        return Ok(false);
    };

    info!("no user schemas remain, removing engine schema");
    let zero = Version::zero();

    if let Some(layout) = on_disk_layout(base, driver)? {
        let steps = resolved_steps(&layout, driver, &current, &zero)?;
        executor::execute(conn, driver, &steps)?;
        return Ok(true);
    }

    if current != required_version() {
        return Err(Error::NoMigrationPath {
            from: current.to_string(),
            to: zero.to_string(),
        });
    }

    let steps = [Step {
        edge: Edge {
            from: current,
            to: zero,
            dir_name: format!("{ENGINE_VERSION}-0"),
        },
        scripts: embedded_scripts(REMOVE_SCRIPTS),
        bookkeeping: Vec::new(),
    }];
    executor::execute(conn, driver, &steps)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SqliteDriver;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_bootstrap_on_pristine_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_engine_schema(&mut conn, &SqliteDriver, None).unwrap();

        assert!(table_exists(&conn, "schema_version"));
        assert!(table_exists(&conn, "schema_log"));
        assert_eq!(
            bookkeeping::current_version(&conn, &SqliteDriver, ENGINE_SCHEMA).unwrap(),
            Some(required_version())
        );
        // The bootstrap transition itself is logged.
        let rows = bookkeeping::history(&conn, &SqliteDriver, Some(ENGINE_SCHEMA)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].from_version, None);
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_engine_schema(&mut conn, &SqliteDriver, None).unwrap();
        ensure_engine_schema(&mut conn, &SqliteDriver, None).unwrap();

        let rows = bookkeeping::history(&conn, &SqliteDriver, Some(ENGINE_SCHEMA)).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_removal_when_unused() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_engine_schema(&mut conn, &SqliteDriver, None).unwrap();

        let removed = remove_engine_schema_if_unused(&mut conn, &SqliteDriver, None).unwrap();
        assert!(removed);
        assert!(!table_exists(&conn, "schema_version"));
        assert!(!table_exists(&conn, "schema_log"));
    }

    #[test]
    fn test_removal_skipped_while_user_schemas_remain() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_engine_schema(&mut conn, &SqliteDriver, None).unwrap();
        conn.execute(
            "INSERT INTO schema_version (schema, version) VALUES ('myapp', '0.01')",
            [],
        )
        .unwrap();

        let removed = remove_engine_schema_if_unused(&mut conn, &SqliteDriver, None).unwrap();
        assert!(!removed);
        assert!(table_exists(&conn, "schema_version"));
    }

    #[test]
    fn test_removal_on_empty_database_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        let removed = remove_engine_schema_if_unused(&mut conn, &SqliteDriver, None).unwrap();
        assert!(!removed);
    }
}
