// tests/integration_test.rs

//! Integration tests for migradir
//!
//! End-to-end migration scenarios across discovery, planning, execution,
//! and bookkeeping.

use migradir::db::bookkeeping;
use migradir::driver::SqliteDriver;
use migradir::{Config, Error, Migrator, Version};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_script(base: &Path, rel: &str, body: &str) {
    let path = base.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn migrator<'c>(conn: &'c mut Connection, base: &Path, schema: &str) -> Migrator<'c> {
    Migrator::new(
        conn,
        Config {
            schema: Some(schema.to_string()),
            base: Some(base.to_path_buf()),
            ..Config::default()
        },
    )
    .unwrap()
}

fn migrator_to<'c>(
    conn: &'c mut Connection,
    base: &Path,
    schema: &str,
    to: &str,
) -> Migrator<'c> {
    Migrator::new(
        conn,
        Config {
            schema: Some(schema.to_string()),
            desired_version: Some(v(to)),
            base: Some(base.to_path_buf()),
            ..Config::default()
        },
    )
    .unwrap()
}

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
fn test_fresh_install() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(
        base,
        "myapp/sqlite/0.01/100_a.sql",
        "CREATE TABLE t(id INT);\n",
    );

    let mut conn = Connection::open_in_memory().unwrap();
    let mut m = migrator(&mut conn, base, "myapp");

    assert!(m.current_version().unwrap().is_none());
    let plan = m.plan(&Version::zero(), &v("0.01")).unwrap();
    assert_eq!(plan.len(), 1);
    assert!(plan[0].from.is_zero());
    assert_eq!(plan[0].to, v("0.01"));

    let landed = m.full_migrate().unwrap();
    assert_eq!(landed, v("0.01"));
    assert_eq!(m.current_version().unwrap(), Some(v("0.01")));

    let history = m.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_version, None);
    assert_eq!(history[0].to_version, "0.01");

    drop(m);
    assert!(table_exists(&conn, "t"));
}

#[test]
fn test_upgrade_takes_shortest_path() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(base, "myapp/sqlite/0.01/100_a.sql", "CREATE TABLE a(x INT);\n");
    write_script(base, "myapp/sqlite/0.02/100_a.sql", "CREATE TABLE a2(x INT);\n");
    write_script(base, "myapp/sqlite/0.03/100_a.sql", "CREATE TABLE a3(x INT);\n");
    write_script(
        base,
        "myapp/sqlite/0.01-0.02/100_up.sql",
        "CREATE TABLE via_02(x INT);\n",
    );
    write_script(
        base,
        "myapp/sqlite/0.01-0.03/100_up.sql",
        "CREATE TABLE direct(x INT);\n",
    );

    let mut conn = Connection::open_in_memory().unwrap();
    migrator_to(&mut conn, base, "myapp", "0.01")
        .full_migrate()
        .unwrap();

    let mut m = migrator(&mut conn, base, "myapp");
    let plan = m.plan(&v("0.01"), &v("0.03")).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].dir_name, "0.01-0.03");

    m.migrate_to(&v("0.03")).unwrap();
    assert_eq!(m.current_version().unwrap(), Some(v("0.03")));

    drop(m);
    assert!(table_exists(&conn, "direct"));
    assert!(!table_exists(&conn, "via_02"));
}

#[test]
fn test_downgrade_to_removal() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(
        base,
        "myapp/sqlite/0.02/100_a.sql",
        "CREATE TABLE a(x INT);\nCREATE TABLE b(y INT);\n",
    );
    write_script(
        base,
        "myapp/sqlite/0.02-0.01/100_down.sql",
        "DROP TABLE b;\n",
    );
    write_script(
        base,
        "myapp/sqlite/0.01-0.00/100_down.sql",
        "DROP TABLE a;\n",
    );

    let mut conn = Connection::open_in_memory().unwrap();
    let mut m = migrator(&mut conn, base, "myapp");
    let landed = m.full_migrate().unwrap();
    assert_eq!(landed, v("0.02"));

    let plan = m.plan(&v("0.02"), &Version::zero()).unwrap();
    let dirs: Vec<&str> = plan.iter().map(|e| e.dir_name.as_str()).collect();
    assert_eq!(dirs, vec!["0.02-0.01", "0.01-0.00"]);

    m.delete_schema().unwrap();
    assert!(m.current_version().unwrap().is_none());

    // Both downgrade steps are in the log, plus the install.
    let history = m.history().unwrap();
    assert_eq!(history.len(), 3);
    let targets: Vec<&str> = history.iter().map(|r| r.to_version.as_str()).collect();
    assert!(targets.contains(&"0.02"));
    assert!(targets.contains(&"0.01"));
    assert!(targets.contains(&"0.00"));

    drop(m);
    assert!(!table_exists(&conn, "a"));
    assert!(!table_exists(&conn, "b"));
}

#[test]
fn test_no_migration_path() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(base, "myapp/sqlite/0.01/100_a.sql", "CREATE TABLE a(x INT);\n");
    write_script(base, "myapp/sqlite/0.02/100_a.sql", "CREATE TABLE a2(x INT);\n");

    let mut conn = Connection::open_in_memory().unwrap();
    let mut m = migrator_to(&mut conn, base, "myapp", "0.01");
    m.full_migrate().unwrap();

    let err = m.migrate_to(&v("0.02")).unwrap_err();
    assert!(matches!(err, Error::NoMigrationPath { .. }));
    // The recorded version is untouched.
    assert_eq!(m.current_version().unwrap(), Some(v("0.01")));

    // A target equal to the stranded current version is still a no-op.
    m.migrate_to(&v("0.01")).unwrap();
}

#[test]
fn test_atomic_rollback_on_failure() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(base, "myapp/sqlite/0.01/100_a.sql", "CREATE TABLE a(x INT);\n");
    write_script(
        base,
        "myapp/sqlite/0.01-0.02/100_good.sql",
        "CREATE TABLE extra(x INT);\n",
    );
    write_script(
        base,
        "myapp/sqlite/0.01-0.02/110_bad.sql",
        "THIS IS NOT SQL;\n",
    );

    let mut conn = Connection::open_in_memory().unwrap();
    // Auto-targeting walks into the broken 0.01-0.02 edge and fails; the
    // bootstrap transaction already committed, the user one rolled back.
    let err = migrator(&mut conn, base, "myapp").full_migrate().unwrap_err();
    assert!(matches!(err, Error::ExecutionFailure { .. }));
    assert!(bookkeeping::current_version(&conn, &SqliteDriver, "myapp")
        .unwrap()
        .is_none());

    let mut m = migrator_to(&mut conn, base, "myapp", "0.01");
    m.full_migrate().unwrap();
    let before = m.current_version().unwrap();

    let err = m.migrate_to(&v("0.02")).unwrap_err();
    match err {
        Error::ExecutionFailure { edge, file, .. } => {
            assert_eq!(edge, "0.01 -> 0.02");
            assert_eq!(file, "110_bad.sql");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(m.current_version().unwrap(), before);
    drop(m);
    assert!(!table_exists(&conn, "extra"));
}

#[test]
fn test_overlay_applies_in_engine_runs() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    // The driver-specific 110_b wins over _common's; _common contributes 105_c.
    write_script(
        base,
        "myapp/sqlite/0.01/100_a.sql",
        "CREATE TABLE a(x INT);\n",
    );
    write_script(
        base,
        "myapp/sqlite/0.01/110_b.sql",
        "CREATE TABLE b_driver(x INT);\n",
    );
    write_script(
        base,
        "myapp/_common/0.01/105_c.sql",
        "INSERT INTO a VALUES (1);\n",
    );
    write_script(
        base,
        "myapp/_common/0.01/110_b.sql",
        "CREATE TABLE b_common(x INT);\n",
    );

    let mut conn = Connection::open_in_memory().unwrap();
    let mut m = migrator(&mut conn, base, "myapp");
    m.full_migrate().unwrap();

    drop(m);
    assert!(table_exists(&conn, "b_driver"));
    assert!(!table_exists(&conn, "b_common"));
    // 105_c ran after 100_a created the table it inserts into.
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM a", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_bootstrap_and_full_delete_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(base, "myapp/sqlite/0.01/100_a.sql", "CREATE TABLE a(x INT);\n");
    write_script(base, "myapp/sqlite/0.01-0/100_down.sql", "DROP TABLE a;\n");

    let mut conn = Connection::open_in_memory().unwrap();
    let mut m = migrator(&mut conn, base, "myapp");
    m.full_migrate().unwrap();

    // Engine schema is recorded alongside the user schema.
    drop(m);
    let schemas = bookkeeping::installed_schemas(&conn, &SqliteDriver).unwrap();
    assert_eq!(schemas, vec!["migration-directories", "myapp"]);

    let mut m = migrator(&mut conn, base, "myapp");
    m.full_delete_schema().unwrap();

    // The last user schema is gone, so the engine schema went with it.
    drop(m);
    assert!(!table_exists(&conn, "schema_version"));
    assert!(!table_exists(&conn, "schema_log"));
    assert!(!table_exists(&conn, "a"));
}

#[test]
fn test_full_delete_keeps_engine_schema_while_others_remain() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(base, "one/sqlite/0.01/100_a.sql", "CREATE TABLE one_t(x INT);\n");
    write_script(base, "one/sqlite/0.01-0/100_down.sql", "DROP TABLE one_t;\n");
    write_script(base, "two/sqlite/0.01/100_a.sql", "CREATE TABLE two_t(x INT);\n");

    let mut conn = Connection::open_in_memory().unwrap();
    migrator(&mut conn, base, "one").full_migrate().unwrap();
    migrator(&mut conn, base, "two").full_migrate().unwrap();

    migrator(&mut conn, base, "one").full_delete_schema().unwrap();

    // "two" still exists, so the bookkeeping tables must survive.
    assert!(table_exists(&conn, "schema_version"));
    let schemas = bookkeeping::installed_schemas(&conn, &SqliteDriver).unwrap();
    assert_eq!(schemas, vec!["migration-directories", "two"]);
}

#[test]
fn test_migrate_is_idempotent_at_target() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_script(base, "myapp/sqlite/0.01/100_a.sql", "CREATE TABLE a(x INT);\n");

    let mut conn = Connection::open_in_memory().unwrap();
    let mut m = migrator(&mut conn, base, "myapp");
    m.full_migrate().unwrap();
    let history_len = m.history().unwrap().len();

    // Second run is a no-op: same version, no new log rows.
    m.full_migrate().unwrap();
    assert_eq!(m.history().unwrap().len(), history_len);
}

#[test]
fn test_on_disk_engine_schema_is_preferred() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    // Ship the engine schema on disk with an extra marker table, proving
    // the on-disk copy is used over the embedded scripts.
    write_script(
        base,
        "migration-directories/_generic/0.01/100_schema_version.sql",
        "CREATE TABLE schema_version (schema TEXT PRIMARY KEY, version TEXT NOT NULL);\n",
    );
    write_script(
        base,
        "migration-directories/_generic/0.01/110_schema_log.sql",
        "CREATE TABLE schema_log (schema TEXT NOT NULL, from_version TEXT, to_version TEXT NOT NULL, at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP);\n",
    );
    write_script(
        base,
        "migration-directories/_generic/0.01/120_marker.sql",
        "CREATE TABLE engine_marker(x INT);\n",
    );
    write_script(base, "myapp/sqlite/0.01/100_a.sql", "CREATE TABLE a(x INT);\n");

    let mut conn = Connection::open_in_memory().unwrap();
    migrator(&mut conn, base, "myapp").full_migrate().unwrap();

    assert!(table_exists(&conn, "engine_marker"));
}
