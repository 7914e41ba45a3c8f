// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use migradir::db::bookkeeping;
use migradir::driver::SqliteDriver;
use migradir::{Config, Migrator, Version};
use rusqlite::Connection;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "migradir")]
#[command(author, version, about = "Directory-driven SQL schema migration engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a schema to a target version (bootstraps the engine schema first)
    Migrate {
        /// Schema name
        schema: String,
        /// Base directory containing per-schema script trees
        #[arg(short, long)]
        base: PathBuf,
        /// Target version (default: highest reachable version)
        #[arg(long)]
        to: Option<String>,
        /// Database path (default: /var/lib/migradir/migradir.db)
        #[arg(short, long, default_value = "/var/lib/migradir/migradir.db")]
        db_path: String,
    },
    /// Remove a schema (and the engine schema, if nothing else remains)
    Remove {
        /// Schema name
        schema: String,
        /// Base directory containing per-schema script trees
        #[arg(short, long)]
        base: PathBuf,
        /// Database path (default: /var/lib/migradir/migradir.db)
        #[arg(short, long, default_value = "/var/lib/migradir/migradir.db")]
        db_path: String,
    },
    /// Show the recorded version of one schema, or of all schemas
    Status {
        /// Schema name (optional, shows all if omitted)
        schema: Option<String>,
        /// Database path (default: /var/lib/migradir/migradir.db)
        #[arg(short, long, default_value = "/var/lib/migradir/migradir.db")]
        db_path: String,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute a migration plan without executing it
    Plan {
        /// Schema name
        schema: String,
        /// Base directory containing per-schema script trees
        #[arg(short, long)]
        base: PathBuf,
        /// Start version (default: the recorded current version)
        #[arg(long)]
        from: Option<String>,
        /// Target version (default: highest reachable version)
        #[arg(long)]
        to: Option<String>,
        /// Database path (default: /var/lib/migradir/migradir.db)
        #[arg(short, long, default_value = "/var/lib/migradir/migradir.db")]
        db_path: String,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the migration history
    History {
        /// Schema name (optional, shows all if omitted)
        schema: Option<String>,
        /// Database path (default: /var/lib/migradir/migradir.db)
        #[arg(short, long, default_value = "/var/lib/migradir/migradir.db")]
        db_path: String,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Open the database, creating it (and its parent directories) on first
/// use for commands that write.
fn open_for_write(db_path: &str) -> Result<Connection> {
    migradir::db::init(db_path)?;
    Ok(migradir::db::open(db_path)?)
}

/// Open the database read-only-ish: a missing file behaves like an empty
/// database instead of creating one.
fn open_for_read(db_path: &str) -> Result<Connection> {
    match migradir::db::open(db_path) {
        Ok(conn) => Ok(conn),
        Err(migradir::Error::DatabaseNotFound(_)) => Ok(Connection::open_in_memory()?),
        Err(e) => Err(e.into()),
    }
}

fn parse_version(text: &str) -> Result<Version> {
    Version::parse(text).with_context(|| format!("invalid version {text:?}"))
}

/// Render a stored UTC timestamp in the local timezone when it parses,
/// verbatim otherwise.
fn render_timestamp(at: &str) -> String {
    match chrono::NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S") {
        Ok(naive) => naive
            .and_utc()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => at.to_string(),
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            schema,
            base,
            to,
            db_path,
        } => {
            let desired = to.as_deref().map(parse_version).transpose()?;
            let mut conn = open_for_write(&db_path)?;
            let mut migrator = Migrator::new(
                &mut conn,
                Config {
                    schema: Some(schema.clone()),
                    desired_version: desired,
                    base: Some(base),
                    ..Config::default()
                },
            )?;
            let landed = migrator.full_migrate()?;
            println!("Schema {} is now at version {}", schema, landed);
            Ok(())
        }
        Commands::Remove {
            schema,
            base,
            db_path,
        } => {
            let mut conn = open_for_write(&db_path)?;
            let mut migrator = Migrator::new(
                &mut conn,
                Config {
                    schema: Some(schema.clone()),
                    base: Some(base),
                    ..Config::default()
                },
            )?;
            migrator.full_delete_schema()?;
            println!("Schema {} removed", schema);
            Ok(())
        }
        Commands::Status {
            schema,
            db_path,
            json,
        } => {
            let conn = open_for_read(&db_path)?;
            let versions = match &schema {
                Some(name) => {
                    let current = bookkeeping::current_version(&conn, &SqliteDriver, name)?;
                    current
                        .map(|v| vec![(name.clone(), v.as_str().to_string())])
                        .unwrap_or_default()
                }
                None => bookkeeping::installed_versions(&conn, &SqliteDriver)?,
            };

            if json {
                let rows: Vec<serde_json::Value> = versions
                    .iter()
                    .map(|(schema, version)| {
                        serde_json::json!({ "schema": schema, "version": version })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if versions.is_empty() {
                match schema {
                    Some(name) => println!("Schema {} is not installed", name),
                    None => println!("No schemas installed"),
                }
            } else {
                for (schema, version) in versions {
                    println!("{:<40} {}", schema, version);
                }
            }
            Ok(())
        }
        Commands::Plan {
            schema,
            base,
            from,
            to,
            db_path,
            json,
        } => {
            let mut conn = open_for_read(&db_path)?;
            let migrator = Migrator::new(
                &mut conn,
                Config {
                    schema: Some(schema),
                    base: Some(base),
                    ..Config::default()
                },
            )?;

            let from = match from.as_deref().map(parse_version).transpose()? {
                Some(v) => v,
                None => migrator.current_version()?.unwrap_or_else(Version::zero),
            };
            let to = match to.as_deref().map(parse_version).transpose()? {
                Some(v) => v,
                None => migrator.auto_target(&from)?,
            };
            let plan = migrator.plan(&from, &to)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else if plan.is_empty() {
                println!("Nothing to do: no steps from version {}", from);
            } else {
                for edge in &plan {
                    println!("{} -> {}  ({})", edge.from, edge.to, edge.dir_name);
                }
            }
            Ok(())
        }
        Commands::History {
            schema,
            db_path,
            json,
        } => {
            let conn = open_for_read(&db_path)?;
            let rows = bookkeeping::history(&conn, &SqliteDriver, schema.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No migration history");
            } else {
                for row in rows {
                    let from = row.from_version.as_deref().unwrap_or("-");
                    println!(
                        "{}  {:<30} {:>8} -> {}",
                        render_timestamp(&row.at),
                        row.schema,
                        from,
                        row.to_version
                    );
                }
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
