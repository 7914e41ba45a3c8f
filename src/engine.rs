// src/engine.rs

//! Engine surface
//!
//! [`Config`] is the recognized option set; [`Migrator`] binds it to a
//! database connection and exposes the migration operations. The
//! connection stays owned by the caller but is used exclusively by the
//! migrator for the duration of each run; runs are synchronous and
//! single-threaded.

use crate::bootstrap;
use crate::db::bookkeeping::{self, LogRow};
use crate::discover::SchemaLayout;
use crate::driver::{self, Driver};
use crate::error::{Error, Result};
use crate::executor::{self, Step};
use crate::graph::{Edge, MigrationGraph};
use crate::version::Version;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::{debug, info};

/// A source a schema's name and target version can be derived from, e.g.
/// the application component that owns the schema. Colons in the
/// qualified name map to dashes in the schema name (`my::app` owns schema
/// `my-app`).
#[derive(Debug, Clone)]
pub struct VersionSource {
    pub name: String,
    pub version: Version,
}

/// Recognized engine options.
///
/// `schema` falls back to a transformation of `source`; `desired_version`
/// falls back to `source`'s version, and failing that to the highest
/// version reachable from the installed one. `driver` is inferred from
/// the handle when omitted. The schema's script root defaults to
/// `<base>/<schema>`, with the driver directory selected inside it.
#[derive(Default)]
pub struct Config {
    pub schema: Option<String>,
    pub desired_version: Option<Version>,
    pub source: Option<VersionSource>,
    pub driver: Option<Box<dyn Driver>>,
    pub base: Option<PathBuf>,
    pub schema_dir: Option<PathBuf>,
}

/// A migration engine bound to one schema and one connection.
pub struct Migrator<'c> {
    conn: &'c mut Connection,
    driver: Box<dyn Driver>,
    schema: String,
    desired: Option<Version>,
    base: Option<PathBuf>,
    schema_dir: PathBuf,
}

impl<'c> Migrator<'c> {
    /// Bind `config` to `conn`, applying the defaulting rules.
    pub fn new(conn: &'c mut Connection, config: Config) -> Result<Self> {
        let Config {
            schema,
            desired_version,
            source,
            driver: configured_driver,
            base,
            schema_dir,
        } = config;

        let schema = match (schema, &source) {
            (Some(name), _) => name,
            (None, Some(source)) => source.name.replace("::", "-"),
            (None, None) => {
                return Err(Error::Config(
                    "either schema or source must be given".to_string(),
                ));
            }
        };

        let desired = desired_version.or_else(|| source.map(|s| s.version));
        let driver = configured_driver.unwrap_or_else(|| driver::infer(conn));

        let schema_dir = match schema_dir {
            Some(dir) => dir,
            None => match &base {
                Some(base) => base.join(&schema),
                None => {
                    return Err(Error::Config(
                        "either base or schema_dir must be given".to_string(),
                    ));
                }
            },
        };

        Ok(Migrator {
            conn,
            driver,
            schema,
            desired,
            base,
            schema_dir,
        })
    }

    /// The schema this migrator manages.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The recorded current version, or `None` when the schema (or the
    /// bookkeeping itself) is absent. Read-only.
    pub fn current_version(&self) -> Result<Option<Version>> {
        bookkeeping::current_version(&*self.conn, self.driver.as_ref(), &self.schema)
    }

    /// Compute the plan from `from` to `to` without executing anything.
    pub fn plan(&self, from: &Version, to: &Version) -> Result<Vec<Edge>> {
        let layout = self.layout()?;
        MigrationGraph::new(layout.edges()).plan(from, to)
    }

    /// The highest version reachable from `from`, or `from` itself when
    /// nothing newer is reachable. Read-only.
    pub fn auto_target(&self, from: &Version) -> Result<Version> {
        let layout = self.layout()?;
        MigrationGraph::new(layout.edges()).auto_target(from)
    }

    /// Migrate to the configured desired version, or to the highest
    /// reachable version when none is configured. Returns the version the
    /// schema ends at.
    pub fn migrate(&mut self) -> Result<Version> {
        let current = self.recorded_or_zero()?;
        let target = match &self.desired {
            Some(version) => version.clone(),
            None => {
                let layout = self.layout()?;
                let target = MigrationGraph::new(layout.edges()).auto_target(&current)?;
                debug!("auto-selected target version {} for {}", target, self.schema);
                target
            }
        };
        self.migrate_to(&target)?;
        Ok(target)
    }

    /// Migrate to an explicit target version (zero removes the schema).
    pub fn migrate_to(&mut self, to: &Version) -> Result<()> {
        let current = self.recorded_or_zero()?;
        if &current == to {
            info!("schema {} already at version {}", self.schema, to);
            return Ok(());
        }

        let layout = self.layout()?;
        let plan = MigrationGraph::new(layout.edges()).plan(&current, to)?;
        info!(
            "migrating schema {} from {} to {} in {} step(s)",
            self.schema,
            current,
            to,
            plan.len()
        );

        let steps = plan
            .into_iter()
            .map(|edge| {
                let scripts = layout.resolve(&edge.dir_name)?;
                let bookkeeping = bookkeeping::record_transition(
                    self.driver.as_ref(),
                    &self.schema,
                    &edge.from,
                    &edge.to,
                );
                Ok(Step {
                    edge,
                    scripts,
                    bookkeeping,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        executor::execute(self.conn, self.driver.as_ref(), &steps)
    }

    /// Remove the schema (migrate to zero).
    pub fn delete_schema(&mut self) -> Result<()> {
        self.migrate_to(&Version::zero())
    }

    /// Bootstrap the engine's own schema, then migrate this one. Each
    /// phase runs in its own transaction.
    pub fn full_migrate(&mut self) -> Result<Version> {
        bootstrap::ensure_engine_schema(self.conn, self.driver.as_ref(), self.base.as_deref())?;
        self.migrate()
    }

    /// Remove this schema, then the engine's own schema if no user schema
    /// remains recorded.
    pub fn full_delete_schema(&mut self) -> Result<()> {
        self.delete_schema()?;
        let removed = bootstrap::remove_engine_schema_if_unused(
            self.conn,
            self.driver.as_ref(),
            self.base.as_deref(),
        )?;
        if removed {
            info!("engine schema removed along with {}", self.schema);
        }
        Ok(())
    }

    /// The transition history recorded for this schema, oldest first.
    pub fn history(&self) -> Result<Vec<LogRow>> {
        bookkeeping::history(&*self.conn, self.driver.as_ref(), Some(&self.schema))
    }

    fn layout(&self) -> Result<SchemaLayout> {
        SchemaLayout::scan(&self.schema_dir, self.driver.name())
    }

    fn recorded_or_zero(&self) -> Result<Version> {
        Ok(self.current_version()?.unwrap_or_else(Version::zero))
    }
}
