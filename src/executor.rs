// src/executor.rs

//! Migration executor
//!
//! Takes a fully resolved plan - edges with their script files already
//! loaded and their bookkeeping statements already generated - and runs
//! the whole thing inside a single transaction on the caller's
//! connection. Within an edge, scripts run in base-name order and each
//! file is split into statements; the edge's bookkeeping statements run
//! after its scripts and before the next edge. Any statement failure
//! rolls everything back, so partial progress is never observable. An
//! empty plan is a no-op: no transaction, no bookkeeping.

use crate::discover::ScriptFile;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::graph::Edge;
use crate::split::split_statements;
use rusqlite::Connection;
use tracing::{debug, info};

/// Label used for [`Error::ExecutionFailure`] when the failing statement
/// was a bookkeeping write rather than a script.
const BOOKKEEPING_FILE: &str = "(bookkeeping)";

/// One resolved step of a migration plan.
#[derive(Debug)]
pub struct Step {
    pub edge: Edge,
    pub scripts: Vec<ScriptFile>,
    /// Statements recording this step in the bookkeeping tables, executed
    /// after the scripts. Empty when the step must not be recorded (the
    /// engine schema's own teardown drops the tables the record would go
    /// into).
    pub bookkeeping: Vec<String>,
}

/// Execute `steps` atomically on `conn`.
pub fn execute(conn: &mut Connection, driver: &dyn Driver, steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        debug!("empty plan, nothing to execute");
        return Ok(());
    }

    let tx = conn.transaction()?;
    driver.prepare_run(&tx)?;

    for step in steps {
        info!("applying migration step {}", step.edge);
        for script in &step.scripts {
            debug!("running {} for {}", script.name, step.edge);
            for statement in split_statements(&script.body) {
                tx.execute_batch(&statement)
                    .map_err(|source| Error::ExecutionFailure {
                        edge: step.edge.to_string(),
                        file: script.name.clone(),
                        source,
                    })?;
            }
        }
        for statement in &step.bookkeeping {
            tx.execute_batch(statement)
                .map_err(|source| Error::ExecutionFailure {
                    edge: step.edge.to_string(),
                    file: BOOKKEEPING_FILE.to_string(),
                    source,
                })?;
        }
    }

    // Transaction drop rolls back, so only an explicit commit publishes.
    let last_edge = steps[steps.len() - 1].edge.to_string();
    tx.commit().map_err(|source| Error::ExecutionFailure {
        edge: last_edge,
        file: "(commit)".to_string(),
        source,
    })?;

    debug!("committed {} migration step(s)", steps.len());
    Ok(())
}
