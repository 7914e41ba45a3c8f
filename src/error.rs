// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for migradir
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Incomplete or contradictory engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A string claimed to be a schema version but failed numeric parse
    #[error("Bad version syntax: {0:?}")]
    BadVersionSyntax(String),

    /// A script file or directory could not be read
    #[error("Failed to read migration scripts at {path}: {source}")]
    ScriptReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The planner could not connect the current version to the target
    #[error("No migration path from version {from} to version {to}")]
    NoMigrationPath { from: String, to: String },

    /// The bookkeeping tables record a version absent from the graph
    #[error("Current version {0} does not appear in the migration graph")]
    UnknownCurrentVersion(String),

    /// The database rejected a statement; the whole transaction was rolled back
    #[error("Statement in {file} failed while applying {edge}: {source}")]
    ExecutionFailure {
        edge: String,
        file: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The engine's own schema could not be brought to its required version
    #[error("Bootstrap of the engine schema failed: {0}")]
    BootstrapFailure(#[source] Box<Error>),
}

/// Result type alias using migradir's Error type
pub type Result<T> = std::result::Result<T, Error>;
