use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or serialise the task table file.
#[derive(Debug, Error)]
pub enum TableError {
    /// Reading or writing the table file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not well-formed CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The CSV writer could not be flushed into its buffer.
    #[error("CSV writer error: {0}")]
    Flush(String),
}

/// Whole-table failure: the header lacks required columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing headers: {}", missing.join(", "))]
pub struct StructuralError {
    /// Required columns absent from the header, in canonical order.
    pub missing: Vec<String>,
}

/// Single-row failure. The row is kept in the table but not scheduled this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// `ExecutablePath` is empty.
    #[error("[{task}] Missing ExecutablePath.")]
    MissingExecutablePath { task: String },

    /// `Frequency` does not parse as an integer.
    #[error("[{task}] Frequency is not a valid number: {value:?}")]
    InvalidFrequency { task: String, value: String },
}

/// Failure to start or wait for a task process.
#[derive(Debug, Error)]
pub enum RunError {
    /// `Arguments` could not be split into shell words (e.g. unbalanced quotes).
    #[error("Cannot tokenize arguments: {0:?}")]
    Arguments(String),

    /// The process could not be started or awaited.
    #[error("Spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failure to hand a task to the execution pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// `shutdown` has already closed the queue.
    #[error("Execution pool is shut down")]
    Closed,
}

/// Failure to commit the table back to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The table could not be rendered to CSV bytes.
    #[error("Table serialisation failed: {0}")]
    Serialize(#[from] TableError),

    /// The sibling temporary file could not be written.
    #[error("Writing temporary file {path} failed: {source}")]
    TempWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every atomic-replace attempt failed; `source` is the last error.
    #[error("Replacing table failed after {attempts} attempts: {source}")]
    ReplaceExhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Whole-cycle failure. The cycle is skipped and retried at the next tick.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The table file does not exist.
    #[error("CSV file not found: {}", .0.display())]
    TableMissing(PathBuf),

    /// The table file exists but could not be read or parsed.
    #[error("Table load failed: {0}")]
    Load(#[from] TableError),

    /// Required columns are missing.
    #[error(transparent)]
    Structure(#[from] StructuralError),
}

pub type Result<T> = std::result::Result<T, CycleError>;
