//! Typed error hierarchy for bgpublish.
//!
//! - `DocumentError`: the monitor document is missing, unreadable or malformed.
//!   Always recoverable: monitors skip the document and retry on the next poll.
//! - `PhaseFailure`: a task raised during publish or finalize. Recorded into the
//!   document as a terminal failure, never retried.
//! - `DriverError`: everything that stops the publishing process.
//! - `SchedulerFailure`: a reconciliation cycle blew up. Logged, the poll loop continues.
//! - `JobError`: a job description that cannot be turned into a monitor document.

use std::path::PathBuf;

use thiserror::Error;

use crate::status::Phase;

/// Errors from loading or saving a monitor document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Monitor document not found at {path}")]
    Missing { path: PathBuf },

    #[error("Failed to read monitor document at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse monitor document at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize monitor document for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write monitor document at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Path of the document the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            DocumentError::Missing { path }
            | DocumentError::Read { path, .. }
            | DocumentError::Parse { path, .. }
            | DocumentError::Serialize { path, .. }
            | DocumentError::Write { path, .. } => path,
        }
    }
}

/// A task raised while a phase was running.
#[derive(Debug, Error)]
#[error("{phase} phase failed{}: {source}", .task.as_deref().map(|t| format!(" on task {t}")).unwrap_or_default())]
pub struct PhaseFailure {
    pub phase: Phase,
    /// Task the failure was attributed to, if one was found in the running status.
    pub task: Option<String>,
    #[source]
    pub source: anyhow::Error,
}

/// Errors that stop the publishing process.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Phase(#[from] PhaseFailure),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// A reconciliation cycle that did not complete.
#[derive(Debug, Error)]
pub enum SchedulerFailure {
    #[error("Reconciliation cycle failed: {0}")]
    CycleFailed(#[source] anyhow::Error),

    #[error("Reconciliation worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Errors from validating a job description.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Task id {id} is used more than once")]
    DuplicateTaskId { id: String },

    #[error("Item {name} must have a uuid unless it is the root grouping")]
    MissingItemId { name: String },

    #[error("Job {name} has no active tasks")]
    NoActiveTasks { name: String },
}
