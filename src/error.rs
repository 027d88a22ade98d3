use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for the migration pipeline.
///
/// Only `Config` aborts a run. Every other variant is caught at the smallest
/// scope that can still continue, logged with the project key / file name /
/// record title it concerns, and counted in the run summary.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("discovery under {path:?}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("resolution of {file}: {reason}")]
    Resolution { file: String, reason: String },

    #[error("upload of {file} failed: {reason}")]
    Upload { file: String, reason: String },

    // A failed rename leaves the remote upload intact but the local name
    // stale; the next run may re-upload unless the content index catches it.
    #[error("rename {from:?} -> {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("submission of \"{title}\": {reason}")]
    Submission { title: String, reason: String },
}
