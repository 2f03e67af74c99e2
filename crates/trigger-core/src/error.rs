//! Error taxonomy for the dispatch pipeline.

use trigger_state::{RepositoryId, StorageError};

/// Failures talking to a repository mirror.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The mirror does not contain the commit.
    #[error("unknown revision: {sha}")]
    UnknownRevision { sha: String },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Option names or values rejected by the schema.
#[derive(Debug, thiserror::Error)]
pub enum OptionError {
    #[error("unknown option: {name}")]
    Unknown { name: String },

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// A build-creation request that could not be completed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors that abort a trigger run or an options update.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),

    #[error("option error: {0}")]
    Option(#[from] OptionError),

    #[error("repository not found: {0}")]
    RepositoryNotFound(RepositoryId),

    #[error("no vcs available for repository {0}")]
    VcsUnavailable(RepositoryId),

    #[error("options were not resolved for project {0}")]
    OptionsMissing(String),

    #[error("file whitelist configured but changed files were not extracted")]
    ChangedFilesMissing,

    #[error("project not found: {0}")]
    ProjectNotFound(String),
}

/// Result type for trigger operations.
pub type Result<T> = std::result::Result<T, TriggerError>;
