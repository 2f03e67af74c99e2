//! Trigger-State: data model and persistence boundaries for build dispatch
//!
//! This crate defines what the dispatch pipeline reads and writes without
//! committing to a storage engine. Revisions, repositories, projects, project
//! options and snapshots are reached through narrow async traits.
//!
//! ## Key Components
//!
//! - `storage_traits`: one trait per boundary (`RevisionStore`, `ProjectStore`, ...)
//! - `schema`: the records those traits exchange
//! - `MemoryCatalog`: in-memory implementation of every trait, loadable from JSON

pub mod catalog;
mod error;
pub mod schema;
pub mod storage_traits;

pub use catalog::MemoryCatalog;
pub use error::StorageError;
pub use schema::{
    OptionMap, Project, ProjectId, ProjectOption, ProjectStatus, Repository, RepositoryBackend,
    RepositoryId, Revision, Snapshot, SnapshotId, SnapshotStatus, CURRENT_SNAPSHOT_OPTION,
};
pub use storage_traits::{
    OptionStore, ProjectStore, RepositoryStore, RevisionStore, SnapshotStore, StorageResult,
};
