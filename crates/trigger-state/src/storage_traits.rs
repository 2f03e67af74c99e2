//! Storage trait definitions for build dispatch
//!
//! Each trait is one narrow boundary the dispatch pipeline consumes:
//! - `RevisionStore`: recorded commits
//! - `RepositoryStore`: tracked remotes
//! - `ProjectStore`: projects and their lifecycle status
//! - `OptionStore`: raw per-project option values (no defaults applied)
//! - `SnapshotStore`: build environment snapshots
//!
//! All traits are async and backend-agnostic. `MemoryCatalog` implements
//! every one of them in memory.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::*;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Find a revision by sha within a repository. `None` if not recorded (yet).
    async fn find_revision(
        &self,
        sha: &str,
        repository_id: RepositoryId,
    ) -> StorageResult<Option<Revision>>;
}

#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn get_repository(&self, id: RepositoryId) -> StorageResult<Option<Repository>>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Active projects bound to the repository.
    async fn list_active(&self, repository_id: RepositoryId) -> StorageResult<Vec<Project>>;

    async fn get_project(&self, id: ProjectId) -> StorageResult<Option<Project>>;

    async fn find_project_by_slug(&self, slug: &str) -> StorageResult<Option<Project>>;
}

/// Per-project option values as stored.
///
/// Guarantees:
/// - `get_options` returns an entry for every requested project, containing
///   only the requested names that are actually set.
/// - `set_option` is an upsert: create if absent, overwrite if present.
#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get_options(
        &self,
        project_ids: &[ProjectId],
        names: &[&str],
    ) -> StorageResult<HashMap<ProjectId, OptionMap>>;

    async fn set_option(&self, project_id: ProjectId, name: &str, value: &str)
        -> StorageResult<()>;
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The project's current snapshot, if one is assigned and still active.
    async fn current_snapshot(&self, project_id: ProjectId) -> StorageResult<Option<Snapshot>>;

    async fn get_snapshot(&self, id: SnapshotId) -> StorageResult<Option<Snapshot>>;
}
