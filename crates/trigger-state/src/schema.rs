//! Records exchanged across the store boundaries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Option holding the id of a project's current snapshot.
pub const CURRENT_SNAPSHOT_OPTION: &str = "snapshot.current";

/// Option name to stored value, for a single project.
pub type OptionMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(pub u64);

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub Uuid);

impl SnapshotId {
    pub fn new() -> Self {
        SnapshotId(Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Version-control system behind a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryBackend {
    Git,
    Unknown,
}

/// A tracked remote; the local mirror is derived from its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub url: String,
    pub backend: RepositoryBackend,
}

/// A single recorded commit.
///
/// Immutable once recorded. `branches` may be empty when the branch
/// membership of the commit is not known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub sha: String,
    pub repository_id: RepositoryId,
    #[serde(default)]
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Inactive,
}

/// A buildable unit bound to exactly one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub slug: String,
    pub repository_id: RepositoryId,
    pub status: ProjectStatus,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}

/// A stored `(project, name) -> value` option row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOption {
    pub project_id: ProjectId,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Pending,
    Active,
    Failed,
    Invalidated,
}

/// A versioned build environment belonging to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub project_id: ProjectId,
    pub status: SnapshotStatus,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Only active snapshots may be assigned as a project's current one.
    pub fn is_assignable(&self) -> bool {
        self.status == SnapshotStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_id_displays_as_simple_hex() {
        let id = SnapshotId(Uuid::nil());
        assert_eq!(id.to_string(), "00000000000000000000000000000000");
    }

    #[test]
    fn revision_branches_default_to_empty() {
        let rev: Revision =
            serde_json::from_str(r#"{"sha":"abc123","repository_id":7}"#).unwrap();
        assert_eq!(rev.repository_id, RepositoryId(7));
        assert!(rev.branches.is_empty());
    }

    #[test]
    fn only_active_snapshots_are_assignable() {
        let mut snap = Snapshot {
            id: SnapshotId::new(),
            project_id: ProjectId(1),
            status: SnapshotStatus::Pending,
            created_at: Utc::now(),
        };
        assert!(!snap.is_assignable());
        snap.status = SnapshotStatus::Active;
        assert!(snap.is_assignable());
    }
}
