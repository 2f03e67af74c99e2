//! In-memory catalog implementing every storage trait
//!
//! `MemoryCatalog` keeps repositories, revisions, projects, options and
//! snapshots in a single lock. It backs the test suites directly and is
//! loaded from a JSON catalog file by the `trigger` binary.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;
use crate::schema::*;
use crate::storage_traits::*;

/// Serialized form of a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub options: Vec<ProjectOption>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    data: Mutex<CatalogData>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: CatalogData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// Load a catalog previously written by [`MemoryCatalog::save_json_file`].
    pub fn from_json_file(path: &Path) -> StorageResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let data: CatalogData = serde_json::from_str(&raw)?;
        debug!(
            path = %path.display(),
            projects = data.projects.len(),
            revisions = data.revisions.len(),
            "loaded catalog"
        );
        Ok(Self::from_data(data))
    }

    pub fn save_json_file(&self, path: &Path) -> StorageResult<()> {
        let raw = {
            let data = self.lock()?;
            serde_json::to_string_pretty(&*data)?
        };
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Copy of the current contents.
    pub fn snapshot_data(&self) -> StorageResult<CatalogData> {
        Ok(self.lock()?.clone())
    }

    pub fn insert_repository(&self, repository: Repository) -> StorageResult<()> {
        let mut data = self.lock()?;
        data.repositories.retain(|r| r.id != repository.id);
        data.repositories.push(repository);
        Ok(())
    }

    pub fn insert_revision(&self, revision: Revision) -> StorageResult<()> {
        let mut data = self.lock()?;
        data.revisions
            .retain(|r| !(r.sha == revision.sha && r.repository_id == revision.repository_id));
        data.revisions.push(revision);
        Ok(())
    }

    pub fn insert_project(&self, project: Project) -> StorageResult<()> {
        let mut data = self.lock()?;
        data.projects.retain(|p| p.id != project.id);
        data.projects.push(project);
        Ok(())
    }

    pub fn insert_snapshot(&self, snapshot: Snapshot) -> StorageResult<()> {
        let mut data = self.lock()?;
        data.snapshots.retain(|s| s.id != snapshot.id);
        data.snapshots.push(snapshot);
        Ok(())
    }

    /// Stored value of a single option, bypassing defaults.
    pub fn option_value(&self, project_id: ProjectId, name: &str) -> StorageResult<Option<String>> {
        let data = self.lock()?;
        Ok(data
            .options
            .iter()
            .find(|o| o.project_id == project_id && o.name == name)
            .map(|o| o.value.clone()))
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, CatalogData>> {
        self.data
            .lock()
            .map_err(|_| StorageError::Backend("catalog lock poisoned".to_string()))
    }
}

#[async_trait]
impl RevisionStore for MemoryCatalog {
    async fn find_revision(
        &self,
        sha: &str,
        repository_id: RepositoryId,
    ) -> StorageResult<Option<Revision>> {
        let data = self.lock()?;
        Ok(data
            .revisions
            .iter()
            .find(|r| r.sha == sha && r.repository_id == repository_id)
            .cloned())
    }
}

#[async_trait]
impl RepositoryStore for MemoryCatalog {
    async fn get_repository(&self, id: RepositoryId) -> StorageResult<Option<Repository>> {
        let data = self.lock()?;
        Ok(data.repositories.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait]
impl ProjectStore for MemoryCatalog {
    async fn list_active(&self, repository_id: RepositoryId) -> StorageResult<Vec<Project>> {
        let data = self.lock()?;
        Ok(data
            .projects
            .iter()
            .filter(|p| p.repository_id == repository_id && p.is_active())
            .cloned()
            .collect())
    }

    async fn get_project(&self, id: ProjectId) -> StorageResult<Option<Project>> {
        let data = self.lock()?;
        Ok(data.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn find_project_by_slug(&self, slug: &str) -> StorageResult<Option<Project>> {
        let data = self.lock()?;
        Ok(data.projects.iter().find(|p| p.slug == slug).cloned())
    }
}

#[async_trait]
impl OptionStore for MemoryCatalog {
    async fn get_options(
        &self,
        project_ids: &[ProjectId],
        names: &[&str],
    ) -> StorageResult<HashMap<ProjectId, OptionMap>> {
        let data = self.lock()?;
        let mut result: HashMap<ProjectId, OptionMap> =
            project_ids.iter().map(|id| (*id, OptionMap::new())).collect();
        for option in &data.options {
            if !names.contains(&option.name.as_str()) {
                continue;
            }
            if let Some(values) = result.get_mut(&option.project_id) {
                values.insert(option.name.clone(), option.value.clone());
            }
        }
        Ok(result)
    }

    async fn set_option(
        &self,
        project_id: ProjectId,
        name: &str,
        value: &str,
    ) -> StorageResult<()> {
        let mut data = self.lock()?;
        match data
            .options
            .iter_mut()
            .find(|o| o.project_id == project_id && o.name == name)
        {
            Some(existing) => existing.value = value.to_string(),
            None => data.options.push(ProjectOption {
                project_id,
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemoryCatalog {
    async fn current_snapshot(&self, project_id: ProjectId) -> StorageResult<Option<Snapshot>> {
        let data = self.lock()?;
        let Some(raw_id) = data
            .options
            .iter()
            .find(|o| o.project_id == project_id && o.name == CURRENT_SNAPSHOT_OPTION)
            .map(|o| o.value.as_str())
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };
        let Ok(id) = Uuid::parse_str(raw_id) else {
            return Ok(None);
        };
        Ok(data
            .snapshots
            .iter()
            .find(|s| s.id.0 == id && s.is_assignable())
            .cloned())
    }

    async fn get_snapshot(&self, id: SnapshotId) -> StorageResult<Option<Snapshot>> {
        let data = self.lock()?;
        Ok(data.snapshots.iter().find(|s| s.id == id).cloned())
    }
}
