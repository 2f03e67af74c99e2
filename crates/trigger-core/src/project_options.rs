//! Reading and updating a project's options.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};
use trigger_state::{
    MemoryCatalog, OptionStore, Project, ProjectId, ProjectStore, SnapshotId, SnapshotStore,
};

use crate::downgrade::detect_snapshot_downgrade;
use crate::error::{OptionError, Result, TriggerError};
use crate::metrics::Metrics;
use crate::options::{
    resolve_options, OptionSchema, OptionValue, ProjectOptions, SNAPSHOT_CURRENT,
};

/// Option updates for one project. `None` leaves the stored value alone.
pub type OptionUpdates = BTreeMap<String, Option<String>>;

/// Validated writes of project options.
#[derive(Clone)]
pub struct ProjectOptionsService {
    projects: Arc<dyn ProjectStore>,
    options: Arc<dyn OptionStore>,
    snapshots: Arc<dyn SnapshotStore>,
    schema: Arc<OptionSchema>,
    metrics: Arc<Metrics>,
}

impl ProjectOptionsService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        options: Arc<dyn OptionStore>,
        snapshots: Arc<dyn SnapshotStore>,
        schema: Arc<OptionSchema>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            projects,
            options,
            snapshots,
            schema,
            metrics,
        }
    }

    pub fn from_catalog(catalog: Arc<MemoryCatalog>, metrics: Arc<Metrics>) -> Self {
        Self::new(
            catalog.clone(),
            catalog.clone(),
            catalog,
            Arc::new(OptionSchema::standard()),
            metrics,
        )
    }

    /// Look a project up by slug, then by numeric id.
    pub async fn find_project(&self, project_ref: &str) -> Result<Project> {
        if let Some(project) = self.projects.find_project_by_slug(project_ref).await? {
            return Ok(project);
        }
        if let Ok(id) = project_ref.parse::<u64>() {
            if let Some(project) = self.projects.get_project(ProjectId(id)).await? {
                return Ok(project);
            }
        }
        Err(TriggerError::ProjectNotFound(project_ref.to_string()))
    }

    /// Every registered option for the project, defaults applied.
    pub async fn show(&self, project_ref: &str) -> Result<(Project, ProjectOptions)> {
        let project = self.find_project(project_ref).await?;
        let names: Vec<&str> = self.schema.specs().map(|spec| spec.name).collect();
        let resolved = resolve_options(
            self.options.as_ref(),
            &self.schema,
            std::slice::from_ref(&project),
            &names,
        )
        .await?;
        let options = resolved
            .for_project(project.id)
            .cloned()
            .ok_or_else(|| TriggerError::OptionsMissing(project.slug.clone()))?;
        Ok((project, options))
    }

    /// Validate and store `updates`, returning the names written in schema
    /// order.
    ///
    /// Every value is validated, and a snapshot pointer checked and compared
    /// against the current one, before the first write. An invalid value
    /// therefore writes nothing. The writes themselves are separate store
    /// calls: if one fails, options earlier in schema order stay written.
    #[instrument(skip(self, updates))]
    pub async fn update(&self, project_ref: &str, updates: &OptionUpdates) -> Result<Vec<String>> {
        let project = self.find_project(project_ref).await?;

        let mut accepted = Vec::new();
        for (name, value) in updates {
            let Some(raw) = value else {
                continue;
            };
            let position = self
                .schema
                .position(name)
                .ok_or_else(|| OptionError::Unknown { name: name.clone() })?;
            let value = self.schema.validate(name, raw)?;
            if let OptionValue::Snapshot(Some(id)) = &value {
                self.check_assignable(name, *id).await?;
            }
            accepted.push((position, name.as_str(), value));
        }
        accepted.sort_by_key(|(position, _, _)| *position);

        for (_, name, value) in &accepted {
            if let (SNAPSHOT_CURRENT, OptionValue::Snapshot(Some(id))) = (*name, value) {
                detect_snapshot_downgrade(self.snapshots.as_ref(), &self.metrics, &project, *id)
                    .await?;
            }
        }

        let mut written = Vec::with_capacity(accepted.len());
        for (_, name, value) in accepted {
            self.options
                .set_option(project.id, name, &value.to_stored())
                .await?;
            written.push(name.to_string());
        }

        debug!(project = %project.slug, written = written.len(), "options updated");
        Ok(written)
    }

    async fn check_assignable(&self, name: &str, id: SnapshotId) -> Result<()> {
        let snapshot = self.snapshots.get_snapshot(id).await?;
        let reason = match snapshot {
            None => "Could not find snapshot",
            Some(snapshot) if !snapshot.is_assignable() => "Snapshot not active",
            Some(_) => return Ok(()),
        };
        Err(OptionError::Invalid {
            name: name.to_string(),
            reason: reason.to_string(),
        }
        .into())
    }
}
