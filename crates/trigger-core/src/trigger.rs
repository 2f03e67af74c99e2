//! Commit trigger: decide which projects build a new revision, then dispatch.
//!
//! One run walks an early-exit ladder:
//!
//! 1. no active projects on the repository: [`TriggerOutcome::NoCandidates`]
//! 2. resolve `build.commit-trigger`, `build.branch-names` and
//!    `build.file-whitelist` for every candidate in one batch
//! 3. extract changed files once, and only if some candidate has a whitelist
//! 4. gate each project: trigger enabled, then branch, then whitelist
//! 5. dispatch one build request per surviving project
//!
//! The gate order decides when whitelist evidence is consulted, so disabled
//! projects and projects on other branches never need changed files.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, Instrument};
use trigger_state::{
    MemoryCatalog, OptionStore, ProjectStore, RepositoryId, RepositoryStore, Revision,
    RevisionStore,
};

use crate::branch::branch_matches;
use crate::diff::ChangedFiles;
use crate::dispatch::{BuildCreator, BuildDispatcher, DispatchReport};
use crate::error::{Result, TriggerError};
use crate::extractor::extract_changed_files;
use crate::metrics::Metrics;
use crate::obs::{emit_no_candidates, emit_project_skipped, trigger_span};
use crate::options::{resolve_options, OptionSchema, ProjectOptions, TRIGGER_OPTIONS};
use crate::vcs::VcsProvider;
use crate::whitelist::whitelist_matches;

/// Collaborators a trigger run reads from and writes to.
#[derive(Clone)]
pub struct TriggerServices {
    pub revisions: Arc<dyn RevisionStore>,
    pub repositories: Arc<dyn RepositoryStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub options: Arc<dyn OptionStore>,
    pub vcs: Arc<dyn VcsProvider>,
    pub builds: Arc<dyn BuildCreator>,
    pub schema: Arc<OptionSchema>,
    pub metrics: Arc<Metrics>,
}

impl TriggerServices {
    /// Wire every store to one catalog and use the standard option schema.
    pub fn from_catalog(
        catalog: Arc<MemoryCatalog>,
        vcs: Arc<dyn VcsProvider>,
        builds: Arc<dyn BuildCreator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            revisions: catalog.clone(),
            repositories: catalog.clone(),
            projects: catalog.clone(),
            options: catalog,
            vcs,
            builds,
            schema: Arc::new(OptionSchema::standard()),
            metrics,
        }
    }
}

/// Why a candidate project was not built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CommitTriggerDisabled,
    BranchNotMatched,
    NoWhitelistedFilesChanged,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CommitTriggerDisabled => f.write_str("build.commit-trigger is disabled"),
            SkipReason::BranchNotMatched => f.write_str("No branches matched build.branch-names"),
            SkipReason::NoWhitelistedFilesChanged => {
                f.write_str("No changed files matched build.file-whitelist")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProject {
    pub project: String,
    pub reason: SkipReason,
}

/// What a completed run decided and dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerReport {
    pub sha: String,
    /// Whether changed files were extracted for this run.
    pub extracted: bool,
    pub skipped: Vec<SkippedProject>,
    pub dispatch: DispatchReport,
}

impl TriggerReport {
    /// Slugs of the projects that passed every gate.
    pub fn approved(&self) -> Vec<&str> {
        self.dispatch
            .outcomes
            .iter()
            .map(|o| o.project.as_str())
            .collect()
    }
}

/// Result of handling one revision. The no-op cases are not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    RevisionUnknown,
    NoCandidates,
    Dispatched(TriggerReport),
}

impl TriggerOutcome {
    pub fn report(&self) -> Option<&TriggerReport> {
        match self {
            TriggerOutcome::Dispatched(report) => Some(report),
            _ => None,
        }
    }
}

/// A single run of the commit trigger for one recorded revision.
pub struct CommitTrigger<'a> {
    services: &'a TriggerServices,
    revision: Revision,
}

impl<'a> CommitTrigger<'a> {
    pub fn new(services: &'a TriggerServices, revision: Revision) -> Self {
        Self { services, revision }
    }

    /// Run the pipeline to completion.
    ///
    /// Extraction failures abort the run. Dispatch failures never do; they
    /// are reported per project in the returned [`DispatchReport`].
    #[instrument(skip_all, fields(sha = %self.revision.sha))]
    pub async fn run(&self) -> Result<TriggerOutcome> {
        let sha = self.revision.sha.as_str();
        let projects = self
            .services
            .projects
            .list_active(self.revision.repository_id)
            .await?;
        if projects.is_empty() {
            emit_no_candidates(sha);
            return Ok(TriggerOutcome::NoCandidates);
        }

        let resolved = resolve_options(
            self.services.options.as_ref(),
            &self.services.schema,
            &projects,
            &TRIGGER_OPTIONS,
        )
        .await?;

        let changed_files = if resolved.any(|options| options.has_file_whitelist()) {
            Some(self.changed_files().await?)
        } else {
            debug!("no candidate has a file whitelist; skipping extraction");
            None
        };

        let mut approved = Vec::new();
        let mut skipped = Vec::new();
        for project in &projects {
            let options = resolved
                .for_project(project.id)
                .ok_or_else(|| TriggerError::OptionsMissing(project.slug.clone()))?;
            match self.gate(options, changed_files.as_ref())? {
                None => approved.push(project.slug.clone()),
                Some(reason) => {
                    emit_project_skipped(&project.slug, &reason.to_string());
                    skipped.push(SkippedProject {
                        project: project.slug.clone(),
                        reason,
                    });
                }
            }
        }

        let dispatcher =
            BuildDispatcher::new(self.services.builds.clone(), self.services.metrics.clone());
        let dispatch = dispatcher.dispatch(sha, &approved).await;

        Ok(TriggerOutcome::Dispatched(TriggerReport {
            sha: sha.to_string(),
            extracted: changed_files.is_some(),
            skipped,
            dispatch,
        }))
    }

    /// First gate the project fails, if any.
    fn gate(
        &self,
        options: &ProjectOptions,
        changed_files: Option<&ChangedFiles>,
    ) -> Result<Option<SkipReason>> {
        if !options.commit_trigger_enabled() {
            return Ok(Some(SkipReason::CommitTriggerDisabled));
        }
        if !branch_matches(&self.revision, &options.branch_patterns()) {
            return Ok(Some(SkipReason::BranchNotMatched));
        }
        if !whitelist_matches(&options.file_whitelist(), changed_files)? {
            return Ok(Some(SkipReason::NoWhitelistedFilesChanged));
        }
        Ok(None)
    }

    async fn changed_files(&self) -> Result<ChangedFiles> {
        let repository_id = self.revision.repository_id;
        let repository = self
            .services
            .repositories
            .get_repository(repository_id)
            .await?
            .ok_or(TriggerError::RepositoryNotFound(repository_id))?;
        let vcs = self
            .services
            .vcs
            .vcs_for(&repository)
            .ok_or(TriggerError::VcsUnavailable(repository_id))?;

        let files =
            extract_changed_files(vcs.as_ref(), &self.revision.sha, &self.services.metrics).await?;
        Ok(files)
    }
}

/// Entry point for a newly recorded revision.
///
/// A revision the store does not know yet is a no-op, not an error.
pub async fn handle_revision_created(
    services: &TriggerServices,
    sha: &str,
    repository_id: RepositoryId,
) -> Result<TriggerOutcome> {
    async {
        let Some(revision) = services.revisions.find_revision(sha, repository_id).await? else {
            debug!("revision not recorded; nothing to trigger");
            return Ok(TriggerOutcome::RevisionUnknown);
        };
        CommitTrigger::new(services, revision).run().await
    }
    .instrument(trigger_span(sha, repository_id.0))
    .await
}
