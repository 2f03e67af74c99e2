//! Scripted fakes for the version-control and build-creation boundaries
//! (testing only).
//!
//! Provides `ScriptedVcs`, `StaticVcsProvider`, and `RecordingBuildCreator`
//! that satisfy the trait contracts without git or a network.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use trigger_state::Repository;

use crate::dispatch::{BuildCreator, BuildRequest, BuildResponse};
use crate::error::{DispatchError, VcsError};
use crate::vcs::{Vcs, VcsProvider, VcsResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// ScriptedVcs
// ---------------------------------------------------------------------------

/// One call observed by a [`ScriptedVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Exists,
    Clone,
    Update,
    Export(String),
}

#[derive(Debug, Default)]
struct VcsState {
    mirror: bool,
    known: HashMap<String, String>,
    after_update: HashMap<String, String>,
    update_error: Option<String>,
    calls: Vec<VcsCall>,
}

/// A mirror whose commits are scripted up front.
///
/// Commits registered with [`ScriptedVcs::with_commit_after_update`] are only
/// exportable once `update` has run, which models a stale mirror.
#[derive(Debug, Default)]
pub struct ScriptedVcs {
    state: Mutex<VcsState>,
}

impl ScriptedVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the mirror already cloned.
    pub fn with_mirror(self) -> Self {
        lock(&self.state).mirror = true;
        self
    }

    pub fn with_commit(self, sha: &str, diff: &str) -> Self {
        lock(&self.state)
            .known
            .insert(sha.to_string(), diff.to_string());
        self
    }

    pub fn with_commit_after_update(self, sha: &str, diff: &str) -> Self {
        lock(&self.state)
            .after_update
            .insert(sha.to_string(), diff.to_string());
        self
    }

    pub fn failing_update(self, stderr: &str) -> Self {
        lock(&self.state).update_error = Some(stderr.to_string());
        self
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        lock(&self.state).calls.clone()
    }

    pub fn export_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, VcsCall::Export(_)))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == VcsCall::Update)
            .count()
    }
}

#[async_trait]
impl Vcs for ScriptedVcs {
    async fn exists(&self) -> bool {
        let mut state = lock(&self.state);
        state.calls.push(VcsCall::Exists);
        state.mirror
    }

    async fn clone_mirror(&self) -> VcsResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(VcsCall::Clone);
        state.mirror = true;
        Ok(())
    }

    async fn update(&self) -> VcsResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(VcsCall::Update);
        if let Some(stderr) = state.update_error.clone() {
            return Err(VcsError::Command {
                command: "git remote update --prune".to_string(),
                stderr,
            });
        }
        let arrived: Vec<_> = state.after_update.drain().collect();
        state.known.extend(arrived);
        Ok(())
    }

    async fn export(&self, sha: &str) -> VcsResult<String> {
        let mut state = lock(&self.state);
        state.calls.push(VcsCall::Export(sha.to_string()));
        state
            .known
            .get(sha)
            .cloned()
            .ok_or_else(|| VcsError::UnknownRevision {
                sha: sha.to_string(),
            })
    }
}

/// Hands out the same VCS for every repository, or none at all.
#[derive(Debug, Default, Clone)]
pub struct StaticVcsProvider {
    vcs: Option<Arc<ScriptedVcs>>,
}

impl StaticVcsProvider {
    pub fn new(vcs: Arc<ScriptedVcs>) -> Self {
        Self { vcs: Some(vcs) }
    }

    /// A provider with no VCS for any repository.
    pub fn unavailable() -> Self {
        Self { vcs: None }
    }
}

impl VcsProvider for StaticVcsProvider {
    fn vcs_for(&self, _repository: &Repository) -> Option<Arc<dyn Vcs>> {
        self.vcs.clone().map(|vcs| vcs as Arc<dyn Vcs>)
    }
}

// ---------------------------------------------------------------------------
// RecordingBuildCreator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Status(u16, serde_json::Value),
    Error(String),
}

#[derive(Debug, Default)]
struct CreatorState {
    requests: Vec<BuildRequest>,
    scripted: HashMap<String, Scripted>,
    builds: BTreeSet<(String, String)>,
}

/// Records every build request and honors `ensure_only` the way the real
/// boundary does: a second request for the same `(project, sha)` returns the
/// existing build instead of creating another.
///
/// Responses can be scripted per project slug; unscripted projects succeed.
#[derive(Debug, Default)]
pub struct RecordingBuildCreator {
    state: Mutex<CreatorState>,
}

impl RecordingBuildCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `project` with `status` and create nothing.
    pub fn with_status(self, project: &str, status: u16, body: serde_json::Value) -> Self {
        lock(&self.state)
            .scripted
            .insert(project.to_string(), Scripted::Status(status, body));
        self
    }

    /// Fail requests for `project` at the transport level.
    pub fn with_error(self, project: &str, reason: &str) -> Self {
        lock(&self.state)
            .scripted
            .insert(project.to_string(), Scripted::Error(reason.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        lock(&self.state).requests.clone()
    }

    /// Projects that received a request, in arrival order.
    pub fn requested_projects(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.project).collect()
    }

    /// Distinct `(project, sha)` builds that exist.
    pub fn created_builds(&self) -> Vec<(String, String)> {
        lock(&self.state).builds.iter().cloned().collect()
    }
}

#[async_trait]
impl BuildCreator for RecordingBuildCreator {
    async fn create_build(&self, request: &BuildRequest) -> Result<BuildResponse, DispatchError> {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());

        match state.scripted.get(&request.project).cloned() {
            Some(Scripted::Error(reason)) => return Err(DispatchError::Transport(reason)),
            Some(Scripted::Status(status, body)) => return Ok(BuildResponse { status, body }),
            None => {}
        }

        let key = (request.project.clone(), request.sha.clone());
        let existing = request.ensure_only && state.builds.contains(&key);
        if !existing {
            state.builds.insert(key);
        }

        Ok(BuildResponse {
            status: 200,
            body: serde_json::json!({
                "project": request.project,
                "sha": request.sha,
                "tag": request.tag,
                "created": !existing,
            }),
        })
    }
}
