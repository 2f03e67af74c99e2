//! Structured log events for the dispatch pipeline.
//!
//! Every decision the trigger makes about a project is emitted here with the
//! same field names (`project`, `sha`, `reason`, `status`) so log pipelines
//! can attribute it.

use tracing::{error, info, warn};

/// Span covering one trigger run for a revision.
pub fn trigger_span(sha: &str, repository_id: u64) -> tracing::Span {
    tracing::info_span!("trigger.revision", sha = %sha, repository_id)
}

pub fn emit_no_candidates(sha: &str) {
    info!(
        event = "trigger.no_candidates",
        sha = %sha,
        "No active projects for repository"
    );
}

pub fn emit_project_skipped(project: &str, reason: &str) {
    info!(
        event = "trigger.project_skipped",
        project = %project,
        reason = %reason,
        "{reason} for project {project}"
    );
}

pub fn emit_build_created(project: &str, sha: &str, status: u16) {
    info!(
        event = "dispatch.created",
        project = %project,
        sha = %sha,
        status,
        "Build requested"
    );
}

pub fn emit_build_rejected(project: &str, sha: &str, status: u16, body: &str) {
    error!(
        event = "dispatch.rejected",
        project = %project,
        sha = %sha,
        status,
        response = %body,
        "Failed to create build: {body}"
    );
}

pub fn emit_dispatch_failed(project: &str, sha: &str, reason: &str) {
    error!(
        event = "dispatch.failed",
        project = %project,
        sha = %sha,
        reason = %reason,
        "Failed to create build: {reason}"
    );
}

pub fn emit_vcs_resync(sha: &str) {
    warn!(event = "vcs.resync", sha = %sha, "Revision unknown to mirror; updating");
}

pub fn emit_snapshot_downgrade(project: &str) {
    warn!(
        event = "snapshot.downgrade",
        project = %project,
        "Snapshot downgrade for project {project}"
    );
}
