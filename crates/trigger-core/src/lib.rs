//! Trigger Core Library
//!
//! Decides which projects build a newly recorded revision and requests those
//! builds. Storage lives behind the `trigger-state` traits; version control
//! and build creation live behind the [`Vcs`] and [`BuildCreator`] traits.

pub mod branch;
pub mod diff;
pub mod dispatch;
pub mod downgrade;
pub mod error;
pub mod extractor;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod options;
pub mod project_options;
pub mod telemetry;
pub mod trigger;
pub mod vcs;
pub mod whitelist;

pub use branch::branch_matches;
pub use diff::{parse_changed_files, ChangedFiles};
pub use dispatch::{
    BuildCreator, BuildDispatcher, BuildRequest, BuildResponse, DispatchOutcome, DispatchReport,
    DispatchStatus, HttpBuildCreator, COMMIT_TAG,
};
pub use downgrade::{detect_snapshot_downgrade, SnapshotDowngrade};
pub use error::{DispatchError, OptionError, Result, TriggerError, VcsError};
pub use extractor::extract_changed_files;
pub use metrics::{Counter, Metrics};
pub use options::{
    resolve_options, OptionSchema, OptionSpec, OptionValue, ProjectOptions, ResolvedOptions,
    TRIGGER_OPTIONS,
};
pub use project_options::{OptionUpdates, ProjectOptionsService};
pub use trigger::{
    handle_revision_created, CommitTrigger, SkipReason, SkippedProject, TriggerOutcome,
    TriggerReport, TriggerServices,
};
pub use vcs::{GitVcs, GitVcsProvider, Vcs, VcsProvider, VcsResult};
pub use whitelist::whitelist_matches;
