//! Snapshot downgrade detection.
//!
//! Observes a change of a project's current snapshot before it is stored.
//! It never blocks the change.

use trigger_state::{Project, SnapshotId, SnapshotStore};

use crate::error::Result;
use crate::metrics::{Counter, Metrics};
use crate::obs::emit_snapshot_downgrade;

/// A current snapshot being replaced by an older one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDowngrade {
    pub project: String,
    pub current: SnapshotId,
    pub replacement: SnapshotId,
}

/// Report a downgrade if `replacement` was created before the project's
/// current snapshot.
///
/// Nothing is reported when the project has no current snapshot or the
/// replacement is unknown.
pub async fn detect_snapshot_downgrade(
    snapshots: &dyn SnapshotStore,
    metrics: &Metrics,
    project: &Project,
    replacement: SnapshotId,
) -> Result<Option<SnapshotDowngrade>> {
    let Some(current) = snapshots.current_snapshot(project.id).await? else {
        return Ok(None);
    };
    let Some(incoming) = snapshots.get_snapshot(replacement).await? else {
        return Ok(None);
    };
    if incoming.created_at >= current.created_at {
        return Ok(None);
    }

    metrics.increment(Counter::SnapshotDowngrade);
    emit_snapshot_downgrade(&project.slug);
    Ok(Some(SnapshotDowngrade {
        project: project.slug.clone(),
        current: current.id,
        replacement: incoming.id,
    }))
}
