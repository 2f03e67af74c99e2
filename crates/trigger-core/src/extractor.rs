//! Changed-file extraction from a possibly stale mirror.

use tracing::{debug, instrument};

use crate::diff::{parse_changed_files, ChangedFiles};
use crate::error::VcsError;
use crate::metrics::{Counter, Metrics};
use crate::obs::emit_vcs_resync;
use crate::vcs::{Vcs, VcsResult};

/// Files changed by `sha`.
///
/// Clones the mirror if it is missing. When the mirror does not know the
/// revision it is updated exactly once and the export retried; a second
/// failure is returned to the caller.
#[instrument(skip(vcs, metrics))]
pub async fn extract_changed_files(
    vcs: &dyn Vcs,
    sha: &str,
    metrics: &Metrics,
) -> VcsResult<ChangedFiles> {
    if !vcs.exists().await {
        debug!("mirror missing; cloning");
        vcs.clone_mirror().await?;
    }

    let diff = match vcs.export(sha).await {
        Ok(diff) => diff,
        Err(VcsError::UnknownRevision { .. }) => {
            emit_vcs_resync(sha);
            metrics.increment(Counter::VcsResync);
            vcs.update().await?;
            vcs.export(sha).await?
        }
        Err(e) => return Err(e),
    };

    let files = parse_changed_files(&diff);
    debug!(files = files.len(), "extracted changed files");
    Ok(files)
}
