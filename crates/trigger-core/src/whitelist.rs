//! File whitelist matching.

use crate::diff::ChangedFiles;
use crate::error::{Result, TriggerError};

/// Whether a revision's changed files intersect a project's whitelist.
///
/// An empty whitelist is unrestricted and always matches, whether or not
/// changed files were extracted. A non-empty whitelist needs the extracted
/// set; `None` there means the caller skipped extraction it was required to
/// run.
pub fn whitelist_matches(
    whitelist: &[String],
    changed_files: Option<&ChangedFiles>,
) -> Result<bool> {
    if whitelist.is_empty() {
        return Ok(true);
    }
    let changed_files = changed_files.ok_or(TriggerError::ChangedFilesMissing)?;
    Ok(changed_files
        .iter()
        .any(|path| whitelist.iter().any(|prefix| path_is_under(path, prefix))))
}

/// Segment-wise prefix test: `foo/bar` covers `foo/bar` and `foo/bar/x`,
/// never `foo/bar2`.
pub fn path_is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_start_matches("./").trim_matches('/');
    if prefix.is_empty() {
        return true;
    }
    let path = path.trim_start_matches("./").trim_start_matches('/');
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}
