//! Branch filter matching.

use trigger_state::Revision;

/// Pattern accepting every branch.
pub const ALL_BRANCHES: &str = "*";

/// Whether `revision` belongs to a branch named by `patterns`.
///
/// An empty pattern list, or any `*` token, accepts every revision (even one
/// with no recorded branch). Otherwise one of the revision's branches must
/// equal a pattern exactly; there is no other glob support.
pub fn branch_matches(revision: &Revision, patterns: &[String]) -> bool {
    if patterns.is_empty() || patterns.iter().any(|p| p == ALL_BRANCHES) {
        return true;
    }
    revision
        .branches
        .iter()
        .any(|branch| patterns.iter().any(|p| p == branch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trigger_state::RepositoryId;

    fn revision(branches: &[&str]) -> Revision {
        Revision {
            sha: "abc123".to_string(),
            repository_id: RepositoryId(1),
            branches: branches.iter().map(|b| b.to_string()).collect(),
        }
    }

    fn patterns(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn wildcard_matches_everything() {
        assert!(branch_matches(&revision(&["feature/x"]), &patterns(&["*"])));
        assert!(branch_matches(&revision(&[]), &patterns(&["*"])));
        assert!(branch_matches(&revision(&["dev"]), &patterns(&["main", "*"])));
    }

    #[test]
    fn empty_patterns_match_everything() {
        assert!(branch_matches(&revision(&["anything"]), &[]));
    }

    #[test]
    fn literal_patterns_need_exact_branch() {
        let filter = patterns(&["main", "release"]);
        assert!(branch_matches(&revision(&["main"]), &filter));
        assert!(branch_matches(&revision(&["topic", "release"]), &filter));
        assert!(!branch_matches(&revision(&["release-2"]), &filter));
        assert!(!branch_matches(&revision(&["mai"]), &filter));
        assert!(!branch_matches(&revision(&[]), &filter));
    }

    #[test]
    fn no_partial_globbing() {
        assert!(!branch_matches(
            &revision(&["release-1.0"]),
            &patterns(&["release-*"])
        ));
    }
}
