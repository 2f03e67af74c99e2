//! Project option schema and resolution.
//!
//! The option vocabulary is fixed: every name the system understands is
//! registered in an [`OptionSchema`] with a default and a validator. The
//! schema is built once at startup and shared by reference.

use std::collections::HashMap;

use trigger_state::{
    OptionMap, OptionStore, Project, ProjectId, SnapshotId, CURRENT_SNAPSHOT_OPTION,
};
use uuid::Uuid;

use crate::error::{OptionError, Result};

pub const GREEN_BUILD_NOTIFY: &str = "green-build.notify";
pub const GREEN_BUILD_PROJECT: &str = "green-build.project";
pub const MAIL_NOTIFY_AUTHOR: &str = "mail.notify-author";
pub const MAIL_NOTIFY_ADDRESSES: &str = "mail.notify-addresses";
pub const MAIL_NOTIFY_ADDRESSES_REVISIONS: &str = "mail.notify-addresses-revisions";
pub const BRANCH_NAMES: &str = "build.branch-names";
pub const COMMIT_TRIGGER: &str = "build.commit-trigger";
pub const FILE_WHITELIST: &str = "build.file-whitelist";
pub const TEST_DURATION_WARNING: &str = "build.test-duration-warning";
pub const PHABRICATOR_DIFF_TRIGGER: &str = "phabricator.diff-trigger";
pub const PHABRICATOR_NOTIFY: &str = "phabricator.notify";
pub const PROJECT_OWNERS: &str = "project.owners";
pub const PROJECT_NOTES: &str = "project.notes";
pub const UI_SHOW_COVERAGE: &str = "ui.show-coverage";
pub const UI_SHOW_TESTS: &str = "ui.show-tests";
pub const SNAPSHOT_CURRENT: &str = CURRENT_SNAPSHOT_OPTION;

/// Options the commit trigger reads for every candidate project.
pub const TRIGGER_OPTIONS: [&str; 3] = [COMMIT_TRIGGER, BRANCH_NAMES, FILE_WHITELIST];

/// A validated option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Flag(bool),
    Text(String),
    Tokens(Vec<String>),
    Addresses(Vec<String>),
    Integer(u64),
    /// `None` clears the pointer.
    Snapshot(Option<SnapshotId>),
}

impl OptionValue {
    /// Canonical string form written to the option store.
    pub fn to_stored(&self) -> String {
        match self {
            OptionValue::Flag(true) => "1".to_string(),
            OptionValue::Flag(false) => "0".to_string(),
            OptionValue::Text(text) => text.clone(),
            OptionValue::Tokens(tokens) => tokens.join(" "),
            OptionValue::Addresses(addresses) => addresses.join(", "),
            OptionValue::Integer(n) => n.to_string(),
            OptionValue::Snapshot(Some(id)) => id.to_string(),
            OptionValue::Snapshot(None) => String::new(),
        }
    }
}

/// Pure validator: raw input to typed value, or a reason for rejection.
pub type Validator = fn(&str) -> std::result::Result<OptionValue, String>;

#[derive(Clone)]
pub struct OptionSpec {
    pub name: &'static str,
    pub default: &'static str,
    validator: Validator,
}

impl OptionSpec {
    pub const fn new(name: &'static str, default: &'static str, validator: Validator) -> Self {
        Self {
            name,
            default,
            validator,
        }
    }

    pub fn validate(&self, raw: &str) -> std::result::Result<OptionValue, OptionError> {
        (self.validator)(raw).map_err(|reason| OptionError::Invalid {
            name: self.name.to_string(),
            reason,
        })
    }
}

impl std::fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionSpec")
            .field("name", &self.name)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/// Immutable registry of known options.
#[derive(Debug, Clone)]
pub struct OptionSchema {
    specs: Vec<OptionSpec>,
}

impl OptionSchema {
    pub fn new(specs: Vec<OptionSpec>) -> Self {
        Self { specs }
    }

    /// The full option vocabulary.
    pub fn standard() -> Self {
        Self::new(vec![
            OptionSpec::new(GREEN_BUILD_NOTIFY, "1", validate_flag),
            OptionSpec::new(GREEN_BUILD_PROJECT, "", validate_text),
            OptionSpec::new(MAIL_NOTIFY_AUTHOR, "1", validate_flag),
            OptionSpec::new(MAIL_NOTIFY_ADDRESSES, "", validate_addresses),
            OptionSpec::new(MAIL_NOTIFY_ADDRESSES_REVISIONS, "", validate_addresses),
            OptionSpec::new(BRANCH_NAMES, "*", validate_tokens),
            OptionSpec::new(COMMIT_TRIGGER, "1", validate_flag),
            OptionSpec::new(FILE_WHITELIST, "", validate_tokens),
            OptionSpec::new(TEST_DURATION_WARNING, "", validate_duration),
            OptionSpec::new(PHABRICATOR_DIFF_TRIGGER, "1", validate_flag),
            OptionSpec::new(PHABRICATOR_NOTIFY, "0", validate_flag),
            OptionSpec::new(PROJECT_OWNERS, "", validate_addresses),
            OptionSpec::new(PROJECT_NOTES, "", validate_text),
            OptionSpec::new(UI_SHOW_COVERAGE, "1", validate_flag),
            OptionSpec::new(UI_SHOW_TESTS, "1", validate_flag),
            OptionSpec::new(SNAPSHOT_CURRENT, "", validate_snapshot_id),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn specs(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.iter()
    }

    /// Position of `name` in registration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|spec| spec.name == name)
    }

    pub fn validate(
        &self,
        name: &str,
        raw: &str,
    ) -> std::result::Result<OptionValue, OptionError> {
        self.get(name)
            .ok_or_else(|| OptionError::Unknown {
                name: name.to_string(),
            })?
            .validate(raw)
    }
}

fn validate_flag(raw: &str) -> std::result::Result<OptionValue, String> {
    match raw.trim() {
        "1" => Ok(OptionValue::Flag(true)),
        "0" => Ok(OptionValue::Flag(false)),
        other => Err(format!("expected 0 or 1, got {other:?}")),
    }
}

fn validate_text(raw: &str) -> std::result::Result<OptionValue, String> {
    Ok(OptionValue::Text(raw.to_string()))
}

fn validate_tokens(raw: &str) -> std::result::Result<OptionValue, String> {
    Ok(OptionValue::Tokens(split_tokens(raw)))
}

fn validate_addresses(raw: &str) -> std::result::Result<OptionValue, String> {
    let addresses: Vec<String> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(bad) = addresses.iter().find(|a| !looks_like_address(a)) {
        return Err(format!("{bad:?} is not an email address"));
    }
    Ok(OptionValue::Addresses(addresses))
}

fn looks_like_address(candidate: &str) -> bool {
    match candidate.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

fn validate_duration(raw: &str) -> std::result::Result<OptionValue, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(OptionValue::Text(String::new()));
    }
    trimmed
        .parse::<u64>()
        .map(OptionValue::Integer)
        .map_err(|_| format!("expected a number of seconds, got {trimmed:?}"))
}

fn validate_snapshot_id(raw: &str) -> std::result::Result<OptionValue, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(OptionValue::Snapshot(None));
    }
    Uuid::parse_str(trimmed)
        .map(|id| OptionValue::Snapshot(Some(SnapshotId(id))))
        .map_err(|_| format!("{trimmed:?} is not a snapshot id"))
}

/// Whitespace-separated tokens with empties discarded.
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Effective options of one project, defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    values: OptionMap,
}

impl ProjectOptions {
    pub fn new(values: OptionMap) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn values(&self) -> &OptionMap {
        &self.values
    }

    /// Only the literal `"1"` enables the commit trigger.
    pub fn commit_trigger_enabled(&self) -> bool {
        self.get(COMMIT_TRIGGER) == Some("1")
    }

    pub fn branch_patterns(&self) -> Vec<String> {
        split_tokens(self.get(BRANCH_NAMES).unwrap_or_default())
    }

    pub fn file_whitelist(&self) -> Vec<String> {
        split_tokens(self.get(FILE_WHITELIST).unwrap_or_default())
    }

    pub fn has_file_whitelist(&self) -> bool {
        !self.file_whitelist().is_empty()
    }
}

/// Options resolved for a batch of projects.
#[derive(Debug, Clone, Default)]
pub struct ResolvedOptions {
    by_project: HashMap<ProjectId, ProjectOptions>,
}

impl ResolvedOptions {
    pub fn for_project(&self, id: ProjectId) -> Option<&ProjectOptions> {
        self.by_project.get(&id)
    }

    pub fn any(&self, predicate: impl Fn(&ProjectOptions) -> bool) -> bool {
        self.by_project.values().any(predicate)
    }
}

/// Resolve `names` for every project in one store round-trip.
///
/// Every requested name is present in each project's result: the stored
/// value when set, the schema default otherwise.
pub async fn resolve_options(
    store: &dyn OptionStore,
    schema: &OptionSchema,
    projects: &[Project],
    names: &[&str],
) -> Result<ResolvedOptions> {
    let specs = names
        .iter()
        .map(|name| {
            schema.get(name).ok_or_else(|| OptionError::Unknown {
                name: name.to_string(),
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let ids: Vec<ProjectId> = projects.iter().map(|p| p.id).collect();
    let mut stored = store.get_options(&ids, names).await?;

    let by_project = ids
        .into_iter()
        .map(|id| {
            let mut values = stored.remove(&id).unwrap_or_default();
            for spec in &specs {
                values
                    .entry(spec.name.to_string())
                    .or_insert_with(|| spec.default.to_string());
            }
            (id, ProjectOptions::new(values))
        })
        .collect();

    Ok(ResolvedOptions { by_project })
}
