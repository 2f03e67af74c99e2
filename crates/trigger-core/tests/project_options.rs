//! Project option updates: validation, `None` handling and downgrade reporting.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing_test::traced_test;
use trigger_core::{
    Counter, Metrics, OptionError, OptionSchema, OptionUpdates, ProjectOptionsService,
    TriggerError,
};
use trigger_state::{
    MemoryCatalog, OptionMap, OptionStore, Project, ProjectId, ProjectStatus, RepositoryId,
    Snapshot, SnapshotId, SnapshotStatus, SnapshotStore, StorageError, StorageResult,
    CURRENT_SNAPSHOT_OPTION,
};

struct Harness {
    catalog: Arc<MemoryCatalog>,
    metrics: Arc<Metrics>,
    service: ProjectOptionsService,
}

fn harness() -> Harness {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog
        .insert_project(Project {
            id: ProjectId(42),
            slug: "web".to_string(),
            repository_id: RepositoryId(1),
            status: ProjectStatus::Active,
        })
        .unwrap();
    let metrics = Arc::new(Metrics::new());
    let service = ProjectOptionsService::from_catalog(catalog.clone(), metrics.clone());
    Harness {
        catalog,
        metrics,
        service,
    }
}

/// Option store whose writes of one option always fail.
struct FailingWrites {
    inner: Arc<MemoryCatalog>,
    fail_on: &'static str,
}

#[async_trait]
impl OptionStore for FailingWrites {
    async fn get_options(
        &self,
        project_ids: &[ProjectId],
        names: &[&str],
    ) -> StorageResult<HashMap<ProjectId, OptionMap>> {
        self.inner.get_options(project_ids, names).await
    }

    async fn set_option(&self, project_id: ProjectId, name: &str, value: &str) -> StorageResult<()> {
        if name == self.fail_on {
            return Err(StorageError::Backend(format!("write of {name} refused")));
        }
        self.inner.set_option(project_id, name, value).await
    }
}

fn snapshot(h: &Harness, age_hours: i64, status: SnapshotStatus) -> SnapshotId {
    let snapshot = Snapshot {
        id: SnapshotId::new(),
        project_id: ProjectId(42),
        status,
        created_at: Utc::now() - Duration::hours(age_hours),
    };
    let id = snapshot.id;
    h.catalog.insert_snapshot(snapshot).unwrap();
    id
}

fn updates(pairs: &[(&str, Option<&str>)]) -> OptionUpdates {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
        .collect()
}

fn stored(h: &Harness, name: &str) -> Option<String> {
    h.catalog.option_value(ProjectId(42), name).unwrap()
}

#[tokio::test]
async fn test_update_writes_in_schema_order() {
    let h = harness();

    let written = h
        .service
        .update(
            "web",
            &updates(&[
                ("build.file-whitelist", Some("src/ docs/")),
                ("build.commit-trigger", Some("0")),
                ("build.branch-names", Some("main release")),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(
        written,
        vec![
            "build.branch-names",
            "build.commit-trigger",
            "build.file-whitelist"
        ]
    );
    assert_eq!(stored(&h, "build.commit-trigger").as_deref(), Some("0"));
    assert_eq!(stored(&h, "build.file-whitelist").as_deref(), Some("src/ docs/"));
}

#[tokio::test]
async fn test_none_never_overwrites_but_empty_string_does() {
    let h = harness();
    h.catalog
        .set_option(ProjectId(42), "build.branch-names", "main")
        .await
        .unwrap();
    h.catalog
        .set_option(ProjectId(42), "project.notes", "keep me?")
        .await
        .unwrap();

    let written = h
        .service
        .update(
            "web",
            &updates(&[("build.branch-names", None), ("project.notes", Some(""))]),
        )
        .await
        .unwrap();

    assert_eq!(written, vec!["project.notes"]);
    assert_eq!(stored(&h, "build.branch-names").as_deref(), Some("main"));
    assert_eq!(stored(&h, "project.notes").as_deref(), Some(""));
}

#[tokio::test]
async fn test_project_can_be_addressed_by_numeric_id() {
    let h = harness();

    h.service
        .update("42", &updates(&[("ui.show-tests", Some("0"))]))
        .await
        .unwrap();

    assert_eq!(stored(&h, "ui.show-tests").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_unknown_project_is_rejected() {
    let h = harness();

    let err = h
        .service
        .update("nope", &updates(&[("ui.show-tests", Some("0"))]))
        .await
        .unwrap_err();

    assert!(matches!(err, TriggerError::ProjectNotFound(ref p) if p == "nope"));
}

#[tokio::test]
async fn test_invalid_value_aborts_the_whole_update() {
    let h = harness();

    let err = h
        .service
        .update(
            "web",
            &updates(&[
                ("build.branch-names", Some("main")),
                ("build.commit-trigger", Some("yes")),
            ]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TriggerError::Option(OptionError::Invalid { ref name, .. })
            if name == "build.commit-trigger"
    ));
    assert_eq!(stored(&h, "build.branch-names"), None);
}

#[tokio::test]
async fn test_invalid_snapshot_blocks_writes_earlier_in_schema_order() {
    let h = harness();

    let err = h
        .service
        .update(
            "web",
            &updates(&[
                ("build.branch-names", Some("main")),
                (
                    CURRENT_SNAPSHOT_OPTION,
                    Some(SnapshotId::new().to_string().as_str()),
                ),
            ]),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Could not find snapshot"));
    assert_eq!(stored(&h, "build.branch-names"), None);
}

#[tokio::test]
#[traced_test]
async fn test_failed_write_keeps_earlier_writes_and_stops() {
    let h = harness();
    let newer = snapshot(&h, 1, SnapshotStatus::Active);
    let older = snapshot(&h, 72, SnapshotStatus::Active);
    h.catalog
        .set_option(ProjectId(42), CURRENT_SNAPSHOT_OPTION, &newer.to_string())
        .await
        .unwrap();
    let service = ProjectOptionsService::new(
        h.catalog.clone(),
        Arc::new(FailingWrites {
            inner: h.catalog.clone(),
            fail_on: "build.commit-trigger",
        }),
        h.catalog.clone(),
        Arc::new(OptionSchema::standard()),
        h.metrics.clone(),
    );

    let err = service
        .update(
            "web",
            &updates(&[
                ("build.branch-names", Some("main")),
                ("build.commit-trigger", Some("0")),
                ("build.file-whitelist", Some("src/")),
                (CURRENT_SNAPSHOT_OPTION, Some(older.to_string().as_str())),
            ]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TriggerError::Storage(StorageError::Backend(_))));
    assert_eq!(stored(&h, "build.branch-names").as_deref(), Some("main"));
    assert_eq!(stored(&h, "build.commit-trigger"), None);
    assert_eq!(stored(&h, "build.file-whitelist"), None);
    assert_eq!(stored(&h, CURRENT_SNAPSHOT_OPTION), Some(newer.to_string()));
    // The comparison ran before any write was attempted.
    assert_eq!(h.metrics.get(Counter::SnapshotDowngrade), 1);
    assert!(logs_contain("Snapshot downgrade for project web"));
}

#[tokio::test]
async fn test_unknown_option_is_rejected() {
    let h = harness();

    let err = h
        .service
        .update("web", &updates(&[("build.colour", Some("blue"))]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TriggerError::Option(OptionError::Unknown { ref name }) if name == "build.colour"
    ));
}

#[tokio::test]
async fn test_snapshot_must_exist_and_be_active() {
    let h = harness();
    let failed = snapshot(&h, 1, SnapshotStatus::Failed);

    let missing = h
        .service
        .update(
            "web",
            &updates(&[(
                CURRENT_SNAPSHOT_OPTION,
                Some(SnapshotId::new().to_string().as_str()),
            )]),
        )
        .await
        .unwrap_err();
    let inactive = h
        .service
        .update(
            "web",
            &updates(&[(CURRENT_SNAPSHOT_OPTION, Some(failed.to_string().as_str()))]),
        )
        .await
        .unwrap_err();

    assert!(missing.to_string().contains("Could not find snapshot"));
    assert!(inactive.to_string().contains("Snapshot not active"));
    assert_eq!(stored(&h, CURRENT_SNAPSHOT_OPTION), None);
}

#[tokio::test]
async fn test_snapshot_pointer_can_be_cleared() {
    let h = harness();
    let current = snapshot(&h, 1, SnapshotStatus::Active);
    h.catalog
        .set_option(ProjectId(42), CURRENT_SNAPSHOT_OPTION, &current.to_string())
        .await
        .unwrap();

    h.service
        .update("web", &updates(&[(CURRENT_SNAPSHOT_OPTION, Some(""))]))
        .await
        .unwrap();

    assert!(h.catalog.current_snapshot(ProjectId(42)).await.unwrap().is_none());
    assert_eq!(h.metrics.get(Counter::SnapshotDowngrade), 0);
}

#[tokio::test]
#[traced_test]
async fn test_rollback_to_older_snapshot_reports_one_downgrade() {
    let h = harness();
    let newer = snapshot(&h, 1, SnapshotStatus::Active);
    let older = snapshot(&h, 72, SnapshotStatus::Active);
    h.catalog
        .set_option(ProjectId(42), CURRENT_SNAPSHOT_OPTION, &newer.to_string())
        .await
        .unwrap();

    h.service
        .update(
            "web",
            &updates(&[(CURRENT_SNAPSHOT_OPTION, Some(older.to_string().as_str()))]),
        )
        .await
        .unwrap();

    assert_eq!(h.metrics.get(Counter::SnapshotDowngrade), 1);
    assert_eq!(
        h.catalog.current_snapshot(ProjectId(42)).await.unwrap().map(|s| s.id),
        Some(older)
    );
    logs_assert(|lines: &[&str]| {
        let warnings = lines
            .iter()
            .filter(|line| line.contains("Snapshot downgrade for project web"))
            .count();
        if warnings == 1 {
            Ok(())
        } else {
            Err(format!("expected one downgrade warning, saw {warnings}"))
        }
    });
}

#[tokio::test]
#[traced_test]
async fn test_newer_or_first_snapshot_is_not_a_downgrade() {
    let h = harness();
    let older = snapshot(&h, 72, SnapshotStatus::Active);
    let newer = snapshot(&h, 1, SnapshotStatus::Active);

    h.service
        .update(
            "web",
            &updates(&[(CURRENT_SNAPSHOT_OPTION, Some(older.to_string().as_str()))]),
        )
        .await
        .unwrap();
    h.service
        .update(
            "web",
            &updates(&[(CURRENT_SNAPSHOT_OPTION, Some(newer.to_string().as_str()))]),
        )
        .await
        .unwrap();

    assert_eq!(h.metrics.get(Counter::SnapshotDowngrade), 0);
    assert!(!logs_contain("Snapshot downgrade"));
}

#[tokio::test]
async fn test_show_fills_defaults_for_every_option() {
    let h = harness();
    h.catalog
        .set_option(ProjectId(42), "build.branch-names", "main")
        .await
        .unwrap();

    let (project, options) = h.service.show("web").await.unwrap();

    assert_eq!(project.id, ProjectId(42));
    assert_eq!(options.get("build.branch-names"), Some("main"));
    assert_eq!(options.get("build.commit-trigger"), Some("1"));
    assert_eq!(options.get("build.file-whitelist"), Some(""));
    assert_eq!(options.values().len(), 16);
}
