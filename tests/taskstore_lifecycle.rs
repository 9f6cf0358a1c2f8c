//! Black-box Task Store lifecycle: create, patch, changelog, status
//! index, optimistic-concurrency conflicts (spec.md §4.4, §8).

use cage::error::CageError;
use cage::model::{AcceptanceCheck, Task, TaskId, TaskStatus, TodoItem, TodoStatus};
use cage::taskstore::{TaskFilter, TaskPatch, TaskStore};

fn store() -> (TaskStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = TaskStore::open(dir.path()).unwrap();
    (store, dir)
}

#[test]
fn create_then_load_round_trips() {
    let (store, _dir) = store();
    let id = TaskId::new("2026-01-01-onboard-agent").unwrap();
    let task = Task::new(id.clone(), "Onboard agent", "alice");
    store.create(task.clone()).unwrap();

    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded.title, "Onboard agent");
    assert_eq!(loaded.status, TaskStatus::Planned);
}

#[test]
fn update_reflects_every_patched_field() {
    let (store, _dir) = store();
    let id = TaskId::new("2026-01-01-write-docs").unwrap();
    store.create(Task::new(id.clone(), "Write docs", "bob")).unwrap();

    let patch = TaskPatch {
        summary: Some("Draft the onboarding guide".to_owned()),
        tags: Some(vec!["docs".to_owned(), "p1".to_owned()]),
        todo: Some(vec![
            TodoItem {
                text: "outline".to_owned(),
                status: TodoStatus::Done,
                date_started: None,
                date_stopped: None,
            },
            TodoItem {
                text: "draft".to_owned(),
                status: TodoStatus::NotStarted,
                date_started: None,
                date_stopped: None,
            },
        ]),
        ..Default::default()
    };
    let updated = store.update(&id, patch, None).unwrap();

    assert_eq!(updated.summary, "Draft the onboarding guide");
    assert_eq!(updated.tags, vec!["docs", "p1"]);
    // (I1) progress_percent follows the done fraction of todo.
    assert_eq!(updated.progress_percent, 50);
    assert!(updated.updated_at >= updated.created_at);
}

#[test]
fn concurrent_update_with_stale_if_unchanged_conflicts() {
    let (store, _dir) = store();
    let id = TaskId::new("2026-01-01-concurrent-edit").unwrap();
    let created = store.create(Task::new(id.clone(), "Concurrent edit", "carol")).unwrap();

    // A second writer loads the same `updated_at` baseline...
    let stale_baseline = created.updated_at;
    // ...but a first writer lands an update in between.
    store
        .update(&id, TaskPatch { summary: Some("first writer".to_owned()), ..Default::default() }, None)
        .unwrap();

    let err = store
        .update(
            &id,
            TaskPatch { summary: Some("second writer".to_owned()), ..Default::default() },
            Some(stale_baseline),
        )
        .unwrap_err();
    assert!(matches!(err, CageError::TaskConflict { .. }));
}

#[test]
fn done_requires_all_success_criteria_checked() {
    let (store, _dir) = store();
    let id = TaskId::new("2026-01-01-ship-feature").unwrap();
    store.create(Task::new(id.clone(), "Ship feature", "dave")).unwrap();
    store
        .update(
            &id,
            TaskPatch {
                success_criteria: Some(vec![AcceptanceCheck { text: "tests pass".to_owned(), checked: false }]),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    let err = store
        .update(&id, TaskPatch { status: Some(TaskStatus::Done), ..Default::default() }, None)
        .unwrap_err();
    assert!(matches!(err, CageError::TaskSchemaViolation { .. }));

    store
        .update(
            &id,
            TaskPatch {
                success_criteria: Some(vec![AcceptanceCheck { text: "tests pass".to_owned(), checked: true }]),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    let done = store
        .update(&id, TaskPatch { status: Some(TaskStatus::Done), ..Default::default() }, None)
        .unwrap();
    assert_eq!(done.status, TaskStatus::Done);
}

#[test]
fn changelog_append_is_monotone_and_survives_reload() {
    let (store, _dir) = store();
    let id = TaskId::new("2026-01-01-audit-trail").unwrap();
    store.create(Task::new(id.clone(), "Audit trail", "erin")).unwrap();

    store.append_changelog(&id, "edited src/lib.rs", None).unwrap();
    store.append_changelog(&id, "edited src/main.rs", None).unwrap();

    let reloaded = store.load(&id).unwrap();
    assert_eq!(reloaded.changelog.len(), 2);
    assert_eq!(reloaded.changelog[0].text, "edited src/lib.rs");
    assert_eq!(reloaded.changelog[1].text, "edited src/main.rs");
}

#[test]
fn list_filters_by_status_and_rebuilds_status_index() {
    let (store, _dir) = store();
    let active_id = TaskId::new("2026-01-01-active-task").unwrap();
    let done_id = TaskId::new("2026-01-01-done-task").unwrap();
    store.create(Task::new(active_id.clone(), "Active task", "frank")).unwrap();
    store.create(Task::new(done_id.clone(), "Done task", "frank")).unwrap();
    store
        .update(&done_id, TaskPatch { status: Some(TaskStatus::Done), ..Default::default() }, None)
        .unwrap();

    let active = store.list(&TaskFilter { status: Some(TaskStatus::Planned), ..Default::default() }).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, active_id);

    let index = store.rebuild_status_index().unwrap();
    assert!(index.active.contains(&active_id));
    assert!(index.recently_completed.contains(&done_id));
}

#[test]
fn delete_removes_task_from_store() {
    let (store, _dir) = store();
    let id = TaskId::new("2026-01-01-scratch-task").unwrap();
    store.create(Task::new(id.clone(), "Scratch task", "gina")).unwrap();
    store.delete(&id).unwrap();

    let err = store.load(&id).unwrap_err();
    assert!(matches!(err, CageError::TaskNotFound { .. }));
}
