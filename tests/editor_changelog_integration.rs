//! Black-box Editor Tool (C3) + Lock Manager (C2) + Task Store (C4)
//! integration: a mutating edit with a `correlation_id` appends a
//! changelog entry to the named task, and a held lock blocks a second
//! agent's overlapping edit (spec.md §4.2, §4.3).

use std::sync::Arc;

use cage::editor::{ChangelogSink, Editor};
use cage::error::CageError;
use cage::lock::LockManager;
use cage::model::operation::{EditPayload, FileOperation, OpKind, Selector};
use cage::model::{Task, TaskId};
use cage::taskstore::TaskStore;

struct TaskStoreSink(Arc<TaskStore>);

impl ChangelogSink for TaskStoreSink {
    fn append_changelog(&self, task_id: &TaskId, text: &str, lock_id: Option<String>) {
        let lock_id = lock_id.and_then(|s| s.parse().ok());
        let _ = self.0.append_changelog(task_id, text, lock_id);
    }
}

fn write(dir: &std::path::Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn mutating_edit_with_correlation_id_appends_task_changelog() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/lib.rs", "fn one() {}\nfn two() {}\n");

    let task_store = Arc::new(TaskStore::open(dir.path()).unwrap());
    let task_id = TaskId::new("2026-01-01-rename-fn").unwrap();
    task_store.create(Task::new(task_id.clone(), "Rename fn", "agent-1")).unwrap();

    let locks = Arc::new(LockManager::new());
    let editor = Editor::new(dir.path().to_path_buf(), locks, 300);
    let sink = TaskStoreSink(Arc::clone(&task_store));

    let op = FileOperation {
        op: OpKind::Update(EditPayload {
            content: "fn uno() {}\n".to_owned(),
            pre_hash: None,
            keep_lock: false,
        }),
        path: "src/lib.rs".to_owned(),
        selector: Some(Selector::Region { start: 1, end: 1 }),
        intent: "rename".to_owned(),
        dry_run: false,
        author: "agent-1".to_owned(),
        correlation_id: Some(task_id.clone()),
    };
    let result = editor.execute(&op, Some(&sink)).unwrap();
    assert!(result.ok);

    let task = task_store.load(&task_id).unwrap();
    assert_eq!(task.changelog.len(), 1);
    assert!(task.changelog[0].text.contains("src/lib.rs"));
}

#[test]
fn second_agents_overlapping_edit_is_rejected_while_lock_held() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", "one\ntwo\nthree\n");

    let locks = Arc::new(LockManager::new());
    // Agent A holds line 2 via a long-lived keep_lock edit.
    let editor_a = Editor::new(dir.path().to_path_buf(), Arc::clone(&locks), 300);
    let op_a = FileOperation {
        op: OpKind::Update(EditPayload {
            content: "TWO\n".to_owned(),
            pre_hash: None,
            keep_lock: true,
        }),
        path: "a.txt".to_owned(),
        selector: Some(Selector::Region { start: 2, end: 2 }),
        intent: "in-progress-edit".to_owned(),
        dry_run: false,
        author: "agent-a".to_owned(),
        correlation_id: None,
    };
    let result_a = editor_a.execute(&op_a, None).unwrap();
    assert!(result_a.lock_id.is_some());

    // Agent B tries to touch the same line while A's lock is outstanding.
    let editor_b = Editor::new(dir.path().to_path_buf(), locks, 300);
    let op_b = FileOperation {
        op: OpKind::Update(EditPayload {
            content: "2-OVERWRITTEN\n".to_owned(),
            pre_hash: None,
            keep_lock: false,
        }),
        path: "a.txt".to_owned(),
        selector: Some(Selector::Region { start: 2, end: 2 }),
        intent: "conflicting-edit".to_owned(),
        dry_run: false,
        author: "agent-b".to_owned(),
        correlation_id: None,
    };
    let err = editor_b.execute(&op_b, None).unwrap_err();
    assert!(matches!(err, CageError::LockConflict { .. }));
}
