use rusqlite::Connection;
use std::thread;
use todo_core::db::{open_db, open_db_in_memory};
use todo_core::{
    ErrorKind, HistoryOperation, HistoryRepository, NewTodo, NotFoundContext,
    SqliteHistoryRepository, SqliteTodoService, TodoPatch, TodoServiceError,
};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> SqliteTodoService<'_> {
    SqliteTodoService::try_from_connection(conn).unwrap()
}

fn history(conn: &Connection) -> SqliteHistoryRepository<'_> {
    SqliteHistoryRepository::try_new(conn).unwrap()
}

fn open_todo(title: &str) -> NewTodo {
    NewTodo::new(title, "open")
}

#[test]
fn create_returns_active_todo_without_history() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    assert!(!created.is_deleted);
    assert_eq!(created.deleted_at, None);
    assert_eq!(created.version, 0);
    assert_eq!(created.title, "A");
    assert_eq!(created.status, "open");

    assert_eq!(history(&conn).count_history().unwrap(), 0);
    assert_eq!(service.find_by_id(created.id, false).unwrap(), created);
}

#[test]
fn update_bumps_version_and_archives_pre_update_snapshot() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    let updated = service
        .update_todo(created.id, &TodoPatch::default().with_status("done"), false)
        .unwrap();

    assert_eq!(updated.version, 1);
    assert_eq!(updated.status, "done");
    assert_eq!(updated.title, "A");

    let records = history(&conn).list_history(created.id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, HistoryOperation::Modified);
    assert_eq!(records[0].todo_id, created.id);
    assert_eq!(records[0].data, created);
    assert_eq!(records[0].data.status, "open");
}

#[test]
fn each_update_adds_one_history_record_and_one_version() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    let first = service
        .update_todo(created.id, &TodoPatch::default().with_title("B"), false)
        .unwrap();
    let second = service
        .update_todo(created.id, &TodoPatch::default().with_title("C"), false)
        .unwrap();

    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);
    let records = history(&conn).list_history(created.id).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].data.title, "A");
    assert_eq!(records[1].data, first);
}

#[test]
fn update_with_empty_patch_still_bumps_version() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    let updated = service
        .update_todo(created.id, &TodoPatch::default(), false)
        .unwrap();
    assert_eq!(updated.version, 1);
    assert_eq!(updated.title, "A");
}

#[test]
fn update_missing_todo_is_not_found() {
    let conn = setup();
    let service = service(&conn);

    let id = Uuid::new_v4();
    let err = service
        .update_todo(id, &TodoPatch::default().with_title("x"), true)
        .unwrap_err();
    assert!(matches!(
        err,
        TodoServiceError::NotFound(NotFoundContext::Target(missing)) if missing == id
    ));
    assert_eq!(err.to_string(), format!("Todo with id {id} not found."));
}

#[test]
fn update_deleted_without_override_is_forbidden_and_changes_nothing() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    let deleted = service.soft_delete_todo(created.id).unwrap();
    let history_before = history(&conn).count_history().unwrap();

    let err = service
        .update_todo(created.id, &TodoPatch::default().with_status("done"), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(
        err.to_string(),
        format!(
            "Todo with id={} is deleted. Pass overrideDeleted=true to modify it.",
            created.id
        )
    );

    let stored = service.find_by_id(created.id, true).unwrap();
    assert_eq!(stored, deleted);
    assert_eq!(stored.version, 0);
    assert_eq!(history(&conn).count_history().unwrap(), history_before);
}

#[test]
fn update_deleted_with_override_reactivates_and_archives() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    let deleted = service.soft_delete_todo(created.id).unwrap();

    let updated = service
        .update_todo(created.id, &TodoPatch::default().with_title("B"), true)
        .unwrap();
    assert!(!updated.is_deleted);
    assert_eq!(updated.deleted_at, None);
    assert_eq!(updated.version, 1);
    assert_eq!(updated.title, "B");

    let records = history(&conn).list_history(created.id).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].operation, HistoryOperation::Modified);
    assert_eq!(records[1].data, deleted);
    assert!(service.find_by_id(created.id, false).is_ok());
}

#[test]
fn soft_delete_sets_markers_and_archives_flagged_snapshot() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    let deleted = service.soft_delete_todo(created.id).unwrap();

    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());
    assert_eq!(deleted.version, 0);

    let records = history(&conn).list_history(created.id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, HistoryOperation::Deleted);
    assert!(records[0].data.is_deleted);
    assert_eq!(records[0].data.deleted_at, deleted.deleted_at);
}

#[test]
fn soft_delete_missing_todo_is_not_found() {
    let conn = setup();
    let service = service(&conn);

    let err = service.soft_delete_todo(Uuid::new_v4()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(history(&conn).count_history().unwrap(), 0);
}

#[test]
fn soft_deleting_twice_archives_twice() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    service.soft_delete_todo(created.id).unwrap();
    let again = service.soft_delete_todo(created.id).unwrap();

    assert!(again.is_deleted);
    assert_eq!(history(&conn).list_history(created.id).unwrap().len(), 2);
}

#[test]
fn restore_brings_todo_back_without_history() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    service.soft_delete_todo(created.id).unwrap();
    let history_before = history(&conn).count_history().unwrap();

    let restored = service.restore_todo(created.id).unwrap();
    assert!(!restored.is_deleted);
    assert_eq!(restored.deleted_at, None);
    assert_eq!(restored.version, 0);
    assert_eq!(history(&conn).count_history().unwrap(), history_before);

    let found = service.find_by_id(created.id, false).unwrap();
    assert_eq!(found.id, created.id);
}

#[test]
fn restore_requires_deleted_state() {
    let conn = setup();
    let service = service(&conn);

    let active = service.create_todo(open_todo("A")).unwrap();
    let err = service.restore_todo(active.id).unwrap_err();
    assert!(matches!(
        err,
        TodoServiceError::NotFound(NotFoundContext::RecycleBinItem(id)) if id == active.id
    ));

    let missing = Uuid::new_v4();
    let err = service.restore_todo(missing).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Todo with id {missing} not found in recycle bin.")
    );
}

#[test]
fn find_active_is_empty_but_find_deleted_is_not_found() {
    let conn = setup();
    let service = service(&conn);

    assert!(service.find_active().unwrap().is_empty());
    let err = service.find_deleted().unwrap_err();
    assert!(matches!(
        err,
        TodoServiceError::NotFound(NotFoundContext::RecycleBinEmpty)
    ));
    assert_eq!(err.to_string(), "No items found in recycle bin.");
}

#[test]
fn find_active_and_find_deleted_partition_todos() {
    let conn = setup();
    let service = service(&conn);

    let a = service.create_todo(open_todo("A")).unwrap();
    let b = service.create_todo(open_todo("B")).unwrap();
    service.soft_delete_todo(b.id).unwrap();

    let active = service.find_active().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, a.id);

    let deleted = service.find_deleted().unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].id, b.id);
}

#[test]
fn find_by_id_hides_deleted_unless_requested() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    service.soft_delete_todo(created.id).unwrap();

    let err = service.find_by_id(created.id, false).unwrap_err();
    assert_eq!(err.to_string(), format!("Not found Todo with id {}", created.id));
    assert!(service.find_by_id(created.id, true).unwrap().is_deleted);
}

#[test]
fn find_deleted_by_id_requires_recycle_bin_membership() {
    let conn = setup();
    let service = service(&conn);

    let active = service.create_todo(open_todo("A")).unwrap();
    let err = service.find_deleted_by_id(active.id).unwrap_err();
    assert!(matches!(
        err,
        TodoServiceError::NotFound(NotFoundContext::RecycleBinItem(_))
    ));

    service.soft_delete_todo(active.id).unwrap();
    let found = service.find_deleted_by_id(active.id).unwrap();
    assert!(found.is_deleted);
}

#[test]
fn delete_all_hard_empties_store_and_leaves_history_alone() {
    let conn = setup();
    let service = service(&conn);

    let a = service.create_todo(open_todo("A")).unwrap();
    let b = service.create_todo(open_todo("B")).unwrap();
    service.create_todo(open_todo("C")).unwrap();
    service.soft_delete_todo(a.id).unwrap();
    service
        .update_todo(b.id, &TodoPatch::default().with_status("done"), false)
        .unwrap();
    let history_before = history(&conn).count_history().unwrap();

    assert_eq!(service.delete_all_hard().unwrap(), 3);
    assert!(service.find_active().unwrap().is_empty());
    assert!(service.find_deleted().is_err());
    assert_eq!(history(&conn).count_history().unwrap(), history_before);
    assert_eq!(history(&conn).list_history(a.id).unwrap().len(), 1);
}

#[test]
fn archive_failure_aborts_update() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_history_insert BEFORE INSERT ON todo_history
         BEGIN
            SELECT RAISE(ABORT, 'history writes disabled');
         END;",
    )
    .unwrap();

    let err = service
        .update_todo(created.id, &TodoPatch::default().with_status("done"), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err
        .to_string()
        .starts_with(&format!("Error updating Todo with id={}:", created.id)));

    let stored = service.find_by_id(created.id, false).unwrap();
    assert_eq!(stored, created);
}

#[test]
fn record_write_failure_aborts_soft_delete_archive() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_todo_update BEFORE UPDATE ON todos
         BEGIN
            SELECT RAISE(ABORT, 'todo writes disabled');
         END;",
    )
    .unwrap();

    let err = service.soft_delete_todo(created.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.to_string().contains("to recycle bin"));
    assert_eq!(history(&conn).count_history().unwrap(), 0);
    assert!(!service.find_by_id(created.id, true).unwrap().is_deleted);
}

#[test]
fn update_at_max_version_fails_without_writing() {
    let conn = setup();
    let service = service(&conn);

    let created = service.create_todo(open_todo("A")).unwrap();
    conn.execute(
        "UPDATE todos SET version = ?1 WHERE id = ?2;",
        rusqlite::params![i64::MAX, created.id.to_string()],
    )
    .unwrap();
    let before = service.find_by_id(created.id, false).unwrap();

    let err = service
        .update_todo(created.id, &TodoPatch::default(), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err
        .to_string()
        .starts_with(&format!("Error updating Todo with id={}:", created.id)));

    assert_eq!(service.find_by_id(created.id, false).unwrap(), before);
    assert_eq!(history(&conn).count_history().unwrap(), 0);
}

#[test]
fn concurrent_updates_from_separate_connections_all_land() {
    const WRITERS: usize = 8;
    const UPDATES_PER_WRITER: usize = 25;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.sqlite3");
    let conn = open_db(&path).unwrap();
    let created = service(&conn).create_todo(open_todo("shared")).unwrap();

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let path = &path;
            let id = created.id;
            scope.spawn(move || {
                let conn = open_db(path).unwrap();
                let service = service(&conn);
                for round in 0..UPDATES_PER_WRITER {
                    let patch = TodoPatch::default().with_status(format!("w{writer}-r{round}"));
                    if let Err(err) = service.update_todo(id, &patch, false) {
                        panic!("writer {writer} round {round} failed: {err}");
                    }
                }
            });
        }
    });

    let total = u64::try_from(WRITERS * UPDATES_PER_WRITER).unwrap();
    assert_eq!(history(&conn).count_history().unwrap(), total);
    assert_eq!(history(&conn).list_history(created.id).unwrap().len() as u64, total);

    // Last write wins: overlapping read-modify-write cycles may reuse a version.
    let stored = service(&conn).find_by_id(created.id, false).unwrap();
    stored.validate().unwrap();
    assert!(stored.version >= 1);
    assert!(stored.version <= i64::try_from(total).unwrap());
    assert!(stored.status.starts_with('w'));
}
