use gradebook_core::{
    GradePolicy, Gradebook, GradebookService, RecordStore, ScoreEntry, SqliteRecordStore,
    StoreError, StudentKey, StudentRecord, SubjectEdit,
};
use rusqlite::Connection;

fn sample_gradebook() -> Gradebook {
    let mut gradebook = Gradebook::new();
    let mut alice = StudentRecord::with_display_name(10, "Alice");
    alice.set_score("math", 90);
    alice.set_score("science", 80);
    gradebook.insert(StudentKey::from_raw("Alice").unwrap(), alice);
    gradebook.insert(StudentKey::from_raw("bob").unwrap(), StudentRecord::new(9));
    gradebook
}

#[test]
fn in_memory_store_creates_schema() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    assert_eq!(store.location(), ":memory:");
    assert!(store.corrupt_copy_path().is_none());
}

#[test]
fn new_database_file_gets_current_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.sqlite3");

    drop(SqliteRecordStore::open(&path).unwrap());
    drop(SqliteRecordStore::open(&path).unwrap());

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), SqliteRecordStore::SCHEMA_VERSION);
    assert_table_exists(&conn, "students");
    assert_table_exists(&conn, "student_subjects");
}

#[test]
fn database_from_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match SqliteRecordStore::open(&path) {
        Err(StoreError::UnsupportedSchema {
            found, supported, ..
        }) => {
            assert_eq!(found, 999);
            assert_eq!(supported, SqliteRecordStore::SCHEMA_VERSION);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema was accepted"),
    }
}

#[test]
fn empty_database_loads_as_empty_gradebook() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn save_then_load_roundtrip() {
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let gradebook = sample_gradebook();

    store.save(&gradebook).unwrap();
    assert_eq!(store.load().unwrap(), gradebook);

    store.save(&store.load().unwrap()).unwrap();
    assert_eq!(store.load().unwrap(), gradebook);
}

#[test]
fn save_replaces_all_rows() {
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    store.save(&sample_gradebook()).unwrap();

    let mut smaller = Gradebook::new();
    smaller.insert(StudentKey::from_raw("cy").unwrap(), StudentRecord::new(8));
    store.save(&smaller).unwrap();

    assert_eq!(store.load().unwrap(), smaller);
}

fn three_students() -> Gradebook {
    let mut gradebook = Gradebook::new();
    for (name, age, score) in [("Alice", 10, 70), ("Bob", 11, 90), ("Cy", 12, 55)] {
        let mut record = StudentRecord::with_display_name(age, name);
        record.set_score("math", score);
        gradebook.insert(StudentKey::from_raw(name).unwrap(), record);
    }
    gradebook
}

fn student_rows(path: &std::path::Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM students;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn inconsistent_rows_are_rejected_after_copying_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.sqlite3");
    let mut store = SqliteRecordStore::open(&path).unwrap();
    store.save(&sample_gradebook()).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE students SET total_score = 1 WHERE student_key = 'alice';",
        [],
    )
    .unwrap();
    drop(conn);

    let err = store.load().unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }), "unexpected error: {err}");
    let backup = err.backup().unwrap();
    assert_eq!(Some(backup.to_path_buf()), store.corrupt_copy_path());
    assert_eq!(student_rows(backup), 2);
}

#[test]
fn saving_after_failed_load_keeps_a_copy_of_every_stored_student() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gb.sqlite3");
    SqliteRecordStore::open(&path)
        .unwrap()
        .save(&three_students())
        .unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE students SET total_score = 91 WHERE student_key = 'bob';",
        [],
    )
    .unwrap();
    drop(conn);

    let mut service =
        GradebookService::open(SqliteRecordStore::open(&path).unwrap(), GradePolicy::default());
    let load_error = service.take_load_error().unwrap();
    let backup = load_error.backup().unwrap().to_path_buf();
    assert!(!service.is_overwrite_guarded());

    service
        .add_or_update_student("Dee", Some("12"), vec![ScoreEntry::new("Art", "50")])
        .unwrap();

    assert_eq!(student_rows(&path), 1);
    assert_eq!(student_rows(&backup), 3);
    let conn = Connection::open(&backup).unwrap();
    let mut stmt = conn
        .prepare("SELECT student_key FROM students ORDER BY student_key;")
        .unwrap();
    let keys: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(keys, vec!["alice", "bob", "cy"]);
}

#[test]
fn service_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.sqlite3");

    let mut first =
        GradebookService::open(SqliteRecordStore::open(&path).unwrap(), GradePolicy::default());
    first
        .add_or_update_student("Alice", Some("10"), vec![ScoreEntry::new("Math", "70")])
        .unwrap();
    first
        .edit_student("alice", Some("11"), vec![SubjectEdit::set("math", "72")])
        .unwrap();
    drop(first);

    let second =
        GradebookService::open(SqliteRecordStore::open(&path).unwrap(), GradePolicy::default());
    let found = second.search_student("ALICE").unwrap();
    assert_eq!(found.display_name, "Alice");
    assert_eq!(found.record.age(), 11);
    assert_eq!(found.record.total_score(), 72);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
