use gradebook_core::{
    GradePolicy, Gradebook, GradebookService, JsonFileStore, RecordStore, ScoreEntry,
    ServiceError, StoreError, StudentKey, StudentRecord,
};
use serde_json::Value;
use std::fs;

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
fn missing_file_loads_as_empty_gradebook() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("gradebook.json"));

    let gradebook = store.load().unwrap();
    assert!(gradebook.is_empty());
}

#[test]
fn save_then_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("nested").join("gradebook.json"));
    let gradebook = sample_gradebook();

    store.save(&gradebook).unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded, gradebook);
}

#[test]
fn saving_an_unmodified_load_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");
    let mut store = JsonFileStore::new(&path);

    store.save(&sample_gradebook()).unwrap();
    let first = fs::read(&path).unwrap();

    let loaded = store.load().unwrap();
    store.save(&loaded).unwrap();
    let second = fs::read(&path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn legacy_snapshot_keeps_its_structured_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook_logs.json");
    let legacy = r#"{
  "alice": {
    "age": 10,
    "subjects": {
      "science": 80,
      "math": 70
    },
    "total_score": 150,
    "count_scores": 2
  }
}"#;
    fs::write(&path, legacy).unwrap();
    let mut store = JsonFileStore::new(&path);

    let loaded = store.load().unwrap();
    store.save(&loaded).unwrap();

    let before: Value = serde_json::from_str(legacy).unwrap();
    let after: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn save_replaces_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("gradebook.json"));

    store.save(&sample_gradebook()).unwrap();
    store.save(&Gradebook::new()).unwrap();

    assert!(store.load().unwrap().is_empty());
}

#[test]
fn written_file_uses_two_space_indentation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");
    let mut store = JsonFileStore::new(&path);
    store.save(&sample_gradebook()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("{\n  \"alice\": {\n    \"age\": 10,"));
    assert!(text.ends_with("}\n"));
}

#[test]
fn corrupt_file_is_copied_aside_before_reporting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");
    fs::write(&path, "{ not json").unwrap();
    let store = JsonFileStore::new(&path);

    let err = store.load().unwrap_err();
    match err {
        StoreError::Corrupt { backup, .. } => {
            let backup = backup.expect("corrupt copy should be kept");
            assert_eq!(backup, store.corrupt_copy_path());
            assert_eq!(fs::read_to_string(backup).unwrap(), "{ not json");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn inconsistent_aggregates_are_treated_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");
    fs::write(
        &path,
        r#"{"alice": {"age": 10, "subjects": {"math": 90}, "total_score": 10, "count_scores": 1}}"#,
    )
    .unwrap();

    let err = JsonFileStore::new(&path).load().unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}

#[test]
fn unreadable_data_path_is_never_saved_over() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");
    fs::create_dir(&path).unwrap();
    fs::write(path.join("keep.txt"), "old data").unwrap();

    let mut service = GradebookService::open(JsonFileStore::new(&path), GradePolicy::default());
    assert!(matches!(
        service.take_load_error(),
        Some(StoreError::Io { .. })
    ));
    assert!(service.is_overwrite_guarded());

    let err = service
        .add_or_update_student("Dee", Some("12"), vec![ScoreEntry::new("Art", "50")])
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Store(StoreError::OverwriteRefused { .. })
    ));
    assert_eq!(fs::read_to_string(path.join("keep.txt")).unwrap(), "old data");
}

#[test]
fn corrupt_file_survives_the_next_save_as_a_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");
    fs::write(&path, "{ not json").unwrap();

    let mut service = GradebookService::open(JsonFileStore::new(&path), GradePolicy::default());
    assert!(!service.is_overwrite_guarded());
    service
        .add_or_update_student("Dee", Some("12"), Vec::new())
        .unwrap();

    let copy = JsonFileStore::new(&path).corrupt_copy_path();
    assert_eq!(fs::read_to_string(copy).unwrap(), "{ not json");
    assert!(fs::read_to_string(&path).unwrap().contains("\"dee\""));
}

#[test]
fn whitespace_only_file_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");
    fs::write(&path, "  \n").unwrap();

    assert!(JsonFileStore::new(&path).load().unwrap().is_empty());
}

#[test]
fn service_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.json");

    let mut first = GradebookService::open(JsonFileStore::new(&path), GradePolicy::default());
    first
        .add_or_update_student(
            "Alice",
            Some("10"),
            vec![ScoreEntry::new("Math", "90"), ScoreEntry::new("Science", "80")],
        )
        .unwrap();
    drop(first);

    let second = GradebookService::open(JsonFileStore::new(&path), GradePolicy::default());
    let found = second.search_student("aLiCe").unwrap();
    assert_eq!(found.display_name, "Alice");
    assert_eq!(found.average(), 85.0);
}
