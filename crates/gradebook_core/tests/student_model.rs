use gradebook_core::{
    calculate_average, Gradebook, GradebookDataError, RecordIntegrityError, StudentKey,
    StudentRecord,
};
use serde_json::json;

#[test]
fn new_record_starts_empty_with_zero_average() {
    let record = StudentRecord::new(12);

    assert_eq!(record.age(), 12);
    assert!(record.subjects().is_empty());
    assert_eq!(record.total_score(), 0);
    assert_eq!(record.count_scores(), 0);
    assert_eq!(calculate_average(&record), 0.0);
    assert!(!record.average().is_nan());
}

#[test]
fn aggregates_follow_every_mutation() {
    let mut record = StudentRecord::new(10);

    record.set_score("math", 90);
    record.set_score("science", 80);
    assert_eq!(record.total_score(), 170);
    assert_eq!(record.count_scores(), 2);
    assert_eq!(record.average(), 85.0);

    let previous = record.set_score("math", 70);
    assert_eq!(previous, Some(90));
    assert_eq!(record.total_score(), 150);
    assert_eq!(record.count_scores(), 2);

    assert_eq!(record.remove_subject("science"), Some(80));
    assert_eq!(record.remove_subject("science"), None);
    assert_eq!(record.total_score(), 70);
    assert_eq!(record.count_scores(), 1);
}

#[test]
fn average_is_not_rounded() {
    let mut record = StudentRecord::new(10);
    record.set_score("a", 1);
    record.set_score("b", 2);
    record.set_score("c", 2);

    assert!((record.average() - 5.0 / 3.0).abs() < f64::EPSILON);
}

#[test]
fn record_serialization_uses_snapshot_fields() {
    let mut record = StudentRecord::new(10);
    record.set_score("math", 90);

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value,
        json!({
            "age": 10,
            "subjects": { "math": 90 },
            "total_score": 90,
            "count_scores": 1
        })
    );

    let named = StudentRecord::with_display_name(10, "  Alice  ");
    let value = serde_json::to_value(&named).unwrap();
    assert_eq!(value["display_name"], "Alice");
}

#[test]
fn deserialize_rejects_inconsistent_aggregates() {
    let value = json!({
        "age": 10,
        "subjects": { "math": 90, "art": 60 },
        "total_score": 100,
        "count_scores": 2
    });

    let err = serde_json::from_value::<StudentRecord>(value).unwrap_err();
    assert!(
        err.to_string()
            .contains("total_score (100) does not match sum of subjects (150)"),
        "unexpected error: {err}"
    );
}

#[test]
fn restore_canonicalizes_subjects_and_checks_counts() {
    let record = StudentRecord::restore(
        None,
        11,
        vec![("  Math ".to_string(), 50)],
        50,
        1,
    )
    .unwrap();
    assert_eq!(record.score("math"), Some(50));

    let err = StudentRecord::restore(None, 11, vec![("Math".to_string(), 50)], 50, 2).unwrap_err();
    assert_eq!(
        err,
        RecordIntegrityError::CountMismatch {
            stored: 2,
            computed: 1
        }
    );

}

#[test]
fn case_variant_subjects_merge_keeping_the_later_score() {
    let record = StudentRecord::restore(
        None,
        11,
        vec![("Math".to_string(), 50), ("MATH".to_string(), 40)],
        90,
        2,
    )
    .unwrap();

    assert_eq!(record.subjects().len(), 1);
    assert_eq!(record.score("math"), Some(40));
    assert_eq!(record.total_score(), 40);
    assert_eq!(record.count_scores(), 1);
}

#[test]
fn legacy_file_with_case_variant_subjects_still_loads() {
    let value = json!({
        "alice": {
            "age": 10,
            "subjects": { "Math": 90, "math": 70, "Art": 60 },
            "total_score": 220,
            "count_scores": 3
        },
        "bob": { "age": 9, "subjects": { "art": 50 }, "total_score": 50, "count_scores": 1 }
    });

    let gradebook: Gradebook = serde_json::from_value(value).unwrap();
    let alice = gradebook.get(&StudentKey::from_raw("Alice").unwrap()).unwrap();
    assert_eq!(alice.score("math"), Some(70));
    assert_eq!(alice.score("art"), Some(60));
    assert_eq!(alice.total_score(), 130);
    assert_eq!(alice.count_scores(), 2);
    assert_eq!(gradebook.len(), 2);
}

#[test]
fn gradebook_deserializes_legacy_keys_case_insensitively() {
    let value = json!({
        "Bob Smith": { "age": 9, "subjects": {}, "total_score": 0, "count_scores": 0 },
        "alice": { "age": 10, "subjects": { "math": 90 }, "total_score": 90, "count_scores": 1 }
    });

    let gradebook: Gradebook = serde_json::from_value(value).unwrap();
    assert_eq!(gradebook.len(), 2);

    let bob = StudentKey::from_raw("BOB SMITH").unwrap();
    let record = gradebook.get(&bob).unwrap();
    assert_eq!(record.display_name(), Some("Bob Smith"));

    let alice = StudentKey::from_raw("Alice").unwrap();
    let record = gradebook.get(&alice).unwrap();
    assert_eq!(record.display_name(), None);
    assert_eq!(Gradebook::display_name_of(&alice, record), "Alice");
}

#[test]
fn gradebook_rejects_keys_colliding_after_canonicalization() {
    let err = Gradebook::from_entries(vec![
        ("alice".to_string(), StudentRecord::new(10)),
        ("ALICE".to_string(), StudentRecord::new(11)),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        GradebookDataError::DuplicateKey(StudentKey::from_raw("alice").unwrap())
    );

    let err = Gradebook::from_entries(vec![(" ".to_string(), StudentRecord::new(10))]).unwrap_err();
    assert_eq!(err, GradebookDataError::BlankKey);
}

#[test]
fn gradebook_serializes_as_object_keyed_by_canonical_name() {
    let mut gradebook = Gradebook::new();
    let key = StudentKey::from_raw("Alice").unwrap();
    let mut record = StudentRecord::with_display_name(10, "Alice");
    record.set_score("math", 90);
    gradebook.insert(key, record);

    let value = serde_json::to_value(&gradebook).unwrap();
    assert_eq!(value["alice"]["total_score"], 90);
    assert_eq!(value["alice"]["display_name"], "Alice");

    let decoded: Gradebook = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, gradebook);
}
