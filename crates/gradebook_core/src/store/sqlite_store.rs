//! SQLite snapshot store.
//!
//! # Responsibility
//! - Persist the gradebook in `students` / `student_subjects` tables.
//! - Create the schema on first open and refuse databases from newer builds.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - `save` replaces every row inside one transaction.
//! - Read paths reject inconsistent rows instead of masking them, after
//!   copying the database file to `<file>.corrupt`.

use crate::model::student::{Gradebook, StudentRecord};
use crate::store::record_store::{self, RecordStore, StoreError, StoreResult};
use log::{error, info, warn};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const SCHEMA_SQL: &str = include_str!("sqlite_schema.sql");

/// Persisted student row before subjects are attached.
struct StudentRow {
    key: String,
    display_name: Option<String>,
    age: u32,
    total_score: i64,
    count_scores: i64,
}

/// Snapshot store backed by a SQLite database.
pub struct SqliteRecordStore {
    conn: Connection,
    /// `None` for in-memory databases.
    path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Schema version written to `PRAGMA user_version`.
    pub const SCHEMA_VERSION: u32 = 1;

    /// Opens the database file at `path`, creating file and schema if needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        Self::prepare(conn, Some(path))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::prepare(Connection::open_in_memory()?, None)
    }

    /// Path of the copy taken when stored rows cannot be read back.
    pub fn corrupt_copy_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(record_store::corrupt_copy_path)
    }

    fn prepare(mut conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if found > Self::SCHEMA_VERSION {
            error!(
                "event=store_open module=store backend=sqlite status=error found_version={} supported_version={}",
                found,
                Self::SCHEMA_VERSION
            );
            return Err(StoreError::UnsupportedSchema {
                location: location_of(path.as_deref()),
                found,
                supported: Self::SCHEMA_VERSION,
            });
        }
        if found < Self::SCHEMA_VERSION {
            let tx = conn.transaction()?;
            tx.execute_batch(SCHEMA_SQL)?;
            tx.execute_batch(&format!("PRAGMA user_version = {};", Self::SCHEMA_VERSION))?;
            tx.commit()?;
            info!(
                "event=store_schema module=store backend=sqlite status=created version={}",
                Self::SCHEMA_VERSION
            );
        }

        info!("event=store_open module=store backend=sqlite status=ok");
        Ok(Self { conn, path })
    }

    fn read_gradebook(&self) -> StoreResult<Gradebook> {
        let mut subjects = self.load_subjects()?;
        let mut entries = Vec::new();

        for row in self.load_students()? {
            let total_score = u64::try_from(row.total_score).map_err(|_| {
                StoreError::InvalidData(format!(
                    "negative total_score `{}` in students.total_score",
                    row.total_score
                ))
            })?;
            let count_scores = usize::try_from(row.count_scores).map_err(|_| {
                StoreError::InvalidData(format!(
                    "negative count_scores `{}` in students.count_scores",
                    row.count_scores
                ))
            })?;
            let record = StudentRecord::restore(
                row.display_name,
                row.age,
                subjects.remove(&row.key).unwrap_or_default(),
                total_score,
                count_scores,
            )
            .map_err(|err| StoreError::InvalidData(format!("student `{}`: {err}", row.key)))?;
            entries.push((row.key, record));
        }

        if let Some(orphan) = subjects.keys().next() {
            return Err(StoreError::InvalidData(format!(
                "subjects reference unknown student `{orphan}`"
            )));
        }

        Gradebook::from_entries(entries).map_err(|err| StoreError::InvalidData(err.to_string()))
    }

    fn load_subjects(&self) -> StoreResult<BTreeMap<String, Vec<(String, u32)>>> {
        let mut stmt = self.conn.prepare(
            "SELECT student_key, subject, score
             FROM student_subjects
             ORDER BY student_key ASC, subject ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>("student_key")?,
                row.get::<_, String>("subject")?,
                row.get::<_, u32>("score")?,
            ))
        })?;

        let mut subjects: BTreeMap<String, Vec<(String, u32)>> = BTreeMap::new();
        for row in rows {
            let (key, subject, score) = row?;
            subjects.entry(key).or_default().push((subject, score));
        }
        Ok(subjects)
    }

    fn load_students(&self) -> StoreResult<Vec<StudentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT student_key, display_name, age, total_score, count_scores
             FROM students
             ORDER BY student_key ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StudentRow {
                key: row.get("student_key")?,
                display_name: row.get("display_name")?,
                age: row.get("age")?,
                total_score: row.get("total_score")?,
                count_scores: row.get("count_scores")?,
            })
        })?;
        let mut students = Vec::new();
        for row in rows {
            students.push(row?);
        }
        Ok(students)
    }
}

impl RecordStore for SqliteRecordStore {
    fn load(&self) -> StoreResult<Gradebook> {
        match self.read_gradebook() {
            Ok(gradebook) => {
                info!(
                    "event=store_load module=store backend=sqlite status=ok students={}",
                    gradebook.len()
                );
                Ok(gradebook)
            }
            Err(err) => {
                let backup = self
                    .path
                    .as_deref()
                    .and_then(|path| record_store::keep_corrupt_copy(path, "sqlite"));
                warn!("event=store_load module=store backend=sqlite status=error error_code=corrupt");
                Err(StoreError::Corrupt {
                    location: self.location(),
                    message: err.to_string(),
                    backup,
                })
            }
        }
    }

    fn save(&mut self, gradebook: &Gradebook) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM student_subjects;", [])?;
        tx.execute("DELETE FROM students;", [])?;
        {
            let mut insert_student = tx.prepare(
                "INSERT INTO students (
                    student_key,
                    display_name,
                    age,
                    total_score,
                    count_scores
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            let mut insert_subject = tx.prepare(
                "INSERT INTO student_subjects (student_key, subject, score)
                 VALUES (?1, ?2, ?3);",
            )?;

            for (key, record) in gradebook.iter() {
                let total_score = i64::try_from(record.total_score()).map_err(|_| {
                    StoreError::InvalidData(format!("total_score overflow for `{key}`"))
                })?;
                let count_scores = i64::try_from(record.count_scores()).map_err(|_| {
                    StoreError::InvalidData(format!("count_scores overflow for `{key}`"))
                })?;
                insert_student.execute(params![
                    key.as_str(),
                    record.display_name(),
                    record.age(),
                    total_score,
                    count_scores,
                ])?;
                for (subject, score) in record.subjects() {
                    insert_subject.execute(params![key.as_str(), subject.as_str(), score])?;
                }
            }
        }
        tx.commit()?;

        info!(
            "event=store_save module=store backend=sqlite status=ok students={}",
            gradebook.len()
        );
        Ok(())
    }

    fn location(&self) -> String {
        location_of(self.path.as_deref())
    }
}

fn location_of(path: Option<&Path>) -> String {
    path.map_or_else(|| ":memory:".to_string(), |path| path.display().to_string())
}
