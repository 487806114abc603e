//! Record store trait, error type and in-memory implementation.

use crate::model::student::Gradebook;
use log::warn;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub type StoreResult<T> = Result<T, StoreError>;

const CORRUPT_SUFFIX: &str = ".corrupt";

/// Persistence error for snapshot load/save operations.
#[derive(Debug)]
pub enum StoreError {
    Io {
        location: String,
        source: std::io::Error,
    },
    /// Persisted state exists but cannot be decoded or fails integrity checks.
    ///
    /// `backup` names the copy taken before the error was returned, if any.
    Corrupt {
        location: String,
        message: String,
        backup: Option<PathBuf>,
    },
    Sqlite(rusqlite::Error),
    /// Database written by a newer schema than this build understands.
    UnsupportedSchema {
        location: String,
        found: u32,
        supported: u32,
    },
    InvalidData(String),
    /// Save skipped because it would replace data that failed to load and
    /// was not copied aside.
    OverwriteRefused { location: String },
}

impl StoreError {
    /// Copy of the unreadable data taken during load, if one exists.
    pub fn backup(&self) -> Option<&Path> {
        match self {
            Self::Corrupt {
                backup: Some(path), ..
            } => Some(path),
            _ => None,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { location, source } => write!(f, "i/o error on `{location}`: {source}"),
            Self::Corrupt {
                location,
                message,
                backup,
            } => {
                write!(f, "gradebook data in `{location}` is unreadable: {message}")?;
                if let Some(backup) = backup {
                    write!(f, " (copy kept at `{}`)", backup.display())?;
                }
                Ok(())
            }
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchema {
                location,
                found,
                supported,
            } => write!(
                f,
                "gradebook database `{location}` has schema version {found}, newer than supported {supported}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted gradebook data: {message}"),
            Self::OverwriteRefused { location } => write!(
                f,
                "saving is paused so the unreadable data at `{location}` is not overwritten"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// `<path>.corrupt`, next to the data file.
pub(crate) fn corrupt_copy_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(CORRUPT_SUFFIX);
    PathBuf::from(name)
}

/// Copies an unreadable data file aside; `None` when the copy failed.
pub(crate) fn keep_corrupt_copy(path: &Path, backend: &str) -> Option<PathBuf> {
    let target = corrupt_copy_path(path);
    match fs::copy(path, &target) {
        Ok(_) => {
            warn!("event=store_backup module=store backend={backend} status=ok");
            Some(target)
        }
        Err(err) => {
            warn!(
                "event=store_backup module=store backend={backend} status=error error={}",
                err
            );
            None
        }
    }
}

/// Snapshot persistence used by the gradebook service.
pub trait RecordStore {
    /// Reads the full gradebook; empty when nothing was saved yet.
    fn load(&self) -> StoreResult<Gradebook>;
    /// Replaces all persisted state with `gradebook`.
    fn save(&mut self, gradebook: &Gradebook) -> StoreResult<()>;
    /// Human-readable location used in messages and logs.
    fn location(&self) -> String;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn load(&self) -> StoreResult<Gradebook> {
        (**self).load()
    }

    fn save(&mut self, gradebook: &Gradebook) -> StoreResult<()> {
        (**self).save(gradebook)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

/// Process-local store holding the last saved snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    snapshot: Option<Gradebook>,
    saves: usize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing snapshot, as if it had been saved before.
    pub fn with_snapshot(gradebook: Gradebook) -> Self {
        Self {
            snapshot: Some(gradebook),
            saves: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&Gradebook> {
        self.snapshot.as_ref()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self) -> StoreResult<Gradebook> {
        Ok(self.snapshot.clone().unwrap_or_default())
    }

    fn save(&mut self, gradebook: &Gradebook) -> StoreResult<()> {
        self.snapshot = Some(gradebook.clone());
        self.saves += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
