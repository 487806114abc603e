//! JSON file snapshot store.
//!
//! # Responsibility
//! - Persist the gradebook as one pretty-printed JSON object keyed by
//!   canonical student name.
//!
//! # Invariants
//! - A missing file loads as an empty gradebook.
//! - Saves go through a temp file in the target directory and an atomic
//!   rename, so readers never observe a half-written snapshot.
//! - An undecodable file is copied to `<file>.corrupt` before the error is
//!   returned. When no copy exists the service refuses to save over it.

use crate::model::student::Gradebook;
use crate::store::record_store::{self, RecordStore, StoreError, StoreResult};
use log::{info, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Snapshot store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the copy taken when the file cannot be decoded.
    pub fn corrupt_copy_path(&self) -> PathBuf {
        record_store::corrupt_copy_path(&self.path)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            location: self.location(),
            source,
        }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> StoreResult<Gradebook> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("event=store_load module=store backend=json status=ok students=0 source=missing");
                return Ok(Gradebook::new());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            info!("event=store_load module=store backend=json status=ok students=0 source=empty");
            return Ok(Gradebook::new());
        }

        match serde_json::from_slice::<Gradebook>(&bytes) {
            Ok(gradebook) => {
                info!(
                    "event=store_load module=store backend=json status=ok students={}",
                    gradebook.len()
                );
                Ok(gradebook)
            }
            Err(err) => {
                let backup = record_store::keep_corrupt_copy(&self.path, "json");
                warn!(
                    "event=store_load module=store backend=json status=error error_code=corrupt line={} column={}",
                    err.line(),
                    err.column()
                );
                Err(StoreError::Corrupt {
                    location: self.location(),
                    message: err.to_string(),
                    backup,
                })
            }
        }
    }

    fn save(&mut self, gradebook: &Gradebook) -> StoreResult<()> {
        let dir = self.parent_dir().to_path_buf();
        fs::create_dir_all(&dir).map_err(|err| self.io_error(err))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|err| self.io_error(err))?;
        serde_json::to_writer_pretty(&mut tmp, gradebook)
            .map_err(|err| self.io_error(err.into()))?;
        tmp.write_all(b"\n").map_err(|err| self.io_error(err))?;
        tmp.as_file().sync_all().map_err(|err| self.io_error(err))?;
        tmp.persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;

        info!(
            "event=store_save module=store backend=json status=ok students={}",
            gradebook.len()
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
