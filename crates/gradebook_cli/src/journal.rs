//! Append-only text journal of student summaries.

use log::info;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const SEPARATOR_WIDTH: usize = 40;

/// Text file receiving one summary block per add/update.
#[derive(Debug, Clone)]
pub struct SummaryJournal {
    path: PathBuf,
}

impl SummaryJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `summary` followed by a dashed separator line.
    pub fn append(&self, summary: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{summary}")?;
        writeln!(file, "{}", "-".repeat(SEPARATOR_WIDTH))?;
        info!("event=journal_append module=cli status=ok");
        Ok(())
    }
}
