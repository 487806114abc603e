//! Runtime configuration.
//!
//! # Responsibility
//! - Load grading bounds, storage backend and logging settings from TOML.
//! - Resolve relative paths against the working directory.
//!
//! # Invariants
//! - Every field has a default; an absent config file is not an error.
//! - Bounds with `min > max` are rejected at load time.

use crate::logging::default_log_level;
use crate::model::validation::{
    FieldBounds, GradePolicy, DEFAULT_AGE_MAX, DEFAULT_AGE_MIN, DEFAULT_SCORE_MAX,
    DEFAULT_SCORE_MIN,
};
use serde::Deserialize;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "GRADEBOOK_CONFIG";
/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "gradebook.toml";

const DEFAULT_JSON_FILE: &str = "gradebook.json";
const DEFAULT_SQLITE_FILE: &str = "gradebook.sqlite3";
const DEFAULT_LOG_SUBDIR: &str = "logs";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
    InvalidBounds {
        field: &'static str,
        min: u32,
        max: u32,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse {
                path: Some(path),
                source,
            } => write!(f, "invalid config `{}`: {source}", path.display()),
            Self::Parse { path: None, source } => write!(f, "invalid config: {source}"),
            Self::InvalidBounds { field, min, max } => {
                write!(f, "{field} bounds are inverted: min {min} > max {max}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidBounds { .. } => None,
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundsConfig {
    pub age_min: u32,
    pub age_max: u32,
    pub score_min: u32,
    pub score_max: u32,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            age_min: DEFAULT_AGE_MIN,
            age_max: DEFAULT_AGE_MAX,
            score_min: DEFAULT_SCORE_MIN,
            score_max: DEFAULT_SCORE_MAX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data file; defaults per backend.
    pub path: Option<PathBuf>,
    /// Optional text file receiving a summary after each add/update.
    pub summary_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Log directory; defaults to `logs/` next to the data file.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Top-level gradebook configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradebookConfig {
    pub bounds: BoundsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl GradebookConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })?;
        config.grade_policy()?;
        Ok(config)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    /// Loads config from `$GRADEBOOK_CONFIG`, else `./gradebook.toml` when it
    /// exists, else defaults.
    pub fn discover(cwd: &Path) -> Result<Self, ConfigError> {
        Self::discover_with(std::env::var_os(CONFIG_ENV_VAR), cwd)
    }

    fn discover_with(explicit: Option<OsString>, cwd: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit.filter(|value| !value.is_empty()) {
            return Self::load_file(cwd.join(path));
        }
        let local = cwd.join(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load_file(local);
        }
        Ok(Self::default())
    }

    /// Validation bounds derived from `[bounds]`.
    pub fn grade_policy(&self) -> Result<GradePolicy, ConfigError> {
        let b = &self.bounds;
        let age = FieldBounds::new(b.age_min, b.age_max).ok_or(ConfigError::InvalidBounds {
            field: "age",
            min: b.age_min,
            max: b.age_max,
        })?;
        let score =
            FieldBounds::new(b.score_min, b.score_max).ok_or(ConfigError::InvalidBounds {
                field: "score",
                min: b.score_min,
                max: b.score_max,
            })?;
        Ok(GradePolicy { age, score })
    }

    /// Absolute data file path for the selected backend.
    pub fn data_path(&self, cwd: &Path) -> PathBuf {
        let path = self.storage.path.clone().unwrap_or_else(|| {
            PathBuf::from(match self.storage.backend {
                StorageBackend::Json => DEFAULT_JSON_FILE,
                StorageBackend::Sqlite => DEFAULT_SQLITE_FILE,
            })
        });
        cwd.join(path)
    }

    pub fn summary_log_path(&self, cwd: &Path) -> Option<PathBuf> {
        self.storage.summary_log.as_ref().map(|path| cwd.join(path))
    }

    /// Absolute log directory.
    pub fn log_dir(&self, cwd: &Path) -> PathBuf {
        match &self.logging.dir {
            Some(dir) => cwd.join(dir),
            None => self
                .data_path(cwd)
                .parent()
                .map(|parent| parent.join(DEFAULT_LOG_SUBDIR))
                .unwrap_or_else(|| cwd.join(DEFAULT_LOG_SUBDIR)),
        }
    }
}
