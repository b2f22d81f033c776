//! Configuration management
//!
//! Settings live in `<home>/settings.json`, where home is `DBSYNC_HOME` or
//! `~/.dbsync`:
//! ```json
//! {
//!   "sourceRoot": "/srv/db",
//!   "ignorePrefix": "_",
//!   "onScriptFailure": "abort",
//!   "engine": { "kind": "duckdb", "path": "app.duckdb" }
//! }
//! ```
//! or `"engine": { "kind": "sqlplus", "binary": "sqlplus", "connect": "system/pw@localhost:1521/XE" }`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_DATABASE_FILE: &str = "dbsync.duckdb";
const DEFAULT_IGNORE_PREFIX: &str = "_";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    source_root: Option<PathBuf>,
    #[serde(default)]
    ignore_prefix: Option<String>,
    #[serde(default)]
    on_script_failure: Option<FailurePolicy>,
    #[serde(default)]
    engine: Option<EngineSettings>,
}

/// Which execution engine to drive, with its connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EngineSettings {
    DuckDb {
        path: PathBuf,
    },
    SqlPlus {
        #[serde(default = "default_sqlplus_binary")]
        binary: PathBuf,
        connect: String,
    },
}

fn default_sqlplus_binary() -> PathBuf {
    PathBuf::from("sqlplus")
}

/// What a versioned script failure does to the rest of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run after the failing folder
    #[default]
    Abort,
    /// Stop only the failing folder and carry on with later versions
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(Error::config(format!(
                "unknown script failure policy '{}' (expected abort or continue)",
                other
            ))),
        }
    }
}

/// Resolved, immutable configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub home: PathBuf,
    /// Directory holding one folder per schema
    pub source_root: PathBuf,
    /// File and directory names starting with this are skipped
    pub ignore_prefix: String,
    pub on_script_failure: FailurePolicy,
    pub engine: EngineSettings,
}

impl Config {
    /// `DBSYNC_HOME`, or `~/.dbsync`
    pub fn default_home() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("DBSYNC_HOME") {
            return Ok(PathBuf::from(dir));
        }
        dirs::home_dir()
            .map(|home| home.join(".dbsync"))
            .ok_or_else(|| Error::config("could not find home directory; set DBSYNC_HOME"))
    }

    /// Load config from the home directory, applying environment overrides
    ///
    /// Overrides: `DBSYNC_ROOT`, `DBSYNC_DUCKDB_PATH`, `DBSYNC_SQLPLUS_CONNECT`
    /// (switches the engine to sqlplus) and `DBSYNC_ON_SCRIPT_FAILURE`.
    pub fn load(home: &Path) -> Result<Self> {
        let settings_path = home.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).map_err(|e| {
                Error::config(format!("invalid {}: {}", settings_path.display(), e))
            })?
        } else {
            SettingsFile::default()
        };

        Self::resolve(home, raw, |key| std::env::var(key).ok())
    }

    fn resolve(home: &Path, raw: SettingsFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source_root = env("DBSYNC_ROOT")
            .map(PathBuf::from)
            .or(raw.source_root)
            .unwrap_or_else(|| PathBuf::from("."));

        let on_script_failure = match env("DBSYNC_ON_SCRIPT_FAILURE") {
            Some(value) => value.parse()?,
            None => raw.on_script_failure.unwrap_or_default(),
        };

        let mut engine = raw.engine.unwrap_or_else(|| EngineSettings::DuckDb {
            path: PathBuf::from(DEFAULT_DATABASE_FILE),
        });
        if let Some(connect) = env("DBSYNC_SQLPLUS_CONNECT") {
            let binary = match engine {
                EngineSettings::SqlPlus { binary, .. } => binary,
                EngineSettings::DuckDb { .. } => default_sqlplus_binary(),
            };
            engine = EngineSettings::SqlPlus { binary, connect };
        } else if let Some(path) = env("DBSYNC_DUCKDB_PATH") {
            engine = EngineSettings::DuckDb {
                path: PathBuf::from(path),
            };
        }
        if let EngineSettings::DuckDb { path } = &mut engine {
            if path.is_relative() {
                *path = home.join(&*path);
            }
        }

        let ignore_prefix = raw
            .ignore_prefix
            .unwrap_or_else(|| DEFAULT_IGNORE_PREFIX.to_string());
        if ignore_prefix.is_empty() {
            return Err(Error::config("ignorePrefix must not be empty"));
        }

        Ok(Self {
            home: home.to_path_buf(),
            source_root,
            ignore_prefix,
            on_script_failure,
            engine,
        })
    }

    pub fn with_source_root(mut self, root: PathBuf) -> Self {
        self.source_root = root;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_script_failure = policy;
        self
    }
}
