//! CLI command implementations

pub mod drop;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use dbsync_core::{Config, EngineSettings, SyncContext};

/// How a command finished when it did not error out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// At least one script failed; exits non-zero
    ScriptsFailed,
}

/// Initialize stderr logging
///
/// `RUST_LOG` wins when set; otherwise warn, raised by `-v` and `-vv`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn require_schema(schema: Option<&str>) -> Result<String> {
    match schema.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => bail!("No schema given; pass --schema or set DBSYNC_SCHEMA"),
    }
}

/// Load configuration, letting `--root` override the configured source root
pub fn load_config(root: Option<PathBuf>) -> Result<Config> {
    let home = Config::default_home()?;
    let config = Config::load(&home)
        .with_context(|| format!("Failed to load configuration from {}", home.display()))?;

    Ok(match root {
        Some(root) => config.with_source_root(root),
        None => config,
    })
}

/// Connect to the configured database
pub fn get_context(config: Config) -> Result<SyncContext> {
    if let EngineSettings::DuckDb { path } = &config.engine {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create database directory: {}", dir.display()))?;
        }
    }

    let target = describe_engine(&config.engine);
    tracing::debug!(engine = %target, root = %config.source_root.display(), "connecting");
    SyncContext::new(config).with_context(|| format!("Failed to connect to {}", target))
}

/// Human-readable engine description, never including credentials
pub fn describe_engine(engine: &EngineSettings) -> String {
    match engine {
        EngineSettings::DuckDb { path } => format!("DuckDB database {}", path.display()),
        EngineSettings::SqlPlus { connect, .. } => {
            let target = connect.rsplit('@').next().unwrap_or(connect);
            if target == connect.as_str() {
                "Oracle via sqlplus".to_string()
            } else {
                format!("Oracle at {} via sqlplus", target)
            }
        }
    }
}
