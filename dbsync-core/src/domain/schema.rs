//! Target schema and its on-disk source fixtures

use std::path::{Path, PathBuf};

use super::result::{Error, Result};
use crate::ports::Dialect;

/// Name of the one-time creation script inside a schema folder
pub const CREATE_SCRIPT: &str = "create.user.sql";

/// Directory of untracked scripts run once, right after creation
pub const BASELINE_DIR: &str = "baseline";

/// Directory holding one subdirectory per version
pub const VERSIONS_DIR: &str = "versions";

/// A validated schema name bound to its source folder
///
/// The name is interpolated into DDL (`DROP SCHEMA x`, `x.dbsync_script_history`),
/// so only plain identifiers are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    source_dir: PathBuf,
}

impl Schema {
    pub fn new(root: &Path, name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            source_dir: root.join(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<root>/<schema>`
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn create_script(&self) -> PathBuf {
        self.source_dir.join(CREATE_SCRIPT)
    }

    pub fn baseline_dir(&self) -> PathBuf {
        self.source_dir.join(BASELINE_DIR)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.source_dir.join(VERSIONS_DIR)
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_$#]*`, the portable unquoted identifier shape
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSchemaName(name.to_string()))
    }
}

/// [`validate_name`], narrowed to what `dialect` accepts unquoted
///
/// DuckDB identifiers cannot contain `#`.
pub fn validate_name_for(name: &str, dialect: Dialect) -> Result<()> {
    validate_name(name)?;
    if dialect == Dialect::DuckDb && name.contains('#') {
        return Err(Error::InvalidSchemaName(name.to_string()));
    }
    Ok(())
}
