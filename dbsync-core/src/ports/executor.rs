//! SQL execution port - runs scripts and statements against a schema

use std::path::{Path, PathBuf};

use thiserror::Error;

/// One result row; `None` is SQL NULL
pub type Row = Vec<Option<String>>;

/// Failure reported by an executor
///
/// `Transport` means the engine itself could not be reached (client missing,
/// listener down, bad credentials). Everything else is the SQL's own failure.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Sql(String),

    #[error("cannot read script {}: {source}", path.display())]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutionError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type ExecResult<T> = std::result::Result<T, ExecutionError>;

/// SQL flavour spoken by an executor; selects catalog and tracking-table SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    DuckDb,
    Oracle,
}

impl Dialect {
    /// Query returning one row per known schema, name in the first column
    pub fn list_schemas_sql(&self) -> &'static str {
        match self {
            Dialect::DuckDb => "SELECT schema_name FROM information_schema.schemata",
            Dialect::Oracle => "SELECT username FROM dba_users",
        }
    }
}

/// SQL execution engine abstraction
///
/// The core never knows whether statements go through an in-process driver
/// or an external client. Calls block until the engine is done; no timeout
/// is applied here.
pub trait SqlExecutor: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Case-insensitive match against the engine's list of schemas
    fn schema_exists(&self, name: &str) -> ExecResult<bool> {
        let wanted = name.to_lowercase();
        let rows = self.query(None, self.dialect().list_schemas_sql(), &[])?;
        Ok(rows.iter().any(|row| {
            row.first()
                .and_then(Option::as_deref)
                .is_some_and(|existing| existing.to_lowercase() == wanted)
        }))
    }

    /// Run the schema's creation script outside any schema context
    fn create_schema(&self, schema: &str, script: &Path) -> ExecResult<()>;

    /// Run one script file with `schema` as the current schema
    fn run_script(&self, schema: &str, script: &Path) -> ExecResult<()>;

    /// Run one statement with `?` text parameters, or a parameterless batch
    fn run_statement(&self, schema: &str, sql: &str, params: &[&str]) -> ExecResult<()>;

    /// Run a read query, optionally with `schema` as the current schema
    fn query(&self, schema: Option<&str>, sql: &str, params: &[&str]) -> ExecResult<Vec<Row>>;

    fn drop_schema(&self, schema: &str) -> ExecResult<()>;
}

/// Read a script file, mapping failures to [`ExecutionError::ScriptUnreadable`]
pub fn read_script(path: &Path) -> ExecResult<String> {
    std::fs::read_to_string(path).map_err(|source| ExecutionError::ScriptUnreadable {
        path: path.to_path_buf(),
        source,
    })
}
