//! DuckDB executor implementation
//!
//! Schemas are plain DuckDB schemas inside one database file. Scripts run as
//! batches after `SET schema`, so unqualified names land in the target schema.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use duckdb::types::ValueRef;
use duckdb::{params_from_iter, Connection};

use crate::ports::{read_script, Dialect, ExecResult, ExecutionError, Row, SqlExecutor};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Schema selected when a statement must run outside the target schema
const DEFAULT_SCHEMA: &str = "main";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

impl From<duckdb::Error> for ExecutionError {
    fn from(err: duckdb::Error) -> Self {
        ExecutionError::Sql(err.to_string())
    }
}

/// DuckDB-backed [`SqlExecutor`]
pub struct DuckDbExecutor {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbExecutor {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock. Any failure to open is a transport error.
    pub fn open(db_path: &Path) -> ExecResult<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    attempt += 1;
                    if !is_retryable_error(&err_msg) || attempt >= MAX_RETRIES {
                        return Err(ExecutionError::Transport(format!(
                            "cannot open {}: {}",
                            db_path.display(),
                            err_msg
                        )));
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                    tracing::warn!(
                        path = %db_path.display(),
                        attempt,
                        max = MAX_RETRIES,
                        "database busy, retrying in {}ms: {}",
                        delay.as_millis(),
                        err_msg
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> ExecResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ExecutionError::Transport(format!("cannot open in-memory database: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading pulls cached binaries from ~/.duckdb; keep it off
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> ExecResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ExecutionError::Transport(format!("connection mutex poisoned: {}", e)))
    }

    fn use_schema(conn: &Connection, schema: &str) -> ExecResult<()> {
        conn.execute_batch(&format!("SET schema = '{}';", schema))?;
        Ok(())
    }
}

/// Render one cell as text, the way the sqlplus client would print it
fn cell_to_string(row: &duckdb::Row, idx: usize) -> ExecResult<Option<String>> {
    let value = match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Boolean(b) => Some(b.to_string()),
        ValueRef::TinyInt(i) => Some(i.to_string()),
        ValueRef::SmallInt(i) => Some(i.to_string()),
        ValueRef::Int(i) => Some(i.to_string()),
        ValueRef::BigInt(i) => Some(i.to_string()),
        ValueRef::HugeInt(i) => Some(i.to_string()),
        ValueRef::UTinyInt(i) => Some(i.to_string()),
        ValueRef::USmallInt(i) => Some(i.to_string()),
        ValueRef::UInt(i) => Some(i.to_string()),
        ValueRef::UBigInt(i) => Some(i.to_string()),
        ValueRef::Float(f) => Some(f.to_string()),
        ValueRef::Double(f) => Some(f.to_string()),
        ValueRef::Decimal(d) => Some(d.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Blob(bytes) => Some(format!("<blob {} bytes>", bytes.len())),
        ValueRef::Date32(days) => chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .map(|epoch| (epoch + chrono::Duration::days(i64::from(days))).to_string()),
        ValueRef::Timestamp(unit, ts) => chrono::DateTime::from_timestamp_micros(unit.to_micros(ts))
            .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        _ => None,
    };
    Ok(value)
}

impl SqlExecutor for DuckDbExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn create_schema(&self, _schema: &str, script: &Path) -> ExecResult<()> {
        let sql = read_script(script)?;
        let conn = self.lock()?;
        Self::use_schema(&conn, DEFAULT_SCHEMA)?;
        conn.execute_batch(&sql)?;
        Ok(())
    }

    fn run_script(&self, schema: &str, script: &Path) -> ExecResult<()> {
        let sql = read_script(script)?;
        let conn = self.lock()?;
        Self::use_schema(&conn, schema)?;
        conn.execute_batch(&sql)?;
        Ok(())
    }

    fn run_statement(&self, schema: &str, sql: &str, params: &[&str]) -> ExecResult<()> {
        let conn = self.lock()?;
        Self::use_schema(&conn, schema)?;
        if params.is_empty() {
            conn.execute_batch(sql)?;
        } else {
            conn.execute(sql, params_from_iter(params.iter()))?;
        }
        Ok(())
    }

    fn query(&self, schema: Option<&str>, sql: &str, params: &[&str]) -> ExecResult<Vec<Row>> {
        let conn = self.lock()?;
        Self::use_schema(&conn, schema.unwrap_or(DEFAULT_SCHEMA))?;

        let mut stmt = conn.prepare(sql)?;
        let mut result_rows = stmt.query(params_from_iter(params.iter()))?;

        let mut rows = Vec::new();
        while let Some(row) = result_rows.next()? {
            let column_count = row.as_ref().column_count();
            let mut cells = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                cells.push(cell_to_string(row, idx)?);
            }
            rows.push(cells);
        }
        Ok(rows)
    }

    fn drop_schema(&self, schema: &str) -> ExecResult<()> {
        let conn = self.lock()?;
        Self::use_schema(&conn, DEFAULT_SCHEMA)?;
        conn.execute_batch(&format!("DROP SCHEMA {} CASCADE;", schema))?;
        Ok(())
    }
}
