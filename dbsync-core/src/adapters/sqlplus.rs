//! sqlplus executor implementation
//!
//! Drives Oracle through the `sqlplus` client: every call spawns
//! `sqlplus -S <connect>` and feeds the session on stdin.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use regex::Regex;

use crate::ports::{Dialect, ExecResult, ExecutionError, Row, SqlExecutor};

/// Oracle errors meaning the database could not be reached or logged into
const CONNECTION_ERRORS: &[&str] = &[
    "ORA-12541", // no listener
    "ORA-12514", // unknown service
    "ORA-12170", // connect timeout
    "ORA-01017", // invalid credentials
    "ORA-12154", // unresolved identifier
    "SP2-0306",  // invalid logon option
];

const COLUMN_SEPARATOR: char = '|';

/// Session settings that make query output machine readable
const QUERY_SETTINGS: &str = "SET HEADING OFF\nSET FEEDBACK OFF\nSET PAGESIZE 0\nSET LINESIZE 32767\nSET TRIMSPOOL ON\nSET TAB OFF\nSET COLSEP '|'\n";

fn error_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^((?:ORA|SP2|PLS)-\d{4,5}.*)$").expect("valid regex"))
}

/// Connection settings for the sqlplus client
#[derive(Debug, Clone)]
pub struct SqlPlusSettings {
    /// Client binary, `sqlplus` on PATH by default
    pub binary: PathBuf,
    /// `user/password@host:port/service`
    pub connect: String,
}

/// [`SqlExecutor`] that shells out to sqlplus
pub struct SqlPlusExecutor {
    settings: SqlPlusSettings,
}

impl SqlPlusExecutor {
    pub fn new(settings: SqlPlusSettings) -> Self {
        Self { settings }
    }

    /// Run one sqlplus session and return its stdout
    ///
    /// `WHENEVER SQLERROR EXIT 1` makes the first failing statement end the
    /// session with a non-zero status.
    fn run_session(&self, schema: Option<&str>, body: &str) -> ExecResult<String> {
        let mut input = String::from("WHENEVER SQLERROR EXIT 1\nWHENEVER OSERROR EXIT 2\n");
        if let Some(schema) = schema {
            input.push_str(&format!("ALTER SESSION SET CURRENT_SCHEMA = {};\n", schema));
        }
        input.push_str(body);
        if !body.ends_with('\n') {
            input.push('\n');
        }
        input.push_str("EXIT\n");

        tracing::debug!(binary = %self.settings.binary.display(), schema, "starting sqlplus session");

        let mut child = Command::new(&self.settings.binary)
            .arg("-S")
            .arg(&self.settings.connect)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ExecutionError::Transport(format!(
                    "cannot start {}: {}",
                    self.settings.binary.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| ExecutionError::Transport(format!("cannot write to sqlplus: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ExecutionError::Transport(format!("sqlplus did not finish: {}", e)))?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if output.status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_failure(&stdout, &stderr))
        }
    }
}

/// Turn a failed session's output into the right error class
fn classify_failure(stdout: &str, stderr: &str) -> ExecutionError {
    let combined = format!("{}\n{}", stdout, stderr);
    let message = error_line_regex()
        .captures(&combined)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| {
            let trimmed = combined.trim();
            if trimmed.is_empty() {
                "sqlplus exited with an error".to_string()
            } else {
                trimmed.to_string()
            }
        });

    if CONNECTION_ERRORS.iter().any(|code| combined.contains(code)) {
        ExecutionError::Transport(message)
    } else {
        ExecutionError::Sql(message)
    }
}

/// Substitute `?` placeholders outside string literals with quoted values
fn bind_params(sql: &str, params: &[&str]) -> ExecResult<String> {
    let mut bound = String::with_capacity(sql.len());
    let mut values = params.iter();
    let mut in_literal = false;

    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                bound.push(c);
            }
            '?' if !in_literal => {
                let value = values.next().ok_or_else(|| {
                    ExecutionError::Sql(format!("not enough parameters for statement: {}", sql))
                })?;
                bound.push('\'');
                bound.push_str(&value.replace('\'', "''"));
                bound.push('\'');
            }
            _ => bound.push(c),
        }
    }

    if values.next().is_some() {
        return Err(ExecutionError::Sql(format!(
            "too many parameters for statement: {}",
            sql
        )));
    }
    Ok(bound)
}

/// sqlplus needs a terminator to execute a statement
fn terminated(sql: &str) -> String {
    let trimmed = sql.trim_end();
    if trimmed.ends_with(';') || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

/// Split `COLSEP '|'` output into rows; empty cells become NULL
fn parse_rows(output: &str) -> Vec<Row> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split(COLUMN_SEPARATOR)
                .map(|cell| {
                    let cell = cell.trim();
                    (!cell.is_empty()).then(|| cell.to_string())
                })
                .collect()
        })
        .collect()
}

impl SqlExecutor for SqlPlusExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn create_schema(&self, _schema: &str, script: &Path) -> ExecResult<()> {
        if !script.is_file() {
            return Err(ExecutionError::ScriptUnreadable {
                path: script.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "script not found"),
            });
        }
        self.run_session(None, &format!("@\"{}\"", script.display()))?;
        Ok(())
    }

    fn run_script(&self, schema: &str, script: &Path) -> ExecResult<()> {
        if !script.is_file() {
            return Err(ExecutionError::ScriptUnreadable {
                path: script.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "script not found"),
            });
        }
        tracing::debug!(schema, script = %script.display(), "executing file");
        self.run_session(Some(schema), &format!("@\"{}\"", script.display()))?;
        Ok(())
    }

    fn run_statement(&self, schema: &str, sql: &str, params: &[&str]) -> ExecResult<()> {
        let body = terminated(&bind_params(sql, params)?);
        self.run_session(Some(schema), &body)?;
        Ok(())
    }

    fn query(&self, schema: Option<&str>, sql: &str, params: &[&str]) -> ExecResult<Vec<Row>> {
        let body = format!("{}{}", QUERY_SETTINGS, terminated(&bind_params(sql, params)?));
        let output = self.run_session(schema, &body)?;
        Ok(parse_rows(&output))
    }

    fn drop_schema(&self, schema: &str) -> ExecResult<()> {
        self.run_session(None, &format!("DROP USER {} CASCADE;", schema))?;
        Ok(())
    }
}
