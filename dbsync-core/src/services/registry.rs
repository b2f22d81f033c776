//! Applied-script registry - the tracking table inside each schema
//!
//! One append-only row per successfully applied script:
//! `(id, version, script, applied_at)`, ids drawn from a sequence.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::{AppliedIndex, ScriptRecord, Version};
use crate::ports::{Dialect, SqlExecutor};

pub const TRACKING_TABLE: &str = "dbsync_script_history";
pub const TRACKING_SEQUENCE: &str = "dbsync_script_history_seq";

/// Written with microsecond precision, read back with any precision
const WRITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const READ_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn storage_exists_sql(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::DuckDb => {
            "SELECT count(*) FROM information_schema.tables \
             WHERE lower(table_schema) = lower(?) AND table_name = ?"
        }
        Dialect::Oracle => {
            "SELECT count(*) FROM all_tables WHERE owner = UPPER(?) AND table_name = UPPER(?)"
        }
    }
}

fn create_storage_sql(dialect: Dialect, schema: &str) -> String {
    match dialect {
        Dialect::DuckDb => format!(
            "CREATE SEQUENCE IF NOT EXISTS {schema}.{TRACKING_SEQUENCE} START 1; \
             CREATE TABLE IF NOT EXISTS {schema}.{TRACKING_TABLE} ( \
             id BIGINT PRIMARY KEY DEFAULT nextval('{schema}.{TRACKING_SEQUENCE}'), \
             version VARCHAR NOT NULL, \
             script VARCHAR NOT NULL, \
             applied_at TIMESTAMP NOT NULL);"
        ),
        Dialect::Oracle => [
            format!("CREATE SEQUENCE {schema}.{TRACKING_SEQUENCE} START WITH 1 INCREMENT BY 1"),
            format!(
                "CREATE TABLE {schema}.{TRACKING_TABLE} ( \
                 id NUMBER(19) PRIMARY KEY, \
                 version VARCHAR2(50) NOT NULL, \
                 script VARCHAR2(400) NOT NULL, \
                 applied_at TIMESTAMP DEFAULT SYSTIMESTAMP NOT NULL)"
            ),
        ]
        .iter()
        .map(|ddl| oracle_create_if_missing(ddl))
        .collect::<Vec<_>>()
        .join("\n"),
    }
}

/// PL/SQL block running `ddl`, tolerating ORA-00955 (name already used)
///
/// Oracle has no `IF NOT EXISTS`; a pass that created the sequence but not
/// the table must still be able to finish on the next run.
fn oracle_create_if_missing(ddl: &str) -> String {
    format!(
        "BEGIN\n  EXECUTE IMMEDIATE '{}';\n\
         EXCEPTION WHEN OTHERS THEN\n  IF SQLCODE != -955 THEN RAISE; END IF;\n\
         END;\n/",
        ddl.replace('\'', "''")
    )
}

/// Insert statement and whether it takes the timestamp as a third parameter
fn insert_sql(dialect: Dialect, schema: &str) -> (String, bool) {
    match dialect {
        // Timestamps are computed in Rust; DuckDB's current_timestamp is TIMESTAMPTZ
        Dialect::DuckDb => (
            format!(
                "INSERT INTO {schema}.{TRACKING_TABLE} (version, script, applied_at) \
                 VALUES (?, ?, CAST(? AS TIMESTAMP))"
            ),
            true,
        ),
        Dialect::Oracle => (
            format!(
                "INSERT INTO {schema}.{TRACKING_TABLE} (id, version, script) \
                 VALUES ({schema}.{TRACKING_SEQUENCE}.NEXTVAL, ?, ?)"
            ),
            false,
        ),
    }
}

fn history_sql(dialect: Dialect, schema: &str) -> String {
    match dialect {
        Dialect::DuckDb => format!(
            "SELECT id, version, script, CAST(applied_at AS VARCHAR) FROM {schema}.{TRACKING_TABLE} ORDER BY id"
        ),
        Dialect::Oracle => format!(
            "SELECT id, version, script, TO_CHAR(applied_at, 'YYYY-MM-DD HH24:MI:SS.FF6') \
             FROM {schema}.{TRACKING_TABLE} ORDER BY id"
        ),
    }
}

/// Durable record of applied scripts, one table per schema
pub struct ScriptRegistry {
    executor: Arc<dyn SqlExecutor>,
}

impl ScriptRegistry {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    /// Whether the tracking table exists; false when the schema itself is missing
    pub fn storage_exists(&self, schema: &str) -> Result<bool> {
        let sql = storage_exists_sql(self.executor.dialect());
        let rows = self
            .executor
            .query(None, sql, &[schema, TRACKING_TABLE])
            .map_err(|e| Error::from_execution(e, Error::Database))?;

        let count = rows
            .first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.as_deref())
            .and_then(|cell| cell.trim().parse::<i64>().ok())
            .ok_or_else(|| Error::database("unexpected result from tracking table lookup"))?;
        Ok(count > 0)
    }

    /// Create the tracking sequence and table if absent; safe to call every run
    pub fn ensure_storage_exists(&self, schema: &str) -> Result<()> {
        let storage_failed = |reason| Error::TrackingStorageFailed {
            schema: schema.to_string(),
            reason,
        };

        if self.storage_exists(schema).map_err(|e| match e {
            Error::Transport(msg) => Error::Transport(msg),
            other => storage_failed(other.to_string()),
        })? {
            return Ok(());
        }

        tracing::info!(schema, table = TRACKING_TABLE, "creating tracking storage");
        let ddl = create_storage_sql(self.executor.dialect(), schema);
        self.executor
            .run_statement(schema, &ddl, &[])
            .map_err(|e| Error::from_execution(e, storage_failed))
    }

    /// Snapshot of applied scripts grouped by normalized version
    ///
    /// Missing storage yields an empty index.
    pub fn load_applied_index(&self, schema: &str) -> Result<AppliedIndex> {
        if !self.storage_exists(schema)? {
            tracing::debug!(schema, "no tracking storage yet");
            return Ok(AppliedIndex::new());
        }

        let sql = format!("SELECT version, script FROM {schema}.{TRACKING_TABLE} ORDER BY id");
        let rows = self
            .executor
            .query(Some(schema), &sql, &[])
            .map_err(|e| Error::from_execution(e, Error::Database))?;

        let pairs = rows.into_iter().filter_map(|row| {
            let mut cells = row.into_iter();
            match (cells.next().flatten(), cells.next().flatten()) {
                (Some(version), Some(script)) => Some((version, script)),
                _ => {
                    tracing::warn!(schema, "skipping tracking row with NULL version or script");
                    None
                }
            }
        });
        Ok(AppliedIndex::from_rows(pairs))
    }

    /// Append one record; any failure here is fatal for the run
    pub fn record_applied(&self, schema: &str, version: &Version, script_id: &str) -> Result<()> {
        let key = version.normalized_key();
        let (sql, with_timestamp) = insert_sql(self.executor.dialect(), schema);
        let now = Utc::now().naive_utc().format(WRITE_TIMESTAMP_FORMAT).to_string();

        let mut params = vec![key.as_str(), script_id];
        if with_timestamp {
            params.push(now.as_str());
        }

        self.executor
            .run_statement(schema, &sql, &params)
            .map_err(|e| {
                Error::from_execution(e, |reason| Error::RecordWriteFailed {
                    schema: schema.to_string(),
                    version: key.clone(),
                    script_id: script_id.to_string(),
                    reason,
                })
            })
    }

    /// Every record, oldest first
    pub fn history(&self, schema: &str) -> Result<Vec<ScriptRecord>> {
        if !self.storage_exists(schema)? {
            return Ok(Vec::new());
        }

        let sql = history_sql(self.executor.dialect(), schema);
        let rows = self
            .executor
            .query(Some(schema), &sql, &[])
            .map_err(|e| Error::from_execution(e, Error::Database))?;

        rows.into_iter()
            .map(|row| {
                let cell = |idx: usize| row.get(idx).cloned().flatten();
                let id = cell(0)
                    .and_then(|id| id.trim().parse::<i64>().ok())
                    .ok_or_else(|| Error::database("tracking row without a numeric id"))?;
                Ok(ScriptRecord {
                    id,
                    version: cell(1).unwrap_or_default(),
                    script_id: cell(2).unwrap_or_default(),
                    applied_at: cell(3).and_then(|ts| {
                        NaiveDateTime::parse_from_str(ts.trim(), READ_TIMESTAMP_FORMAT).ok()
                    }),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbExecutor;

    fn registry_with_schema(schema: &str) -> (Arc<DuckDbExecutor>, ScriptRegistry) {
        let executor = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
        executor
            .run_statement("main", &format!("CREATE SCHEMA {};", schema), &[])
            .unwrap();
        let registry = ScriptRegistry::new(executor.clone());
        (executor, registry)
    }

    #[test]
    fn test_ensure_storage_is_idempotent() {
        let (_executor, registry) = registry_with_schema("app");

        assert!(!registry.storage_exists("app").unwrap());
        registry.ensure_storage_exists("app").unwrap();
        assert!(registry.storage_exists("app").unwrap());
        registry.ensure_storage_exists("app").unwrap();
        assert!(registry.storage_exists("app").unwrap());
    }

    #[test]
    fn test_half_created_storage_is_completed() {
        let (executor, registry) = registry_with_schema("app");
        executor
            .run_statement(
                "app",
                &format!("CREATE SEQUENCE app.{TRACKING_SEQUENCE} START 1;"),
                &[],
            )
            .unwrap();
        assert!(!registry.storage_exists("app").unwrap());

        registry.ensure_storage_exists("app").unwrap();
        assert!(registry.storage_exists("app").unwrap());
        registry
            .record_applied("app", &Version::new(0, 1, 0), "a.sql")
            .unwrap();
    }

    #[test]
    fn test_oracle_storage_ddl_tolerates_existing_objects() {
        let sql = create_storage_sql(Dialect::Oracle, "app");

        // One guarded block per object, each ended by a lone slash
        assert_eq!(sql.matches("IF SQLCODE != -955 THEN RAISE; END IF;").count(), 2);
        assert_eq!(sql.lines().filter(|line| line.trim() == "/").count(), 2);
        assert!(sql.trim_end().ends_with('/'));

        let sequence = sql
            .find(&format!("EXECUTE IMMEDIATE 'CREATE SEQUENCE app.{TRACKING_SEQUENCE} "))
            .unwrap();
        let table = sql
            .find(&format!("EXECUTE IMMEDIATE 'CREATE TABLE app.{TRACKING_TABLE} "))
            .unwrap();
        assert!(sequence < table);

        // The table block runs even when the sequence is already there
        let first_block_end = sql.find("\n/").unwrap();
        assert!(first_block_end > sequence && first_block_end < table);
    }

    #[test]
    fn test_oracle_guard_escapes_quotes() {
        let block = oracle_create_if_missing("CREATE TABLE t (c VARCHAR2(1) DEFAULT 'x')");
        assert!(block.contains("EXECUTE IMMEDIATE 'CREATE TABLE t (c VARCHAR2(1) DEFAULT ''x'')';"));
    }

    #[test]
    fn test_missing_storage_loads_empty_index() {
        let (_executor, registry) = registry_with_schema("app");
        assert!(registry.load_applied_index("app").unwrap().is_empty());
        // schema that does not exist at all
        assert!(registry.load_applied_index("ghost").unwrap().is_empty());
        assert!(registry.history("ghost").unwrap().is_empty());
    }

    #[test]
    fn test_record_and_load() {
        let (_executor, registry) = registry_with_schema("app");
        registry.ensure_storage_exists("app").unwrap();

        let v01 = Version::parse("0.1.0").unwrap();
        registry.record_applied("app", &v01, "a.sql").unwrap();
        registry.record_applied("app", &v01, "b.sql").unwrap();
        registry
            .record_applied("app", &Version::parse("0.2").unwrap(), "c.sql")
            .unwrap();

        let index = registry.load_applied_index("app").unwrap();
        assert_eq!(index.scripts_for("0.1"), vec!["a.sql", "b.sql"]);
        assert_eq!(index.scripts_for("0.2"), vec!["c.sql"]);
    }

    #[test]
    fn test_history_ids_increase_and_carry_timestamps() {
        let (_executor, registry) = registry_with_schema("app");
        registry.ensure_storage_exists("app").unwrap();
        let v = Version::new(1, 0, 0);
        registry.record_applied("app", &v, "first.sql").unwrap();
        registry.record_applied("app", &v, "second.sql").unwrap();

        let history = registry.history("app").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].id < history[1].id);
        assert_eq!(history[0].version, "1.0");
        assert_eq!(history[0].script_id, "first.sql");
        assert!(history.iter().all(|r| r.applied_at.is_some()));
    }

    #[test]
    fn test_stored_version_spellings_are_normalized() {
        let (executor, registry) = registry_with_schema("app");
        registry.ensure_storage_exists("app").unwrap();
        executor
            .run_statement(
                "app",
                &format!(
                    "INSERT INTO app.{TRACKING_TABLE} (version, script, applied_at) \
                     VALUES ('0.1.0', 'legacy.sql', TIMESTAMP '2020-01-01 00:00:00')"
                ),
                &[],
            )
            .unwrap();

        let index = registry.load_applied_index("app").unwrap();
        assert!(index.contains(&Version::parse("0.1").unwrap(), "legacy.sql"));
    }

    #[test]
    fn test_record_without_storage_fails_loudly() {
        let (_executor, registry) = registry_with_schema("app");
        let err = registry
            .record_applied("app", &Version::new(0, 1, 0), "a.sql")
            .unwrap_err();
        match err {
            Error::RecordWriteFailed {
                schema,
                version,
                script_id,
                ..
            } => {
                assert_eq!(schema, "app");
                assert_eq!(version, "0.1");
                assert_eq!(script_id, "a.sql");
            }
            other => panic!("expected RecordWriteFailed, got {other:?}"),
        }
    }
}
