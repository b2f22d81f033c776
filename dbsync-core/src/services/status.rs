//! Status planner - what a sync would do, without doing it

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::schema::validate_name_for;
use crate::domain::{
    AppliedIndex, FolderStatus, ScriptState, ScriptStatus, StatusReport, Version,
};
use crate::ports::SqlExecutor;

use super::catalog::SourceCatalog;
use super::registry::ScriptRegistry;

/// Read-only planner backing `status` and `sync --dry-run`
pub struct StatusService {
    executor: Arc<dyn SqlExecutor>,
    catalog: SourceCatalog,
    registry: ScriptRegistry,
}

impl StatusService {
    pub fn new(executor: Arc<dyn SqlExecutor>, catalog: SourceCatalog) -> Self {
        let registry = ScriptRegistry::new(Arc::clone(&executor));
        Self {
            executor,
            catalog,
            registry,
        }
    }

    /// Classify every versioned script as applied, pending or beyond target
    ///
    /// Performs no writes; a schema that does not exist yet has nothing
    /// applied.
    pub fn plan(&self, schema_name: &str, target: Option<&Version>) -> Result<StatusReport> {
        let schema = self.catalog.schema(schema_name)?;
        validate_name_for(schema.name(), self.executor.dialect())?;
        if !self.catalog.schema_source_exists(&schema)? {
            return Err(Error::SchemaSourceMissing {
                schema: schema_name.to_string(),
                root: self.catalog.root().to_path_buf(),
            });
        }
        let folders = self.catalog.list_version_folders(&schema)?;

        let exists = self
            .executor
            .schema_exists(schema.name())
            .map_err(|e| Error::from_execution(e, Error::Database))?;

        let (index, baseline_scripts) = if exists {
            (self.registry.load_applied_index(schema.name())?, 0)
        } else {
            (
                AppliedIndex::new(),
                self.catalog.list_baseline_scripts(&schema)?.len(),
            )
        };

        let folders = folders
            .into_iter()
            .map(|folder| {
                let beyond = target.is_some_and(|t| folder.version > *t);
                let scripts = folder
                    .scripts
                    .into_iter()
                    .map(|script_id| {
                        let state = if index.contains(&folder.version, &script_id) {
                            ScriptState::Applied
                        } else if beyond {
                            ScriptState::BeyondTarget
                        } else {
                            ScriptState::Pending
                        };
                        ScriptStatus { script_id, state }
                    })
                    .collect();
                FolderStatus {
                    version: folder.version,
                    name: folder.name,
                    scripts,
                }
            })
            .collect();

        Ok(StatusReport {
            schema: schema.name().to_string(),
            exists,
            baseline_scripts,
            folders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbExecutor;
    use crate::config::FailurePolicy;
    use crate::services::MigrationEngine;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(path: &Path, sql: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, sql).unwrap();
    }

    fn tree(dir: &TempDir) {
        let root = dir.path().join("app");
        write(&root.join("create.user.sql"), "CREATE SCHEMA app;");
        write(&root.join("baseline").join("01.sql"), "CREATE TABLE t (id INTEGER);");
        write(&root.join("baseline").join("02.sql"), "INSERT INTO t VALUES (0);");
        write(&root.join("versions").join("0.1").join("a.sql"), "INSERT INTO t VALUES (1);");
        write(&root.join("versions").join("0.2").join("b.sql"), "INSERT INTO t VALUES (2);");
    }

    #[test]
    fn test_plan_for_missing_schema_touches_nothing() {
        let dir = TempDir::new().unwrap();
        tree(&dir);
        let executor = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
        let service = StatusService::new(executor.clone(), SourceCatalog::new(dir.path(), "_"));

        let report = service.plan("app", None).unwrap();

        assert!(!report.exists);
        assert_eq!(report.baseline_scripts, 2);
        assert_eq!(report.count(ScriptState::Pending), 2);
        assert!(!executor.schema_exists("app").unwrap());
    }

    #[test]
    fn test_plan_after_partial_sync() {
        let dir = TempDir::new().unwrap();
        tree(&dir);
        let executor = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
        let catalog = SourceCatalog::new(dir.path(), "_");
        MigrationEngine::new(executor.clone(), catalog.clone(), FailurePolicy::Abort)
            .sync("app", Some(&Version::new(0, 1, 0)))
            .unwrap();
        write(
            &dir.path().join("app").join("versions").join("0.3").join("c.sql"),
            "SELECT 1;",
        );

        let service = StatusService::new(executor, catalog);
        let report = service.plan("app", Some(&Version::new(0, 2, 0))).unwrap();

        assert!(report.exists);
        assert_eq!(report.baseline_scripts, 0);
        let pending: Vec<_> = report.pending().map(|(_, id)| id).collect();
        assert_eq!(pending, vec!["b.sql"]);
        assert_eq!(report.count(ScriptState::Applied), 1);
        assert_eq!(report.count(ScriptState::BeyondTarget), 1);
    }

    #[test]
    fn test_plan_requires_source() {
        let dir = TempDir::new().unwrap();
        let executor = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
        let service = StatusService::new(executor, SourceCatalog::new(dir.path(), "_"));

        assert!(matches!(
            service.plan("app", None),
            Err(Error::SchemaSourceMissing { .. })
        ));
    }
}
