//! Migration engine - brings a schema up to date with its version folders
//!
//! A run validates the source tree, provisions the schema, reads the
//! applied-script registry once and then walks the version folders in
//! ascending order, running every script that is not yet recorded.

use std::sync::Arc;

use crate::config::FailurePolicy;
use crate::domain::result::{Error, Result};
use crate::domain::schema::validate_name_for;
use crate::domain::{
    AppliedIndex, AppliedScript, Schema, ScriptFailure, SyncReport, Version, VersionFolder,
};
use crate::ports::SqlExecutor;

use super::catalog::SourceCatalog;
use super::provisioner::SchemaProvisioner;
use super::registry::ScriptRegistry;

/// How a single folder ended
enum FolderOutcome {
    Completed,
    Failed,
}

/// Runs pending versioned scripts against one schema at a time
pub struct MigrationEngine {
    executor: Arc<dyn SqlExecutor>,
    catalog: SourceCatalog,
    registry: ScriptRegistry,
    provisioner: SchemaProvisioner,
    policy: FailurePolicy,
}

impl MigrationEngine {
    pub fn new(executor: Arc<dyn SqlExecutor>, catalog: SourceCatalog, policy: FailurePolicy) -> Self {
        let registry = ScriptRegistry::new(Arc::clone(&executor));
        let provisioner = SchemaProvisioner::new(Arc::clone(&executor), catalog.clone());
        Self {
            executor,
            catalog,
            registry,
            provisioner,
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Bring `schema_name` up to `target` (or the newest folder when `None`)
    ///
    /// Fatal problems are returned as `Err`: a missing or malformed source
    /// tree (before any database contact), provisioning failures, record
    /// writes that fail, and transport failures. A versioned script that
    /// fails stops its folder and is reported in [`SyncReport::failures`].
    pub fn sync(&self, schema_name: &str, target: Option<&Version>) -> Result<SyncReport> {
        let schema = self.catalog.schema(schema_name)?;
        validate_name_for(schema.name(), self.executor.dialect())?;

        if !self.catalog.schema_source_exists(&schema)? {
            return Err(Error::SchemaSourceMissing {
                schema: schema_name.to_string(),
                root: self.catalog.root().to_path_buf(),
            });
        }
        let folders = self.catalog.list_version_folders(&schema)?;
        tracing::debug!(schema = schema_name, folders = folders.len(), "source validated");

        let provisioned = self.provisioner.ensure_schema_provisioned(&schema)?;
        let mut index = self.registry.load_applied_index(schema.name())?;
        tracing::debug!(schema = schema_name, recorded = index.len(), "loaded applied scripts");

        let mut report = SyncReport::new(schema.name(), provisioned);

        for folder in &folders {
            if let Some(target) = target {
                if folder.version > *target {
                    tracing::debug!(version = %folder.version, %target, "beyond target version, skipping");
                    if !report.skipped_versions.contains(&folder.version) {
                        report.skipped_versions.push(folder.version);
                    }
                    continue;
                }
            }

            match self.apply_folder(&schema, folder, &mut index, &mut report)? {
                FolderOutcome::Completed => {}
                FolderOutcome::Failed if self.policy == FailurePolicy::Abort => {
                    tracing::warn!(version = %folder.version, "aborting run after failed folder");
                    report.aborted = true;
                    break;
                }
                FolderOutcome::Failed => {
                    tracing::warn!(version = %folder.version, "continuing with next version folder");
                }
            }
        }

        tracing::info!(
            schema = schema_name,
            applied = report.applied.len(),
            already_applied = report.already_applied,
            failed = report.failures.len(),
            "sync finished"
        );
        Ok(report)
    }

    fn apply_folder(
        &self,
        schema: &Schema,
        folder: &VersionFolder,
        index: &mut AppliedIndex,
        report: &mut SyncReport,
    ) -> Result<FolderOutcome> {
        let version = &folder.version;

        for script_id in &folder.scripts {
            if index.contains(version, script_id) {
                tracing::debug!(%version, script = %script_id, "already applied");
                report.already_applied += 1;
                continue;
            }

            let path = folder.script_path(script_id);
            tracing::info!(schema = schema.name(), %version, script = %script_id, "applying script");

            if let Err(e) = self.executor.run_script(schema.name(), &path) {
                if e.is_transport() {
                    return Err(Error::from_execution(e, Error::Transport));
                }
                let failure = Error::ScriptExecutionFailed {
                    script_id: script_id.clone(),
                    version: version.normalized_key(),
                    reason: e.to_string(),
                };
                tracing::warn!(path = %path.display(), "{}", failure);
                report.failures.push(ScriptFailure {
                    version: *version,
                    script_id: script_id.clone(),
                    path,
                    message: e.to_string(),
                });
                return Ok(FolderOutcome::Failed);
            }

            self.registry.record_applied(schema.name(), version, script_id)?;
            index.insert(version, script_id);
            report.applied.push(AppliedScript {
                version: *version,
                script_id: script_id.clone(),
            });
        }

        Ok(FolderOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbExecutor;
    use crate::domain::ProvisionOutcome;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(path: &Path, sql: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, sql).unwrap();
    }

    fn source_tree(dir: &TempDir) -> std::path::PathBuf {
        let root = dir.path().join("app");
        write(&root.join("create.user.sql"), "CREATE SCHEMA app;");
        write(&root.join("baseline").join("01.sql"), "CREATE TABLE log (step VARCHAR);");
        root
    }

    fn engine(dir: &TempDir, policy: FailurePolicy) -> (Arc<DuckDbExecutor>, MigrationEngine) {
        let executor = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
        let catalog = SourceCatalog::new(dir.path(), "_");
        let engine = MigrationEngine::new(executor.clone(), catalog, policy);
        (executor, engine)
    }

    fn steps(executor: &DuckDbExecutor) -> Vec<String> {
        executor
            .query(Some("app"), "SELECT step FROM log ORDER BY rowid", &[])
            .unwrap()
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect()
    }

    #[test]
    fn test_first_run_creates_and_applies_everything() {
        let dir = TempDir::new().unwrap();
        let root = source_tree(&dir);
        let versions = root.join("versions");
        write(&versions.join("0.1").join("a.sql"), "INSERT INTO log VALUES ('a');");
        write(&versions.join("0.2").join("b.sql"), "INSERT INTO log VALUES ('b');");
        let (executor, engine) = engine(&dir, FailurePolicy::Abort);

        let report = engine.sync("app", None).unwrap();

        assert_eq!(report.provisioned, ProvisionOutcome::Created);
        assert_eq!(report.applied.len(), 2);
        assert!(report.is_success());
        assert_eq!(steps(&executor), vec!["a", "b"]);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let root = source_tree(&dir);
        write(&root.join("versions").join("0.1").join("a.sql"), "INSERT INTO log VALUES ('a');");
        let (executor, engine) = engine(&dir, FailurePolicy::Abort);

        engine.sync("app", None).unwrap();
        let second = engine.sync("app", None).unwrap();

        assert_eq!(second.provisioned, ProvisionOutcome::AlreadyExisted);
        assert!(second.applied.is_empty());
        assert_eq!(second.already_applied, 1);
        assert_eq!(steps(&executor), vec!["a"]);
    }

    #[test]
    fn test_target_skips_later_folders_without_stopping() {
        let dir = TempDir::new().unwrap();
        let root = source_tree(&dir);
        let versions = root.join("versions");
        write(&versions.join("0.0").join("x.sql"), "INSERT INTO log VALUES ('x');");
        write(&versions.join("0.1").join("y.sql"), "INSERT INTO log VALUES ('y');");
        write(&versions.join("0.2").join("z.sql"), "INSERT INTO log VALUES ('z');");
        let (executor, engine) = engine(&dir, FailurePolicy::Abort);

        let report = engine.sync("app", Some(&Version::new(0, 1, 0))).unwrap();

        assert_eq!(steps(&executor), vec!["x", "y"]);
        assert_eq!(report.skipped_versions, vec![Version::new(0, 2, 0)]);
    }

    #[test]
    fn test_failure_policy_decides_later_folders() {
        for (policy, expected) in [
            (FailurePolicy::Abort, vec!["a1"]),
            (FailurePolicy::Continue, vec!["a1", "b1"]),
        ] {
            let dir = TempDir::new().unwrap();
            let root = source_tree(&dir);
            let versions = root.join("versions");
            write(&versions.join("0.1").join("1.sql"), "INSERT INTO log VALUES ('a1');");
            write(&versions.join("0.1").join("2.sql"), "INSERT INTO missing_table VALUES (1);");
            write(&versions.join("0.1").join("3.sql"), "INSERT INTO log VALUES ('a3');");
            write(&versions.join("0.2").join("1.sql"), "INSERT INTO log VALUES ('b1');");
            let (executor, engine) = engine(&dir, policy);

            let report = engine.sync("app", None).unwrap();

            assert_eq!(steps(&executor), expected, "policy {policy:?}");
            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].script_id, "2.sql");
            assert_eq!(report.aborted, policy == FailurePolicy::Abort);

            let index = ScriptRegistry::new(executor.clone())
                .load_applied_index("app")
                .unwrap();
            assert_eq!(index.scripts_for("0.1"), vec!["1.sql"]);
        }
    }

    #[test]
    fn test_missing_source_fails_before_database_contact() {
        let dir = TempDir::new().unwrap();
        let (executor, engine) = engine(&dir, FailurePolicy::Abort);

        let err = engine.sync("app", None).unwrap_err();

        assert!(matches!(err, Error::SchemaSourceMissing { .. }));
        assert!(!executor.schema_exists("app").unwrap());
    }

    #[test]
    fn test_malformed_folder_fails_before_provisioning() {
        let dir = TempDir::new().unwrap();
        let root = source_tree(&dir);
        write(&root.join("versions").join("latest").join("a.sql"), "SELECT 1;");
        let (executor, engine) = engine(&dir, FailurePolicy::Abort);

        let err = engine.sync("app", None).unwrap_err();

        assert!(matches!(err, Error::InvalidVersionFormat(_)));
        assert!(!executor.schema_exists("app").unwrap());
    }
}
