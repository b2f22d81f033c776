//! Schema provisioner - first-time creation and baseline

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{ProvisionOutcome, Schema};
use crate::ports::SqlExecutor;

use super::catalog::SourceCatalog;
use super::registry::ScriptRegistry;

/// Makes sure a schema exists before versioned scripts run
///
/// Creation runs `create.user.sql`, then every baseline script once, then
/// sets up tracking storage. Baseline scripts are never recorded; they only
/// ever run on this path.
pub struct SchemaProvisioner {
    executor: Arc<dyn SqlExecutor>,
    catalog: SourceCatalog,
    registry: ScriptRegistry,
}

impl SchemaProvisioner {
    pub fn new(executor: Arc<dyn SqlExecutor>, catalog: SourceCatalog) -> Self {
        let registry = ScriptRegistry::new(Arc::clone(&executor));
        Self {
            executor,
            catalog,
            registry,
        }
    }

    pub fn ensure_schema_provisioned(&self, schema: &Schema) -> Result<ProvisionOutcome> {
        let name = schema.name();

        let exists = self
            .executor
            .schema_exists(name)
            .map_err(|e| Error::from_execution(e, Error::Database))?;

        if exists {
            tracing::info!(schema = name, "schema already exists");
            self.registry.ensure_storage_exists(name)?;
            return Ok(ProvisionOutcome::AlreadyExisted);
        }

        // Listed before creation so an unreadable baseline directory fails
        // without leaving a half-created schema behind
        let baseline = self.catalog.list_baseline_scripts(schema)?;

        let create_script = schema.create_script();
        tracing::info!(schema = name, script = %create_script.display(), "running schema creation script");
        if !create_script.is_file() {
            return Err(Error::SchemaCreationFailed {
                schema: name.to_string(),
                script: create_script,
                reason: "creation script not found".to_string(),
            });
        }
        self.executor
            .create_schema(name, &create_script)
            .map_err(|e| {
                Error::from_execution(e, |reason| Error::SchemaCreationFailed {
                    schema: name.to_string(),
                    script: create_script.clone(),
                    reason,
                })
            })?;

        for script in &baseline {
            tracing::info!(schema = name, script = %script.display(), "running baseline script");
            self.executor.run_script(name, script).map_err(|e| {
                Error::from_execution(e, |reason| Error::BaselineScriptFailed {
                    schema: name.to_string(),
                    script: script.clone(),
                    reason,
                })
            })?;
        }

        self.registry.ensure_storage_exists(name)?;
        tracing::info!(schema = name, baseline = baseline.len(), "schema created");
        Ok(ProvisionOutcome::Created)
    }
}
