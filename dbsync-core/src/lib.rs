//! dbsync core - versioned SQL script application
//!
//! This crate implements the core logic following hexagonal architecture:
//!
//! - **domain**: Versions, schemas, registry snapshots and run reports
//! - **ports**: The `SqlExecutor` trait every database transport implements
//! - **services**: Source catalog, registry, provisioner, engine and planner
//! - **adapters**: Concrete executors (DuckDB, Oracle via sqlplus)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::sync::Arc;

use ports::SqlExecutor;
use services::{MigrationEngine, ScriptRegistry, SourceCatalog, StatusService};

// Re-export commonly used types at crate root
pub use config::{Config, EngineSettings, FailurePolicy};
pub use domain::result::{Error, Result};
pub use domain::{
    AppliedIndex, AppliedScript, FolderStatus, ProvisionOutcome, Schema, ScriptFailure,
    ScriptRecord, ScriptState, ScriptStatus, StatusReport, SyncReport, Version, VersionFolder,
};

/// Main context for dbsync operations
///
/// Holds the configuration, the executor and the services built on it.
pub struct SyncContext {
    pub config: Config,
    pub executor: Arc<dyn SqlExecutor>,
    pub catalog: SourceCatalog,
    pub registry: ScriptRegistry,
    pub engine: MigrationEngine,
    pub status_service: StatusService,
}

impl SyncContext {
    /// Connect to the configured engine and wire up the services
    pub fn new(config: Config) -> Result<Self> {
        let executor = adapters::connect(&config.engine)?;
        Ok(Self::with_executor(config, executor))
    }

    /// Use an already-constructed executor
    pub fn with_executor(config: Config, executor: Arc<dyn SqlExecutor>) -> Self {
        let catalog = SourceCatalog::new(&config.source_root, config.ignore_prefix.as_str());
        let registry = ScriptRegistry::new(Arc::clone(&executor));
        let engine = MigrationEngine::new(
            Arc::clone(&executor),
            catalog.clone(),
            config.on_script_failure,
        );
        let status_service = StatusService::new(Arc::clone(&executor), catalog.clone());

        Self {
            config,
            executor,
            catalog,
            registry,
            engine,
            status_service,
        }
    }

    /// Drop a schema and everything in it, bypassing the engine
    ///
    /// Returns false when there was nothing to drop.
    pub fn drop_schema(&self, name: &str) -> Result<bool> {
        domain::schema::validate_name_for(name, self.executor.dialect())?;
        let exists = self
            .executor
            .schema_exists(name)
            .map_err(|e| Error::from_execution(e, Error::Database))?;
        if !exists {
            return Ok(false);
        }
        tracing::info!(schema = name, "dropping schema");
        self.executor
            .drop_schema(name)
            .map_err(|e| Error::from_execution(e, Error::Database))?;
        Ok(true)
    }
}
