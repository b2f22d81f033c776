//! Adapter implementations
//!
//! Adapters implement the [`SqlExecutor`](crate::ports::SqlExecutor) port:
//! - DuckDB through the in-process driver
//! - Oracle through the `sqlplus` client process

pub mod duckdb;
pub mod sqlplus;

use std::sync::Arc;

use crate::config::EngineSettings;
use crate::domain::result::{Error, Result};
use crate::ports::SqlExecutor;

/// Build the executor selected by the configuration
pub fn connect(engine: &EngineSettings) -> Result<Arc<dyn SqlExecutor>> {
    match engine {
        EngineSettings::DuckDb { path } => {
            let executor = duckdb::DuckDbExecutor::open(path)
                .map_err(|e| Error::Transport(e.to_string()))?;
            Ok(Arc::new(executor))
        }
        EngineSettings::SqlPlus { binary, connect } => {
            Ok(Arc::new(sqlplus::SqlPlusExecutor::new(sqlplus::SqlPlusSettings {
                binary: binary.clone(),
                connect: connect.clone(),
            })))
        }
    }
}
