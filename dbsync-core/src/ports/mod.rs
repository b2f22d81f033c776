//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The engine
//! depends only on these traits, not on concrete implementations.

mod executor;

pub use executor::{read_script, Dialect, ExecResult, ExecutionError, Row, SqlExecutor};
