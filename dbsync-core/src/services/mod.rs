//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one step of bringing a schema up to date.

mod catalog;
mod migration;
mod provisioner;
pub mod registry;
mod status;

pub use catalog::SourceCatalog;
pub use migration::MigrationEngine;
pub use provisioner::SchemaProvisioner;
pub use registry::ScriptRegistry;
pub use status::StatusService;
