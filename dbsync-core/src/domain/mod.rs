//! Core domain types
//!
//! Pure data structures with validation logic - no I/O.

mod folder;
pub mod record;
pub mod report;
pub mod result;
pub mod schema;
mod version;

pub use folder::VersionFolder;
pub use record::{AppliedIndex, ScriptRecord};
pub use report::{
    AppliedScript, FolderStatus, ProvisionOutcome, ScriptFailure, ScriptState, ScriptStatus,
    StatusReport, SyncReport,
};
pub use schema::Schema;
pub use version::Version;
