//! Outcomes of sync and status runs

use std::path::PathBuf;

use serde::Serialize;

use super::version::Version;

/// Whether provisioning found the schema or had to create it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    AlreadyExisted,
    Created,
}

/// A script applied and recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedScript {
    pub version: Version,
    pub script_id: String,
}

/// A versioned script that failed; its folder stopped at this script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptFailure {
    pub version: Version,
    pub script_id: String,
    pub path: PathBuf,
    pub message: String,
}

/// Result of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub schema: String,
    pub provisioned: ProvisionOutcome,
    /// Applied scripts, in execution order
    pub applied: Vec<AppliedScript>,
    /// Scripts found already recorded
    pub already_applied: usize,
    /// Folders beyond the target version
    pub skipped_versions: Vec<Version>,
    pub failures: Vec<ScriptFailure>,
    /// Stopped after a failure instead of moving on to later versions
    pub aborted: bool,
}

impl SyncReport {
    pub fn new(schema: &str, provisioned: ProvisionOutcome) -> Self {
        Self {
            schema: schema.to_string(),
            provisioned,
            applied: Vec::new(),
            already_applied: 0,
            skipped_versions: Vec::new(),
            failures: Vec::new(),
            aborted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptState {
    Applied,
    Pending,
    BeyondTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptStatus {
    pub script_id: String,
    pub state: ScriptState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderStatus {
    pub version: Version,
    pub name: String,
    pub scripts: Vec<ScriptStatus>,
}

/// Read-only view of what a sync would do
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub schema: String,
    pub exists: bool,
    /// Number of baseline scripts that would run on creation
    pub baseline_scripts: usize,
    pub folders: Vec<FolderStatus>,
}

impl StatusReport {
    pub fn count(&self, state: ScriptState) -> usize {
        self.folders
            .iter()
            .flat_map(|f| &f.scripts)
            .filter(|s| s.state == state)
            .count()
    }

    /// Scripts a sync would run, in execution order
    pub fn pending(&self) -> impl Iterator<Item = (&Version, &str)> {
        self.folders.iter().flat_map(|f| {
            f.scripts
                .iter()
                .filter(|s| s.state == ScriptState::Pending)
                .map(move |s| (&f.version, s.script_id.as_str()))
        })
    }
}
