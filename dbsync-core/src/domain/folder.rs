//! A version directory and the scripts discovered in it

use std::path::PathBuf;

use super::version::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFolder {
    pub version: Version,
    /// Directory name as found on disk ("1.2" and "1.2.0" are both possible)
    pub name: String,
    pub path: PathBuf,
    /// File names in byte order, ignored names removed
    pub scripts: Vec<String>,
}

impl VersionFolder {
    pub fn script_path(&self, script_id: &str) -> PathBuf {
        self.path.join(script_id)
    }
}
