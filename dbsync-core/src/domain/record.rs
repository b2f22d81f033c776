//! Applied-script records and the per-run index built from them

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::Serialize;

use super::version::Version;

/// One row of the tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRecord {
    pub id: i64,
    /// Version text exactly as stored
    pub version: String,
    pub script_id: String,
    pub applied_at: Option<NaiveDateTime>,
}

/// Script ids recorded per normalized version key
///
/// Built once per run. The engine inserts each script it records so that a
/// second folder of the same version cannot re-apply it within the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl AppliedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group `(version, script)` rows by normalized version
    ///
    /// Versions that do not parse are kept under their trimmed text; they can
    /// never match a version folder.
    pub fn from_rows<I, V, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (V, S)>,
        V: AsRef<str>,
        S: Into<String>,
    {
        let mut index = Self::new();
        for (version, script) in rows {
            let raw = version.as_ref().trim();
            let key = match Version::parse(raw) {
                Ok(v) => v.normalized_key(),
                Err(_) => {
                    tracing::warn!(version = raw, "unparsable version in tracking table");
                    raw.to_string()
                }
            };
            index.entries.entry(key).or_default().insert(script.into());
        }
        index
    }

    pub fn contains(&self, version: &Version, script_id: &str) -> bool {
        self.entries
            .get(&version.normalized_key())
            .is_some_and(|scripts| scripts.contains(script_id))
    }

    /// Returns false if the script was already present
    pub fn insert(&mut self, version: &Version, script_id: &str) -> bool {
        self.entries
            .entry(version.normalized_key())
            .or_default()
            .insert(script_id.to_string())
    }

    /// Scripts recorded under a normalized key, sorted
    pub fn scripts_for(&self, key: &str) -> Vec<&str> {
        self.entries
            .get(key)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Total number of recorded scripts
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
