//! Source catalog - discovers a schema's scripts on disk
//!
//! Layout under the source root:
//! ```text
//! <root>/<schema>/create.user.sql
//! <root>/<schema>/baseline/*
//! <root>/<schema>/versions/<major.minor[.patch]>/*
//! ```
//! Anything whose name starts with the ignore prefix is invisible.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::result::{Error, Result};
use crate::domain::{Schema, Version, VersionFolder};

/// Directory entry kinds we care about
#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

/// Read-only view of the migration source tree
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    root: PathBuf,
    ignore_prefix: String,
}

impl SourceCatalog {
    pub fn new(root: impl Into<PathBuf>, ignore_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ignore_prefix: ignore_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validated schema bound to this catalog's root
    ///
    /// Names starting with the ignore prefix are refused: their source
    /// folder would be invisible.
    pub fn schema(&self, name: &str) -> Result<Schema> {
        let schema = Schema::new(&self.root, name)?;
        if self.is_ignored(name) {
            return Err(Error::config(format!(
                "Schema '{}' starts with the ignore prefix '{}', so its source folder is skipped",
                name, self.ignore_prefix
            )));
        }
        Ok(schema)
    }

    /// True iff the root contains a directory named after the schema
    pub fn schema_source_exists(&self, schema: &Schema) -> Result<bool> {
        let found = self
            .entries(&self.root, EntryKind::Dir)?
            .into_iter()
            .any(|(name, _)| name == schema.name());
        Ok(found)
    }

    /// Version folders in ascending version order
    ///
    /// Folders naming the same version are all kept, ordered by directory
    /// name. A missing `versions/` directory means no folders.
    pub fn list_version_folders(&self, schema: &Schema) -> Result<Vec<VersionFolder>> {
        let versions_dir = schema.versions_dir();
        if !versions_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut folders = Vec::new();
        for (name, path) in self.entries(&versions_dir, EntryKind::Dir)? {
            let version = Version::parse(&name)?;
            let scripts = self.list_scripts_in(&path)?;
            folders.push(VersionFolder {
                version,
                name,
                path,
                scripts,
            });
        }

        folders.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)));
        Ok(folders)
    }

    /// Script file names in byte order
    pub fn list_scripts_in(&self, folder: &Path) -> Result<Vec<String>> {
        Ok(self
            .entries(folder, EntryKind::File)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Baseline script paths in byte order; none if there is no `baseline/`
    pub fn list_baseline_scripts(&self, schema: &Schema) -> Result<Vec<PathBuf>> {
        let baseline_dir = schema.baseline_dir();
        if !baseline_dir.is_dir() {
            return Ok(Vec::new());
        }
        Ok(self
            .entries(&baseline_dir, EntryKind::File)?
            .into_iter()
            .map(|(_, path)| path)
            .collect())
    }

    fn is_ignored(&self, name: &str) -> bool {
        name.starts_with(&self.ignore_prefix)
    }

    /// Non-ignored entries of one kind, sorted by name
    fn entries(&self, dir: &Path, kind: EntryKind) -> Result<Vec<(String, PathBuf)>> {
        let unavailable = |source| Error::SourceUnavailable {
            path: dir.to_path_buf(),
            source,
        };

        let mut found = Vec::new();
        for entry in fs::read_dir(dir).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let path = entry.path();
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(name = ?raw, dir = %dir.display(), "skipping non UTF-8 name");
                    continue;
                }
            };
            if self.is_ignored(&name) {
                tracing::debug!(name, "ignored");
                continue;
            }
            let matches = match kind {
                EntryKind::Dir => path.is_dir(),
                EntryKind::File => path.is_file(),
            };
            if matches {
                found.push((name, path));
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "SELECT 1;").unwrap();
    }

    fn catalog(dir: &TempDir) -> SourceCatalog {
        SourceCatalog::new(dir.path(), "_")
    }

    #[test]
    fn test_schema_source_exists() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        touch(&dir.path().join("notadir"));
        let catalog = catalog(&dir);

        assert!(catalog.schema_source_exists(&catalog.schema("app").unwrap()).unwrap());
        assert!(!catalog.schema_source_exists(&catalog.schema("other").unwrap()).unwrap());
        assert!(!catalog.schema_source_exists(&catalog.schema("notadir").unwrap()).unwrap());
    }

    #[test]
    fn test_schema_named_with_ignore_prefix_is_refused() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("_tmp").join("create.user.sql"));
        let catalog = catalog(&dir);

        let err = catalog.schema("_tmp").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ignore prefix '_'"));

        // Same name is fine under a different prefix
        let other = SourceCatalog::new(dir.path(), "~");
        let schema = other.schema("_tmp").unwrap();
        assert!(other.schema_source_exists(&schema).unwrap());
    }

    #[test]
    fn test_unreadable_root_is_source_unavailable() {
        let dir = TempDir::new().unwrap();
        let catalog = SourceCatalog::new(dir.path().join("missing"), "_");
        let schema = catalog.schema("app").unwrap();

        let err = catalog.schema_source_exists(&schema).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn test_version_folders_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        let versions = dir.path().join("app").join("versions");
        for v in ["1.10", "1.9", "0.2.1", "0.2"] {
            touch(&versions.join(v).join("a.sql"));
        }
        let catalog = catalog(&dir);

        let folders = catalog
            .list_version_folders(&catalog.schema("app").unwrap())
            .unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["0.2", "0.2.1", "1.9", "1.10"]);
    }

    #[test]
    fn test_same_version_folders_are_all_kept() {
        let dir = TempDir::new().unwrap();
        let versions = dir.path().join("app").join("versions");
        touch(&versions.join("0.1.0").join("b.sql"));
        touch(&versions.join("0.1").join("a.sql"));
        touch(&versions.join("0.0").join("z.sql"));
        let catalog = catalog(&dir);

        let folders = catalog
            .list_version_folders(&catalog.schema("app").unwrap())
            .unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["0.0", "0.1", "0.1.0"]);
        assert_eq!(folders[1].version, folders[2].version);
        assert_eq!(folders[2].scripts, vec!["b.sql"]);
    }

    #[test]
    fn test_scripts_sorted_bytewise_and_filtered() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("app").join("versions").join("0.1");
        for name in ["b.sql", "a.sql", "B.sql", "_draft.sql", "10_x.sql", "2_x.sql"] {
            touch(&folder.join(name));
        }
        fs::create_dir_all(folder.join("nested")).unwrap();
        let catalog = catalog(&dir);

        let scripts = catalog.list_scripts_in(&folder).unwrap();
        assert_eq!(scripts, vec!["10_x.sql", "2_x.sql", "B.sql", "a.sql", "b.sql"]);
    }

    #[test]
    fn test_ignored_version_folder_is_skipped() {
        let dir = TempDir::new().unwrap();
        let versions = dir.path().join("app").join("versions");
        touch(&versions.join("0.1").join("a.sql"));
        touch(&versions.join("_wip").join("x.sql"));
        let catalog = catalog(&dir);

        let folders = catalog
            .list_version_folders(&catalog.schema("app").unwrap())
            .unwrap();
        assert_eq!(folders.len(), 1);
    }

    #[test]
    fn test_malformed_version_folder_is_rejected() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("app").join("versions").join("next").join("a.sql"));
        let catalog = catalog(&dir);

        let err = catalog
            .list_version_folders(&catalog.schema("app").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVersionFormat(ref name) if name == "next"));
    }

    #[test]
    fn test_missing_directories_are_empty() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        let catalog = catalog(&dir);
        let schema = catalog.schema("app").unwrap();

        assert!(catalog.list_version_folders(&schema).unwrap().is_empty());
        assert!(catalog.list_baseline_scripts(&schema).unwrap().is_empty());
    }

    #[test]
    fn test_baseline_scripts_are_paths_in_order() {
        let dir = TempDir::new().unwrap();
        let baseline = dir.path().join("app").join("baseline");
        touch(&baseline.join("02_data.sql"));
        touch(&baseline.join("01_tables.sql"));
        touch(&baseline.join("_notes.txt"));
        let catalog = catalog(&dir);

        let scripts = catalog
            .list_baseline_scripts(&catalog.schema("app").unwrap())
            .unwrap();
        assert_eq!(
            scripts,
            vec![baseline.join("01_tables.sql"), baseline.join("02_data.sql")]
        );
    }
}
