//! JSON manifest exported from a photo library application.

use super::{ensure_unique_ids, file_name_of, ImageRecord, LibraryCatalog, LibraryTag};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One entry of a library manifest.
///
/// Relative paths are resolved against the manifest's folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub edited_path: Option<PathBuf>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// The library knows the original is not downloaded
    #[serde(default)]
    pub missing: bool,
    /// `photo` or `movie`; movies are not hashed
    #[serde(default)]
    pub kind: Option<String>,
}

impl ManifestItem {
    fn is_movie(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("movie"))
    }
}

pub struct ManifestCatalog {
    path: PathBuf,
    library: LibraryTag,
}

impl ManifestCatalog {
    pub fn new(path: impl Into<PathBuf>, library: LibraryTag) -> Self {
        Self {
            path: path.into(),
            library,
        }
    }

    fn resolve(&self, base: &Path, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            base.join(path)
        }
    }
}

impl LibraryCatalog for ManifestCatalog {
    fn library(&self) -> LibraryTag {
        self.library
    }

    fn list_items(&self) -> Result<Vec<ImageRecord>, CatalogError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CatalogError::LibraryNotFound {
                    path: self.path.clone(),
                }
            } else {
                CatalogError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        let items: Vec<ManifestItem> =
            serde_json::from_str(&content).map_err(|e| CatalogError::InvalidManifest {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let base = self.path.parent().unwrap_or(Path::new("")).to_path_buf();
        let total = items.len();

        let records: Vec<ImageRecord> = items
            .into_iter()
            .filter(|item| !item.is_movie())
            .map(|item| {
                let path = self.resolve(&base, item.path);
                let display_name = item.display_name.unwrap_or_else(|| file_name_of(&path));
                ImageRecord {
                    id: item.id,
                    library: self.library,
                    path,
                    edited_path: item.edited_path.map(|p| self.resolve(&base, p)),
                    display_name,
                    exists_on_disk: !item.missing,
                }
            })
            .collect();

        ensure_unique_ids(self.library, &records)?;

        tracing::debug!(
            "Loaded {} items from manifest {} ({} movies skipped)",
            records.len(),
            self.path.display(),
            total - records.len()
        );

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("library.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn reads_items_in_manifest_order() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            r#"[
                {"id": "B", "path": "masters/b.jpg", "edited_path": "edits/b.jpg"},
                {"id": "A", "path": "/abs/a.jpg", "display_name": "Beach", "missing": true}
            ]"#,
        );

        let records = ManifestCatalog::new(&manifest, LibraryTag::Iphoto)
            .list_items()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "B");
        assert_eq!(records[0].path, dir.path().join("masters/b.jpg"));
        assert_eq!(records[0].edited_path, Some(dir.path().join("edits/b.jpg")));
        assert_eq!(records[0].display_name, "b.jpg");
        assert!(records[0].exists_on_disk);

        assert_eq!(records[1].path, PathBuf::from("/abs/a.jpg"));
        assert_eq!(records[1].display_name, "Beach");
        assert!(!records[1].exists_on_disk);
        assert!(records.iter().all(|r| r.library == LibraryTag::Iphoto));
    }

    #[test]
    fn movies_are_skipped() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            r#"[
                {"id": "1", "path": "a.jpg", "kind": "photo"},
                {"id": "2", "path": "clip.mov", "kind": "Movie"}
            ]"#,
        );

        let records = ManifestCatalog::new(&manifest, LibraryTag::Photos)
            .list_items()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
    }

    #[test]
    fn malformed_manifest_is_rejected() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir, r#"{"not": "a list"}"#);

        let error = ManifestCatalog::new(&manifest, LibraryTag::Photos)
            .list_items()
            .unwrap_err();
        assert!(matches!(error, CatalogError::InvalidManifest { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            r#"[{"id": "1", "path": "a.jpg"}, {"id": "1", "path": "b.jpg"}]"#,
        );

        let error = ManifestCatalog::new(&manifest, LibraryTag::Photos)
            .list_items()
            .unwrap_err();
        assert!(matches!(error, CatalogError::DuplicateId { .. }));
    }

    #[test]
    fn missing_manifest_is_library_not_found() {
        let error = ManifestCatalog::new("/no/such/manifest.json", LibraryTag::Photos)
            .list_items()
            .unwrap_err();
        assert!(matches!(error, CatalogError::LibraryNotFound { .. }));
    }
}
