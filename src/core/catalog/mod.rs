//! # Catalog Module
//!
//! Supplies the items of a photo library to the scan.
//!
//! The core never reads a photo library directly. It asks a
//! [`LibraryCatalog`] for an ordered list of [`ImageRecord`]s and for the
//! file to hash for each record.
//!
//! ## Adapters
//! - [`InMemoryCatalog`] - records supplied by the caller
//! - [`ManifestCatalog`] - a JSON export of a photo library
//! - [`DirectoryCatalog`] - a plain folder of images

mod directory;
mod filter;
mod manifest;
mod memory;

pub use directory::DirectoryCatalog;
pub use filter::ImageFilter;
pub use manifest::{ManifestCatalog, ManifestItem};
pub use memory::InMemoryCatalog;

use crate::error::{CatalogError, HashError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Which library an item belongs to.
///
/// `Photos` is the primary library, `Iphoto` the secondary one whose items
/// are matched against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryTag {
    Photos,
    Iphoto,
}

impl LibraryTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryTag::Photos => "photos",
            LibraryTag::Iphoto => "iphoto",
        }
    }
}

impl std::fmt::Display for LibraryTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One photo as listed by a catalog. Immutable for the duration of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Stable identifier, unique across the libraries of a run
    pub id: String,
    pub library: LibraryTag,
    /// Original file
    pub path: PathBuf,
    /// Edited rendition, if the library keeps one
    pub edited_path: Option<PathBuf>,
    pub display_name: String,
    /// False when the library knows the original is not available locally
    pub exists_on_disk: bool,
}

impl ImageRecord {
    /// Record for an on-disk file, named after its file name.
    pub fn new(id: impl Into<String>, library: LibraryTag, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = file_name_of(&path);
        Self {
            id: id.into(),
            library,
            path,
            edited_path: None,
            display_name,
            exists_on_disk: true,
        }
    }

    pub fn with_edited(mut self, edited_path: impl Into<PathBuf>) -> Self {
        self.edited_path = Some(edited_path.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Mark the item as not available on disk
    pub fn missing(mut self) -> Self {
        self.exists_on_disk = false;
        self
    }
}

/// The parts of a record that travel with a hash into candidate pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub library: LibraryTag,
    /// The file that was actually hashed
    pub path: PathBuf,
    pub display_name: String,
}

impl ImageRef {
    pub fn new(record: &ImageRecord, hashed_path: PathBuf) -> Self {
        Self {
            id: record.id.clone(),
            library: record.library,
            path: hashed_path,
            display_name: record.display_name.clone(),
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Capability to enumerate one photo library.
pub trait LibraryCatalog: Send + Sync {
    /// The tag every record of this catalog carries
    fn library(&self) -> LibraryTag;

    /// List every item, in a stable order
    fn list_items(&self) -> Result<Vec<ImageRecord>, CatalogError>;

    /// Pick the file to hash for `record`.
    ///
    /// With `prefer_edited` the edited rendition is tried first, otherwise
    /// the original. The first candidate that exists as a file wins.
    fn resolve_path(&self, record: &ImageRecord, prefer_edited: bool) -> Result<PathBuf, HashError> {
        let edited = record.edited_path.as_deref();
        let candidates: Vec<&Path> = if prefer_edited {
            edited.into_iter().chain([record.path.as_path()]).collect()
        } else {
            std::iter::once(record.path.as_path()).chain(edited).collect()
        };

        candidates
            .iter()
            .find(|path| path.is_file())
            .map(|path| path.to_path_buf())
            .ok_or_else(|| HashError::MissingFile {
                path: candidates
                    .first()
                    .map(|path| path.to_path_buf())
                    .unwrap_or_else(|| record.path.clone()),
            })
    }
}

/// Open a catalog from a command-line location: a folder of images or a
/// JSON manifest.
pub fn open_catalog(
    location: &Path,
    library: LibraryTag,
) -> Result<Box<dyn LibraryCatalog>, CatalogError> {
    if location.is_dir() {
        return Ok(Box::new(DirectoryCatalog::new(location, library)));
    }
    if !location.exists() {
        return Err(CatalogError::LibraryNotFound {
            path: location.to_path_buf(),
        });
    }

    let is_json = location
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(Box::new(ManifestCatalog::new(location, library)))
    } else {
        Err(CatalogError::InvalidManifest {
            path: location.to_path_buf(),
            reason: "expected a directory or a .json manifest".to_string(),
        })
    }
}

/// Fail on the first id that appears twice.
pub(crate) fn ensure_unique_ids(
    library: LibraryTag,
    records: &[ImageRecord],
) -> Result<(), CatalogError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(CatalogError::DuplicateId {
                library: library.to_string(),
                id: record.id.clone(),
            });
        }
    }
    Ok(())
}
