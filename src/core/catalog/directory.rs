//! Folder-backed library using walkdir.

use super::filter::ImageFilter;
use super::{ImageRecord, LibraryCatalog, LibraryTag};
use crate::error::CatalogError;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Treats every image under a folder as a library item.
///
/// Ids are the library tag followed by the path relative to the root, with
/// `/` separators (`photos/2001/IMG_1.jpg`), so two folders holding the same
/// file names never share ids. A file named
/// `<stem>_edited.<ext>` next to `<stem>.<ext>` is that item's edited
/// rendition rather than an item of its own.
pub struct DirectoryCatalog {
    root: PathBuf,
    library: LibraryTag,
    follow_symlinks: bool,
    filter: ImageFilter,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>, library: LibraryTag) -> Self {
        Self {
            root: root.into(),
            library,
            follow_symlinks: false,
            filter: ImageFilter::new(),
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self) -> Result<BTreeSet<PathBuf>, CatalogError> {
        let mut files = BTreeSet::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.filter.skips_name(name))
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.filter.should_include(entry.path()) {
                        files.insert(entry.into_path());
                    }
                }
                Err(e) if e.depth() == 0 => {
                    return Err(CatalogError::ReadFailed {
                        path: self.root.clone(),
                        source: e
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable entry under {}: {}",
                        self.root.display(),
                        e
                    );
                }
            }
        }

        Ok(files)
    }

    fn item_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        std::iter::once(Cow::Borrowed(self.library.as_str()))
            .chain(relative.components().map(|c| c.as_os_str().to_string_lossy()))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl LibraryCatalog for DirectoryCatalog {
    fn library(&self) -> LibraryTag {
        self.library
    }

    fn list_items(&self) -> Result<Vec<ImageRecord>, CatalogError> {
        if !self.root.is_dir() {
            return Err(CatalogError::LibraryNotFound {
                path: self.root.clone(),
            });
        }

        let files = self.walk()?;

        let mut edited_for: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        for path in &files {
            if let Some(original) = ImageFilter::original_of_edited(path) {
                if files.contains(&original) {
                    edited_for.insert(original, path.clone());
                }
            }
        }
        let edited_paths: BTreeSet<&PathBuf> = edited_for.values().collect();

        let mut records: Vec<ImageRecord> = files
            .iter()
            .filter(|path| !edited_paths.contains(path))
            .map(|path| {
                let mut record = ImageRecord::new(self.item_id(path), self.library, path);
                if let Some(edited) = edited_for.get(path) {
                    record = record.with_edited(edited);
                }
                record
            })
            .collect();

        records.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!(
            "Listed {} items ({} with edits) in {}",
            records.len(),
            edited_for.len(),
            self.root.display()
        );

        Ok(records)
    }
}
