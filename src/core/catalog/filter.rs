//! File filtering for folder-backed libraries.

use std::collections::HashSet;
use std::path::Path;

/// Suffix a photo editor appends to the stem of an edited rendition
pub const EDITED_SUFFIX: &str = "_edited";

/// Decides which files in a folder are library photos
pub struct ImageFilter {
    /// Lowercase file extensions to include
    extensions: HashSet<String>,
    /// Whether to include hidden files
    include_hidden: bool,
}

impl ImageFilter {
    /// Create a new filter with default supported extensions
    pub fn new() -> Self {
        Self {
            extensions: [
                "jpg", "jpeg", "png", "webp", "heic", "heif", "gif", "bmp", "tiff", "tif",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Whether a directory entry name is hidden and should be skipped
    pub fn skips_name(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.skips_name(name) {
                return false;
            }
        }

        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// The path of the original an edited rendition belongs to, if `path`
    /// is named like one (`IMG_1.jpg` for `IMG_1_edited.jpg`).
    pub fn original_of_edited(path: &Path) -> Option<std::path::PathBuf> {
        let stem = path.file_stem()?.to_str()?;
        let base = stem.strip_suffix(EDITED_SUFFIX)?;
        if base.is_empty() {
            return None;
        }
        let name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", base, ext),
            None => base.to_string(),
        };
        Some(path.with_file_name(name))
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}
