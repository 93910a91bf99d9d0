//! Catalog over records supplied by the caller.

use super::{ensure_unique_ids, ImageRecord, LibraryCatalog, LibraryTag};
use crate::error::CatalogError;

/// Serves a fixed list of records. Every record is retagged with the
/// catalog's library.
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    library: LibraryTag,
    records: Vec<ImageRecord>,
}

impl InMemoryCatalog {
    pub fn new(library: LibraryTag, records: Vec<ImageRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                record.library = library;
                record
            })
            .collect();
        Self { library, records }
    }

    pub fn push(&mut self, mut record: ImageRecord) {
        record.library = self.library;
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LibraryCatalog for InMemoryCatalog {
    fn library(&self) -> LibraryTag {
        self.library
    }

    fn list_items(&self) -> Result<Vec<ImageRecord>, CatalogError> {
        ensure_unique_ids(self.library, &self.records)?;
        Ok(self.records.clone())
    }
}
