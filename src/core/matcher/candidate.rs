//! Candidate pair records.

use crate::core::catalog::{ImageRef, LibraryTag};
use crate::core::hasher::{HashMethod, HashParams};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Kind of pair. Declaration order is the ranking order at equal distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairType {
    DupeWithinPhotos,
    DupeWithinIphoto,
    CrossLibrary,
}

impl PairType {
    pub fn dupe_within(library: LibraryTag) -> Self {
        match library {
            LibraryTag::Photos => PairType::DupeWithinPhotos,
            LibraryTag::Iphoto => PairType::DupeWithinIphoto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PairType::DupeWithinPhotos => "dupe_within_photos",
            PairType::DupeWithinIphoto => "dupe_within_iphoto",
            PairType::CrossLibrary => "cross_library",
        }
    }
}

impl std::fmt::Display for PairType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable id of an unordered pair of library items.
///
/// xxh3-64 of `library:id|library:id` with the two halves sorted, as 16
/// hex digits.
pub fn pair_id(a: &ImageRef, b: &ImageRef) -> String {
    let mut keys = [
        format!("{}:{}", a.library, a.id),
        format!("{}:{}", b.library, b.id),
    ];
    keys.sort();
    format!("{:016x}", xxh3_64(keys.join("|").as_bytes()))
}

/// Two images whose codes are within a threshold of each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCandidate {
    pub pair_id: String,
    pub pair_type: PairType,
    pub left: ImageRef,
    pub right: ImageRef,
    pub distance: u32,
    pub hash_method: HashMethod,
    pub hash_size: u32,
}

impl PairCandidate {
    pub fn new(
        pair_type: PairType,
        left: ImageRef,
        right: ImageRef,
        distance: u32,
        params: HashParams,
    ) -> Self {
        Self {
            pair_id: pair_id(&left, &right),
            pair_type,
            left,
            right,
            distance,
            hash_method: params.method,
            hash_size: params.size,
        }
    }
}

/// Secondary-library item with no primary match within the cross threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedRecord {
    pub image: ImageRef,
}
