//! # Matcher Module
//!
//! Turns per-library hash codes into a ranked list of candidate pairs.
//!
//! ## Passes
//! 1. **Dedupe** - every code of a library queries that library's index with
//!    the dedupe threshold. Self matches are dropped and `(a, b)` / `(b, a)`
//!    collapse into one pair.
//! 2. **Cross-library** - every secondary code queries the primary index with
//!    the cross threshold and keeps only its closest primary match.
//! 3. **Unmatched** - secondary items with no cross match at all.
//!
//! Candidates are ordered by distance, then pair type (dupes first), then
//! pair id.

mod candidate;

pub use candidate::{pair_id, PairCandidate, PairType, UnmatchedRecord};

use crate::core::catalog::{ImageRef, LibraryTag};
use crate::core::hasher::HashParams;
use crate::core::index::SimilarityIndex;
use crate::core::pool::HashedImage;
use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Distance thresholds for the two kinds of match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub dedupe_threshold: u32,
    pub cross_threshold: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            dedupe_threshold: 5,
            cross_threshold: 8,
        }
    }
}

/// Hashed items of one library with their index
pub struct IndexedLibrary<'a> {
    pub library: LibraryTag,
    pub images: &'a [HashedImage],
    pub index: SimilarityIndex,
}

impl<'a> IndexedLibrary<'a> {
    /// Index `images` in order.
    pub fn build(
        library: LibraryTag,
        params: HashParams,
        images: &'a [HashedImage],
    ) -> Result<Self, IndexError> {
        let index = SimilarityIndex::from_codes(params, images.iter().map(|i| i.code.clone()))?;
        tracing::debug!(
            "Indexed {} library: {} codes, {} nodes, depth {}",
            library,
            index.len(),
            index.node_count(),
            index.depth()
        );
        Ok(Self {
            library,
            images,
            index,
        })
    }

    fn refs_by_id(&self) -> HashMap<&str, &ImageRef> {
        self.images
            .iter()
            .map(|i| (i.code.owner_id.as_str(), &i.image))
            .collect()
    }
}

/// Ranked candidates and unmatched secondary items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub candidates: Vec<PairCandidate>,
    pub unmatched: Vec<UnmatchedRecord>,
}

pub struct CandidateGenerator {
    params: HashParams,
    config: MatchConfig,
}

impl CandidateGenerator {
    pub fn new(params: HashParams, config: MatchConfig) -> Self {
        Self { params, config }
    }

    pub fn config(&self) -> MatchConfig {
        self.config
    }

    /// Within-library duplicate pairs, unsorted.
    pub fn dedupe(&self, library: &IndexedLibrary<'_>) -> Result<Vec<PairCandidate>, IndexError> {
        let refs = library.refs_by_id();
        let pair_type = PairType::dupe_within(library.library);
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut pairs = Vec::new();

        for image in library.images {
            let target = &image.code;
            for found in library.index.query_within(target, self.config.dedupe_threshold)? {
                let other = found.code.owner_id.as_str();
                if other == target.owner_id {
                    continue;
                }

                let (left_id, right_id) = if target.owner_id.as_str() < other {
                    (target.owner_id.as_str(), other)
                } else {
                    (other, target.owner_id.as_str())
                };
                if !seen.insert((left_id, right_id)) {
                    continue;
                }

                if let (Some(left), Some(right)) = (refs.get(left_id), refs.get(right_id)) {
                    pairs.push(PairCandidate::new(
                        pair_type,
                        (*left).clone(),
                        (*right).clone(),
                        found.distance,
                        self.params,
                    ));
                }
            }
        }

        Ok(pairs)
    }

    /// Closest primary match for each secondary item, plus the secondary
    /// items with none.
    pub fn cross_match(
        &self,
        primary: &IndexedLibrary<'_>,
        secondary: &[HashedImage],
    ) -> Result<(Vec<PairCandidate>, Vec<UnmatchedRecord>), IndexError> {
        let refs = primary.refs_by_id();
        let mut pairs = Vec::new();
        let mut unmatched = Vec::new();

        for image in secondary {
            let matches = primary
                .index
                .query_within(&image.code, self.config.cross_threshold)?;

            // Nearest first, ties by primary owner id
            let best = matches
                .iter()
                .filter_map(|found| {
                    refs.get(found.code.owner_id.as_str())
                        .map(|left| (found.distance, *left))
                })
                .next();

            match best {
                Some((distance, left)) => pairs.push(PairCandidate::new(
                    PairType::CrossLibrary,
                    left.clone(),
                    image.image.clone(),
                    distance,
                    self.params,
                )),
                None => unmatched.push(UnmatchedRecord {
                    image: image.image.clone(),
                }),
            }
        }

        Ok((pairs, unmatched))
    }

    /// Run every pass and rank the result.
    pub fn generate(
        &self,
        primary: &IndexedLibrary<'_>,
        secondary: Option<&IndexedLibrary<'_>>,
    ) -> Result<CandidateSet, IndexError> {
        let mut candidates = self.dedupe(primary)?;
        let mut unmatched = Vec::new();

        if let Some(secondary) = secondary {
            candidates.extend(self.dedupe(secondary)?);
            let (cross, missing) = self.cross_match(primary, secondary.images)?;
            candidates.extend(cross);
            unmatched = missing;
        }

        sort_candidates(&mut candidates);
        Ok(CandidateSet {
            candidates,
            unmatched,
        })
    }
}

/// Ascending distance, then pair type, then pair id
pub fn sort_candidates(candidates: &mut [PairCandidate]) {
    candidates.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| a.pair_type.cmp(&b.pair_type))
            .then_with(|| a.pair_id.cmp(&b.pair_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::{HashBits, HashCode, HashMethod};
    use std::path::PathBuf;

    fn params() -> HashParams {
        HashParams::new(HashMethod::Ahash, 3)
    }

    fn hashed(library: LibraryTag, id: &str, pattern: &str) -> HashedImage {
        let bits = HashBits::from_bits(pattern.chars().map(|c| c == '1'));
        HashedImage {
            code: HashCode::new(id, library, params(), bits).unwrap(),
            image: ImageRef {
                id: id.to_string(),
                library,
                path: PathBuf::from(format!("/{}/{}.jpg", library, id)),
                display_name: format!("{}.jpg", id),
            },
            from_cache: false,
        }
    }

    fn generator(dedupe: u32, cross: u32) -> CandidateGenerator {
        CandidateGenerator::new(
            params(),
            MatchConfig {
                dedupe_threshold: dedupe,
                cross_threshold: cross,
            },
        )
    }

    #[test]
    fn dedupe_collapses_symmetric_pairs_and_skips_self() {
        let images = vec![
            hashed(LibraryTag::Photos, "b", "000000000"),
            hashed(LibraryTag::Photos, "a", "100000000"),
        ];
        let library = IndexedLibrary::build(LibraryTag::Photos, params(), &images).unwrap();

        let pairs = generator(1, 0).dedupe(&library).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].left.id, "a");
        assert_eq!(pairs[0].right.id, "b");
        assert_eq!(pairs[0].pair_type, PairType::DupeWithinPhotos);
        assert_eq!(pairs[0].distance, 1);
    }

    #[test]
    fn identical_codes_pair_at_distance_zero() {
        let images = vec![
            hashed(LibraryTag::Iphoto, "x", "111000111"),
            hashed(LibraryTag::Iphoto, "y", "111000111"),
        ];
        let library = IndexedLibrary::build(LibraryTag::Iphoto, params(), &images).unwrap();

        let pairs = generator(0, 0).dedupe(&library).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].distance, 0);
        assert_eq!(pairs[0].pair_type, PairType::DupeWithinIphoto);
    }

    #[test]
    fn cross_match_keeps_closest_and_breaks_ties_by_primary_id() {
        let primary_images = vec![
            hashed(LibraryTag::Photos, "p2", "110000000"),
            hashed(LibraryTag::Photos, "p1", "011000000"),
            hashed(LibraryTag::Photos, "p3", "111111111"),
        ];
        let primary = IndexedLibrary::build(LibraryTag::Photos, params(), &primary_images).unwrap();
        // One bit from p2 and one bit from p1
        let secondary = vec![hashed(LibraryTag::Iphoto, "s", "010000000")];

        let (pairs, unmatched) = generator(0, 3).cross_match(&primary, &secondary).unwrap();
        assert!(unmatched.is_empty());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].left.id, "p1");
        assert_eq!(pairs[0].right.id, "s");
        assert_eq!(pairs[0].distance, 1);
    }

    #[test]
    fn secondary_without_match_is_unmatched_once() {
        let primary_images = vec![hashed(LibraryTag::Photos, "p", "000000000")];
        let primary = IndexedLibrary::build(LibraryTag::Photos, params(), &primary_images).unwrap();
        let secondary_images = vec![
            hashed(LibraryTag::Iphoto, "near", "000000001"),
            hashed(LibraryTag::Iphoto, "far", "111111111"),
        ];
        let secondary =
            IndexedLibrary::build(LibraryTag::Iphoto, params(), &secondary_images).unwrap();

        let set = generator(0, 2).generate(&primary, Some(&secondary)).unwrap();
        assert_eq!(set.unmatched.len(), 1);
        assert_eq!(set.unmatched[0].image.id, "far");
        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.candidates[0].pair_type, PairType::CrossLibrary);
    }

    #[test]
    fn ordering_puts_dupes_before_cross_at_equal_distance() {
        let primary_images = vec![
            hashed(LibraryTag::Photos, "p1", "000000000"),
            hashed(LibraryTag::Photos, "p2", "000000000"),
        ];
        let secondary_images = vec![hashed(LibraryTag::Iphoto, "s", "000000000")];
        let primary = IndexedLibrary::build(LibraryTag::Photos, params(), &primary_images).unwrap();
        let secondary =
            IndexedLibrary::build(LibraryTag::Iphoto, params(), &secondary_images).unwrap();

        let set = generator(0, 0).generate(&primary, Some(&secondary)).unwrap();
        let types: Vec<PairType> = set.candidates.iter().map(|c| c.pair_type).collect();
        assert_eq!(types, vec![PairType::DupeWithinPhotos, PairType::CrossLibrary]);
        assert_eq!(set.candidates[1].left.id, "p1");
    }

    #[test]
    fn without_secondary_only_dedupe_runs() {
        let images = vec![
            hashed(LibraryTag::Photos, "a", "000000000"),
            hashed(LibraryTag::Photos, "b", "000000011"),
            hashed(LibraryTag::Photos, "c", "000000111"),
        ];
        let primary = IndexedLibrary::build(LibraryTag::Photos, params(), &images).unwrap();

        let set = generator(2, 8).generate(&primary, None).unwrap();
        assert!(set.unmatched.is_empty());
        let distances: Vec<u32> = set.candidates.iter().map(|c| c.distance).collect();
        assert_eq!(distances, vec![1, 2]);
        assert!(set.candidates.iter().all(|c| c.distance <= 2));
    }
}
