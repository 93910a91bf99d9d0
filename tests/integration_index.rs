//! Integration tests for the BK-tree index and candidate ranking.
//!
//! Codes here are synthetic so exact distances can be chosen.

use photo_library_matcher::core::catalog::{ImageRef, LibraryTag};
use photo_library_matcher::core::hasher::{HashBits, HashCode, HashMethod, HashParams};
use photo_library_matcher::core::index::SimilarityIndex;
use photo_library_matcher::core::matcher::{
    CandidateGenerator, IndexedLibrary, MatchConfig, PairType,
};
use photo_library_matcher::core::pool::HashedImage;
use std::collections::HashSet;
use std::path::PathBuf;

fn params() -> HashParams {
    HashParams::new(HashMethod::Dhash, 8)
}

/// Deterministic pseudo-random 64-bit words
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

fn code_from_word(library: LibraryTag, id: &str, word: u64) -> HashCode {
    let bits = HashBits::from_bits((0..64).rev().map(|i| (word >> i) & 1 == 1));
    HashCode::new(id, library, params(), bits).unwrap()
}

/// Words clustered around a few centres so small radii have answers
fn random_words(count: usize, seed: u64) -> Vec<(String, u64)> {
    let mut rng = XorShift(seed);
    (0..count)
        .map(|i| {
            let centre = [0u64, u64::MAX, 0x00FF_00FF_00FF_00FF][i % 3];
            let noise = rng.next() & rng.next() & rng.next();
            (format!("img{:03}", i), centre ^ noise)
        })
        .collect()
}

fn random_codes(count: usize, seed: u64) -> Vec<HashCode> {
    random_words(count, seed)
        .into_iter()
        .map(|(id, word)| code_from_word(LibraryTag::Photos, &id, word))
        .collect()
}

fn hashed(library: LibraryTag, id: &str, word: u64) -> HashedImage {
    HashedImage {
        code: code_from_word(library, id, word),
        image: ImageRef {
            id: id.to_string(),
            library,
            path: PathBuf::from(format!("/{}/{}.jpg", library, id)),
            display_name: format!("{}.jpg", id),
        },
        from_cache: false,
    }
}

#[test]
fn range_queries_match_a_linear_scan() {
    let codes = random_codes(300, 0x9E37_79B9_7F4A_7C15);
    let index = SimilarityIndex::from_codes(params(), codes.iter().cloned()).unwrap();
    assert_eq!(index.len(), codes.len());

    for query in codes.iter().step_by(7) {
        for radius in [0, 3, 8, 16] {
            let found: HashSet<&str> = index
                .query_within(query, radius)
                .unwrap()
                .iter()
                .map(|m| m.code.owner_id.as_str())
                .collect();
            let expected: HashSet<&str> = codes
                .iter()
                .filter(|c| c.distance(query).unwrap() <= radius)
                .map(|c| c.owner_id.as_str())
                .collect();
            assert_eq!(found, expected, "query {} radius {}", query.owner_id, radius);
        }
    }
}

#[test]
fn query_results_are_sorted_and_exact() {
    let codes = random_codes(120, 42);
    let index = SimilarityIndex::from_codes(params(), codes.iter().cloned()).unwrap();
    let query = &codes[0];

    let matches = index.query_within(query, 20).unwrap();
    for window in matches.windows(2) {
        assert!(window[0].distance <= window[1].distance);
    }
    for m in &matches {
        assert_eq!(m.distance, m.code.distance(query).unwrap());
    }
}

#[test]
fn distance_is_a_metric() {
    let codes = random_codes(40, 7);
    for a in &codes {
        assert_eq!(a.distance(a).unwrap(), 0);
        for b in &codes {
            let ab = a.distance(b).unwrap();
            assert_eq!(ab, b.distance(a).unwrap());
            for c in codes.iter().take(10) {
                assert!(a.distance(c).unwrap() <= ab + b.distance(c).unwrap());
            }
        }
    }
}

#[test]
fn inserting_the_same_bits_twice_keeps_both_retrievable() {
    let first = code_from_word(LibraryTag::Photos, "first", 0xDEAD_BEEF);
    let second = code_from_word(LibraryTag::Photos, "second", 0xDEAD_BEEF);

    let mut index = SimilarityIndex::new(params());
    index.insert(first.clone()).unwrap();
    index.insert(second).unwrap();

    assert_eq!(index.len(), 2);
    assert_eq!(index.node_count(), 1);

    let ids: Vec<&str> = index
        .query_within(&first, 0)
        .unwrap()
        .iter()
        .map(|m| m.code.owner_id.as_str())
        .collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[test]
fn three_near_duplicates_rank_the_closest_pair_first() {
    // d(a,b) = 2, d(a,c) = 3, d(b,c) = 5
    let images = vec![
        hashed(LibraryTag::Photos, "a", 0b00000),
        hashed(LibraryTag::Photos, "b", 0b00011),
        hashed(LibraryTag::Photos, "c", 0b11100),
    ];
    let library = IndexedLibrary::build(LibraryTag::Photos, params(), &images).unwrap();
    let generator = CandidateGenerator::new(
        params(),
        MatchConfig {
            dedupe_threshold: 3,
            cross_threshold: 0,
        },
    );

    let set = generator.generate(&library, None).unwrap();
    let pairs: Vec<(&str, &str, u32)> = set
        .candidates
        .iter()
        .map(|c| (c.left.id.as_str(), c.right.id.as_str(), c.distance))
        .collect();

    assert_eq!(pairs, vec![("a", "b", 2), ("a", "c", 3)]);
    assert!(set
        .candidates
        .iter()
        .all(|c| c.pair_type == PairType::DupeWithinPhotos));
}

#[test]
fn candidates_never_pair_an_item_with_itself_or_repeat() {
    let primary: Vec<HashedImage> = random_words(60, 11)
        .into_iter()
        .map(|(id, word)| hashed(LibraryTag::Photos, &id, word))
        .collect();
    let secondary: Vec<HashedImage> = random_words(30, 13)
        .into_iter()
        .map(|(id, word)| hashed(LibraryTag::Iphoto, &format!("s-{}", id), word))
        .collect();

    let primary = IndexedLibrary::build(LibraryTag::Photos, params(), &primary).unwrap();
    let secondary = IndexedLibrary::build(LibraryTag::Iphoto, params(), &secondary).unwrap();
    let generator = CandidateGenerator::new(params(), MatchConfig::default());
    let set = generator.generate(&primary, Some(&secondary)).unwrap();

    let mut seen = HashSet::new();
    let mut id_pairs = HashSet::new();
    for pair in &set.candidates {
        assert_ne!(pair.left.id, pair.right.id, "self pair {}", pair.left.id);
        assert!(seen.insert(pair.pair_id.clone()), "repeated {}", pair.pair_id);
        let key = if pair.left.id < pair.right.id {
            (pair.left.id.clone(), pair.right.id.clone())
        } else {
            (pair.right.id.clone(), pair.left.id.clone())
        };
        assert!(id_pairs.insert(key), "repeated ids {} {}", pair.left.id, pair.right.id);
    }

    // Each secondary item is either cross-matched once or unmatched
    let crossed = set.candidates.iter().filter(|c| c.pair_type == PairType::CrossLibrary).count();
    assert_eq!(crossed + set.unmatched.len(), 30);

    for window in set.candidates.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        assert!((a.distance, a.pair_type, &a.pair_id) <= (b.distance, b.pair_type, &b.pair_id));
    }
}
