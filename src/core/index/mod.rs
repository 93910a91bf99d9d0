//! # Index Module
//!
//! BK-tree over hash codes under Hamming distance.
//!
//! ## How It Works
//! - Every node holds one bit pattern. A child hangs off its parent on the
//!   edge labelled with their distance.
//! - A range query at radius `r` from a node at distance `d` only descends
//!   into edges labelled `d - r ..= d + r` (triangle inequality), so most of
//!   the tree is never visited.
//! - Codes with identical bits share a node.
//!
//! ## Performance
//! - Insert: O(depth) distance computations
//! - Query: sub-linear for small radii, never worse than a linear scan
//!
//! Nodes live in an arena and refer to each other by index.

use crate::core::hasher::{HashCode, HashParams};
use crate::error::IndexError;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Node {
    /// Codes with identical bits; never empty
    codes: Vec<HashCode>,
    /// Edge label (distance to this node) -> child node index
    children: BTreeMap<u32, usize>,
}

impl Node {
    fn new(code: HashCode) -> Self {
        Self {
            codes: vec![code],
            children: BTreeMap::new(),
        }
    }

    fn pivot(&self) -> &HashCode {
        &self.codes[0]
    }
}

/// A code found by a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMatch<'a> {
    pub code: &'a HashCode,
    pub distance: u32,
}

/// Distance-indexed set of codes of one method and size.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    params: HashParams,
    nodes: Vec<Node>,
    len: usize,
    depth: usize,
}

impl SimilarityIndex {
    pub fn new(params: HashParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            len: 0,
            depth: 0,
        }
    }

    /// Build an index from codes, inserting in iteration order.
    pub fn from_codes<I>(params: HashParams, codes: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = HashCode>,
    {
        let mut index = Self::new(params);
        for code in codes {
            index.insert(code)?;
        }
        Ok(index)
    }

    pub fn params(&self) -> HashParams {
        self.params
    }

    fn check_comparable(&self, code: &HashCode) -> Result<(), IndexError> {
        if code.params() != self.params {
            return Err(self.params.incomparable(&code.params()));
        }
        Ok(())
    }

    /// Add a code. Inserting the same code twice keeps both copies.
    pub fn insert(&mut self, code: HashCode) -> Result<(), IndexError> {
        self.check_comparable(&code)?;

        if self.nodes.is_empty() {
            self.nodes.push(Node::new(code));
            self.len = 1;
            self.depth = 1;
            return Ok(());
        }

        let mut current = 0;
        let mut level = 1;
        loop {
            let distance = self.nodes[current].pivot().bits.hamming(&code.bits);
            if distance == 0 {
                self.nodes[current].codes.push(code);
                self.len += 1;
                return Ok(());
            }

            match self.nodes[current].children.get(&distance) {
                Some(&child) => {
                    current = child;
                    level += 1;
                }
                None => {
                    let index = self.nodes.len();
                    self.nodes.push(Node::new(code));
                    self.nodes[current].children.insert(distance, index);
                    self.len += 1;
                    self.depth = self.depth.max(level + 1);
                    return Ok(());
                }
            }
        }
    }

    /// Every code within `max_distance` of `target`, nearest first.
    ///
    /// Ties are ordered by library then owner id. The target itself is
    /// returned if it was inserted; callers exclude self matches.
    pub fn query_within(
        &self,
        target: &HashCode,
        max_distance: u32,
    ) -> Result<Vec<IndexMatch<'_>>, IndexError> {
        self.check_comparable(target)?;

        let mut matches = Vec::new();
        if self.nodes.is_empty() {
            return Ok(matches);
        }

        let mut stack = vec![0usize];
        let mut visited = 0usize;
        while let Some(current) = stack.pop() {
            visited += 1;
            let node = &self.nodes[current];
            let distance = node.pivot().bits.hamming(&target.bits);

            if distance <= max_distance {
                matches.extend(node.codes.iter().map(|code| IndexMatch { code, distance }));
            }

            let low = distance.saturating_sub(max_distance);
            let high = distance.saturating_add(max_distance);
            stack.extend(node.children.range(low..=high).map(|(_, &child)| child));
        }

        tracing::trace!(
            "BK-tree query for {}: visited {}/{} nodes, {} matches within {}",
            target.owner_id,
            visited,
            self.nodes.len(),
            matches.len(),
            max_distance
        );

        matches.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.code.library.cmp(&b.code.library))
                .then_with(|| a.code.owner_id.cmp(&b.code.owner_id))
        });
        Ok(matches)
    }

    /// Number of codes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct bit patterns
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path, counted in nodes
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// All codes in insertion-tree order
    pub fn iter(&self) -> impl Iterator<Item = &HashCode> {
        self.nodes.iter().flat_map(|node| node.codes.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::LibraryTag;
    use crate::core::hasher::{HashBits, HashMethod};

    fn params() -> HashParams {
        HashParams::new(HashMethod::Dhash, 3)
    }

    fn code(id: &str, pattern: &str) -> HashCode {
        let bits = HashBits::from_bits(pattern.chars().map(|c| c == '1'));
        HashCode::new(id, LibraryTag::Photos, params(), bits).unwrap()
    }

    fn ids(matches: &[IndexMatch<'_>]) -> Vec<String> {
        matches.iter().map(|m| m.code.owner_id.clone()).collect()
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = SimilarityIndex::new(params());
        assert!(index.is_empty());
        assert_eq!(index.depth(), 0);
        let target = code("p", "000000000");
        assert!(index.query_within(&target, 9).unwrap().is_empty());
    }

    #[test]
    fn first_insert_becomes_root() {
        let mut index = SimilarityIndex::new(params());
        index.insert(code("a", "000000000")).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.node_count(), 1);
        assert_eq!(index.depth(), 1);
    }

    #[test]
    fn children_hang_on_distance_edges() {
        let mut index = SimilarityIndex::new(params());
        index.insert(code("root", "000000000")).unwrap();
        index.insert(code("one", "100000000")).unwrap();
        // Same distance from the root as "one", so it descends below it
        index.insert(code("other", "010000000")).unwrap();

        assert_eq!(index.node_count(), 3);
        assert_eq!(index.depth(), 3);
    }

    #[test]
    fn query_returns_nearest_first_within_radius() {
        let mut index = SimilarityIndex::new(params());
        for (id, bits) in [
            ("far", "111111111"),
            ("two", "110000000"),
            ("zero", "000000000"),
            ("one", "100000000"),
        ] {
            index.insert(code(id, bits)).unwrap();
        }

        let target = code("target", "000000000");
        let matches = index.query_within(&target, 2).unwrap();
        assert_eq!(ids(&matches), vec!["zero", "one", "two"]);
        assert_eq!(
            matches.iter().map(|m| m.distance).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn duplicate_codes_share_a_node_and_are_both_returned() {
        let mut index = SimilarityIndex::new(params());
        index.insert(code("b", "101010101")).unwrap();
        index.insert(code("a", "101010101")).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.node_count(), 1);

        let matches = index.query_within(&code("p", "101010101"), 0).unwrap();
        assert_eq!(ids(&matches), vec!["a", "b"]);
    }

    #[test]
    fn incomparable_codes_are_rejected() {
        let mut index = SimilarityIndex::new(params());
        let other = HashCode::new(
            "x",
            LibraryTag::Photos,
            HashParams::new(HashMethod::Phash, 3),
            HashBits::from_bits([false; 9]),
        )
        .unwrap();

        assert!(matches!(
            index.insert(other.clone()),
            Err(IndexError::IncomparableHash { .. })
        ));
        assert!(index.query_within(&other, 1).is_err());
    }

    #[test]
    fn iter_visits_every_code() {
        let index = SimilarityIndex::from_codes(
            params(),
            vec![code("a", "000000000"), code("b", "000000000"), code("c", "111000000")],
        )
        .unwrap();
        let mut all: Vec<&str> = index.iter().map(|c| c.owner_id.as_str()).collect();
        all.sort();
        assert_eq!(all, vec!["a", "b", "c"]);
    }
}
