//! Hash codes bound to their owning library item.

use super::{HashBits, HashMethod};
use crate::core::catalog::LibraryTag;
use crate::error::{HashError, IndexError};
use serde::{Deserialize, Serialize};

/// Hash method and grid size. Two codes are comparable only when these match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashParams {
    pub method: HashMethod,
    pub size: u32,
}

impl HashParams {
    pub fn new(method: HashMethod, size: u32) -> Self {
        Self { method, size }
    }

    /// Number of bits a code with these parameters carries
    pub fn bit_len(&self) -> u32 {
        self.size.saturating_mul(self.size)
    }

    /// Error describing a comparison between `self` and `other`
    pub fn incomparable(&self, other: &HashParams) -> IndexError {
        IndexError::IncomparableHash {
            left_method: self.method.to_string(),
            left_size: self.size,
            right_method: other.method.to_string(),
            right_size: other.size,
        }
    }
}

impl std::fmt::Display for HashParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.method, self.size)
    }
}

/// Perceptual hash of one library item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCode {
    pub owner_id: String,
    pub library: LibraryTag,
    pub method: HashMethod,
    pub size: u32,
    pub bits: HashBits,
}

impl HashCode {
    /// Build a code, checking that `bits` holds exactly `size²` bits.
    pub fn new(
        owner_id: impl Into<String>,
        library: LibraryTag,
        params: HashParams,
        bits: HashBits,
    ) -> Result<Self, HashError> {
        if params.size == 0 {
            return Err(HashError::ComputationFailed(
                "hash size must be positive".to_string(),
            ));
        }
        if bits.len() != params.bit_len() {
            return Err(HashError::ComputationFailed(format!(
                "{} hash must have {} bits, got {}",
                params,
                params.bit_len(),
                bits.len()
            )));
        }

        Ok(Self {
            owner_id: owner_id.into(),
            library,
            method: params.method,
            size: params.size,
            bits,
        })
    }

    pub fn params(&self) -> HashParams {
        HashParams::new(self.method, self.size)
    }

    pub fn is_comparable(&self, other: &HashCode) -> bool {
        self.method == other.method && self.size == other.size
    }

    /// Hamming distance to another code of the same method and size.
    pub fn distance(&self, other: &HashCode) -> Result<u32, IndexError> {
        if !self.is_comparable(other) {
            return Err(self.params().incomparable(&other.params()));
        }
        Ok(self.bits.hamming(&other.bits))
    }

    /// Integer encoding of the bits as hex
    pub fn to_hex(&self) -> String {
        self.bits.to_hex()
    }
}
