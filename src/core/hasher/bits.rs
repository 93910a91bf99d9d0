//! Fixed-length bit vectors produced by the hash algorithms.

use crate::error::HashError;
use serde::{Deserialize, Serialize};

/// A packed, fixed-length bit vector.
///
/// Bits are stored most-significant-first within each byte. Unused bits in
/// the final byte are always zero, so they never contribute to a distance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "EncodedBits", try_from = "EncodedBits")]
pub struct HashBits {
    bytes: Vec<u8>,
    len: u32,
}

impl HashBits {
    /// Pack a sequence of bits, first bit into the highest position.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bytes = Vec::new();
        let mut current_byte: u8 = 0;
        let mut bit_position = 0;
        let mut len: u32 = 0;

        for bit in bits {
            if bit {
                current_byte |= 1 << (7 - bit_position);
            }
            bit_position += 1;
            len += 1;

            if bit_position == 8 {
                bytes.push(current_byte);
                current_byte = 0;
                bit_position = 0;
            }
        }

        if bit_position > 0 {
            bytes.push(current_byte);
        }

        Self { bytes, len }
    }

    /// Wrap already-packed bytes holding `len` bits.
    pub fn from_bytes(bytes: Vec<u8>, len: u32) -> Result<Self, HashError> {
        let expected = byte_len(len);
        if bytes.len() != expected {
            return Err(HashError::ComputationFailed(format!(
                "expected {} bytes for a {}-bit hash, got {}",
                expected,
                len,
                bytes.len()
            )));
        }
        Ok(Self { bytes, len })
    }

    /// Parse the hexadecimal encoding produced by [`HashBits::to_hex`].
    pub fn from_hex(hex: &str, len: u32) -> Result<Self, HashError> {
        if !hex.is_ascii() || hex.len() % 2 != 0 {
            return Err(HashError::ComputationFailed(format!(
                "hash hex '{}' is not an even run of hex digits",
                hex
            )));
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| HashError::ComputationFailed(format!("invalid hash hex '{}': {}", hex, e)))?;

        Self::from_bytes(bytes, len)
    }

    /// Number of bits in the hash
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Value of the bit at `index` (0 = first bit).
    pub fn bit(&self, index: u32) -> bool {
        if index >= self.len {
            return false;
        }
        let byte = self.bytes[(index / 8) as usize];
        byte & (1 << (7 - index % 8)) != 0
    }

    /// Hamming distance: the number of positions where the two vectors differ.
    ///
    /// Callers must make sure both vectors have the same length; see
    /// [`HashCode::distance`](super::HashCode::distance) for the checked form.
    pub fn hamming(&self, other: &Self) -> u32 {
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Integer encoding of the hash as a big-endian hexadecimal string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Similarity as a percentage (0-100)
    pub fn similarity(&self, other: &Self) -> f64 {
        if self.len == 0 {
            return 100.0;
        }
        (1.0 - (self.hamming(other) as f64 / self.len as f64)) * 100.0
    }
}

fn byte_len(bits: u32) -> usize {
    bits.div_ceil(8) as usize
}

/// Serialized form: hex digits plus the bit length.
#[derive(Serialize, Deserialize)]
struct EncodedBits {
    hex: String,
    bits: u32,
}

impl From<HashBits> for EncodedBits {
    fn from(value: HashBits) -> Self {
        Self {
            hex: value.to_hex(),
            bits: value.len,
        }
    }
}

impl TryFrom<EncodedBits> for HashBits {
    type Error = HashError;

    fn try_from(value: EncodedBits) -> Result<Self, Self::Error> {
        HashBits::from_hex(&value.hex, value.bits)
    }
}
