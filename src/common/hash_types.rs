/// Fixed-width digest types shared by the Ethash and ProgPoW pipelines.
///
/// Digests are stored as canonical byte arrays. The mix algorithms view them
/// as little-endian 32- or 64-bit words; those conversions happen only at the
/// accessor boundary so the byte layout on the wire never depends on host
/// endianness.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit hash (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

/// 512-bit hash (64 bytes), the light-cache item width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hash512(pub [u8; 64]);

/// 1024-bit hash (128 bytes), the full-dataset item width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hash1024(pub [u8; 128]);

/// 2048-bit hash (256 bytes), the L1-cache tile width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hash2048(pub [u8; 256]);

macro_rules! digest_impl {
    ($name:ident, $bytes:expr) => {
        impl $name {
            pub const SIZE: usize = $bytes;

            pub fn from_bytes(bytes: [u8; $bytes]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $bytes] {
                &self.0
            }

            /// Read 32-bit word `i` as little-endian.
            #[inline(always)]
            pub fn word32(&self, i: usize) -> u32 {
                LittleEndian::read_u32(&self.0[i * 4..])
            }

            /// Read 64-bit word `i` as little-endian.
            #[inline(always)]
            pub fn word64(&self, i: usize) -> u64 {
                LittleEndian::read_u64(&self.0[i * 8..])
            }

            /// Decode the whole digest into little-endian 32-bit words.
            #[inline]
            pub fn to_words32(&self) -> [u32; $bytes / 4] {
                let mut words = [0u32; $bytes / 4];
                LittleEndian::read_u32_into(&self.0, &mut words);
                words
            }

            /// Re-encode little-endian 32-bit words into a digest.
            #[inline]
            pub fn from_words32(words: &[u32; $bytes / 4]) -> Self {
                let mut bytes = [0u8; $bytes];
                LittleEndian::write_u32_into(words, &mut bytes);
                Self(bytes)
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != $bytes {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; $bytes];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $bytes])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

digest_impl!(Hash256, 32);
digest_impl!(Hash512, 64);
digest_impl!(Hash1024, 128);
digest_impl!(Hash2048, 256);

impl Hash256 {
    /// Compare two digests as big-endian unsigned 256-bit integers.
    ///
    /// Big-endian unsigned order over fixed-width values is exactly the
    /// lexicographic order of their byte arrays.
    #[inline]
    pub fn is_less_or_equal(&self, other: &Hash256) -> bool {
        self.0 <= other.0
    }

    /// Boundary check for a final hash: `self <= boundary`.
    #[inline]
    pub fn meets_boundary(&self, boundary: &Hash256) -> bool {
        self.is_less_or_equal(boundary)
    }
}

impl Hash512 {
    /// XOR at full 512-bit width.
    #[inline]
    pub fn xor(&self, other: &Hash512) -> Hash512 {
        let mut out = [0u8; 64];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a ^ b;
        }
        Hash512(out)
    }
}

impl Hash1024 {
    /// Concatenate two 512-bit halves.
    pub fn from_halves(h0: &Hash512, h1: &Hash512) -> Hash1024 {
        let mut bytes = [0u8; 128];
        bytes[..64].copy_from_slice(&h0.0);
        bytes[64..].copy_from_slice(&h1.0);
        Hash1024(bytes)
    }
}

impl Hash2048 {
    /// One 1024-bit half, `i < 2`.
    pub fn half(&self, i: usize) -> Hash1024 {
        let mut bytes = [0u8; 128];
        bytes.copy_from_slice(&self.0[i * 128..(i + 1) * 128]);
        Hash1024(bytes)
    }

    /// Concatenate four 512-bit quarters.
    pub fn from_quarters(parts: [&Hash512; 4]) -> Hash2048 {
        let mut bytes = [0u8; 256];
        for (i, part) in parts.iter().enumerate() {
            bytes[i * 64..(i + 1) * 64].copy_from_slice(&part.0);
        }
        Hash2048(bytes)
    }

    /// Concatenate two adjacent 1024-bit dataset items.
    pub fn from_items(h0: &Hash1024, h1: &Hash1024) -> Hash2048 {
        let mut bytes = [0u8; 256];
        bytes[..128].copy_from_slice(&h0.0);
        bytes[128..].copy_from_slice(&h1.0);
        Hash2048(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_accessors_are_little_endian() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x78;
        bytes[1] = 0x56;
        bytes[2] = 0x34;
        bytes[3] = 0x12;
        let hash = Hash256::from_bytes(bytes);
        assert_eq!(hash.word32(0), 0x12345678);
        assert_eq!(hash.word64(0), 0x12345678);
    }

    #[test]
    fn words_round_trip() {
        let mut bytes = [0u8; 64];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let hash = Hash512::from_bytes(bytes);
        assert_eq!(Hash512::from_words32(&hash.to_words32()), hash);
    }

    #[test]
    fn boundary_compare_is_big_endian() {
        let mut small = [0u8; 32];
        small[31] = 0xff;
        let mut big = [0u8; 32];
        big[0] = 0x01;
        let small = Hash256::from_bytes(small);
        let big = Hash256::from_bytes(big);
        assert!(small.is_less_or_equal(&big));
        assert!(!big.is_less_or_equal(&small));
        assert!(small.is_less_or_equal(&small));
    }

    #[test]
    fn hex_round_trip() {
        let hash = Hash256::from_bytes([0xab; 32]);
        assert_eq!(Hash256::from_hex(&hash.to_hex()).unwrap(), hash);
        assert!(Hash256::from_hex("abcd").is_err());
    }

    #[test]
    fn xor_512() {
        let a = Hash512::from_bytes([0b1010_1010; 64]);
        let b = Hash512::from_bytes([0b0101_0101; 64]);
        assert_eq!(a.xor(&b), Hash512::from_bytes([0xff; 64]));
    }
}
