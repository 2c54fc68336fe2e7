/// Difficulty and boundary conversions.
///
/// A share is valid when its final hash, read as a big-endian 256-bit
/// integer, does not exceed the boundary. Boundaries arrive either as a
/// difficulty (`floor((2^256 - 1) / d)`) or in Bitcoin's compact "nBits"
/// encoding used by stratum pools.

use primitive_types::U256;

use super::hash_types::Hash256;

/// Decoded compact boundary plus the sign/overflow flags of the nBits
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactBoundary {
    pub boundary: Hash256,
    pub negative: bool,
    pub overflow: bool,
}

/// Boundary for a given difficulty, emitted as 32 big-endian bytes.
///
/// For `d <= 1` every hash passes, so the boundary is all ones.
pub fn boundary_from_difficulty(difficulty: U256) -> Hash256 {
    let mut bytes = [0u8; 32];
    if difficulty > U256::one() {
        (U256::MAX / difficulty).to_big_endian(&mut bytes);
    } else {
        bytes = [0xff; 32];
    }
    Hash256::from_bytes(bytes)
}

/// Decode a Bitcoin-style compact target.
///
/// `size = nbits >> 24`, `word = nbits & 0x007fffff`; the word is shifted
/// into position `8 * (size - 3)` bits from the bottom. The negative and
/// overflow flags mirror bitcoind's `arith_uint256::SetCompact`.
pub fn boundary_from_compact(nbits: u32) -> CompactBoundary {
    let size = nbits >> 24;
    let word = nbits & 0x007f_ffff;

    let value = if size <= 3 {
        U256::from(word >> (8 * (3 - size)))
    } else {
        let shift = 8 * (size - 3);
        if shift >= 256 {
            U256::zero()
        } else {
            U256::from(word) << shift
        }
    };

    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);

    CompactBoundary {
        boundary: Hash256::from_bytes(bytes),
        negative: word != 0 && (nbits & 0x0080_0000) != 0,
        overflow: word != 0
            && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_difficulty_passes_everything() {
        assert_eq!(
            boundary_from_difficulty(U256::zero()),
            Hash256::from_bytes([0xff; 32])
        );
        assert_eq!(
            boundary_from_difficulty(U256::one()),
            Hash256::from_bytes([0xff; 32])
        );
    }

    #[test]
    fn power_of_two_difficulty() {
        // (2^256 - 1) / 2^32 leaves 32 one-bits at the top cleared.
        let boundary = boundary_from_difficulty(U256::from(1u64 << 32));
        let mut expected = [0xffu8; 32];
        expected[0] = 0;
        expected[1] = 0;
        expected[2] = 0;
        expected[3] = 0;
        assert_eq!(boundary, Hash256::from_bytes(expected));
    }

    #[test]
    fn monotonic_in_difficulty() {
        let mut previous = boundary_from_difficulty(U256::from(2u32));
        for d in [3u64, 10, 1000, 1 << 20, 1 << 40] {
            let next = boundary_from_difficulty(U256::from(d));
            assert!(next.is_less_or_equal(&previous));
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn compact_mainnet_genesis_bits() {
        // 0x1d00ffff: word 0x00ffff shifted 26 bytes up.
        let decoded = boundary_from_compact(0x1d00ffff);
        let mut expected = [0u8; 32];
        expected[4] = 0xff;
        expected[5] = 0xff;
        assert_eq!(decoded.boundary, Hash256::from_bytes(expected));
        assert!(!decoded.negative);
        assert!(!decoded.overflow);
    }

    #[test]
    fn compact_small_sizes_shift_down() {
        // size 1 keeps only the top byte of the word.
        let decoded = boundary_from_compact(0x01123456);
        let mut expected = [0u8; 32];
        expected[31] = 0x12;
        assert_eq!(decoded.boundary, Hash256::from_bytes(expected));
    }

    #[test]
    fn compact_flags() {
        assert!(boundary_from_compact(0x01803456).negative);
        assert!(!boundary_from_compact(0x01800000).negative);
        assert!(boundary_from_compact(0x23000001).overflow);
        assert!(boundary_from_compact(0x22000100).overflow);
        assert!(boundary_from_compact(0x21010000).overflow);
        assert!(!boundary_from_compact(0x20ffffff).overflow);
    }
}
