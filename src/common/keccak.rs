/// Keccak permutations and sponges.
///
/// Implements Keccak-f[1600] (24 rounds, 64-bit lanes) and Keccak-f[800]
/// (22 rounds, 32-bit lanes), plus the Keccak-256/512 sponge wrappers with
/// Ethereum's historical 0x01 suffix byte. This is pre-standard Keccak, not
/// SHA3 (which pads with 0x06).

use byteorder::{ByteOrder, LittleEndian};

use super::hash_types::{Hash256, Hash512};

/// Keccak-f[800] state: 25 x 32-bit words.
pub type KeccakState800 = [u32; 25];

/// Keccak-f[1600] state: 25 x 64-bit words.
pub type KeccakState1600 = [u64; 25];

const ROUND_CONSTANTS_64: [u64; 24] = [
    0x0000000000000001, 0x0000000000008082, 0x800000000000808a, 0x8000000080008000,
    0x000000000000808b, 0x0000000080000001, 0x8000000080008081, 0x8000000000008009,
    0x000000000000008a, 0x0000000000000088, 0x0000000080008009, 0x000000008000000a,
    0x000000008000808b, 0x800000000000008b, 0x8000000000008089, 0x8000000000008003,
    0x8000000000008002, 0x8000000000000080, 0x000000000000800a, 0x800000008000000a,
    0x8000000080008081, 0x8000000000008080, 0x0000000080000001, 0x8000000080008008,
];

/// f[800] round constants: the low 32 bits of the f[1600] constants,
/// truncated to the 22 rounds of the smaller permutation.
const ROUND_CONSTANTS_32: [u32; 22] = [
    0x00000001, 0x00008082, 0x0000808a, 0x80008000, 0x0000808b, 0x80000001,
    0x80008081, 0x00008009, 0x0000008a, 0x00000088, 0x80008009, 0x8000000a,
    0x8000808b, 0x0000008b, 0x00008089, 0x00008003, 0x00008002, 0x00000080,
    0x0000800a, 0x8000000a, 0x80008081, 0x00008080,
];

/// Rotation offset of each source lane (row-major, index = 5y + x).
/// f[800] uses the same table reduced mod 32.
const RHO: [u32; 25] = [
    0, 1, 62, 28, 27, //
    36, 44, 6, 55, 20, //
    3, 10, 43, 25, 39, //
    41, 45, 15, 21, 8, //
    18, 2, 61, 56, 14,
];

/// Source lane gathered into each destination by the pi step.
const PI: [usize; 25] = [
    0, 6, 12, 18, 24, //
    3, 9, 10, 16, 22, //
    1, 7, 13, 19, 20, //
    4, 5, 11, 17, 23, //
    2, 8, 14, 15, 21,
];

/// The Keccak-f[1600] permutation.
pub fn keccakf1600(state: &mut KeccakState1600) {
    for rc in ROUND_CONSTANTS_64 {
        // Theta
        let mut c = [0u64; 5];
        for x in 0..5 {
            c[x] = state[x] ^ state[x + 5] ^ state[x + 10] ^ state[x + 15] ^ state[x + 20];
        }
        let mut d = [0u64; 5];
        for x in 0..5 {
            d[x] = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
        }
        for (i, lane) in state.iter_mut().enumerate() {
            *lane ^= d[i % 5];
        }

        // Rho + Pi, gathered into the destination order
        let mut b = [0u64; 25];
        for i in 0..25 {
            b[i] = state[PI[i]].rotate_left(RHO[PI[i]]);
        }

        // Chi
        for y in 0..5 {
            let base = y * 5;
            for x in 0..5 {
                state[base + x] =
                    b[base + x] ^ (!b[base + (x + 1) % 5] & b[base + (x + 2) % 5]);
            }
        }

        // Iota
        state[0] ^= rc;
    }
}

/// The Keccak-f[800] permutation.
pub fn keccakf800(state: &mut KeccakState800) {
    for rc in ROUND_CONSTANTS_32 {
        let mut c = [0u32; 5];
        for x in 0..5 {
            c[x] = state[x] ^ state[x + 5] ^ state[x + 10] ^ state[x + 15] ^ state[x + 20];
        }
        let mut d = [0u32; 5];
        for x in 0..5 {
            d[x] = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
        }
        for (i, lane) in state.iter_mut().enumerate() {
            *lane ^= d[i % 5];
        }

        let mut b = [0u32; 25];
        for i in 0..25 {
            b[i] = state[PI[i]].rotate_left(RHO[PI[i]] % 32);
        }

        for y in 0..5 {
            let base = y * 5;
            for x in 0..5 {
                state[base + x] =
                    b[base + x] ^ (!b[base + (x + 1) % 5] & b[base + (x + 2) % 5]);
            }
        }

        state[0] ^= rc;
    }
}

/// Sponge over Keccak-f[1600] with rate 1600 - 2 * `bits` and the 0x01
/// suffix byte. `out` receives `bits / 8` digest bytes, little-endian per
/// 64-bit state word.
fn keccak(out: &mut [u8], bits: usize, input: &[u8]) {
    let block_size = (1600 - bits * 2) / 8;
    let block_words = block_size / 8;

    let mut state: KeccakState1600 = [0; 25];

    let mut blocks = input.chunks_exact(block_size);
    for block in &mut blocks {
        for (word, chunk) in state[..block_words].iter_mut().zip(block.chunks_exact(8)) {
            *word ^= LittleEndian::read_u64(chunk);
        }
        keccakf1600(&mut state);
    }

    // Final partial block: append the 0x01 suffix right after the input and
    // set the most significant bit of the last rate word.
    let remainder = blocks.remainder();
    let mut last = [0u8; 144];
    last[..remainder.len()].copy_from_slice(remainder);
    last[remainder.len()] = 0x01;
    for (word, chunk) in state[..block_words]
        .iter_mut()
        .zip(last[..block_size].chunks_exact(8))
    {
        *word ^= LittleEndian::read_u64(chunk);
    }
    state[block_words - 1] ^= 0x8000_0000_0000_0000;

    keccakf1600(&mut state);

    for (chunk, word) in out.chunks_exact_mut(8).zip(state.iter()) {
        LittleEndian::write_u64(chunk, *word);
    }
}

/// Keccak-256 of an arbitrary byte string.
pub fn keccak256(input: &[u8]) -> Hash256 {
    let mut out = [0u8; 32];
    keccak(&mut out, 256, input);
    Hash256::from_bytes(out)
}

/// Keccak-512 of an arbitrary byte string.
pub fn keccak512(input: &[u8]) -> Hash512 {
    let mut out = [0u8; 64];
    keccak(&mut out, 512, input);
    Hash512::from_bytes(out)
}
