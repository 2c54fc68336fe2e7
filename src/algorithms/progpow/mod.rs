/// ProgPoW: a programmatic proof-of-work built on random sequences of cache
/// accesses, register math and DAG reads, all driven by KISS99.
///
/// The per-period "random program" is the RNG state seeded from
/// `block_number / PROGPOW_PERIOD`; every one of the 64 rounds replays it
/// from the start, which is why the round helper takes the state by value.

pub mod kernel;

use byteorder::{ByteOrder, LittleEndian};

use crate::common::bitwise::{
    clz32, fnv1a, mul_hi32, popcnt32, rotl32, rotr32, FNV_OFFSET_BASIS,
};
use crate::common::keccak::{keccakf800, KeccakState800};
use crate::common::{Hash256, Kiss99};
use crate::error::{Result, VerificationResult};

use super::ethash::{epoch_from_block, get_epoch_context, EpochContext};
use super::PowResult;

/// Blocks before the random program changes.
pub const PROGPOW_PERIOD: u64 = 1;
/// Lanes that work together calculating a hash.
pub const PROGPOW_LANES: u32 = 16;
/// u32 registers per lane.
pub const PROGPOW_REGS: u32 = 32;
/// u32 loads from the DAG per lane.
pub const PROGPOW_DAG_LOADS: u32 = 4;
/// Bytes of the cached portion of the DAG.
pub const PROGPOW_CACHE_BYTES: u32 = 16 * 1024;
/// DAG accesses, also the number of loops executed.
pub const PROGPOW_CNT_DAG: u32 = 64;
/// Random cache accesses per loop.
pub const PROGPOW_CNT_CACHE: u32 = 11;
/// Random math instructions per loop.
pub const PROGPOW_CNT_MATH: u32 = 18;

/// u32 words each lane consumes from a 2048-bit DAG item.
pub const PROGPOW_WORDS_PER_LANE: u32 =
    (crate::common::Hash2048::SIZE as u32) / (4 * PROGPOW_LANES);

const LANES: usize = PROGPOW_LANES as usize;
const REGS: usize = PROGPOW_REGS as usize;
const CACHE_WORDS: u32 = PROGPOW_CACHE_BYTES / 4;
const WORDS_PER_LANE: usize = PROGPOW_WORDS_PER_LANE as usize;

/// ProgPoW period for a block number.
#[inline]
pub fn period_from_block(block_number: u64) -> u64 {
    block_number / PROGPOW_PERIOD
}

/// RNG state of the random program: a KISS99 generator plus precomputed
/// permutations of the destination and source register indexes.
#[derive(Debug, Clone)]
pub struct MixRngState {
    pub rng: Kiss99,
    dst_seq: [u32; REGS],
    src_seq: [u32; REGS],
    dst_counter: usize,
    src_counter: usize,
}

impl MixRngState {
    pub fn new(seed: u64) -> Self {
        let seed_lo = seed as u32;
        let seed_hi = (seed >> 32) as u32;

        let z = fnv1a(FNV_OFFSET_BASIS, seed_lo);
        let w = fnv1a(z, seed_hi);
        let jsr = fnv1a(w, seed_lo);
        let jcong = fnv1a(jsr, seed_hi);
        let mut rng = Kiss99::new(z, w, jsr, jcong);

        // Fisher-Yates over both sequences, interleaved draws.
        let mut dst_seq = [0u32; REGS];
        let mut src_seq = [0u32; REGS];
        for i in 0..REGS {
            dst_seq[i] = i as u32;
            src_seq[i] = i as u32;
        }
        for i in (2..=REGS as u32).rev() {
            dst_seq.swap(i as usize - 1, (rng.next() % i) as usize);
            src_seq.swap(i as usize - 1, (rng.next() % i) as usize);
        }

        Self {
            rng,
            dst_seq,
            src_seq,
            dst_counter: 0,
            src_counter: 0,
        }
    }

    /// Next destination register index; the permutation repeats after
    /// `PROGPOW_REGS` calls.
    #[inline]
    pub fn next_dst(&mut self) -> u32 {
        let value = self.dst_seq[self.dst_counter % REGS];
        self.dst_counter += 1;
        value
    }

    /// Next source register index.
    #[inline]
    pub fn next_src(&mut self) -> u32 {
        let value = self.src_seq[self.src_counter % REGS];
        self.src_counter += 1;
        value
    }
}

/// Merge `b` into `a` without losing `a`'s entropy.
#[inline]
pub(crate) fn random_merge(a: &mut u32, b: u32, sel: u32) {
    // Non-zero rotation amount from the selector's upper bits.
    let x = ((sel >> 16) % 31) + 1;
    match sel % 4 {
        0 => *a = a.wrapping_mul(33).wrapping_add(b),
        1 => *a = (*a ^ b).wrapping_mul(33),
        2 => *a = rotl32(*a, x) ^ b,
        _ => *a = rotr32(*a, x) ^ b,
    }
}

/// One of eleven random math operations on two registers.
#[inline]
pub(crate) fn random_math(a: u32, b: u32, sel: u32) -> u32 {
    match sel % 11 {
        0 => a.wrapping_add(b),
        1 => a.wrapping_mul(b),
        2 => mul_hi32(a, b),
        3 => a.min(b),
        4 => rotl32(a, b),
        5 => rotr32(a, b),
        6 => a & b,
        7 => a | b,
        8 => a ^ b,
        9 => clz32(a) + clz32(b),
        _ => popcnt32(a) + popcnt32(b),
    }
}

type Mix = [[u32; REGS]; LANES];

/// Fill every lane's registers from a KISS99 seeded with the hash seed and
/// the lane id.
fn init_mix(seed: u64) -> Mix {
    let z = fnv1a(FNV_OFFSET_BASIS, seed as u32);
    let w = fnv1a(z, (seed >> 32) as u32);

    let mut mix: Mix = [[0u32; REGS]; LANES];
    for (l, lane) in mix.iter_mut().enumerate() {
        let jsr = fnv1a(w, l as u32);
        let jcong = fnv1a(jsr, l as u32);
        let mut rng = Kiss99::new(z, w, jsr, jcong);
        for reg in lane.iter_mut() {
            *reg = rng.next();
        }
    }
    mix
}

/// One round: pick a 2048-bit DAG item, interleave cache reads with random
/// math, then merge the item into the lanes.
///
/// `state` arrives by value: each round replays the period's program.
fn round(context: &EpochContext, r: u32, mix: &mut Mix, mut state: MixRngState) {
    let num_items = context.full_dataset_num_items() / 2;
    let item_index = mix[r as usize % LANES][0] % num_items;
    let item = context.lookup_2048(item_index).to_words32();

    let max_operations = PROGPOW_CNT_CACHE.max(PROGPOW_CNT_MATH);
    for i in 0..max_operations {
        if i < PROGPOW_CNT_CACHE {
            // Random access to the cached portion of the DAG.
            let src = state.next_src() as usize;
            let dst = state.next_dst() as usize;
            let sel = state.rng.next();

            for lane in mix.iter_mut() {
                let offset = (lane[src] % CACHE_WORDS) as usize;
                random_merge(&mut lane[dst], context.l1_word(offset), sel);
            }
        }
        if i < PROGPOW_CNT_MATH {
            // Two distinct source registers, uniformly.
            let src_rnd = state.rng.next() % (PROGPOW_REGS * (PROGPOW_REGS - 1));
            let src1 = (src_rnd % PROGPOW_REGS) as usize;
            let mut src2 = (src_rnd / PROGPOW_REGS) as usize;
            if src2 >= src1 {
                src2 += 1;
            }

            let sel1 = state.rng.next();
            let dst = state.next_dst() as usize;
            let sel2 = state.rng.next();

            for lane in mix.iter_mut() {
                let data = random_math(lane[src1], lane[src2], sel1);
                random_merge(&mut lane[dst], data, sel2);
            }
        }
    }

    // DAG access pattern: destination 0 is pinned so the loop's output
    // always depends on the loaded item.
    let mut dsts = [0u32; WORDS_PER_LANE];
    let mut sels = [0u32; WORDS_PER_LANE];
    for k in 0..WORDS_PER_LANE {
        dsts[k] = if k == 0 { 0 } else { state.next_dst() };
        sels[k] = state.rng.next();
    }

    for (l, lane) in mix.iter_mut().enumerate() {
        let offset = ((l ^ r as usize) % LANES) * WORDS_PER_LANE;
        for k in 0..WORDS_PER_LANE {
            random_merge(&mut lane[dsts[k] as usize], item[offset + k], sels[k]);
        }
    }
}

/// Seed hash: Keccak-f[800] over the header and nonce with ProgPoW's domain
/// separation words.
fn hash_seed(header_hash: &Hash256, nonce: u64) -> Hash256 {
    let mut state: KeccakState800 = [0; 25];
    for i in 0..8 {
        state[i] = header_hash.word32(i);
    }
    state[8] = nonce as u32;
    state[9] = (nonce >> 32) as u32;
    state[10] = 0x0000_0001;
    state[18] = 0x8000_8081;

    keccakf800(&mut state);

    let mut out = [0u8; 32];
    LittleEndian::write_u32_into(&state[..8], &mut out);
    Hash256::from_bytes(out)
}

/// The 64-round mix, reduced to a 256-bit digest.
fn hash_mix(context: &EpochContext, period: u64, seed: u64) -> Hash256 {
    let mut mix = init_mix(seed);
    let state = MixRngState::new(period);

    for r in 0..PROGPOW_CNT_DAG {
        round(context, r, &mut mix, state.clone());
    }

    // Reduce each lane to one word.
    let mut lane_hash = [0u32; LANES];
    for (l, lane) in mix.iter().enumerate() {
        lane_hash[l] = lane.iter().fold(FNV_OFFSET_BASIS, |h, reg| fnv1a(h, *reg));
    }

    // Reduce all lanes to 256 bits.
    let mut mix_hash = [FNV_OFFSET_BASIS; 8];
    for (l, hash) in lane_hash.iter().enumerate() {
        mix_hash[l % 8] = fnv1a(mix_hash[l % 8], *hash);
    }
    Hash256::from_words32(&mix_hash)
}

/// Final digest: Keccak-f[800] over header, seed and mix hash.
///
/// State layout per the ProgPoW specification: words 0..8 the header hash,
/// 8..10 the 64-bit seed, 10.. the mix hash, with the 0x01 / 0x80008081
/// domain words at 17 and 24 written last.
fn hash_final(header_hash: &Hash256, seed: u64, mix_hash: &Hash256) -> Hash256 {
    let mut state: KeccakState800 = [0; 25];
    for i in 0..8 {
        state[i] = header_hash.word32(i);
    }
    state[8] = seed as u32;
    state[9] = (seed >> 32) as u32;
    for i in 0..8 {
        state[10 + i] = mix_hash.word32(i);
    }
    state[17] = 0x0000_0001;
    state[24] = 0x8000_8081;

    keccakf800(&mut state);

    let mut out = [0u8; 32];
    LittleEndian::write_u32_into(&state[..8], &mut out);
    Hash256::from_bytes(out)
}

/// Compute the ProgPoW result for a header and nonce within a period.
pub fn hash(
    context: &EpochContext,
    period: u64,
    header_hash: &Hash256,
    nonce: u64,
) -> PowResult {
    let seed_hash = hash_seed(header_hash, nonce);
    let seed = seed_hash.word64(0);
    let mix_hash = hash_mix(context, period, seed);
    PowResult {
        final_hash: hash_final(header_hash, seed, &mix_hash),
        mix_hash,
    }
}

/// Full verification: recomputes the hash and checks boundary then mix.
pub fn verify_full(
    context: &EpochContext,
    period: u64,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> VerificationResult {
    let result = hash(context, period, header_hash, nonce);
    if !result.final_hash.meets_boundary(boundary) {
        return VerificationResult::InvalidNonce;
    }
    if result.mix_hash != *mix_hash {
        return VerificationResult::InvalidMixHash;
    }
    VerificationResult::Ok
}

/// Full verification resolving epoch and period from a block number; uses a
/// light context.
pub fn verify_full_for_block(
    block_number: u64,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> Result<VerificationResult> {
    let context = get_epoch_context(epoch_from_block(block_number), false)?;
    Ok(verify_full(
        &context,
        period_from_block(block_number),
        header_hash,
        mix_hash,
        nonce,
        boundary,
    ))
}
