/// Ethash: seed, 256-access mix and final hash, plus verification.

pub mod context;
pub mod epoch;

use byteorder::{ByteOrder, LittleEndian};

use crate::common::bitwise::fnv1;
use crate::common::keccak::{keccak256, keccak512};
use crate::common::{Hash1024, Hash256, Hash512};
use crate::error::{Result, VerificationResult};

use super::PowResult;

pub use context::{get_epoch_context, EpochContext};
pub use epoch::{epoch_from_block, epoch_from_seed, epoch_seed};

/// Mix seed: Keccak-512 of the header hash and the little-endian nonce.
fn hash_seed(header_hash: &Hash256, nonce: u64) -> Hash512 {
    let mut data = [0u8; 40];
    data[..32].copy_from_slice(header_hash.as_bytes());
    LittleEndian::write_u64(&mut data[32..], nonce);
    keccak512(&data)
}

/// The 256-access dataset mix, compressed to 256 bits.
fn hash_mix(context: &EpochContext, seed: &Hash512) -> Hash256 {
    const NUM_WORDS: usize = Hash1024::SIZE / 4;

    let seed_words = seed.to_words32();
    let seed_init = seed_words[0];

    let mut mix = [0u32; NUM_WORDS];
    mix[..16].copy_from_slice(&seed_words);
    mix[16..].copy_from_slice(&seed_words);

    let index_limit = context.full_dataset_num_items();
    for i in 0..epoch::NUM_DATASET_ACCESSES as u32 {
        let p = fnv1(i ^ seed_init, mix[i as usize % NUM_WORDS]) % index_limit;
        let item = context.lookup_1024(p).to_words32();
        for (word, new) in mix.iter_mut().zip(item.iter()) {
            *word = fnv1(*word, *new);
        }
    }

    // Fold each group of four words down to one.
    let mut compressed = [0u32; 8];
    for (i, group) in mix.chunks_exact(4).enumerate() {
        compressed[i] = fnv1(fnv1(fnv1(group[0], group[1]), group[2]), group[3]);
    }
    Hash256::from_words32(&compressed)
}

/// Final digest: Keccak-256 over the seed and the mix hash.
fn hash_final(seed: &Hash512, mix_hash: &Hash256) -> Hash256 {
    let mut data = [0u8; 96];
    data[..64].copy_from_slice(seed.as_bytes());
    data[64..].copy_from_slice(mix_hash.as_bytes());
    keccak256(&data)
}

/// Compute the Ethash result for a header and nonce.
pub fn hash(context: &EpochContext, header_hash: &Hash256, nonce: u64) -> PowResult {
    let seed = hash_seed(header_hash, nonce);
    let mix_hash = hash_mix(context, &seed);
    PowResult {
        final_hash: hash_final(&seed, &mix_hash),
        mix_hash,
    }
}

/// Light verification: trusts the supplied mix hash and only recomputes the
/// seed and final digest against the boundary.
pub fn verify_light(
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> bool {
    let seed = hash_seed(header_hash, nonce);
    hash_final(&seed, mix_hash).meets_boundary(boundary)
}

/// Full verification: checks the boundary on the supplied mix hash first,
/// then recomputes the mix and requires a byte match.
pub fn verify_full(
    context: &EpochContext,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> VerificationResult {
    let seed = hash_seed(header_hash, nonce);
    if !hash_final(&seed, mix_hash).meets_boundary(boundary) {
        return VerificationResult::InvalidNonce;
    }
    if hash_mix(context, &seed) != *mix_hash {
        return VerificationResult::InvalidMixHash;
    }
    VerificationResult::Ok
}

/// Full verification resolving the epoch context from a block number; uses
/// a light context.
pub fn verify_full_for_block(
    block_number: u64,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> Result<VerificationResult> {
    let context = get_epoch_context(epoch_from_block(block_number), false)?;
    Ok(verify_full(&context, header_hash, mix_hash, nonce, boundary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_mixes_header_and_nonce() {
        let header = Hash256::from_bytes([0x01; 32]);
        assert_eq!(hash_seed(&header, 7), hash_seed(&header, 7));
        assert_ne!(hash_seed(&header, 7), hash_seed(&header, 8));
        assert_ne!(
            hash_seed(&header, 7),
            hash_seed(&Hash256::from_bytes([0x02; 32]), 7)
        );
    }

    #[test]
    fn seed_nonce_is_little_endian() {
        let header = Hash256::default();
        let mut data = [0u8; 40];
        data[32] = 0x2a;
        assert_eq!(hash_seed(&header, 0x2a), keccak512(&data));
    }

    #[test]
    fn final_hash_binds_both_inputs() {
        let seed = keccak512(b"seed");
        let mix = keccak256(b"mix");
        let out = hash_final(&seed, &mix);
        assert_ne!(out, hash_final(&seed, &keccak256(b"other")));
        assert_ne!(out, hash_final(&keccak512(b"other"), &mix));
    }

    #[test]
    fn light_verify_rejects_high_hash() {
        // A zero boundary is unbeatable unless the final hash is zero.
        let header = Hash256::default();
        let mix = Hash256::default();
        assert!(!verify_light(&header, &mix, 0, &Hash256::default()));
        assert!(verify_light(&header, &mix, 0, &Hash256::from_bytes([0xff; 32])));
    }
}
