/// Per-epoch protocol parameters.
///
/// Cache and dataset sizes are prime item counts so the modular index
/// arithmetic in the mix cycles through the whole table. The epoch seed is
/// Keccak-256 iterated from 32 zero bytes.

use std::cell::RefCell;

use crate::common::keccak::keccak256;
use crate::common::Hash256;
use crate::error::{PowError, Result};

/// Blocks per epoch.
pub const EPOCH_LENGTH: u64 = 7500;

/// Light-cache item width in bytes (one Keccak-512 block).
pub const LIGHT_CACHE_ITEM_SIZE: usize = 64;

/// Full-dataset item width in bytes.
pub const FULL_DATASET_ITEM_SIZE: usize = 128;

/// Light-cache size at epoch 0, before prime rounding: 2^24 bytes.
pub const LIGHT_CACHE_INIT_SIZE: u32 = 1 << 24;

/// Light-cache growth per epoch: 2^17 bytes.
pub const LIGHT_CACHE_GROWTH: u32 = 1 << 17;

/// Full-dataset size at epoch 0, before prime rounding: 2^30 bytes.
pub const FULL_DATASET_INIT_SIZE: u32 = 1 << 30;

/// Full-dataset growth per epoch: 2^23 bytes.
pub const FULL_DATASET_GROWTH: u32 = 1 << 23;

/// RandMemoHash passes over the light cache.
pub const LIGHT_CACHE_ROUNDS: usize = 3;

/// Parent accesses when deriving one dataset item.
pub const FULL_DATASET_ITEM_PARENTS: u32 = 256;

/// DAG reads per Ethash hash.
pub const NUM_DATASET_ACCESSES: usize = 256;

/// Bytes of the eagerly built L1 slice used by ProgPoW.
pub const L1_CACHE_SIZE: usize = 16 * 1024;

/// Upper bound of the reverse seed search.
const EPOCH_FROM_SEED_TRIES: u32 = 30_000;

/// Epoch covering a block number.
#[inline]
pub fn epoch_from_block(block_number: u64) -> u32 {
    (block_number / EPOCH_LENGTH) as u32
}

/// Primality by trial division. Requires an odd input > 2; squares are
/// compared in 64 bits so the probe never overflows.
fn is_odd_prime(number: u32) -> bool {
    if number & 1 == 0 {
        return false;
    }
    let number = number as u64;
    let mut d = 3u64;
    while d * d <= number {
        if number % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Largest prime not exceeding the bound; 0 when the bound is below 2.
pub fn find_largest_prime(upper_bound: u32) -> u32 {
    if upper_bound < 2 {
        return 0;
    }
    if upper_bound == 2 {
        return 2;
    }
    let mut n = upper_bound | 1;
    if n > upper_bound {
        n -= 2;
    }
    while !is_odd_prime(n) {
        n -= 2;
    }
    n
}

/// Number of 512-bit items in the epoch's light cache.
pub fn light_cache_num_items(epoch_number: u32) -> u32 {
    const ITEMS_INIT: u32 = LIGHT_CACHE_INIT_SIZE / LIGHT_CACHE_ITEM_SIZE as u32;
    const ITEMS_GROWTH: u32 = LIGHT_CACHE_GROWTH / LIGHT_CACHE_ITEM_SIZE as u32;
    find_largest_prime(ITEMS_INIT + epoch_number * ITEMS_GROWTH)
}

/// Number of 1024-bit items in the epoch's full dataset.
pub fn full_dataset_num_items(epoch_number: u32) -> u32 {
    const ITEMS_INIT: u32 = FULL_DATASET_INIT_SIZE / FULL_DATASET_ITEM_SIZE as u32;
    const ITEMS_GROWTH: u32 = FULL_DATASET_GROWTH / FULL_DATASET_ITEM_SIZE as u32;
    find_largest_prime(ITEMS_INIT + epoch_number * ITEMS_GROWTH)
}

/// Light-cache size in bytes.
pub fn light_cache_size(num_items: u32) -> usize {
    num_items as usize * LIGHT_CACHE_ITEM_SIZE
}

/// Full-dataset size in bytes.
pub fn full_dataset_size(num_items: u32) -> usize {
    num_items as usize * FULL_DATASET_ITEM_SIZE
}

/// Seed hash of an epoch: Keccak-256 iterated `epoch_number` times starting
/// from 32 zero bytes.
pub fn epoch_seed(epoch_number: u32) -> Hash256 {
    let mut seed = Hash256::default();
    for _ in 0..epoch_number {
        seed = keccak256(seed.as_bytes());
    }
    seed
}

thread_local! {
    /// Last resolved (epoch, seed) pair; sequential pool jobs walk epochs
    /// one step at a time, so the next-seed probe almost always hits.
    static SEED_MEMO: RefCell<Option<(u32, Hash256)>> = const { RefCell::new(None) };
}

/// Reverse lookup: the epoch whose seed equals `seed`.
///
/// Bounded linear search from epoch 0; fails with `UnknownEpochSeed` after
/// 30,000 iterates.
pub fn epoch_from_seed(seed: &Hash256) -> Result<u32> {
    SEED_MEMO.with(|memo| {
        let cached = *memo.borrow();
        if let Some((epoch, cached_seed)) = cached {
            if cached_seed == *seed {
                return Ok(epoch);
            }
            // Sequential access: probe the next iterate before rescanning.
            let next = keccak256(cached_seed.as_bytes());
            if next == *seed {
                *memo.borrow_mut() = Some((epoch + 1, next));
                return Ok(epoch + 1);
            }
        }

        let mut candidate = Hash256::default();
        for epoch in 0..EPOCH_FROM_SEED_TRIES {
            if candidate == *seed {
                *memo.borrow_mut() = Some((epoch, candidate));
                return Ok(epoch);
            }
            candidate = keccak256(candidate.as_bytes());
        }
        Err(PowError::UnknownEpochSeed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_boundaries() {
        assert_eq!(epoch_from_block(0), 0);
        assert_eq!(epoch_from_block(7499), 0);
        assert_eq!(epoch_from_block(7500), 1);
        assert_eq!(epoch_from_block(30_000), 4);
        assert_eq!(epoch_from_block(1_282_500), 171);
    }

    #[test]
    fn largest_prime_walks_down() {
        assert_eq!(find_largest_prime(0), 0);
        assert_eq!(find_largest_prime(1), 0);
        assert_eq!(find_largest_prime(2), 2);
        assert_eq!(find_largest_prime(3), 3);
        assert_eq!(find_largest_prime(4), 3);
        assert_eq!(find_largest_prime(100), 97);
        assert_eq!(find_largest_prime(97), 97);
    }

    #[test]
    fn epoch_zero_item_counts() {
        // 2^24 / 64 = 262144 and 2^30 / 128 = 8388608, stepped down to the
        // nearest primes.
        assert_eq!(light_cache_num_items(0), 262_139);
        assert_eq!(full_dataset_num_items(0), 8_388_593);
        assert_eq!(light_cache_size(262_139), 16_776_896);
        assert_eq!(full_dataset_size(8_388_593), 1_073_739_904);
    }

    #[test]
    fn item_counts_are_odd_primes_and_non_decreasing() {
        let mut last_light = 0;
        let mut last_full = 0;
        for epoch in [0u32, 1, 2, 10, 100, 171, 1000] {
            let light = light_cache_num_items(epoch);
            let full = full_dataset_num_items(epoch);
            assert!(light & 1 == 1 && is_odd_prime(light));
            assert!(full & 1 == 1 && is_odd_prime(full));
            assert!(light >= last_light);
            assert!(full >= last_full);
            last_light = light;
            last_full = full;
        }
    }

    #[test]
    fn seed_iterates_keccak() {
        assert_eq!(epoch_seed(0), Hash256::default());
        assert_eq!(
            epoch_seed(1).to_hex(),
            "290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        );
        assert_eq!(epoch_seed(2), keccak256(epoch_seed(1).as_bytes()));
    }

    #[test]
    fn seed_reverse_lookup() {
        assert_eq!(epoch_from_seed(&epoch_seed(0)).unwrap(), 0);
        assert_eq!(epoch_from_seed(&epoch_seed(171)).unwrap(), 171);
        // Sequential access hits the memo fast path.
        assert_eq!(epoch_from_seed(&epoch_seed(172)).unwrap(), 172);
        assert_eq!(
            epoch_from_seed(&Hash256::from_bytes([0x11; 32])),
            Err(PowError::UnknownEpochSeed)
        );
    }
}
