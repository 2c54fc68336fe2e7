/// Epoch context: light cache, L1 slice and optional full dataset.
///
/// The light cache is enough to derive any dataset item on demand; a full
/// context keeps a lazily filled dataset so repeated lookups pay the
/// derivation cost once. Contexts are shared process-wide through a mutex
/// guarded slot with a thread-local fast path.

use std::cell::RefCell;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::common::bitwise::fnv1;
use crate::common::keccak::keccak512;
use crate::common::{Hash1024, Hash2048, Hash256, Hash512};
use crate::error::{PowError, Result};

use super::epoch::{
    self, full_dataset_num_items, light_cache_num_items, FULL_DATASET_ITEM_PARENTS,
    FULL_DATASET_ITEM_SIZE, L1_CACHE_SIZE, LIGHT_CACHE_ROUNDS,
};

/// 1024-bit items covered by the L1 slice.
const L1_CACHE_NUM_ITEMS: u32 = (L1_CACHE_SIZE / FULL_DATASET_ITEM_SIZE) as u32;

/// 2048-bit tiles making up the L1 slice.
const L1_CACHE_NUM_TILES: usize = L1_CACHE_SIZE / Hash2048::SIZE;

/// Immutable per-epoch hashing context.
pub struct EpochContext {
    epoch_number: u32,
    light_cache_num_items: u32,
    full_dataset_num_items: u32,
    light_cache: Box<[Hash512]>,
    /// First 128 dataset items as 4096 little-endian words, built eagerly.
    l1_cache: Box<[u32]>,
    /// Lazily derived dataset items; the cell doubles as the presence flag.
    full_dataset: Option<Box<[OnceCell<Hash1024>]>>,
}

impl EpochContext {
    /// Build the context for an epoch, deriving the light cache and the L1
    /// slice; `full` additionally reserves the lazy dataset table.
    ///
    /// Prefer [`get_epoch_context`] which caches the result process-wide.
    pub fn new(epoch_number: u32, full: bool) -> Result<Self> {
        let light_items = light_cache_num_items(epoch_number);
        let full_items = full_dataset_num_items(epoch_number);

        info!(
            epoch = epoch_number,
            light_bytes = epoch::light_cache_size(light_items),
            full, "building epoch context"
        );

        let seed = epoch::epoch_seed(epoch_number);
        let light_cache = build_light_cache(light_items, &seed)
            .map_err(|bytes| PowError::AllocationFailure { epoch: epoch_number, bytes })?
            .into_boxed_slice();

        let full_dataset = if full {
            let mut cells: Vec<OnceCell<Hash1024>> = Vec::new();
            cells
                .try_reserve_exact(full_items as usize)
                .map_err(|_| PowError::AllocationFailure {
                    epoch: epoch_number,
                    bytes: epoch::full_dataset_size(full_items),
                })?;
            cells.resize_with(full_items as usize, OnceCell::new);
            Some(cells.into_boxed_slice())
        } else {
            None
        };

        // Eager L1 fill: the first 64 2048-bit tiles, i.e. dataset items
        // 0..128.
        let tiles: Vec<Hash2048> = (0..L1_CACHE_NUM_TILES)
            .map(|i| calculate_dataset_item_2048(&light_cache, full_items, i as u32))
            .collect();

        let mut l1_cache = Vec::with_capacity(L1_CACHE_SIZE / 4);
        for tile in &tiles {
            l1_cache.extend_from_slice(&tile.to_words32());
        }

        if let Some(cells) = &full_dataset {
            for (i, tile) in tiles.iter().enumerate() {
                let _ = cells[i * 2].set(tile.half(0));
                let _ = cells[i * 2 + 1].set(tile.half(1));
            }
        }

        debug!(epoch = epoch_number, "epoch context ready");

        Ok(Self {
            epoch_number,
            light_cache_num_items: light_items,
            full_dataset_num_items: full_items,
            light_cache,
            l1_cache: l1_cache.into_boxed_slice(),
            full_dataset,
        })
    }

    pub fn epoch_number(&self) -> u32 {
        self.epoch_number
    }

    pub fn light_cache_num_items(&self) -> u32 {
        self.light_cache_num_items
    }

    pub fn full_dataset_num_items(&self) -> u32 {
        self.full_dataset_num_items
    }

    /// Whether a full dataset table is reserved.
    pub fn is_full(&self) -> bool {
        self.full_dataset.is_some()
    }

    /// The epoch's light cache.
    pub fn light_cache(&self) -> &[Hash512] {
        &self.light_cache
    }

    /// The L1 slice as little-endian words.
    pub fn l1_cache(&self) -> &[u32] {
        &self.l1_cache
    }

    /// One little-endian word of the L1 slice, `offset < 4096`.
    #[inline(always)]
    pub(crate) fn l1_word(&self, offset: usize) -> u32 {
        self.l1_cache[offset]
    }

    /// 1024-bit dataset item: served from the L1 slice, then the lazy
    /// dataset table, then derived on the fly.
    pub fn lookup_1024(&self, index: u32) -> Hash1024 {
        if index < L1_CACHE_NUM_ITEMS {
            let start = index as usize * (Hash1024::SIZE / 4);
            let words: [u32; Hash1024::SIZE / 4] =
                self.l1_cache[start..start + Hash1024::SIZE / 4]
                    .try_into()
                    .expect("L1 slice holds whole items");
            return Hash1024::from_words32(&words);
        }

        if let Some(cells) = &self.full_dataset {
            return *cells[index as usize].get_or_init(|| {
                calculate_dataset_item_1024(
                    &self.light_cache,
                    self.full_dataset_num_items,
                    index,
                )
            });
        }

        calculate_dataset_item_1024(&self.light_cache, self.full_dataset_num_items, index)
    }

    /// 2048-bit item built from two adjacent 1024-bit items.
    pub fn lookup_2048(&self, index: u32) -> Hash2048 {
        let first = index.wrapping_mul(2);
        Hash2048::from_items(
            &self.lookup_1024(first),
            &self.lookup_1024(first.wrapping_add(1)),
        )
    }

    /// Materialise every dataset item in parallel. A no-op for light
    /// contexts; miners call this once up front instead of paying lazy
    /// derivation on the hot path.
    pub fn prewarm(&self) {
        let Some(cells) = &self.full_dataset else {
            return;
        };
        info!(
            epoch = self.epoch_number,
            items = self.full_dataset_num_items,
            "materialising full dataset"
        );
        cells.par_iter().enumerate().for_each(|(index, cell)| {
            cell.get_or_init(|| {
                calculate_dataset_item_1024(
                    &self.light_cache,
                    self.full_dataset_num_items,
                    index as u32,
                )
            });
        });
    }
}

/// Build the light cache: a Keccak-512 chain from the epoch seed followed by
/// three RandMemoHash passes. Fails with the attempted byte count when the
/// allocation cannot be satisfied.
fn build_light_cache(num_items: u32, seed: &Hash256) -> std::result::Result<Vec<Hash512>, usize> {
    let n = num_items as usize;
    let mut cache: Vec<Hash512> = Vec::new();
    cache
        .try_reserve_exact(n)
        .map_err(|_| epoch::light_cache_size(num_items))?;

    let mut item = keccak512(seed.as_bytes());
    cache.push(item);
    for _ in 1..n {
        item = keccak512(item.as_bytes());
        cache.push(item);
    }

    for _ in 0..LIGHT_CACHE_ROUNDS {
        for i in 0..n {
            // First parent: low word of the item, little-endian, mod n.
            let v = (cache[i].word32(0) % num_items) as usize;
            // Second parent: the previous item, wrapping at zero.
            let w = (i + n - 1) % n;
            cache[i] = keccak512(cache[v].xor(&cache[w]).as_bytes());
        }
    }

    Ok(cache)
}

/// One 512-bit slice of a dataset item under derivation.
struct ItemState<'a> {
    cache: &'a [Hash512],
    num_cache_items: u32,
    seed: u32,
    mix: [u32; 16],
}

impl<'a> ItemState<'a> {
    fn new(cache: &'a [Hash512], num_cache_items: u32, index: u32) -> Self {
        let mut mix = cache[(index % num_cache_items) as usize].to_words32();
        mix[0] ^= index;
        let mix = keccak512(Hash512::from_words32(&mix).as_bytes()).to_words32();
        Self {
            cache,
            num_cache_items,
            seed: index,
            mix,
        }
    }

    #[inline]
    fn update(&mut self, round: u32) {
        let t = fnv1(self.seed ^ round, self.mix[round as usize % self.mix.len()]);
        let parent = &self.cache[(t % self.num_cache_items) as usize];
        for (j, word) in self.mix.iter_mut().enumerate() {
            *word = fnv1(*word, parent.word32(j));
        }
    }

    fn finish(self) -> Hash512 {
        keccak512(Hash512::from_words32(&self.mix).as_bytes())
    }
}

/// Derive the 1024-bit dataset item at `index` from the light cache.
pub fn calculate_dataset_item_1024(
    light_cache: &[Hash512],
    num_cache_items: u32,
    index: u32,
) -> Hash1024 {
    let mut item0 = ItemState::new(light_cache, num_cache_items, index.wrapping_mul(2));
    let mut item1 = ItemState::new(
        light_cache,
        num_cache_items,
        index.wrapping_mul(2).wrapping_add(1),
    );

    for i in 0..FULL_DATASET_ITEM_PARENTS {
        item0.update(i);
        item1.update(i);
    }

    Hash1024::from_halves(&item0.finish(), &item1.finish())
}

/// Derive the 2048-bit dataset item at `index` from the light cache.
pub fn calculate_dataset_item_2048(
    light_cache: &[Hash512],
    num_cache_items: u32,
    index: u32,
) -> Hash2048 {
    let base = index.wrapping_mul(4);
    let mut items = [
        ItemState::new(light_cache, num_cache_items, base),
        ItemState::new(light_cache, num_cache_items, base.wrapping_add(1)),
        ItemState::new(light_cache, num_cache_items, base.wrapping_add(2)),
        ItemState::new(light_cache, num_cache_items, base.wrapping_add(3)),
    ];

    for i in 0..FULL_DATASET_ITEM_PARENTS {
        for item in items.iter_mut() {
            item.update(i);
        }
    }

    let [i0, i1, i2, i3] = items;
    Hash2048::from_quarters([&i0.finish(), &i1.finish(), &i2.finish(), &i3.finish()])
}

static SHARED_CONTEXT: Mutex<Option<Arc<EpochContext>>> = Mutex::new(None);

thread_local! {
    static LOCAL_CONTEXT: RefCell<Option<Arc<EpochContext>>> = const { RefCell::new(None) };
}

fn context_matches(context: &EpochContext, epoch_number: u32, full: bool) -> bool {
    context.epoch_number() == epoch_number && context.is_full() == full
}

/// Get or build the context for `(epoch_number, full)`.
///
/// Fast path: the calling thread's cached handle. Slow path: the shared
/// slot under its mutex, rebuilding and replacing on mismatch. A full
/// request replaces a cached light context for the same epoch and vice
/// versa.
pub fn get_epoch_context(epoch_number: u32, full: bool) -> Result<Arc<EpochContext>> {
    let local = LOCAL_CONTEXT.with(|slot| slot.borrow().clone());
    if let Some(context) = local {
        if context_matches(&context, epoch_number, full) {
            return Ok(context);
        }
    }

    // Drop the stale thread-local reference before taking the lock so the
    // shared replacement below can free the old context.
    LOCAL_CONTEXT.with(|slot| slot.borrow_mut().take());

    let context = {
        let mut shared = SHARED_CONTEXT.lock();
        match shared.as_ref() {
            Some(context) if context_matches(context, epoch_number, full) => {
                Arc::clone(context)
            }
            _ => {
                debug!(epoch = epoch_number, full, "replacing shared epoch context");
                let built = Arc::new(EpochContext::new(epoch_number, full)?);
                *shared = Some(Arc::clone(&built));
                built
            }
        }
    };

    LOCAL_CONTEXT.with(|slot| *slot.borrow_mut() = Some(Arc::clone(&context)));
    Ok(context)
}
