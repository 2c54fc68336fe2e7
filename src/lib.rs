//! emberhash - Ethash / ProgPoW proof-of-work engine
//!
//! The algorithmic core of a miner: bit-exact Keccak permutations, epoch
//! context construction (light cache, L1 slice, lazily filled full dataset)
//! and the Ethash / ProgPoW mix and verification paths. No I/O, no network,
//! no protocol plumbing; callers feed in a header hash, a nonce and a
//! boundary and get tagged results back.
//!
//! Contexts are memory heavy (16 MiB light cache and, optionally, a 1 GiB+
//! dataset at epoch 0) and are cached process-wide with a per-thread fast
//! path; see [`get_epoch_context`].

pub mod algorithms;
pub mod common;
pub mod error;

pub use algorithms::ethash::{
    self, epoch_from_block, epoch_from_seed, epoch_seed, get_epoch_context, EpochContext,
};
pub use algorithms::progpow::{self, kernel::KernelType, period_from_block};
pub use algorithms::{context_for_block, Algorithm, PowResult};
pub use common::{
    boundary_from_compact, boundary_from_difficulty, CompactBoundary, Hash1024, Hash2048,
    Hash256, Hash512,
};
pub use error::{PowError, Result, VerificationResult};

/// Re-exported so callers can build difficulties without naming the
/// underlying crate.
pub use primitive_types::U256;
