/// Shared primitives: digest types, bit operations, Keccak, KISS99 and
/// boundary conversions.

pub mod bitwise;
pub mod difficulty;
pub mod hash_types;
pub mod keccak;
pub mod kiss99;

pub use difficulty::{boundary_from_compact, boundary_from_difficulty, CompactBoundary};
pub use hash_types::{Hash1024, Hash2048, Hash256, Hash512};
pub use kiss99::Kiss99;
