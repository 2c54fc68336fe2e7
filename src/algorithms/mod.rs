/// Proof-of-work algorithm implementations and the dispatch tag.

pub mod ethash;
pub mod progpow;

use std::fmt;
use std::str::FromStr;

use crate::common::Hash256;
use crate::error::{Result, VerificationResult};

use ethash::EpochContext;

/// Output of one proof-of-work evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowResult {
    pub final_hash: Hash256,
    pub mix_hash: Hash256,
}

/// Which mix algorithm a job runs. Ethash and ProgPoW share epoch contexts;
/// the split is two entry points behind this tag, not subclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Ethash,
    Progpow,
}

impl Algorithm {
    /// Compute the hash for a header and nonce at a block number.
    pub fn hash(
        &self,
        context: &EpochContext,
        block_number: u64,
        header_hash: &Hash256,
        nonce: u64,
    ) -> PowResult {
        match self {
            Algorithm::Ethash => ethash::hash(context, header_hash, nonce),
            Algorithm::Progpow => progpow::hash(
                context,
                progpow::period_from_block(block_number),
                header_hash,
                nonce,
            ),
        }
    }

    /// Full verification against a boundary.
    pub fn verify_full(
        &self,
        context: &EpochContext,
        block_number: u64,
        header_hash: &Hash256,
        mix_hash: &Hash256,
        nonce: u64,
        boundary: &Hash256,
    ) -> VerificationResult {
        match self {
            Algorithm::Ethash => {
                ethash::verify_full(context, header_hash, mix_hash, nonce, boundary)
            }
            Algorithm::Progpow => progpow::verify_full(
                context,
                progpow::period_from_block(block_number),
                header_hash,
                mix_hash,
                nonce,
                boundary,
            ),
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethash" => Ok(Algorithm::Ethash),
            "progpow" => Ok(Algorithm::Progpow),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Ethash => write!(f, "ethash"),
            Algorithm::Progpow => write!(f, "progpow"),
        }
    }
}

/// Convenience: fetch the context for the epoch covering `block_number`.
pub fn context_for_block(block_number: u64, full: bool) -> Result<std::sync::Arc<EpochContext>> {
    ethash::get_epoch_context(ethash::epoch_from_block(block_number), full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_tag_parses() {
        assert_eq!("ethash".parse::<Algorithm>().unwrap(), Algorithm::Ethash);
        assert_eq!("ProgPoW".parse::<Algorithm>().unwrap(), Algorithm::Progpow);
        assert!("scrypt".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::Ethash.to_string(), "ethash");
        assert_eq!(Algorithm::Progpow.to_string(), "progpow");
    }
}
