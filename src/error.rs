use thiserror::Error;

/// Failures surfaced by the proof-of-work core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowError {
    /// A light-cache or full-dataset allocation could not be satisfied.
    #[error("epoch {epoch} context allocation failed ({bytes} bytes)")]
    AllocationFailure { epoch: u32, bytes: usize },

    /// No epoch within the search bound produced the given seed.
    #[error("no epoch matches the given seed hash")]
    UnknownEpochSeed,
}

/// Outcome of a full proof-of-work verification.
///
/// Not an error: callers routinely probe candidate shares and dispatch on
/// the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationResult {
    /// Final hash within the boundary and mix hash matches.
    Ok,
    /// The final hash exceeds the boundary.
    InvalidNonce,
    /// The recomputed mix hash differs from the one supplied.
    InvalidMixHash,
}

impl VerificationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationResult::Ok)
    }
}

pub type Result<T> = std::result::Result<T, PowError>;
