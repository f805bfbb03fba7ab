//! DiffusionError: unified error type for halo-diffusion public APIs.
//!
//! Every fallible entry point (partitioning, configuration, halo exchange,
//! the step loop and the harness) reports through this enum so the CLI can map
//! any failure onto a single non-zero exit path.

use thiserror::Error;

/// Unified error type for halo-diffusion operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DiffusionError {
    /// The algorithm needs at least one neighbour edge, i.e. two ranks.
    #[error("this program requires at least 2 ranks, got {ranks}")]
    TooFewRanks { ranks: usize },
    /// A rank id outside `0..nranks` was supplied.
    #[error("rank {rank} is out of range for {nranks} ranks")]
    RankOutOfRange { rank: usize, nranks: usize },
    /// Every rank must own at least one cell.
    #[error("global size {global_size} over {nranks} ranks leaves {local} owned cells per rank (need at least 1)")]
    SliceTooSmall {
        global_size: usize,
        nranks: usize,
        local: usize,
    },
    /// The global size is not a multiple of the rank count and the remainder policy rejects it.
    #[error("global size {global_size} is not divisible by {nranks} ranks ({dropped} cells would be dropped)")]
    UnevenPartition {
        global_size: usize,
        nranks: usize,
        dropped: usize,
    },
    /// Diffusion coefficient outside `[0, 0.5)` or not finite.
    #[error("diffusion coefficient must satisfy 0 <= alpha < 0.5, got {0}")]
    InvalidAlpha(f64),
    /// The step count must be positive.
    #[error("step count must be positive")]
    ZeroSteps,
    /// The global domain must contain at least one cell.
    #[error("global domain size must be positive")]
    InvalidGlobalSize,
    /// A message to or from `neighbor` could not be completed or decoded.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// Receive polling exceeded the configured cap within a single step.
    #[error("step {step}: receive polling exceeded {polls} rounds")]
    PollLimitExceeded { step: u64, polls: u64 },
    /// This rank was torn down because a peer failed.
    #[error("rank {rank} cancelled after a peer failure")]
    Cancelled { rank: usize },
    /// A rank thread panicked.
    #[error("rank {0} panicked")]
    RankPanicked(usize),
    /// A timing line did not end in `<seconds> s`.
    #[error("malformed timing report: `{0}`")]
    MalformedReport(String),
    /// The MPI runtime could not be initialised (or was initialised twice).
    #[error("MPI initialization failed")]
    MpiInit,
}

impl DiffusionError {
    /// True for errors that are a consequence of another rank's failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DiffusionError::Cancelled { .. })
    }
}
