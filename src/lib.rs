//! # halo-diffusion
//!
//! halo-diffusion advances the explicit 1-D heat equation
//! `u'[i] = u[i] + alpha * (u[i-1] - 2 u[i] + u[i+1])` on a domain split into
//! contiguous slices, one per rank. Each slice carries one ghost cell per side
//! that is refreshed from the neighbouring rank every step.
//!
//! The interesting part is the exchange. Three strategies are provided:
//! a blocking baseline, a non-blocking exchange followed by a wait-for-all,
//! and an overlapped step that computes the interior while the ghost values
//! are in flight and touches the two boundary cells only once both receives
//! have been observed complete. All three produce identical fields.
//!
//! ## Backends
//! - [`algs::communicator::ThreadComm`]: ranks are threads of one process
//!   sharing a [`algs::communicator::LocalUniverse`].
//! - `MpiComm` (feature `mpi-support`): one rank per MPI process.
//!
//! ## Usage
//!
//! ```no_run
//! use halo_diffusion::prelude::*;
//!
//! let config = DiffusionConfig::new(100_000, 5_000, 0.1)
//!     .with_strategy(ExchangeStrategy::Overlap);
//! let outcomes = launch_local(&config, 4)?;
//! if let Some(report) = designated_report(&outcomes, &config) {
//!     println!("{report}");
//! }
//! # Ok::<(), DiffusionError>(())
//! ```

pub mod algs;
pub mod config;
pub mod diffusion_error;
pub mod field;
pub mod halo;
pub mod harness;
pub mod observer;
pub mod partition;
pub mod report;
pub mod scheduler;
pub mod stencil;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{
        CommTag, Communicator, LocalUniverse, ThreadComm, Wait,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::config::{DiffusionConfig, ExchangeStrategy, PollStrategy, RemainderPolicy};
    pub use crate::diffusion_error::DiffusionError;
    pub use crate::field::{DoubleBuffer, LocalField};
    pub use crate::halo::{ExchangeRequests, HaloExchanger, HaloRequest};
    pub use crate::harness::{
        RankOutcome, assemble_global, compare_strategies, designated_report, launch_local,
        launch_local_observed, run_rank, run_rank_observed,
    };
    pub use crate::observer::{NoopObserver, RecordingObserver, StepObserver, StepPhase};
    pub use crate::partition::{Neighbor, Partition, Side};
    pub use crate::report::{Comparison, TimingReport, strategy_label};
    pub use crate::scheduler::OverlapScheduler;
}
