//! Timestepper: start-up, the timed step loop, and the timing report.
//!
//! [`run_rank`] is what every rank executes on its own communicator:
//! partition, seed, barrier, timed loop, barrier. [`launch_local`] runs a
//! whole group of ranks as threads of this process over a fresh
//! [`LocalUniverse`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use crate::algs::communicator::{Communicator, LocalUniverse};
use crate::config::{DiffusionConfig, ExchangeStrategy};
use crate::diffusion_error::DiffusionError;
use crate::field::{DoubleBuffer, LocalField};
use crate::observer::{NoopObserver, StepObserver};
use crate::partition::{MIN_RANKS, Partition};
use crate::report::{TimingReport, strategy_label};
use crate::scheduler::OverlapScheduler;

/// What one rank hands back after the timed region.
#[derive(Clone, Debug, PartialEq)]
pub struct RankOutcome {
    pub rank: usize,
    pub nranks: usize,
    pub strategy: ExchangeStrategy,
    pub steps: u64,
    pub elapsed: Duration,
    /// Global index of `field[0]`.
    pub offset: usize,
    /// Owned cells after the last step.
    pub field: Vec<f64>,
}

impl RankOutcome {
    pub fn report(&self, config: &DiffusionConfig) -> TimingReport {
        TimingReport::new(
            strategy_label(self.strategy, config),
            self.elapsed.as_secs_f64(),
        )
    }
}

pub fn run_rank<C: Communicator>(
    comm: &C,
    config: &DiffusionConfig,
) -> Result<RankOutcome, DiffusionError> {
    run_rank_observed(comm, config, NoopObserver)
}

/// [`run_rank`] with an instrumented step loop.
pub fn run_rank_observed<C: Communicator, O: StepObserver>(
    comm: &C,
    config: &DiffusionConfig,
    observer: O,
) -> Result<RankOutcome, DiffusionError> {
    config.validate()?;
    let part = Partition::from_config(config, comm.size(), comm.rank())?;

    let mut field = LocalField::zeros(part.local_size);
    field.seed_hot_region(&part, config.hot_value);
    let mut scheduler = OverlapScheduler::new(comm, part, DoubleBuffer::from_current(field), config)
        .with_observer(observer);

    comm.barrier();
    let start = Instant::now();
    scheduler.run(config.steps)?;
    let elapsed = start.elapsed();
    comm.barrier();

    log::debug!(
        "rank {} finished {} steps in {:.6} s",
        part.rank,
        scheduler.step_count(),
        elapsed.as_secs_f64()
    );
    Ok(RankOutcome {
        rank: part.rank,
        nranks: part.nranks,
        strategy: config.strategy,
        steps: scheduler.step_count(),
        elapsed,
        offset: part.global_offset,
        field: scheduler.current().owned().to_vec(),
    })
}

/// Every strategy in turn on the same communicator, in
/// [`ExchangeStrategy::ALL`] order. `base.strategy` is ignored.
pub fn compare_strategies<C: Communicator>(
    comm: &C,
    base: &DiffusionConfig,
) -> Result<Vec<RankOutcome>, DiffusionError> {
    ExchangeStrategy::ALL
        .into_iter()
        .map(|strategy| run_rank(comm, &base.clone().with_strategy(strategy)))
        .collect()
}

pub fn launch_local(
    config: &DiffusionConfig,
    nranks: usize,
) -> Result<Vec<RankOutcome>, DiffusionError> {
    launch_local_observed(config, nranks, |_| NoopObserver)
}

/// Run `nranks` ranks as threads, each with the observer `make_observer(rank)`.
///
/// Fails with `TooFewRanks` before spawning anything when `nranks < 2`.
/// If any rank fails, the universe is aborted so the others unwind; the
/// first error that is not a cancellation is returned.
pub fn launch_local_observed<O, F>(
    config: &DiffusionConfig,
    nranks: usize,
    make_observer: F,
) -> Result<Vec<RankOutcome>, DiffusionError>
where
    O: StepObserver + Send,
    F: Fn(usize) -> O,
{
    if nranks < MIN_RANKS {
        return Err(DiffusionError::TooFewRanks { ranks: nranks });
    }
    config.validate()?;

    let universe = LocalUniverse::new(nranks);
    let results: Vec<Result<RankOutcome, DiffusionError>> = std::thread::scope(|s| {
        let handles: Vec<_> = universe
            .comms()
            .into_iter()
            .map(|comm| {
                let observer = make_observer(comm.rank());
                let universe = &universe;
                s.spawn(move || {
                    let rank = comm.rank();
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        run_rank_observed(&comm, config, observer)
                    }))
                    .unwrap_or(Err(DiffusionError::RankPanicked(rank)));
                    if let Err(e) = &result {
                        log::error!("rank {rank}: {e}");
                        universe.abort();
                    }
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| h.join().unwrap_or(Err(DiffusionError::RankPanicked(rank))))
            .collect()
    });

    let mut outcomes = Vec::with_capacity(nranks);
    let mut cancelled = None;
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.is_cancellation() => {
                cancelled.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    match cancelled {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

/// Owned cells of every rank, concatenated in rank order.
pub fn assemble_global(outcomes: &[RankOutcome]) -> Vec<f64> {
    let mut sorted: Vec<&RankOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|o| o.rank);
    sorted.into_iter().flat_map(|o| o.field.iter().copied()).collect()
}

/// The single report line of a run, produced from rank 0's timing.
pub fn designated_report(outcomes: &[RankOutcome], config: &DiffusionConfig) -> Option<TimingReport> {
    outcomes
        .iter()
        .find(|o| o.rank == 0)
        .map(|o| o.report(config))
}
