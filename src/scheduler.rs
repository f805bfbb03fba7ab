//! Per-step orchestration of halo exchange and stencil computation.
//!
//! One engine, three orderings ([`ExchangeStrategy`]):
//!
//! * `Blocking`: blocking exchange, then the whole owned range.
//! * `NonBlockingWait`: issue all four requests, wait for all of them, then
//!   the whole owned range.
//! * `Overlap`:
//!   `Issued → InteriorComputing → RecvPolling → BoundaryComputing → SendWaiting → Swapped`.
//!   The interior is computed while the exchange is in flight; the two
//!   boundary cells wait until both receives have been observed complete.
//!   Both sends complete before the swap, so the buffer they read from is
//!   never handed out as a write target while a send may still use it.
//!
//! There is no barrier inside the step loop; neighbouring ranks are coupled
//! only through the exchange.

use crate::algs::communicator::{CommTag, Communicator};
use crate::config::{DiffusionConfig, ExchangeStrategy, PollStrategy};
use crate::diffusion_error::DiffusionError;
use crate::field::{DoubleBuffer, LocalField};
use crate::halo::{ExchangeRequests, HaloExchanger};
use crate::observer::{NoopObserver, StepObserver, StepPhase};
use crate::partition::{Partition, Side};
use crate::stencil;

const SIDES: [Side; 2] = [Side::Right, Side::Left];

pub struct OverlapScheduler<'c, C: Communicator, O: StepObserver = NoopObserver> {
    exchanger: HaloExchanger<'c, C>,
    part: Partition,
    buffers: DoubleBuffer,
    alpha: f64,
    strategy: ExchangeStrategy,
    poll: PollStrategy,
    poll_limit: Option<u64>,
    step: u64,
    observer: O,
}

impl<'c, C: Communicator> OverlapScheduler<'c, C, NoopObserver> {
    /// `buffers.current()` must already hold the initial condition.
    pub fn new(comm: &'c C, part: Partition, buffers: DoubleBuffer, config: &DiffusionConfig) -> Self {
        debug_assert_eq!(buffers.current().len(), part.local_size);
        Self {
            exchanger: HaloExchanger::with_tag(comm, part, CommTag::default()),
            part,
            buffers,
            alpha: config.alpha,
            strategy: config.strategy,
            poll: config.poll,
            poll_limit: config.poll_limit,
            step: 0,
            observer: NoopObserver,
        }
    }
}

impl<'c, C: Communicator, O: StepObserver> OverlapScheduler<'c, C, O> {
    pub fn with_observer<P: StepObserver>(self, observer: P) -> OverlapScheduler<'c, C, P> {
        OverlapScheduler {
            exchanger: self.exchanger,
            part: self.part,
            buffers: self.buffers,
            alpha: self.alpha,
            strategy: self.strategy,
            poll: self.poll,
            poll_limit: self.poll_limit,
            step: self.step,
            observer,
        }
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    pub fn current(&self) -> &LocalField {
        self.buffers.current()
    }

    pub fn into_buffers(self) -> DoubleBuffer {
        self.buffers
    }

    /// Advance one time step.
    pub fn step(&mut self) -> Result<(), DiffusionError> {
        match self.strategy {
            ExchangeStrategy::Blocking => self.step_blocking()?,
            ExchangeStrategy::NonBlockingWait => self.step_wait_all()?,
            ExchangeStrategy::Overlap => self.step_overlap()?,
        }
        self.buffers.swap();
        enter(&mut self.observer, self.part.rank, self.step, StepPhase::Swapped);
        self.step += 1;
        Ok(())
    }

    pub fn run(&mut self, steps: u64) -> Result<(), DiffusionError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    fn step_blocking(&mut self) -> Result<(), DiffusionError> {
        let step = self.step;
        let (cur, next) = self.buffers.split_mut();

        enter(&mut self.observer, self.part.rank, step, StepPhase::Exchanging);
        self.exchanger.blocking_exchange(cur)?;
        for side in SIDES {
            self.observer.on_receive_complete(step, side);
        }

        enter(&mut self.observer, self.part.rank, step, StepPhase::Computing);
        read_ghosts(&mut self.observer, step);
        stencil::apply_all(&self.part, cur, next, self.alpha);
        Ok(())
    }

    fn step_wait_all(&mut self) -> Result<(), DiffusionError> {
        let step = self.step;
        let (cur, next) = self.buffers.split_mut();

        enter(&mut self.observer, self.part.rank, step, StepPhase::Issued);
        let mut reqs = self.exchanger.issue_exchange(cur);

        enter(&mut self.observer, self.part.rank, step, StepPhase::Exchanging);
        reqs.wait_all()?;
        for side in SIDES {
            self.observer.on_receive_complete(step, side);
        }
        reqs.deliver_ghosts(cur);

        enter(&mut self.observer, self.part.rank, step, StepPhase::Computing);
        read_ghosts(&mut self.observer, step);
        stencil::apply_all(&self.part, cur, next, self.alpha);
        Ok(())
    }

    fn step_overlap(&mut self) -> Result<(), DiffusionError> {
        let step = self.step;
        let rank = self.part.rank;
        let (cur, next) = self.buffers.split_mut();

        enter(&mut self.observer, rank, step, StepPhase::Issued);
        let mut reqs = self.exchanger.issue_exchange(cur);

        enter(&mut self.observer, rank, step, StepPhase::InteriorComputing);
        stencil::apply_interior(&self.part, cur, next, self.alpha);

        enter(&mut self.observer, rank, step, StepPhase::RecvPolling);
        let rounds = await_receives(
            &mut reqs,
            self.poll,
            self.poll_limit,
            &mut self.observer,
            step,
        )?;
        log::trace!("rank {rank} step {step}: receives complete after {rounds} poll rounds");

        enter(&mut self.observer, rank, step, StepPhase::BoundaryComputing);
        reqs.deliver_ghosts(cur);
        read_ghosts(&mut self.observer, step);
        stencil::apply_boundary(&self.part, cur, next, self.alpha);

        enter(&mut self.observer, rank, step, StepPhase::SendWaiting);
        reqs.wait_sends()
    }
}

fn enter<O: StepObserver>(observer: &mut O, rank: usize, step: u64, phase: StepPhase) {
    log::trace!("rank {rank} step {step}: {phase:?}");
    observer.on_phase(step, phase);
}

fn read_ghosts<O: StepObserver>(observer: &mut O, step: u64) {
    for side in SIDES {
        observer.on_ghost_read(step, side);
    }
}

/// Poll both receives until complete; returns the number of incomplete rounds.
fn await_receives<C: Communicator, O: StepObserver>(
    reqs: &mut ExchangeRequests<C>,
    poll: PollStrategy,
    limit: Option<u64>,
    observer: &mut O,
    step: u64,
) -> Result<u64, DiffusionError> {
    if poll == PollStrategy::Block {
        for side in SIDES {
            reqs.recv_mut(side).complete()?;
            observer.on_receive_complete(step, side);
        }
        return Ok(0);
    }

    let mut seen = [false; 2];
    let mut rounds = 0u64;
    loop {
        for (k, side) in SIDES.into_iter().enumerate() {
            if !seen[k] && reqs.recv_mut(side).poll()? {
                seen[k] = true;
                observer.on_receive_complete(step, side);
            }
        }
        if seen == [true, true] {
            return Ok(rounds);
        }
        rounds += 1;
        if let Some(limit) = limit {
            if rounds > limit {
                return Err(DiffusionError::PollLimitExceeded { step, polls: rounds });
            }
        }
        if poll == PollStrategy::Yield {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
    }
}
