//! Step instrumentation hooks.
//!
//! The scheduler reports every phase transition, the first time each receive
//! is observed complete, and every point where the stencil is about to read a
//! ghost cell. [`NoopObserver`] compiles all of it away; [`RecordingObserver`]
//! keeps an ordered event log that tests use to prove no ghost is read before
//! its receive completed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::partition::Side;

/// States a rank passes through within one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepPhase {
    Issued,
    InteriorComputing,
    RecvPolling,
    BoundaryComputing,
    SendWaiting,
    Swapped,
    /// Blocking exchange or wait-for-all (non-overlapped strategies).
    Exchanging,
    /// Whole owned range in one pass (non-overlapped strategies).
    Computing,
}

pub trait StepObserver {
    fn on_phase(&mut self, _step: u64, _phase: StepPhase) {}
    fn on_receive_complete(&mut self, _step: u64, _side: Side) {}
    fn on_ghost_read(&mut self, _step: u64, _side: Side) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepEvent {
    Phase { step: u64, phase: StepPhase },
    ReceiveComplete { step: u64, side: Side },
    GhostRead { step: u64, side: Side },
}

/// Shared, ordered event log. Clones append to the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<StepEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StepEvent> {
        self.events.lock().clone()
    }

    /// Phases of `step`, in order.
    pub fn phases(&self, step: u64) -> Vec<StepPhase> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match *e {
                StepEvent::Phase { step: s, phase } if s == step => Some(phase),
                _ => None,
            })
            .collect()
    }

    /// First ghost read not preceded by a completed receive on the same side
    /// in the same step.
    pub fn first_unconfirmed_read(&self) -> Option<(u64, Side)> {
        let events = self.events.lock();
        let mut confirmed = std::collections::HashSet::new();
        for e in events.iter() {
            match *e {
                StepEvent::ReceiveComplete { step, side } => {
                    confirmed.insert((step, side));
                }
                StepEvent::GhostRead { step, side } if !confirmed.contains(&(step, side)) => {
                    return Some((step, side));
                }
                _ => {}
            }
        }
        None
    }

    fn push(&self, e: StepEvent) {
        self.events.lock().push(e);
    }
}

impl StepObserver for RecordingObserver {
    fn on_phase(&mut self, step: u64, phase: StepPhase) {
        self.push(StepEvent::Phase { step, phase });
    }
    fn on_receive_complete(&mut self, step: u64, side: Side) {
        self.push(StepEvent::ReceiveComplete { step, side });
    }
    fn on_ghost_read(&mut self, step: u64, side: Side) {
        self.push(StepEvent::GhostRead { step, side });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_read_before_completion() {
        let mut obs = RecordingObserver::new();
        obs.on_receive_complete(0, Side::Left);
        obs.on_ghost_read(0, Side::Left);
        obs.on_ghost_read(0, Side::Right);
        obs.on_receive_complete(0, Side::Right);
        assert_eq!(obs.first_unconfirmed_read(), Some((0, Side::Right)));
    }

    #[test]
    fn completion_does_not_carry_across_steps() {
        let mut obs = RecordingObserver::new();
        obs.on_receive_complete(0, Side::Left);
        obs.on_ghost_read(1, Side::Left);
        assert_eq!(obs.first_unconfirmed_read(), Some((1, Side::Left)));
    }

    #[test]
    fn clones_share_the_log() {
        let obs = RecordingObserver::new();
        let mut handle = obs.clone();
        handle.on_phase(3, StepPhase::Swapped);
        assert_eq!(obs.phases(3), vec![StepPhase::Swapped]);
    }
}
