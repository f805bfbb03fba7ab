use halo_diffusion::observer::StepEvent;
use halo_diffusion::prelude::*;

fn observed_run(config: &DiffusionConfig, nranks: usize) -> Vec<RecordingObserver> {
    let observers: Vec<RecordingObserver> = (0..nranks).map(|_| RecordingObserver::new()).collect();
    launch_local_observed(config, nranks, |rank| observers[rank].clone()).unwrap();
    observers
}

#[test]
fn no_ghost_is_read_before_its_receive_completes() {
    for strategy in ExchangeStrategy::ALL {
        for poll in [PollStrategy::Spin, PollStrategy::Yield, PollStrategy::Block] {
            let config = DiffusionConfig::new(60, 15, 0.2)
                .with_strategy(strategy)
                .with_poll(poll);
            for (rank, obs) in observed_run(&config, 4).iter().enumerate() {
                assert_eq!(
                    obs.first_unconfirmed_read(),
                    None,
                    "rank {rank}, {strategy:?}, {poll:?}"
                );
            }
        }
    }
}

#[test]
fn interior_is_computed_before_receives_are_awaited() {
    let config = DiffusionConfig::new(40, 4, 0.1).with_strategy(ExchangeStrategy::Overlap);
    for obs in observed_run(&config, 2) {
        for step in 0..4 {
            let events = obs.events();
            let position = |want: StepEvent| events.iter().position(|e| *e == want).unwrap();
            let interior = position(StepEvent::Phase {
                step,
                phase: StepPhase::InteriorComputing,
            });
            let polling = position(StepEvent::Phase {
                step,
                phase: StepPhase::RecvPolling,
            });
            let boundary = position(StepEvent::Phase {
                step,
                phase: StepPhase::BoundaryComputing,
            });
            assert!(interior < polling && polling < boundary);
            for side in [Side::Left, Side::Right] {
                let done = position(StepEvent::ReceiveComplete { step, side });
                let read = position(StepEvent::GhostRead { step, side });
                assert!(polling < done && done < read, "step {step} {side:?}");
            }
        }
    }
}

#[test]
fn non_overlapped_strategies_exchange_then_compute() {
    for strategy in [ExchangeStrategy::Blocking, ExchangeStrategy::NonBlockingWait] {
        let config = DiffusionConfig::new(30, 3, 0.1).with_strategy(strategy);
        for obs in observed_run(&config, 3) {
            for step in 0..3 {
                let phases = obs.phases(step);
                let exchange = phases.iter().position(|p| *p == StepPhase::Exchanging);
                let compute = phases.iter().position(|p| *p == StepPhase::Computing);
                assert!(exchange.is_some() && exchange < compute, "{strategy:?}: {phases:?}");
                assert_eq!(phases.last(), Some(&StepPhase::Swapped));
            }
        }
    }
}
