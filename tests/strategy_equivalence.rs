mod util;

use halo_diffusion::prelude::*;
use proptest::prelude::*;
use util::{assert_close, distributed_from, run_global, serial_from, serial_reference, small_config};

#[test]
fn every_strategy_matches_the_serial_reference() {
    for nranks in [2, 3, 4] {
        let want = serial_reference(&small_config(ExchangeStrategy::Overlap), nranks);
        for strategy in ExchangeStrategy::ALL {
            let got = run_global(&small_config(strategy), nranks);
            assert_close(&got, &want, 1e-12);
        }
    }
}

#[test]
fn heat_crosses_rank_boundaries() {
    let config = DiffusionConfig::new(16, 40, 0.25);
    let field = run_global(&config, 2);
    // Rank 0 owns the hot region; after 40 steps rank 1 must have warmed up.
    assert!(field[8..].iter().any(|&v| v > 0.0), "{field:?}");
}

#[test]
fn zero_alpha_is_the_identity() {
    for strategy in ExchangeStrategy::ALL {
        let config = DiffusionConfig::new(24, 10, 0.0).with_strategy(strategy);
        let field = run_global(&config, 3);
        let mut want = vec![0.0; 24];
        for v in &mut want[..3] {
            *v = config.hot_value;
        }
        assert_eq!(field, want, "{strategy:?}");
    }
}

#[test]
fn uneven_split_simulates_the_truncated_domain() {
    let config = DiffusionConfig::new(50, 12, 0.1);
    let field = run_global(&config, 4);
    assert_eq!(field.len(), 48);
    assert_close(&field, &serial_reference(&config, 4), 1e-12);
}

#[test]
fn one_owned_cell_per_rank() {
    for (global_size, nranks) in [(3, 2), (4, 3)] {
        let config = DiffusionConfig::new(global_size, 1, 0.1);
        let outcomes = launch_local(&config, nranks).unwrap();
        assert_close(&assemble_global(&outcomes), &serial_reference(&config, nranks), 1e-12);
    }

    let initial = [5.0, -1.0, 3.0];
    for strategy in ExchangeStrategy::ALL {
        for poll in [PollStrategy::Spin, PollStrategy::Block] {
            let config = DiffusionConfig::new(3, 6, 0.3)
                .with_strategy(strategy)
                .with_poll(poll);
            let got = distributed_from(&initial, 3, &config);
            assert_close(&got, &serial_from(initial.to_vec(), 6, 0.3), 1e-12);
        }
    }
}

#[test]
fn fewer_cells_than_ranks_is_rejected() {
    assert!(matches!(
        launch_local(&DiffusionConfig::new(3, 1, 0.1), 4),
        Err(DiffusionError::SliceTooSmall { local: 0, .. })
    ));
}

#[test]
fn config_survives_a_json_round_trip() {
    let config = DiffusionConfig::new(64, 9, 0.3)
        .with_strategy(ExchangeStrategy::NonBlockingWait)
        .with_poll(PollStrategy::Yield)
        .with_poll_limit(1_000_000);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"non-blocking-wait\""), "{json}");
    let back: DiffusionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);

    let partial: DiffusionConfig = serde_json::from_str(r#"{"global_size": 32}"#).unwrap();
    assert_eq!(partial.global_size, 32);
    assert_eq!(partial.strategy, ExchangeStrategy::Overlap);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn strategies_agree_on_random_inputs(
        nranks in 2usize..=5,
        local in 1usize..=12,
        steps in 1u64..=20,
        alpha in 0.0f64..0.49,
        hot in -5.0f64..50.0,
    ) {
        let base = DiffusionConfig::new(nranks * local, steps, alpha).with_hot_value(hot);
        let reference = run_global(&base.clone().with_strategy(ExchangeStrategy::Blocking), nranks);
        for strategy in [ExchangeStrategy::NonBlockingWait, ExchangeStrategy::Overlap] {
            let got = run_global(&base.clone().with_strategy(strategy), nranks);
            prop_assert_eq!(got.len(), reference.len());
            for (g, r) in got.iter().zip(&reference) {
                prop_assert!((g - r).abs() <= 1e-12);
            }
        }
        let serial = serial_reference(&base, nranks);
        for (g, r) in reference.iter().zip(&serial) {
            prop_assert!((g - r).abs() <= 1e-12);
        }
    }
}
