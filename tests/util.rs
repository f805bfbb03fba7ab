#![allow(dead_code)]
use halo_diffusion::prelude::*;

/// Serial whole-domain solver: `nranks * (global_size / nranks)` cells with
/// zero values outside both ends, seeded the way rank 0 is seeded.
pub fn serial_reference(config: &DiffusionConfig, nranks: usize) -> Vec<f64> {
    let local = config.global_size / nranks;
    let mut u = vec![0.0; local * nranks];
    for g in 0..(local / 2).saturating_sub(1) {
        u[g] = config.hot_value;
    }
    serial_from(u, config.steps, config.alpha)
}

/// Serial solver from an arbitrary initial field.
pub fn serial_from(mut u: Vec<f64>, steps: u64, alpha: f64) -> Vec<f64> {
    let n = u.len();
    let mut next = vec![0.0; n];
    for _ in 0..steps {
        for i in 0..n {
            let l = if i == 0 { 0.0 } else { u[i - 1] };
            let r = if i + 1 == n { 0.0 } else { u[i + 1] };
            next[i] = u[i] + alpha * (l - 2.0 * u[i] + r);
        }
        std::mem::swap(&mut u, &mut next);
    }
    u
}

/// Distributed run from an arbitrary initial field of `nranks * k` cells.
pub fn distributed_from(initial: &[f64], nranks: usize, config: &DiffusionConfig) -> Vec<f64> {
    let universe = LocalUniverse::new(nranks);
    let parts: Vec<Vec<f64>> = std::thread::scope(|s| {
        let handles: Vec<_> = universe
            .comms()
            .into_iter()
            .map(|comm| {
                s.spawn(move || {
                    let part = Partition::new(initial.len(), nranks, comm.rank()).unwrap();
                    let mut field = LocalField::zeros(part.local_size);
                    let start = part.global_offset;
                    field
                        .owned_mut()
                        .copy_from_slice(&initial[start..start + part.local_data_size]);
                    let mut sched =
                        OverlapScheduler::new(&comm, part, DoubleBuffer::from_current(field), config);
                    sched.run(config.steps).unwrap();
                    sched.current().owned().to_vec()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    parts.concat()
}

/// Assert two fields agree element-wise within `tol`.
pub fn assert_close(got: &[f64], want: &[f64], tol: f64) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!(
            (g - w).abs() <= tol,
            "cell {i}: got {g}, want {w} (|diff| = {})",
            (g - w).abs()
        );
    }
}

/// Small configuration that still has a non-empty interior on every rank.
pub fn small_config(strategy: ExchangeStrategy) -> DiffusionConfig {
    DiffusionConfig::new(48, 25, 0.2).with_strategy(strategy)
}

/// Run `config` on `nranks` threads and return the assembled owned field.
pub fn run_global(config: &DiffusionConfig, nranks: usize) -> Vec<f64> {
    let outcomes = launch_local(config, nranks).expect("run failed");
    assemble_global(&outcomes)
}
