use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use halo_diffusion::config::{
    DEFAULT_ALPHA, DEFAULT_GLOBAL_SIZE, DEFAULT_HOT_VALUE, DEFAULT_STEPS,
};
use halo_diffusion::prelude::*;

/// Parallel 1-D diffusion with overlapped halo exchange.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one strategy and print its timing line.
    Run(RunArgs),
    /// Run all three strategies on the same configuration and compare them.
    Compare(RunArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Total number of cells across all ranks.
    #[arg(long, default_value_t = DEFAULT_GLOBAL_SIZE)]
    global_size: usize,
    /// Number of time steps.
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    steps: u64,
    /// Diffusion coefficient, must lie in [0, 0.5).
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    alpha: f64,
    /// Number of in-process ranks.
    #[arg(short = 'n', long, default_value_t = 4)]
    ranks: usize,
    #[arg(long, value_enum, default_value_t = CliStrategy::Overlap)]
    strategy: CliStrategy,
    /// How the overlapped step waits for its receives.
    #[arg(long, value_enum, default_value_t = CliPoll::Spin)]
    poll: CliPoll,
    /// Fail a step after this many unsuccessful receive polls.
    #[arg(long)]
    poll_limit: Option<u64>,
    /// What to do when the global size is not a multiple of the rank count.
    #[arg(long, value_enum, default_value_t = CliRemainder::Warn)]
    remainder: CliRemainder,
    /// Initial value of the hot region on rank 0.
    #[arg(long, default_value_t = DEFAULT_HOT_VALUE)]
    hot_value: f64,
    /// Use the MPI world instead of in-process ranks (`--ranks` is ignored).
    #[cfg(feature = "mpi-support")]
    #[arg(long)]
    mpi: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliStrategy {
    Blocking,
    Wait,
    Overlap,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliPoll {
    Spin,
    Yield,
    Block,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliRemainder {
    Warn,
    Reject,
}

impl From<CliStrategy> for ExchangeStrategy {
    fn from(s: CliStrategy) -> Self {
        match s {
            CliStrategy::Blocking => ExchangeStrategy::Blocking,
            CliStrategy::Wait => ExchangeStrategy::NonBlockingWait,
            CliStrategy::Overlap => ExchangeStrategy::Overlap,
        }
    }
}

impl From<CliPoll> for PollStrategy {
    fn from(p: CliPoll) -> Self {
        match p {
            CliPoll::Spin => PollStrategy::Spin,
            CliPoll::Yield => PollStrategy::Yield,
            CliPoll::Block => PollStrategy::Block,
        }
    }
}

impl From<CliRemainder> for RemainderPolicy {
    fn from(r: CliRemainder) -> Self {
        match r {
            CliRemainder::Warn => RemainderPolicy::Warn,
            CliRemainder::Reject => RemainderPolicy::Reject,
        }
    }
}

impl RunArgs {
    fn config(&self) -> DiffusionConfig {
        let mut config = DiffusionConfig::new(self.global_size, self.steps, self.alpha)
            .with_strategy(self.strategy.into())
            .with_poll(self.poll.into())
            .with_remainder(self.remainder.into())
            .with_hot_value(self.hot_value);
        if let Some(limit) = self.poll_limit {
            config = config.with_poll_limit(limit);
        }
        config
    }
}

/// Where the ranks of a run live. Built once per invocation: MPI can only
/// be initialised once per process.
enum Launcher {
    Local(usize),
    #[cfg(feature = "mpi-support")]
    Mpi(MpiComm),
}

impl Launcher {
    fn from_args(args: &RunArgs) -> Result<Self, DiffusionError> {
        #[cfg(feature = "mpi-support")]
        if args.mpi {
            return Ok(Launcher::Mpi(MpiComm::new()?));
        }
        Ok(Launcher::Local(args.ranks))
    }

    /// Outcome of rank 0 for each strategy; empty on the other MPI ranks.
    fn compare(&self, base: &DiffusionConfig) -> Result<Vec<RankOutcome>, DiffusionError> {
        match self {
            Launcher::Local(nranks) => {
                let mut outcomes = Vec::with_capacity(ExchangeStrategy::ALL.len());
                for strategy in ExchangeStrategy::ALL {
                    let config = base.clone().with_strategy(strategy);
                    let ranks = launch_local(&config, *nranks)?;
                    outcomes.extend(ranks.into_iter().filter(|o| o.rank == 0));
                }
                Ok(outcomes)
            }
            #[cfg(feature = "mpi-support")]
            Launcher::Mpi(comm) => Ok(compare_strategies(comm, base)?
                .into_iter()
                .filter(|o| o.rank == 0)
                .collect()),
        }
    }

    /// Rank 0's report, or `None` on the other MPI ranks.
    fn run(&self, config: &DiffusionConfig) -> Result<Option<TimingReport>, DiffusionError> {
        match self {
            Launcher::Local(nranks) => {
                let outcomes = launch_local(config, *nranks)?;
                Ok(designated_report(&outcomes, config))
            }
            #[cfg(feature = "mpi-support")]
            Launcher::Mpi(comm) => {
                let outcome = run_rank(comm, config)?;
                Ok((outcome.rank == 0).then(|| outcome.report(config)))
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), DiffusionError> {
    match cli.command {
        Command::Run(args) => {
            let config = args.config();
            if let Some(report) = Launcher::from_args(&args)?.run(&config)? {
                println!("{report}");
            }
        }
        Command::Compare(args) => {
            let base = args.config();
            let outcomes = Launcher::from_args(&args)?.compare(&base)?;
            let runs: Vec<_> = outcomes
                .iter()
                .map(|o| (o.strategy, o.report(&base)))
                .collect();
            for (_, report) in &runs {
                println!("{report}");
            }
            if !runs.is_empty() {
                println!("{}", Comparison::from_runs(runs));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
