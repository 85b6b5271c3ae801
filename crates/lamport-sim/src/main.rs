//! Lamport mutual-exclusion simulator.
//!
//! Runs the protocol either under the deterministic scheduler (default) or as
//! one tokio task per process (`--concurrent`), then prints a summary.
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`; `--verbose` raises
//! the default level to debug.

use std::{
    io::{self, Write},
    process::ExitCode,
};

use clap::{Parser, ValueEnum};
use lamport_core::{ProcessId, ProtocolConfig, TieBreak};
use lamport_harness::{
    ConcurrentConfig, ConcurrentError, SchedulePolicy, Simulation, SimulationConfig,
    SimulationError, WorldConfig, concurrent,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lamport-sim")]
#[command(about = "Simulate Lamport's distributed mutual exclusion", long_about = None)]
struct Cli {
    /// Number of processes
    #[arg(short = 'n', long, default_value_t = 3)]
    processes: u32,

    /// Critical-section entries per process
    #[arg(short, long, default_value_t = 2)]
    rounds: u32,

    /// Scheduler seed
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Scheduling policy
    #[arg(long, value_enum, default_value_t = PolicyArg::Random)]
    policy: PolicyArg,

    /// Ordering of requests with equal timestamps
    #[arg(long, value_enum, default_value_t = TieBreakArg::ProcessId)]
    tie_break: TieBreakArg,

    /// Chance of an idle scheduler step
    #[arg(long, default_value_t = 0.0)]
    skip_probability: f64,

    /// Step budget before the run is declared stuck
    #[arg(long, default_value_t = 1_000_000)]
    max_steps: u64,

    /// Run one tokio task per process instead of the scheduler
    #[arg(long)]
    concurrent: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Random,
    RoundRobin,
}

impl From<PolicyArg> for SchedulePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Random => Self::Random,
            PolicyArg::RoundRobin => Self::RoundRobin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TieBreakArg {
    ProcessId,
    Permissive,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::ProcessId => Self::ProcessId,
            TieBreakArg::Permissive => Self::Permissive,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),

    #[error("concurrent run failed: {0}")]
    Concurrent(#[from] ConcurrentError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Cli {
    fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig::default().with_tie_break(self.tie_break.into())
    }

    fn simulation_config(&self) -> SimulationConfig {
        let world = WorldConfig::new(self.processes)
            .with_protocol(self.protocol())
            .with_rounds_for_all(self.rounds);

        SimulationConfig::new(world)
            .with_seed(self.seed)
            .with_policy(self.policy.into())
            .with_skip_probability(self.skip_probability)
    }

    fn concurrent_config(&self) -> ConcurrentConfig {
        ConcurrentConfig {
            processes: self.processes,
            rounds: self.rounds,
            protocol: self.protocol(),
            ..ConcurrentConfig::default()
        }
    }
}

fn format_entries(entries: &[ProcessId]) -> String {
    entries.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

fn run_scheduled(cli: &Cli, out: &mut impl Write) -> Result<(), CliError> {
    let mut sim = Simulation::new(cli.simulation_config());
    let report = sim.run_until_quiescent(cli.max_steps)?;
    let world = sim.world();

    info!(steps = report.steps, entries = report.entries.len(), "simulation quiescent");

    writeln!(out, "mode: scheduled ({:?}, seed {})", cli.policy, cli.seed)?;
    writeln!(out, "processes: {}", cli.processes)?;
    writeln!(out, "steps: {}", report.steps)?;
    writeln!(out, "entries: {}", format_entries(&report.entries))?;
    for p in world.processes() {
        writeln!(
            out,
            "{}: entered {}, sent {}, received {}, clock {}",
            p.id(),
            world.entry_count(p.id()),
            world.messages_sent(p.id()),
            world.messages_received(p.id()),
            p.clock()
        )?;
    }
    Ok(())
}

fn run_concurrent(cli: &Cli, out: &mut impl Write) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let report = runtime.block_on(concurrent::run(cli.concurrent_config()))?;

    info!(entries = report.entries.len(), "concurrent run complete");

    writeln!(out, "mode: concurrent")?;
    writeln!(out, "processes: {}", cli.processes)?;
    writeln!(out, "entries: {}", format_entries(&report.entries))?;
    for outcome in &report.outcomes {
        writeln!(
            out,
            "{}: entered {}, polls {}, clock {}",
            outcome.process, outcome.rounds, outcome.polls, outcome.clock
        )?;
    }
    Ok(())
}

fn run(cli: &Cli, out: &mut impl Write) -> Result<(), CliError> {
    if cli.concurrent { run_concurrent(cli, out) } else { run_scheduled(cli, out) }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    match run(&cli, &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        },
    }
}
