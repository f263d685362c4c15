//! ringbuf-stress: run the ring buffer stress test for a bounded time.
//!
//! Prints `stress test`, runs one consumer and N producers against the ring
//! for the given number of seconds, then prints `ok` and exits 0. Any
//! detected violation aborts the process.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ringbuf_stress::prng::DEFAULT_SEED;
use ringbuf_stress::{
    init_logging, ConsoleReporter, Fault, FaultyRing, JsonReporter, LockedRing, Reporter,
    RingBuffer, StressConfig, StressRunner, RING_CAPACITY,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "ringbuf-stress",
    about = "Stress an MPSC byte ring buffer with self-checking frames",
    long_about = "
Runs one consumer and (cores) producer threads against a shared ring buffer
for a bounded time. Every frame carries its length and an XOR checksum, and
a canary byte sits past the end of the buffer. Any corruption, overrun or
framing error aborts the process.

Example:
    ringbuf-stress                          # 10 second run
    ringbuf-stress 1                        # 1 second run
    ringbuf-stress 5 --workers 2            # one consumer, one producer
    ringbuf-stress 5 --backend faulty-overrun   # detectors must fire
    ringbuf-stress 5 --backend faulty-misframe --fault-after 10
"
)]
struct Cli {
    /// Run duration in whole seconds
    #[arg(default_value_t = 10)]
    seconds: u64,

    /// Worker threads including the consumer (default: cores + 1)
    #[arg(long)]
    workers: Option<usize>,

    /// Ring backend to stress
    #[arg(long, value_enum, default_value_t = Backend::Reference)]
    backend: Backend,

    /// Clean operations a faulty backend performs before misbehaving
    #[arg(long, default_value_t = 10_000)]
    fault_after: u64,

    /// Base seed for the per-worker generators
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u32,

    /// Print the run summary as JSON after completion
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Quiet mode (only errors are logged)
    #[arg(long, short = 'q')]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Mutex-guarded reference ring
    Reference,
    /// Reference ring that starts writing one byte past capacity
    FaultyOverrun,
    /// Reference ring that starts handing out misaligned ranges
    FaultyMisframe,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    init_logging(level);

    let config = StressConfig::new().seconds(cli.seconds).seed(cli.seed);
    let config = match cli.workers {
        Some(n) => config.workers(n),
        None => config,
    };
    let workers = config.worker_count();

    let mut runner = StressRunner::with_config(config);
    let mut reporters: Vec<Box<dyn Reporter>> = vec![Box::new(ConsoleReporter::new())];
    if cli.json {
        reporters.push(Box::new(JsonReporter::new()));
    }
    runner.reporters(reporters);

    let ring = LockedRing::new(RING_CAPACITY, workers).context("Failed to set up ring buffer")?;
    match cli.backend {
        Backend::Reference => run(&runner, ring),
        Backend::FaultyOverrun => {
            run(&runner, FaultyRing::new(ring, Fault::Overrun, cli.fault_after))
        }
        Backend::FaultyMisframe => {
            run(&runner, FaultyRing::new(ring, Fault::Misframe, cli.fault_after))
        }
    }
}

fn run<R: RingBuffer + 'static>(runner: &StressRunner, ring: R) -> Result<()> {
    let backend = ring.name();
    runner
        .run(ring)
        .with_context(|| format!("Stress run against {} backend failed", backend))?;
    Ok(())
}
