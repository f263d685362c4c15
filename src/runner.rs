//! The stress runner: sets up shared state, arms the stop timer, runs the
//! worker pool and reports.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::{FailureMode, StressConfig};
use crate::error::HarnessError;
use crate::harness::{run_worker, Shared};
use crate::report::{ConsoleReporter, Reporter};
use crate::result::{RunPlan, RunSummary, WorkerReport};
use crate::ring::RingBuffer;

/// Runs one bounded stress session against a ring backend.
///
/// # Example
///
/// ```rust,no_run
/// use ringbuf_stress::{FailureMode, LockedRing, StressConfig, StressRunner, RING_CAPACITY};
///
/// let config = StressConfig::new()
///     .seconds(1)
///     .failure_mode(FailureMode::Report);
/// let workers = config.worker_count();
/// let runner = StressRunner::with_config(config);
///
/// let ring = LockedRing::new(RING_CAPACITY, workers).unwrap();
/// let summary = runner.run(ring).unwrap();
/// assert!(summary.frames_verified > 0);
/// ```
pub struct StressRunner {
    config: StressConfig,
    reporters: Vec<Box<dyn Reporter>>,
}

impl StressRunner {
    /// Create a runner with default config.
    pub fn new() -> Self {
        Self::with_config(StressConfig::default())
    }

    /// Create a runner with explicit config and the console reporter.
    pub fn with_config(config: StressConfig) -> Self {
        Self {
            config,
            reporters: vec![Box::new(ConsoleReporter::new())],
        }
    }

    pub fn config(&self) -> &StressConfig {
        &self.config
    }

    /// Replace reporters with a custom set.
    pub fn reporters(&mut self, reporters: Vec<Box<dyn Reporter>>) -> &mut Self {
        self.reporters = reporters;
        self
    }

    /// Add an additional reporter.
    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) -> &mut Self {
        self.reporters.push(reporter);
        self
    }

    /// Stress `ring` for the configured duration.
    ///
    /// The ring must accept at least [`StressConfig::worker_count`]
    /// registrations. Returns the first violation any worker reported; with
    /// [`FailureMode::Abort`](crate::FailureMode::Abort) a violation aborts
    /// the process before this returns.
    ///
    /// If a thread fails to spawn, the workers already started exit
    /// without touching the ring and the run returns
    /// [`HarnessError::Spawn`], or aborts under
    /// [`FailureMode::Abort`](crate::FailureMode::Abort).
    pub fn run<R>(&self, ring: R) -> Result<RunSummary, HarnessError>
    where
        R: RingBuffer + 'static,
    {
        let workers = self.config.worker_count();
        let plan = RunPlan {
            backend: ring.name().to_string(),
            workers,
            capacity: ring.capacity(),
            duration: self.config.duration,
        };
        let shared = Arc::new(Shared::new(
            ring,
            workers,
            self.config.seed,
            self.config.failure_mode,
        )?);

        for r in &self.reporters {
            r.run_start(&plan);
        }
        info!(
            backend = %plan.backend,
            workers,
            capacity = plan.capacity,
            duration_ms = plan.duration.as_millis() as u64,
            "starting stress run"
        );

        // Workers park on their gate until every thread and the timer
        // exist, so a failed spawn never strands the others at a barrier.
        let mut gates = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            match spawn_gated(id, Arc::clone(&shared)) {
                Ok((gate, handle)) => {
                    gates.push(gate);
                    handles.push(handle);
                }
                Err(e) => return Err(self.abandon(gates, handles, e)),
            }
        }

        let started_at = unix_millis();
        let start = Instant::now();
        let timer = match StopTimer::arm(self.config.duration, Arc::clone(&shared)) {
            Ok(timer) => timer,
            Err(e) => return Err(self.abandon(gates, handles, e)),
        };
        for gate in gates {
            gate.send(()).ok();
        }

        let mut reports = Vec::with_capacity(workers);
        let mut failure = None;
        for (id, handle) in handles.into_iter().enumerate() {
            let err = match handle.join() {
                Ok(Ok(Some(report))) => {
                    reports.push(report);
                    continue;
                }
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => e,
                Err(_) => HarnessError::WorkerPanicked { worker: id },
            };
            // Keep the first violation; later ones are usually fallout.
            if failure.is_none() {
                failure = Some(err);
            }
        }
        timer.disarm();

        if let Some(err) = failure {
            warn!(backend = %plan.backend, error = %err, "stress run failed");
            return Err(err);
        }

        let summary = RunSummary::from_reports(plan, start.elapsed(), started_at, reports);
        info!(
            frames_produced = summary.frames_produced,
            frames_verified = summary.frames_verified,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "stress run passed"
        );
        for r in &self.reporters {
            r.run_end(&summary);
        }
        Ok(summary)
    }
}

impl Default for StressRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl StressRunner {
    /// Release parked workers without running them and turn `cause` into
    /// the run's error.
    fn abandon(
        &self,
        gates: Vec<mpsc::Sender<()>>,
        handles: Vec<WorkerHandle>,
        cause: io::Error,
    ) -> HarnessError {
        let err = HarnessError::Spawn(cause);
        error!(error = %err, "stress run setup failed");
        if self.config.failure_mode == FailureMode::Abort {
            std::process::abort();
        }
        // A dropped gate wakes its worker with a disconnect.
        drop(gates);
        for handle in handles {
            handle.join().ok();
        }
        err
    }
}

type WorkerHandle = JoinHandle<Result<Option<WorkerReport>, HarnessError>>;

/// Spawn worker `id` parked on a gate. Sending on the gate starts it;
/// dropping the gate makes it exit with `Ok(None)` without registering.
fn spawn_gated<R>(
    id: usize,
    shared: Arc<Shared<R>>,
) -> io::Result<(mpsc::Sender<()>, WorkerHandle)>
where
    R: RingBuffer + 'static,
{
    let (gate, opened) = mpsc::channel::<()>();
    let handle = thread::Builder::new()
        .name(format!("stress-{}", id))
        .spawn(move || match opened.recv() {
            Ok(()) => run_worker(id, &shared).map(Some),
            Err(_) => Ok(None),
        })?;
    Ok((gate, handle))
}

/// One-shot timer that raises the stop flag when it expires.
///
/// Expiry does nothing but store the flag. Disarming wakes the timer
/// thread early so a run that ended on a violation does not wait out the
/// full duration.
struct StopTimer {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl StopTimer {
    fn arm<R>(duration: Duration, shared: Arc<Shared<R>>) -> io::Result<Self>
    where
        R: RingBuffer + 'static,
    {
        let (cancel, expiry) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("stress-timer".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = expiry.recv_timeout(duration) {
                    shared.control().stop();
                }
            })?;
        Ok(Self { cancel, handle })
    }

    fn disarm(self) {
        drop(self.cancel);
        self.handle.join().ok();
    }
}

fn unix_millis() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_millis())
}
