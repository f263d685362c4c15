//! Worker lifecycle: the producer and consumer loops and the barriers
//! around them.
//!
//! Every worker moves through the same states:
//!
//! ```text
//! register -> start barrier -> run loop -> teardown barrier -> unregister
//! ```
//!
//! The teardown barrier keeps any thread from giving its registration back
//! while another is still touching the ring. Registration failures and
//! panics raised by the backend still pass through both barriers so the
//! rest of the pool cannot deadlock.
//!
//! Both loops poll without backoff: `Busy` and `Empty` go straight back to
//! the top of the loop to keep contention on the ring as high as possible.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;

use tracing::{debug, error};

use crate::config::FailureMode;
use crate::context::{Role, WorkerContext};
use crate::error::HarnessError;
use crate::frame::{FrameCursor, FrameWriter};
use crate::result::WorkerReport;
use crate::ring::RingBuffer;
use crate::store::BackingStore;

/// Process-wide run state: the stop flag and the shared barrier.
#[derive(Debug)]
pub struct RunControl {
    stop: AtomicBool,
    barrier: Barrier,
}

impl RunControl {
    pub fn new(workers: usize) -> Self {
        Self {
            stop: AtomicBool::new(false),
            barrier: Barrier::new(workers),
        }
    }

    /// Raise the stop flag. Safe to call from any thread, any number of
    /// times; does nothing else.
    #[inline]
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn rendezvous(&self) {
        self.barrier.wait();
    }
}

/// Everything the workers share.
#[derive(Debug)]
pub struct Shared<R> {
    pub(crate) ring: R,
    pub(crate) store: BackingStore,
    pub(crate) control: RunControl,
    pub(crate) writer: FrameWriter,
    pub(crate) seed: u32,
    pub(crate) failure_mode: FailureMode,
}

impl<R: RingBuffer> Shared<R> {
    pub fn new(
        ring: R,
        workers: usize,
        seed: u32,
        failure_mode: FailureMode,
    ) -> Result<Self, HarnessError> {
        let capacity = ring.capacity();
        Ok(Self {
            writer: FrameWriter::for_ring(capacity)?,
            store: BackingStore::new(capacity),
            control: RunControl::new(workers),
            ring,
            seed,
            failure_mode,
        })
    }

    pub fn ring(&self) -> &R {
        &self.ring
    }

    pub fn store(&self) -> &BackingStore {
        &self.store
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    fn fail(&self, worker: usize, err: &HarnessError) {
        error!(worker, backend = self.ring.name(), error = %err, "invariant violated");
        match self.failure_mode {
            FailureMode::Abort => std::process::abort(),
            FailureMode::Report => self.control.stop(),
        }
    }
}

/// Producer side of one loop iteration.
pub struct Producer<'a, R: RingBuffer> {
    ring: &'a R,
    store: &'a BackingStore,
    writer: FrameWriter,
}

impl<'a, R: RingBuffer> Producer<'a, R> {
    pub fn new(shared: &'a Shared<R>) -> Self {
        Self {
            ring: &shared.ring,
            store: &shared.store,
            writer: shared.writer.clone(),
        }
    }

    /// Build one frame and try to publish it. Returns whether it was
    /// published; a busy ring just drops the frame.
    pub fn step(
        &mut self,
        worker: &mut R::Worker,
        ctx: &mut WorkerContext,
    ) -> Result<bool, HarnessError> {
        ctx.iterations += 1;
        self.store.check_canary()?;

        let frame = self.writer.generate(&mut ctx.rng);
        let Some(offset) = self.ring.acquire(worker, frame.len()) else {
            ctx.busy += 1;
            return Ok(false);
        };

        let capacity = self.store.capacity();
        if offset >= capacity {
            return Err(HarnessError::OffsetOutOfRange { offset, capacity });
        }
        self.store.write(offset, frame)?;
        self.ring.produce(worker);

        let len = frame.len();
        ctx.record_frames(1, len);
        Ok(true)
    }
}

/// Consumer side of one loop iteration.
pub struct Consumer<'a, R: RingBuffer> {
    ring: &'a R,
    store: &'a BackingStore,
    scratch: Vec<u8>,
}

impl<'a, R: RingBuffer> Consumer<'a, R> {
    pub fn new(shared: &'a Shared<R>) -> Self {
        Self {
            ring: &shared.ring,
            store: &shared.store,
            scratch: Vec::with_capacity(shared.store.capacity()),
        }
    }

    /// Claim whatever is published, verify it frame by frame and release
    /// it. Returns the number of frames verified.
    pub fn step(&mut self, ctx: &mut WorkerContext) -> Result<u64, HarnessError> {
        ctx.iterations += 1;
        self.store.check_canary()?;

        let Some(span) = self.ring.consume() else {
            ctx.empty += 1;
            return Ok(0);
        };

        let capacity = self.store.capacity();
        if span.offset >= capacity {
            return Err(HarnessError::OffsetOutOfRange {
                offset: span.offset,
                capacity,
            });
        }
        self.store
            .read_into(span.offset, span.length, &mut self.scratch)?;

        // The frames must tile the range exactly: a frame running past its
        // end shows up as truncation.
        let mut cursor = FrameCursor::new(&self.scratch);
        let mut frames = 0;
        while let Some(frame) = cursor.next() {
            if let Err(source) = frame {
                return Err(HarnessError::Corruption {
                    offset: span.offset + cursor.offset(),
                    source,
                });
            }
            frames += 1;
        }

        self.ring.release(span.length);
        ctx.record_frames(frames, span.length);
        Ok(frames)
    }
}

fn consumer_loop<R: RingBuffer>(
    shared: &Shared<R>,
    ctx: &mut WorkerContext,
) -> Result<(), HarnessError> {
    let mut consumer = Consumer::new(shared);
    while !shared.control.should_stop() {
        consumer.step(ctx)?;
    }
    Ok(())
}

fn producer_loop<R: RingBuffer>(
    shared: &Shared<R>,
    worker: &mut R::Worker,
    ctx: &mut WorkerContext,
) -> Result<(), HarnessError> {
    let mut producer = Producer::new(shared);
    while !shared.control.should_stop() {
        producer.step(worker, ctx)?;
    }
    Ok(())
}

/// Body of worker thread `id`.
///
/// In [`FailureMode::Abort`] a violation never returns; in
/// [`FailureMode::Report`] it stops the whole pool and comes back as `Err`
/// once the teardown barrier is passed. A panic inside the backend counts
/// as a violation and is reported as [`HarnessError::WorkerPanicked`].
pub fn run_worker<R: RingBuffer>(
    id: usize,
    shared: &Shared<R>,
) -> Result<WorkerReport, HarnessError> {
    let mut ctx = WorkerContext::new(id, shared.seed);
    let panicked = || HarnessError::WorkerPanicked { worker: id };

    let registration = match panic::catch_unwind(AssertUnwindSafe(|| shared.ring.register())) {
        Ok(registration) => registration.map_err(HarnessError::from),
        Err(_) => Err(panicked()),
    };
    shared.control.rendezvous();

    let (outcome, worker) = match registration {
        Ok(mut worker) => {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match ctx.role() {
                Role::Consumer => consumer_loop(shared, &mut ctx),
                Role::Producer => producer_loop(shared, &mut worker, &mut ctx),
            }))
            .unwrap_or_else(|_| Err(panicked()));
            (outcome, Some(worker))
        }
        Err(e) => (Err(e), None),
    };
    if let Err(err) = &outcome {
        shared.fail(id, err);
    }

    shared.control.rendezvous();
    if let Some(worker) = worker {
        shared.ring.unregister(worker);
    }

    debug!(
        worker = id,
        role = ?ctx.role(),
        iterations = ctx.iterations,
        frames = ctx.frames(),
        "worker exited"
    );
    outcome.map(|()| ctx.into_report())
}
