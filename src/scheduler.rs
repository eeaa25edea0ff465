//! Persistence scheduler: decides when an in-memory snapshot is written to
//! durable storage.
//!
//! Bursts of rapid state changes collapse into at most one write per
//! throttle window, plus exactly one trailing write so the final state is
//! eventually durable. Writes to the backend are strictly serialized: at
//! most one `persist_difference` call is outstanding at any time, and a
//! later snapshot is never persisted before an earlier one.

use crate::backend::StorageBackend;
use crate::error::Result;
use crate::types::{PersistTrigger, SchedulerConfig, Snapshot};
use crossbeam_channel::{after, bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Work item for the persist worker thread.
enum Job {
    Persist {
        last: Option<Snapshot>,
        next: Snapshot,
    },
    Shutdown,
}

/// Mutable scheduler state. Every mutation happens under the one mutex in
/// [`Shared`]; timer and completion callbacks re-enter through the same
/// lock, so the single-flight and monotonic-timestamp invariants hold even
/// with callers on multiple threads.
#[derive(Default)]
struct SchedulerState {
    /// Snapshot last handed to the backend (updated on completion, success
    /// or failure).
    last_persisted: Option<Snapshot>,

    /// Most recent snapshot seen by `process`.
    newest: Option<Snapshot>,

    /// A persist is currently outstanding.
    persisting: bool,

    /// A `process` call arrived while a persist was outstanding; drained
    /// as one trailing write on completion.
    backlog_pending: bool,

    /// New persists are blocked; an outstanding one may finish.
    paused: bool,

    /// `process` has been called at least once.
    initialized: bool,

    /// Start time of the most recent persist.
    last_persist_at: Option<Instant>,

    /// Guards against stale timer callbacks after cancellation.
    timer_epoch: u64,

    /// Cancel handle for the pending throttle timer, if one is armed.
    timer_cancel: Option<Sender<()>>,
}

impl SchedulerState {
    fn cancel_timer(&mut self) {
        // Dropping the sender disconnects the timer thread's cancel
        // channel; the epoch check catches a fire that raced the drop.
        self.timer_cancel = None;
    }
}

struct Shared {
    backend: Arc<dyn StorageBackend>,
    config: SchedulerConfig,
    jobs: Sender<Job>,
    state: Mutex<SchedulerState>,
}

impl Shared {
    fn process(self: &Arc<Self>, trigger: Option<PersistTrigger>, new_state: Snapshot) -> bool {
        let mut st = self.state.lock();
        st.newest = Some(new_state.clone());
        st.initialized = true;

        if st.paused {
            return false;
        }
        if let Some(last) = &st.last_persisted {
            // Identity, not deep equality: unchanged state never rewrites.
            if last.same_as(&new_state) {
                return false;
            }
        }
        if st.persisting {
            st.backlog_pending = true;
            return false;
        }

        let forced = matches!(trigger, Some(PersistTrigger::Force));
        let wait = match (forced, self.backend.throttle(), st.last_persist_at) {
            (true, _, _) | (_, None, _) | (_, _, None) => None,
            (false, Some(window), Some(started)) => {
                let elapsed = started.elapsed();
                if elapsed >= window {
                    None
                } else {
                    Some(window - elapsed)
                }
            }
        };

        match wait {
            None => {
                st.cancel_timer();
                self.begin_persist(&mut st, new_state);
                true
            }
            Some(delay) => {
                if st.timer_cancel.is_none() {
                    self.arm_timer(&mut st, delay);
                }
                false
            }
        }
    }

    /// Start a persist. Caller holds the state lock and has already ruled
    /// out paused / identical / in-flight.
    fn begin_persist(&self, st: &mut SchedulerState, snapshot: Snapshot) {
        st.persisting = true;
        st.last_persist_at = Some(Instant::now());
        st.backlog_pending = false;

        debug!("dispatching persist to worker");
        let _ = self.jobs.send(Job::Persist {
            last: st.last_persisted.clone(),
            next: snapshot,
        });
    }

    /// Completion path, invoked on the worker thread after the backend
    /// call returns. Advances the persisted marker unconditionally so a
    /// failed write can never wedge the single-flight slot.
    fn finish_persist(self: &Arc<Self>, persisted: Snapshot) {
        let drain = {
            let mut st = self.state.lock();
            st.last_persisted = Some(persisted);
            st.persisting = false;
            if st.backlog_pending {
                st.backlog_pending = false;
                st.newest.clone()
            } else {
                None
            }
        };

        // At most one trailing call per completion; anything it starts
        // goes back through the worker queue rather than recursing.
        if let Some(newest) = drain {
            self.process(None, newest);
        }
    }

    fn arm_timer(self: &Arc<Self>, st: &mut SchedulerState, delay: Duration) {
        st.timer_epoch += 1;
        let epoch = st.timer_epoch;
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        st.timer_cancel = Some(cancel_tx);

        let shared = Arc::clone(self);
        thread::spawn(move || {
            select! {
                recv(cancel_rx) -> _ => {}
                recv(after(delay)) -> _ => shared.timer_fired(epoch),
            }
        });
    }

    fn timer_fired(self: &Arc<Self>, epoch: u64) {
        let newest = {
            let mut st = self.state.lock();
            if st.timer_epoch != epoch || st.timer_cancel.is_none() {
                return;
            }
            st.timer_cancel = None;
            st.newest.clone()
        };

        if let Some(newest) = newest {
            self.process(None, newest);
        }
    }

    fn resume(self: &Arc<Self>) {
        let newest = {
            let mut st = self.state.lock();
            st.paused = false;
            if st.initialized {
                st.newest.clone()
            } else {
                None
            }
        };

        // Flush any backlog accumulated during the pause, subject to
        // normal throttling.
        if let Some(newest) = newest {
            self.process(None, newest);
        }
    }

    fn persist_and_pause(self: &Arc<Self>) {
        let mut st = self.state.lock();
        st.cancel_timer();

        if st.initialized && !st.persisting {
            let differs = match (&st.last_persisted, &st.newest) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(last), Some(newest)) => !last.same_as(newest),
            };
            if differs {
                let newest = st.newest.clone().expect("checked above");
                self.begin_persist(&mut st, newest);
            }
        }

        st.paused = true;
    }

    fn run_worker(self: Arc<Self>, jobs: Receiver<Job>) {
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Shutdown => break,
                Job::Persist { last, next } => {
                    if let Err(e) = self.backend.persist_difference(last.as_ref(), &next) {
                        warn!("persist attempt failed: {e}");
                        if let Some(hook) = &self.config.on_persist_error {
                            hook(&e);
                        }
                    }
                    self.finish_persist(next);
                }
            }
        }
    }
}

/// Throttling, coalescing persistence coordinator.
///
/// Owns the throttle/pause/backlog state machine and decides, on every
/// state change, whether to start a persist now, defer it, or drop it as
/// redundant. Backend writes run on a dedicated worker thread; dropping
/// the scheduler stops the worker after any in-flight write completes.
pub struct PersistenceScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl PersistenceScheduler {
    /// Create a scheduler over the given backend with default config.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(backend, SchedulerConfig::default())
    }

    /// Create a scheduler with an explicit config.
    pub fn with_config(backend: Arc<dyn StorageBackend>, config: SchedulerConfig) -> Self {
        let (jobs_tx, jobs_rx) = unbounded();
        let shared = Arc::new(Shared {
            backend,
            config,
            jobs: jobs_tx,
            state: Mutex::new(SchedulerState::default()),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("snapvault-persist".into())
            .spawn(move || worker_shared.run_worker(jobs_rx))
            .expect("failed to spawn persist worker");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// The hot path: record `new_state` as the newest snapshot and decide
    /// whether to persist it now, defer it, or skip it.
    ///
    /// Returns `true` iff a persist was started during this call. Skips
    /// when paused or when `new_state` is identity-equal to the last
    /// persisted snapshot; defers (setting the backlog flag) while another
    /// persist is in flight; otherwise persists immediately when the
    /// throttle window has elapsed or `trigger` forces it, and schedules a
    /// trailing timer when it has not.
    pub fn process(&self, trigger: Option<PersistTrigger>, new_state: Snapshot) -> bool {
        self.shared.process(trigger, new_state)
    }

    /// Block new persists from starting. An in-flight persist is allowed
    /// to finish.
    pub fn pause(&self) {
        self.shared.state.lock().paused = true;
    }

    /// Allow persists again and flush anything that accumulated during
    /// the pause.
    pub fn resume(&self) {
        self.shared.resume();
    }

    /// Persist the newest snapshot immediately (bypassing the throttle
    /// window) if it differs from the last persisted one, then pause.
    ///
    /// Guarantees no snapshot is lost when quiescing the scheduler, e.g.
    /// before the application suspends.
    pub fn persist_and_pause(&self) {
        self.shared.persist_and_pause();
    }

    /// Read the persisted snapshot from the backend. On success the
    /// returned snapshot (if any) is recorded as already durable, so
    /// subsequent `process` calls with the same handle are no-ops.
    pub fn read_state(&self) -> Result<Option<Snapshot>> {
        let snapshot = self.shared.backend.read_state()?;
        if let Some(snap) = &snapshot {
            self.shared.state.lock().last_persisted = Some(snap.clone());
        }
        Ok(snapshot)
    }

    /// Persist the very first snapshot through the backend and record it
    /// as already durable.
    pub fn save_initial_state(&self, state: Snapshot) -> Result<()> {
        self.shared.backend.save_initial_state(&state)?;
        self.shared.state.lock().last_persisted = Some(state);
        Ok(())
    }

    /// Delete persisted state and forget the durable marker.
    pub fn delete_state(&self) -> Result<()> {
        self.shared.backend.delete_state()?;
        self.shared.state.lock().last_persisted = None;
        Ok(())
    }
}

impl Drop for PersistenceScheduler {
    fn drop(&mut self) {
        self.shared.state.lock().cancel_timer();
        let _ = self.shared.jobs.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
