//! Cancellation plumbing.
//!
//! A [`WorkerHandle`] is the controller's side of one worker. Beginning a run
//! hands the worker a [`RunTicket`]; the ticket's [`CancelToken`] is what the
//! substrate's checkpoints consult. Cancelling an idle handle does nothing, and
//! a stop requested for one run is cleared when that run's ticket is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Token carried by a stop that woke an interruptible blocking call.
pub(crate) const INTERRUPT_TOKEN: &str = "interrupt";
/// Token carried by a stop observed at an operation checkpoint.
pub(crate) const FORCED_STOP_TOKEN: &str = "forced-stop";

#[derive(Debug, Default)]
struct HandleState {
    running: bool,
    /// Stop flag of the current run. Replaced every time a run begins.
    stop: Arc<AtomicBool>,
    /// Incremented every time a run begins.
    generation: u64,
    completed: u64,
}

#[derive(Debug, Default)]
struct HandleInner {
    state: Mutex<HandleState>,
    wake: Condvar,
}

impl HandleInner {
    fn state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Controller-side handle for cancelling the run on one worker.
///
/// Cloning shares the handle; any clone may cancel.
///
/// Cancellation is best effort. The running unit observes it at the
/// substrate's operation checkpoints and inside interruptible blocking calls
/// such as `sleep`. A native call that blocks without reaching a checkpoint
/// keeps running until it returns.
#[derive(Debug, Clone, Default)]
pub struct WorkerHandle {
    inner: Arc<HandleInner>,
}

impl WorkerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the in-flight run stop.
    ///
    /// Returns `true` if a run was in flight. With no run in flight this is a
    /// no-op, so a late cancel never affects an outcome already produced.
    pub fn cancel(&self) -> bool {
        let state = self.inner.state();
        if !state.running {
            return false;
        }
        // Set under the state lock so a sleeper cannot miss the wakeup.
        if !state.stop.swap(true, Ordering::SeqCst) {
            tracing::debug!(generation = state.generation, "cancellation requested");
        }
        self.inner.wake.notify_all();
        true
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// Number of runs that have finished on this handle.
    pub fn completed_runs(&self) -> u64 {
        self.inner.state().completed
    }

    /// Mark a run as in flight.
    pub(crate) fn begin(&self) -> Result<RunTicket> {
        let mut state = self.inner.state();
        if state.running {
            return Err(Error::WorkerBusy);
        }
        state.running = true;
        state.stop = Arc::new(AtomicBool::new(false));
        state.generation += 1;
        Ok(RunTicket {
            inner: self.inner.clone(),
            stop: state.stop.clone(),
            generation: state.generation,
        })
    }
}

/// Proof that a run is in flight on a handle. Dropping it ends the run.
#[derive(Debug)]
pub(crate) struct RunTicket {
    inner: Arc<HandleInner>,
    stop: Arc<AtomicBool>,
    generation: u64,
}

impl RunTicket {
    pub(crate) fn token(&self) -> CancelToken {
        CancelToken {
            inner: self.inner.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        self.stop.store(false, Ordering::SeqCst);
        if state.generation == self.generation {
            state.running = false;
            state.completed += 1;
        }
        self.inner.wake.notify_all();
    }
}

/// Worker-side view of one run's cancellation state.
#[derive(Debug, Clone)]
pub(crate) struct CancelToken {
    inner: Arc<HandleInner>,
    stop: Arc<AtomicBool>,
}

impl CancelToken {
    /// Lock-free; polled between every evaluated operation.
    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Block for `duration` or until a stop is requested.
    ///
    /// Returns `true` if the wait was interrupted.
    pub(crate) fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.inner.state();
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }
}
