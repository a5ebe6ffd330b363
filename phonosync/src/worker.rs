//! Background execution context for reflections and pathing passes.
//!
//! The worker blocks on an auto-reset wake signal, runs exactly one pass per
//! wake, publishes `pass_completed` and goes back to sleep. Idleness is an
//! explicit flag the worker owns, never inferred from thread state.

use crate::error::{CoreError, PhonoSyncError, Result};
use crate::guard::guard_engine_call;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

#[derive(Debug, Default)]
struct WorkerState {
    stop_requested: AtomicBool,
    /// Set by `signal`, cleared by the worker once the pass it asked for returned.
    busy: AtomicBool,
    pass_completed: AtomicBool,
    passes_run: AtomicU64,
    passes_failed: AtomicU64,
}

/// Dedicated thread that executes one reflections/pathing pass per signal.
pub struct SimulationWorker {
    wake_tx: Sender<()>,
    state: Arc<WorkerState>,
    join: Option<JoinHandle<()>>,
}

impl SimulationWorker {
    /// Spawns the worker thread. `pass` runs once per accepted signal.
    pub fn start<F>(name: &str, pass: F) -> Result<Self>
    where
        F: FnMut() -> std::result::Result<(), CoreError> + Send + 'static,
    {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let state = Arc::new(WorkerState::default());
        let state_for_thread = Arc::clone(&state);

        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(wake_rx, state_for_thread, pass))
            .map_err(|e| PhonoSyncError::WorkerSpawn(format!("{name}: {e}")))?;

        log::debug!("Simulation worker '{}' started", name);

        Ok(Self {
            wake_tx,
            state,
            join: Some(join),
        })
    }

    /// Wakes the worker for one pass.
    ///
    /// Signals sent before the worker picks up the pending one are coalesced.
    /// Returns `false` once the worker has been stopped.
    pub fn signal(&self) -> bool {
        if self.join.is_none() || self.state.stop_requested.load(Ordering::Acquire) {
            return false;
        }

        // Busy must be visible before the wake so the scheduler never sees an
        // idle worker that is about to start a pass.
        self.state.busy.store(true, Ordering::Release);
        match self.wake_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => {
                self.state.busy.store(false, Ordering::Release);
                false
            }
        }
    }

    /// True when no pass is running or pending.
    pub fn is_idle(&self) -> bool {
        !self.state.busy.load(Ordering::Acquire)
    }

    pub fn pass_completed(&self) -> bool {
        self.state.pass_completed.load(Ordering::Acquire)
    }

    /// Observes and clears the pass-completed flag.
    pub fn take_completed(&self) -> bool {
        self.state.pass_completed.swap(false, Ordering::AcqRel)
    }

    pub fn passes_run(&self) -> u64 {
        self.state.passes_run.load(Ordering::Acquire)
    }

    pub fn passes_failed(&self) -> u64 {
        self.state.passes_failed.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.join.is_some()
    }

    /// Requests a stop, wakes the worker and joins it.
    ///
    /// Blocks until any in-flight pass has returned. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };

        self.state.stop_requested.store(true, Ordering::Release);
        // A full mailbox already holds a wake the worker will observe.
        let _ = self.wake_tx.try_send(());

        if join.join().is_err() {
            log::error!("Simulation worker panicked");
        }
        self.state.busy.store(false, Ordering::Release);
        log::debug!(
            "Simulation worker stopped after {} passes",
            self.passes_run()
        );
    }
}

impl Drop for SimulationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<F>(wake_rx: Receiver<()>, state: Arc<WorkerState>, mut pass: F)
where
    F: FnMut() -> std::result::Result<(), CoreError>,
{
    loop {
        if wake_rx.recv().is_err() || state.stop_requested.load(Ordering::Acquire) {
            break;
        }
        state.busy.store(true, Ordering::Release);

        let result = guard_engine_call("reflections/pathing pass", &mut pass);
        state.passes_run.fetch_add(1, Ordering::AcqRel);
        match result {
            Ok(Ok(())) => state.pass_completed.store(true, Ordering::Release),
            Ok(Err(e)) => {
                state.passes_failed.fetch_add(1, Ordering::AcqRel);
                log::warn!("Reflections/pathing pass failed: {}", e);
            }
            Err(_) => {
                state.passes_failed.fetch_add(1, Ordering::AcqRel);
            }
        }

        state.busy.store(false, Ordering::Release);
    }
}
