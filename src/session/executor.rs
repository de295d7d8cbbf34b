//! Single-threaded frame analysis worker.
//!
//! Frames are taken from a [`LatestSlot`] one at a time. The worker does not
//! take the next frame until the current one has been released, so at most
//! one frame is ever in flight, even when the analyzer completes
//! asynchronously.

use super::slot::LatestSlot;
use crate::capture::Frame;
use crate::metrics::ScanMetrics;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Default)]
struct GateState {
    busy: bool,
    closed: bool,
}

/// Tracks whether a frame is currently in flight.
#[derive(Default)]
struct InFlight {
    state: Mutex<GateState>,
    idle: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) {
        self.lock().busy = true;
    }

    fn finish(&self) {
        self.lock().busy = false;
        self.idle.notify_all();
    }

    /// Waits for the in-flight frame. Returns false if closed meanwhile.
    fn wait_idle(&self) -> bool {
        let mut state = self.lock();
        while state.busy && !state.closed {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        !state.closed
    }

    fn close(&self) {
        self.lock().closed = true;
        self.idle.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Dedicated worker thread delivering frames to an analyzer.
pub struct AnalysisExecutor {
    slot: Arc<LatestSlot<Frame>>,
    in_flight: Arc<InFlight>,
    worker: Option<JoinHandle<()>>,
}

impl AnalysisExecutor {
    /// Spawns the worker.
    ///
    /// `analyzer` runs on the worker for each frame and takes ownership of
    /// it. `on_drained` runs once if the slot is closed by the producer and
    /// every frame has been released; it does not run after
    /// [`AnalysisExecutor::shutdown`].
    pub fn spawn<A, D>(
        name: &str,
        slot: Arc<LatestSlot<Frame>>,
        metrics: Arc<ScanMetrics>,
        mut analyzer: A,
        on_drained: D,
    ) -> std::io::Result<Self>
    where
        A: FnMut(Frame) + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        let in_flight = Arc::new(InFlight::default());
        let worker = {
            let slot = Arc::clone(&slot);
            let in_flight = Arc::clone(&in_flight);
            thread::Builder::new().name(name.to_owned()).spawn(move || {
                tracing::debug!("Analysis worker started");
                while let Some(frame) = slot.take() {
                    in_flight.begin();
                    let gate = Arc::clone(&in_flight);
                    let released = Arc::clone(&metrics);
                    let frame = frame.with_release_hook(Box::new(move |_| {
                        released.frame_released();
                        gate.finish();
                    }));
                    analyzer(frame);
                    if !in_flight.wait_idle() {
                        break;
                    }
                }
                if !in_flight.is_closed() {
                    tracing::debug!("Analysis stream drained");
                    on_drained();
                }
                tracing::debug!("Analysis worker stopped");
            })?
        };

        Ok(Self {
            slot,
            in_flight,
            worker: Some(worker),
        })
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// A pending frame is discarded; an in-flight decode is not cancelled
    /// but the worker no longer waits for it.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.in_flight.close();
        self.slot.clear_and_close();
        if worker.join().is_err() {
            tracing::error!("Analysis worker panicked");
        }
    }

    /// Returns true while the worker thread is running.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for AnalysisExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
