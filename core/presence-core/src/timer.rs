//! Periodic refresh timer.
//!
//! The handle owns its worker thread. Dropping the handle stops the thread
//! and joins it, so replacing an `Option<RefreshTimer>` is enough to
//! guarantee at most one timer is alive.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type RefreshHook = Arc<dyn Fn() + Send + Sync>;

pub struct RefreshTimer {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    interval: Duration,
}

impl RefreshTimer {
    pub fn start(interval: Duration, on_tick: RefreshHook) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = thread::Builder::new()
            .name("presence-refresh".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => on_tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to spawn refresh timer thread");
                None
            }
        };

        Self {
            stop: Some(stop_tx),
            worker,
            interval,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for RefreshTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTimer")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
