//! Lifecycle handle for a repository's event worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Owns a running repository worker and the tasks feeding it.
///
/// Dropping the handle stops the worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
    feeders: Vec<JoinHandle<()>>,
    /// Flags polled by feeder threads outside the runtime.
    stop_flags: Vec<Arc<AtomicBool>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        name: &'static str,
        shutdown: watch::Sender<bool>,
        worker: JoinHandle<()>,
        feeders: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            name,
            shutdown,
            worker: Some(worker),
            feeders,
            stop_flags: Vec::new(),
        }
    }

    pub(crate) fn with_feeder(mut self, feeder: JoinHandle<()>) -> Self {
        self.feeders.push(feeder);
        self
    }

    /// Adds a flag that is raised on shutdown.
    pub(crate) fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flags.push(flag);
        self
    }

    /// Creates the shutdown signal a worker loop selects on.
    pub(crate) fn signal() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    /// Signals the worker to stop after the event it is applying.
    pub fn shutdown(&self) {
        log::debug!("Stopping {} worker", self.name);
        self.shutdown.send_replace(true);
        for feeder in &self.feeders {
            feeder.abort();
        }
        for flag in &self.stop_flags {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Returns whether the worker loop has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the worker loop to exit.
    pub async fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                log::error!("{} worker panicked: {}", self.name, e);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Resolves once shutdown has been requested or every sender is gone.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // An error means the handle was dropped, which also stops the worker.
    let _ = rx.wait_for(|stop| *stop).await;
}
