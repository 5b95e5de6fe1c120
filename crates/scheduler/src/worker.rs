//! Single long-lived background worker.
//!
//! A [`BackgroundWorker`] owns one named thread that runs a caller-supplied
//! body. The body parks on the shared [`WakeSignal`] while idle and checks
//! [`WorkerContext::is_running`] after every wake. Stopping clears the running
//! flag, raises the signal so a parked body returns promptly, and joins the
//! thread before returning.

use crate::WakeSignal;
use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};

/// Errors from the worker lifecycle
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The OS refused to create the thread
    #[error("failed to spawn worker thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The worker body panicked; the thread is gone but its work is lost
    #[error("worker thread {name} panicked")]
    Panicked { name: String },
}

/// View of the worker's lifecycle handed to the body
#[derive(Debug, Clone)]
pub struct WorkerContext {
    running: Arc<AtomicBool>,
    signal: WakeSignal,
}

impl WorkerContext {
    /// Whether the owner still wants the body to run
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Park until the next wake
    ///
    /// Returns immediately when a stop was requested.
    pub fn wait(&self) {
        if self.is_running() {
            self.signal.wait();
        }
    }

    /// The signal the body parks on
    pub fn signal(&self) -> &WakeSignal {
        &self.signal
    }
}

/// One background thread with cooperative shutdown
///
/// # Example
///
/// ```
/// use bigview_scheduler::{BackgroundWorker, WakeSignal};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let signal = WakeSignal::new();
/// let wakes = Arc::new(AtomicUsize::new(0));
/// let counter = wakes.clone();
///
/// let mut worker = BackgroundWorker::spawn("example", signal.clone(), move |ctx| {
///     while ctx.is_running() {
///         ctx.wait();
///         counter.fetch_add(1, Ordering::SeqCst);
///     }
/// })
/// .unwrap();
///
/// signal.wake();
/// worker.stop().unwrap();
/// assert!(wakes.load(Ordering::SeqCst) >= 1);
/// ```
pub struct BackgroundWorker {
    name: String,
    thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    signal: WakeSignal,
}

impl BackgroundWorker {
    /// Spawn a named thread running `body`
    pub fn spawn<F>(name: impl Into<String>, signal: WakeSignal, body: F) -> Result<Self, WorkerError>
    where
        F: FnOnce(WorkerContext) + Send + 'static,
    {
        let name = name.into();
        let running = Arc::new(AtomicBool::new(true));
        let context = WorkerContext {
            running: running.clone(),
            signal: signal.clone(),
        };

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(context))
            .map_err(|source| WorkerError::Spawn {
                name: name.clone(),
                source,
            })?;

        tracing::debug!(worker = %name, "background worker started");

        Ok(Self {
            name,
            thread: Some(thread),
            running,
            signal,
        })
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has been started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.thread.is_some() && self.running.load(Ordering::Acquire)
    }

    /// Request shutdown without waiting
    ///
    /// The body observes this at its next running check.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.signal.wake();
    }

    /// Stop the worker and wait for its thread to exit
    ///
    /// Idempotent: later calls return `Ok(())` immediately. Blocks for as long
    /// as the body needs to reach its next running check, which may include
    /// an in-flight load.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        self.request_stop();

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        thread.join().map_err(|_| WorkerError::Panicked {
            name: self.name.clone(),
        })?;

        tracing::debug!(worker = %self.name, "background worker stopped");
        Ok(())
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(worker = %self.name, %err, "worker failed during drop");
        }
    }
}
