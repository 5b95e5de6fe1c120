//! Background refill worker
//!
//! One [`CacheWorker`] per cache. Its thread parks on the cache's wake signal
//! and runs one pass per pending refill:
//!
//! 1. claim the refill (StartUpdate to InUpdate) under the cache lock
//! 2. snapshot the viewport, then size and store the window under the lock
//! 3. call the region loader with no lock held
//! 4. commit or discard the result under the lock

use crate::cache::{Cache, PassOutcome};
use bigview_render::{Rect, RegionLoader};
use bigview_scheduler::{BackgroundWorker, WorkerContext, WorkerError};
use std::sync::{Arc, Mutex, PoisonError};

/// Read access to the rectangle the viewport currently shows
pub trait ViewportProbe: Send + Sync {
    fn viewport_rect(&self) -> Rect;
}

impl<F> ViewportProbe for F
where
    F: Fn() -> Rect + Send + Sync,
{
    fn viewport_rect(&self) -> Rect {
        self()
    }
}

type SharedLoader = Arc<Mutex<Box<dyn RegionLoader>>>;

/// Owner of the refill thread
///
/// The loader outlives individual threads, so a stopped worker can be
/// started again.
pub struct CacheWorker {
    cache: Arc<Cache>,
    probe: Arc<dyn ViewportProbe>,
    loader: SharedLoader,
    worker: Option<BackgroundWorker>,
}

impl CacheWorker {
    pub fn new(cache: Arc<Cache>, probe: Arc<dyn ViewportProbe>, loader: Box<dyn RegionLoader>) -> Self {
        Self {
            cache,
            probe,
            loader: Arc::new(Mutex::new(loader)),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(BackgroundWorker::is_running)
    }

    /// Spawn the refill thread; a running thread is stopped first
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.worker.is_some() {
            self.stop()?;
        }

        let cache = Arc::clone(&self.cache);
        let probe = Arc::clone(&self.probe);
        let loader = Arc::clone(&self.loader);
        let signal = self.cache.signal().clone();

        let worker = BackgroundWorker::spawn("bigview-cache", signal, move |ctx| {
            run(ctx, &cache, probe.as_ref(), &loader);
        })?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Stop the refill thread and wait for it to exit
    ///
    /// A load in flight is cancelled and its result dropped. A refill that
    /// was pending or running is reset, so the next update starts over.
    /// Idempotent.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(mut worker) = self.worker.take() else {
            return Ok(());
        };

        worker.request_stop();
        let interrupted = self.cache.reset_interrupted();
        let joined = worker.stop();

        if self.cache.reset_interrupted() || interrupted {
            tracing::debug!("interrupted refill reset");
        }
        joined
    }
}

impl Drop for CacheWorker {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(%err, "cache worker failed during drop");
        }
    }
}

fn run(ctx: WorkerContext, cache: &Cache, probe: &dyn ViewportProbe, loader: &Mutex<Box<dyn RegionLoader>>) {
    while ctx.is_running() {
        let Some(pass) = cache.begin_pass() else {
            ctx.wait();
            continue;
        };

        let viewport = probe.viewport_rect();
        let Some(window) = cache.prepare_window(&pass, viewport) else {
            tracing::trace!(epoch = pass.epoch(), "pass abandoned before load");
            continue;
        };

        tracing::debug!(%window, %viewport, "loading cache window");
        let result = {
            let mut loader = loader.lock().unwrap_or_else(PoisonError::into_inner);
            loader.load(window, pass.cancel_token())
        };

        match cache.finish_pass(pass, result) {
            PassOutcome::Retry => tracing::debug!("retrying with smaller window"),
            PassOutcome::Published
            | PassOutcome::Superseded
            | PassOutcome::Exhausted
            | PassOutcome::Failed => {}
        }
    }
}
