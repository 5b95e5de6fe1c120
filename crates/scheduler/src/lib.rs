//! bigview Scheduler Library
//!
//! Threading primitives for the cache refill worker.
//!
//! The viewer runs exactly two threads of control per scene: the render
//! caller and one background worker that performs region loads. This crate
//! provides the pieces that worker is built from:
//!
//! - [`WakeSignal`]: a coalescing, lossless wake-up the worker parks on
//! - [`CancellationToken`]: per-pass cooperative cancellation
//! - [`BackgroundWorker`]: a named thread with idempotent stop-and-join
//!
//! # Example
//!
//! ```
//! use bigview_scheduler::{BackgroundWorker, CancellationToken, WakeSignal};
//!
//! let signal = WakeSignal::new();
//! let token = CancellationToken::new();
//! let pass = token.clone();
//!
//! let mut worker = BackgroundWorker::spawn("refill", signal.clone(), move |ctx| {
//!     while ctx.is_running() {
//!         ctx.wait();
//!         if pass.is_cancelled() {
//!             continue;
//!         }
//!         // ... perform one pass ...
//!     }
//! })
//! .unwrap();
//!
//! signal.wake();
//! token.cancel();
//! worker.stop().unwrap();
//! ```

mod cancel;
mod signal;
mod worker;

pub use cancel::CancellationToken;
pub use signal::WakeSignal;
pub use worker::{BackgroundWorker, WorkerContext, WorkerError};
