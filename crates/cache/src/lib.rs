//! bigview Cache Library
//!
//! Full-resolution window cache with a budget-sized margin around the
//! viewport, refilled by a single background worker.

pub mod cache;
pub mod config;
pub mod memory_budget;
pub mod system_memory;
pub mod window;
pub mod worker;

pub use cache::{Cache, CacheFrame, CacheState, CacheStats, Pass, PassOutcome};
pub use config::{CacheConfig, ConfigError};
pub use memory_budget::MemoryBudget;
pub use system_memory::{memory_ceiling, FALLBACK_MEMORY_CEILING};
pub use window::{compute_window, CacheWindowPolicy, MarginWindowPolicy};
pub use worker::{CacheWorker, ViewportProbe};
