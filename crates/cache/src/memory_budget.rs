//! Adaptive memory budget for the cache window
//!
//! The budget is a percentage of a fixed memory ceiling. Each allocation
//! failure reported by the region loader costs one percentage point; the
//! budget never grows back. At zero the cache stops refilling and the viewer
//! runs on the low-resolution sample alone.

use std::sync::atomic::{AtomicU32, Ordering};

/// Shrinking share of a memory ceiling
///
/// Mutated only by the party handling an allocation failure; everyone else
/// reads it with relaxed ordering. A stale read only skews window sizing.
///
/// # Example
///
/// ```
/// use bigview_cache::MemoryBudget;
///
/// let budget = MemoryBudget::new(5, 100 * 1024 * 1024);
/// assert_eq!(budget.bytes(), 5 * 1024 * 1024);
///
/// budget.shrink();
/// assert_eq!(budget.percent(), 4);
/// ```
#[derive(Debug)]
pub struct MemoryBudget {
    percent: AtomicU32,
    ceiling: u64,
}

impl MemoryBudget {
    /// Budget of `percent` (capped at 100) of `ceiling` bytes
    pub fn new(percent: u32, ceiling: u64) -> Self {
        Self {
            percent: AtomicU32::new(percent.min(100)),
            ceiling,
        }
    }

    /// Current percentage
    pub fn percent(&self) -> u32 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Memory ceiling the percentage applies to
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Bytes the cache window may currently use
    pub fn bytes(&self) -> u64 {
        self.ceiling.saturating_mul(self.percent() as u64) / 100
    }

    /// Give up one percentage point; returns the new percentage
    pub fn shrink(&self) -> u32 {
        let previous = self
            .percent
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(1))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_sub(1)
    }

    /// True once every percentage point has been given up
    pub fn is_exhausted(&self) -> bool {
        self.percent() == 0
    }
}
