//! Cooperative cancellation for background load passes
//!
//! Every cache refill pass gets its own token. The foreground side cancels it
//! when the pass is superseded (invalidate, suspend) or when the worker is
//! stopped. Region loaders may poll the token to bail out early, but nothing
//! relies on them doing so: a cancelled pass is discarded at publish time
//! regardless of what the loader returns.

use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token shared between the party that starts a pass and the
/// loader that performs it
///
/// Clones share the same flag.
///
/// # Example
///
/// ```
/// use bigview_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let loader_token = token.clone();
///
/// // Foreground: the pass became stale.
/// token.cancel();
///
/// // Loader: checked between decode stripes.
/// assert!(loader_token.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel()` has been called on this token or any clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether two tokens share the same flag
    pub fn same_pass(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
