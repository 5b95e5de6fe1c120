//! Coalescing wake signal
//!
//! A background worker parks on [`WakeSignal::wait`] with no timeout and is
//! released by [`WakeSignal::wake`]. Wakes raised while the worker is busy are
//! remembered (at most one is buffered) so a wake can never be lost between the
//! worker checking its state and going back to sleep.

use flume::{Receiver, Sender, TryRecvError, TrySendError};

/// Wake signal backed by a capacity-one channel
///
/// Cloning yields another handle to the same signal.
///
/// # Example
///
/// ```
/// use bigview_scheduler::WakeSignal;
///
/// let signal = WakeSignal::new();
/// signal.wake();
/// signal.wake(); // coalesced with the first one
///
/// assert!(signal.is_pending());
/// signal.wait(); // returns immediately
/// assert!(!signal.is_pending());
/// ```
#[derive(Debug, Clone)]
pub struct WakeSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl WakeSignal {
    /// Create a signal with no pending wake
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        Self { tx, rx }
    }

    /// Raise the signal
    ///
    /// Never blocks. If a wake is already pending this is a no-op.
    pub fn wake(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            // Both ends live in `self`, so the channel cannot be disconnected.
            Err(TrySendError::Disconnected(())) => {}
        }
    }

    /// Block until the signal is raised, consuming the pending wake
    pub fn wait(&self) {
        // The receiver lives as long as the sender held by `self`.
        let _ = self.rx.recv();
    }

    /// Consume a pending wake without blocking
    ///
    /// Returns `true` if one was pending.
    pub fn try_take(&self) -> bool {
        match self.rx.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Whether a wake is buffered
    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_signal_is_idle() {
        let signal = WakeSignal::new();
        assert!(!signal.is_pending());
        assert!(!signal.try_take());
    }

    #[test]
    fn test_wakes_coalesce() {
        let signal = WakeSignal::new();
        for _ in 0..10 {
            signal.wake();
        }

        assert!(signal.try_take());
        assert!(!signal.try_take());
    }

    #[test]
    fn test_wake_before_wait_is_not_lost() {
        let signal = WakeSignal::new();
        signal.wake();

        // Would hang forever if the wake had been dropped.
        signal.wait();
        assert!(!signal.is_pending());
    }

    #[test]
    fn test_wait_blocks_until_woken() {
        let signal = WakeSignal::new();
        let released = Arc::new(AtomicBool::new(false));

        let waiter = {
            let signal = signal.clone();
            let released = released.clone();
            thread::spawn(move || {
                signal.wait();
                released.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!released.load(Ordering::SeqCst));

        signal.wake();
        waiter.join().unwrap();
        assert!(released.load(Ordering::SeqCst));
    }
}
