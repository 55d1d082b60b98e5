//! Cooperative shutdown signaling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable handle to the process-wide stop flag.
///
/// Single writer (the controlling task), multiple readers (the channel
/// loops). The flag is monotonic: it only ever goes false -> true, so a
/// loop observing the old value for one extra iteration is harmless.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Handlers exit at their next flag check, at most
    /// one backoff interval later.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_clear() {
        assert!(!ShutdownFlag::new().is_shutdown());
    }

    #[test]
    fn test_clones_observe_shutdown() {
        let flag = ShutdownFlag::new();
        let reader = flag.clone();
        flag.shutdown();
        assert!(reader.is_shutdown());
    }
}
