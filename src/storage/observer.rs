use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives a notification after each successful mutating store operation.
///
/// This is how the rest of the system learns that posts changed (the status
/// file's "posts changed" counter). Implementations must be cheap; they run
/// while the area lock is still held.
pub trait ChangeObserver: Send + Sync {
    /// Called once after a successful save, remove or append.
    fn posts_changed(&self);
}

impl<F> ChangeObserver for F
where
    F: Fn() + Send + Sync,
{
    fn posts_changed(&self) {
        self()
    }
}

/// Observer that ignores every notification.
#[derive(Default)]
pub struct NoopObserver;

impl ChangeObserver for NoopObserver {
    fn posts_changed(&self) {}
}

/// Observer counting notifications with an atomic counter.
#[derive(Default)]
pub struct ChangeCounter {
    changes: AtomicU64,
}

impl ChangeCounter {
    /// Returns the number of notifications received so far.
    pub fn count(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }
}

impl ChangeObserver for ChangeCounter {
    fn posts_changed(&self) {
        self.changes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default observer, a [`NoopObserver`].
pub fn default_observer() -> Arc<dyn ChangeObserver> {
    Arc::new(NoopObserver)
}
