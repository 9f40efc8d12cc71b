//! Detecting termination of spawned contexts.

use std::{sync::Arc, time::Duration};

use tokio::{task::AbortHandle, time::MissedTickBehavior};
use ttymux_core::ContextHandle;

/// Callback fired once when a watched context is gone.
pub type OnGone = Box<dyn FnOnce() + Send + 'static>;

/// Strategy for noticing that a context has terminated.
pub trait LivenessWatch: Send + Sync {
    /// Start watching `handle`; `on_gone` runs at most once.
    ///
    /// Dropping the returned guard stops the watch.
    fn watch(&self, handle: Arc<dyn ContextHandle>, on_gone: OnGone) -> WatchGuard;
}

/// Keeps a watch alive; dropping it cancels the watch.
#[derive(Debug, Default)]
pub struct WatchGuard {
    task: Option<AbortHandle>,
}

impl WatchGuard {
    /// Guard a background watch task.
    #[must_use]
    pub const fn new(task: AbortHandle) -> Self {
        Self { task: Some(task) }
    }

    /// A guard with nothing to cancel.
    #[must_use]
    pub const fn detached() -> Self {
        Self { task: None }
    }

    /// Stop the watch now.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Polls `is_alive` at a fixed interval.
///
/// Used when the host offers no push notification for context exit.
#[derive(Debug, Clone, Copy)]
pub struct PollWatch {
    interval: Duration,
}

impl PollWatch {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PollWatch {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl LivenessWatch for PollWatch {
    fn watch(&self, handle: Arc<dyn ContextHandle>, on_gone: OnGone) -> WatchGuard {
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !handle.is_alive() {
                    tracing::debug!("Watched context is gone");
                    on_gone();
                    return;
                }
            }
        });
        WatchGuard::new(task.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;

    #[derive(Default)]
    struct Flag {
        dead: AtomicBool,
    }

    impl ContextHandle for Flag {
        fn is_alive(&self) -> bool {
            !self.dead.load(Ordering::SeqCst)
        }

        fn terminate(&self) {
            self.dead.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_fires_after_termination() {
        let handle = Arc::new(Flag::default());
        let (tx, rx) = oneshot::channel();
        let watch = PollWatch::new(Duration::from_millis(10));

        let _guard = watch.watch(
            Arc::clone(&handle) as Arc<dyn ContextHandle>,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        handle.terminate();

        tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("watch did not fire")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_guard_cancels_watch() {
        let handle = Arc::new(Flag::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let watch = PollWatch::new(Duration::from_millis(5));

        let counter = Arc::clone(&fired);
        let guard = watch.watch(
            Arc::clone(&handle) as Arc<dyn ContextHandle>,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        drop(guard);
        handle.terminate();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
