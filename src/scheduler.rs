//! Cancellable repeating task.
//!
//! The detection loop needs one well-defined cancellation path instead of
//! loose interval/timeout handles, so the repeating cadence lives behind
//! this small wrapper around a tokio task.

use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A fixed-cadence async task. The first tick fires immediately, subsequent
/// ticks every `period`. The tick callback returns `false` to end the task
/// on its own; `cancel()` ends it from outside, aborting any in-progress
/// tick.
pub struct RepeatingTask {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // A slow tick pushes the next one out instead of bursting.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                if !tick().await {
                    debug!("Repeating task ended by its tick");
                    break;
                }
                if flag.load(Ordering::SeqCst) {
                    break;
                }
            }
        });

        Self { cancelled, handle }
    }

    /// Stop the cadence. Any tick in progress is aborted; no further ticks
    /// run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_ticks_repeat_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = RepeatingTask::spawn(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        task.cancel();
        let ticks_at_cancel = count.load(Ordering::SeqCst);
        assert!(ticks_at_cancel >= 2, "expected repeated ticks, got {}", ticks_at_cancel);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), ticks_at_cancel);
        assert!(task.is_cancelled());
    }

    #[tokio::test]
    async fn test_tick_can_end_the_task() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let _task = RepeatingTask::spawn(Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) < 2 }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_tick_fires_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = RepeatingTask::spawn(Duration::from_secs(3600), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        task.cancel();
    }
}
