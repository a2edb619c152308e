use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_secs(1);

/// One-second countdown running on the tokio runtime.
///
/// The timer only reports; whoever starts it decides what expiry means
/// (usually submitting the exam).
#[derive(Debug, Default)]
pub struct ExamTimer {
    remaining: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl ExamTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down from `duration` (whole seconds), replacing any
    /// countdown already running.
    ///
    /// `on_tick` first receives the full duration, then the remaining
    /// seconds once per second. At zero it receives `0` and `on_complete`
    /// runs once.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<T, C>(&mut self, duration: Duration, mut on_tick: T, on_complete: C)
    where
        T: FnMut(u64) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.stop();

        let total = duration.as_secs();
        self.remaining.store(total, Ordering::SeqCst);
        let remaining = Arc::clone(&self.remaining);

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            let mut left = total;
            loop {
                interval.tick().await;
                remaining.store(left, Ordering::SeqCst);
                on_tick(left);
                if left == 0 {
                    break;
                }
                left -= 1;
            }
            tracing::info!(seconds = total, "exam timer expired");
            on_complete();
        }));
    }

    /// Cancel the running countdown, if any. The remaining value is kept.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Seconds left as of the last tick.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ExamTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::oneshot;

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl FnMut(u64) + Send + 'static) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        (ticks, move |s| sink.lock().unwrap().push(s))
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_zero_then_completes() {
        let mut timer = ExamTimer::new();
        let (ticks, on_tick) = recorder();
        let (tx, rx) = oneshot::channel();

        timer.start(Duration::from_secs(3), on_tick, move || {
            let _ = tx.send(());
        });
        assert_eq!(timer.remaining(), 3);

        rx.await.unwrap();
        assert_eq!(*ticks.lock().unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(timer.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_completes_immediately() {
        let mut timer = ExamTimer::new();
        let (ticks, on_tick) = recorder();
        let (tx, rx) = oneshot::channel();

        timer.start(Duration::ZERO, on_tick, move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();
        assert_eq!(*ticks.lock().unwrap(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_before_completion() {
        let mut timer = ExamTimer::new();
        let (ticks, on_tick) = recorder();
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);

        timer.start(Duration::from_secs(10), on_tick, move || {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(*ticks.lock().unwrap(), vec![10, 9, 8]);
        assert_eq!(timer.remaining(), 8);
        assert!(timer.is_running());

        timer.stop();
        assert!(!timer.is_running());
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.lock().unwrap().len(), 3);
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_running_countdown() {
        let mut timer = ExamTimer::new();
        let first_done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&first_done);
        timer.start(Duration::from_secs(5), |_| {}, move || {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let (ticks, on_tick) = recorder();
        let (tx, rx) = oneshot::channel();
        timer.start(Duration::from_secs(2), on_tick, move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();

        assert_eq!(*ticks.lock().unwrap(), vec![2, 1, 0]);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!first_done.load(Ordering::SeqCst));
    }
}
