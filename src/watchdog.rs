use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::select;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time;
use tracing::debug;

/// Callback slots for a [Watchdog]: `on_interval` runs on every tick, `on_timeout` runs at most
///  once if the watchdog was scheduled with a timeout. Components supply handlers instead of
///  subclassing a timer.
#[async_trait]
pub trait WatchdogHandler: Send + Sync + 'static {
    async fn on_interval(&self);

    async fn on_timeout(&self);
}

/// A periodic callback with an optional one-shot timeout, driving a protocol loop from the
///  hosting runtime.
///
/// The first interval tick fires immediately on scheduling. If a timeout is configured and
///  expires, `on_timeout` runs once and the watchdog stops - including its periodic ticks.
///
/// Callbacks never overlap: they are awaited one at a time on a single task. Cancellation is
///  immediate and idempotent, may be called from within a callback (via [Watchdog::canceller]),
///  and guarantees that no further callback is invoked, including one already due.
pub struct Watchdog {
    name: &'static str,
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    pub fn schedule(
        name: &'static str,
        interval: Duration,
        timeout: Option<Duration>,
        handler: Arc<dyn WatchdogHandler>,
    ) -> Watchdog {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(Self::run(name, interval, timeout, handler, cancelled.clone()));
        Watchdog {
            name,
            cancelled,
            handle,
        }
    }

    async fn run(
        name: &'static str,
        interval: Duration,
        timeout: Option<Duration>,
        handler: Arc<dyn WatchdogHandler>,
        cancelled: Arc<AtomicBool>,
    ) {
        let mut ticks = time::interval(interval);

        match timeout {
            None => loop {
                ticks.tick().await;
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                handler.on_interval().await;
            },
            Some(timeout) => {
                let expired = time::sleep(timeout);
                tokio::pin!(expired);

                loop {
                    select! {
                        _ = ticks.tick() => {
                            if cancelled.load(Ordering::Relaxed) {
                                return;
                            }
                            handler.on_interval().await;
                        }
                        _ = &mut expired => {
                            if cancelled.load(Ordering::Relaxed) {
                                return;
                            }
                            debug!("watchdog '{}' timed out", name);
                            handler.on_timeout().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// A detached handle that can cancel this watchdog, e.g. from within its own callback.
    pub fn canceller(&self) -> WatchdogCanceller {
        WatchdogCanceller {
            cancelled: self.cancelled.clone(),
            abort: self.handle.abort_handle(),
        }
    }

    pub fn cancel(&self) {
        debug!("cancelling watchdog '{}'", self.name);
        self.cancelled.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

/// Cancellation handle detached from the owning [Watchdog]. Does not keep the watchdog's task
///  alive.
#[derive(Clone)]
pub struct WatchdogCanceller {
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl WatchdogCanceller {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::runtime::Builder;

    #[derive(Default)]
    struct CountingHandler {
        intervals: AtomicUsize,
        timeouts: AtomicUsize,
        /// when set, the handler cancels its own watchdog on the first interval tick
        cancel_on_first_interval: Mutex<Option<WatchdogCanceller>>,
    }

    #[async_trait]
    impl WatchdogHandler for CountingHandler {
        async fn on_interval(&self) {
            self.intervals.fetch_add(1, Ordering::Relaxed);
            if let Some(canceller) = self.cancel_on_first_interval.lock().unwrap().take() {
                canceller.cancel();
            }
        }

        async fn on_timeout(&self) {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn paused_rt() -> tokio::runtime::Runtime {
        Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build().unwrap()
    }

    #[rstest]
    fn test_periodic_ticks() {
        let rt = paused_rt();
        rt.block_on(async {
            let handler = Arc::new(CountingHandler::default());
            let watchdog = Watchdog::schedule("test", Duration::from_millis(100), None, handler.clone());

            time::sleep(Duration::from_millis(350)).await;

            // ticks at 0, 100, 200 and 300 ms
            assert_eq!(handler.intervals.load(Ordering::Relaxed), 4);
            assert_eq!(handler.timeouts.load(Ordering::Relaxed), 0);

            drop(watchdog);
        });
    }

    #[rstest]
    fn test_timeout_fires_once_and_stops_ticks() {
        let rt = paused_rt();
        rt.block_on(async {
            let handler = Arc::new(CountingHandler::default());
            let _watchdog = Watchdog::schedule("test", Duration::from_millis(250), Some(Duration::from_millis(600)), handler.clone());

            time::sleep(Duration::from_millis(2000)).await;

            // ticks at 0, 250 and 500 ms; the timeout at 600 ms ends the periodic loop
            assert_eq!(handler.intervals.load(Ordering::Relaxed), 3);
            assert_eq!(handler.timeouts.load(Ordering::Relaxed), 1);

            time::sleep(Duration::from_millis(2000)).await;
            assert_eq!(handler.intervals.load(Ordering::Relaxed), 3);
            assert_eq!(handler.timeouts.load(Ordering::Relaxed), 1);
        });
    }

    #[rstest]
    fn test_cancel_stops_everything() {
        let rt = paused_rt();
        rt.block_on(async {
            let handler = Arc::new(CountingHandler::default());
            let watchdog = Watchdog::schedule("test", Duration::from_millis(100), Some(Duration::from_millis(10_000)), handler.clone());

            time::sleep(Duration::from_millis(250)).await;
            assert_eq!(handler.intervals.load(Ordering::Relaxed), 3);

            watchdog.cancel();
            time::sleep(Duration::from_millis(20_000)).await;

            assert_eq!(handler.intervals.load(Ordering::Relaxed), 3);
            assert_eq!(handler.timeouts.load(Ordering::Relaxed), 0);
        });
    }

    #[rstest]
    fn test_cancel_from_within_callback() {
        let rt = paused_rt();
        rt.block_on(async {
            let handler = Arc::new(CountingHandler::default());
            let watchdog = Watchdog::schedule("test", Duration::from_millis(100), None, handler.clone());
            *handler.cancel_on_first_interval.lock().unwrap() = Some(watchdog.canceller());

            time::sleep(Duration::from_millis(1000)).await;

            assert_eq!(handler.intervals.load(Ordering::Relaxed), 1);

            drop(watchdog);
        });
    }

    #[rstest]
    fn test_drop_cancels() {
        let rt = paused_rt();
        rt.block_on(async {
            let handler = Arc::new(CountingHandler::default());
            let watchdog = Watchdog::schedule("test", Duration::from_millis(100), None, handler.clone());

            time::sleep(Duration::from_millis(150)).await;
            drop(watchdog);
            time::sleep(Duration::from_millis(1000)).await;

            assert_eq!(handler.intervals.load(Ordering::Relaxed), 2);
        });
    }
}
