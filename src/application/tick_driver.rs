use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

type TickHandler = Box<dyn FnMut(u64) + Send>;

/// Periodic tick source with a single replaceable handler.
///
/// The handler slot is read when a tick fires, so a handler swapped between
/// ticks is the one that runs. `stop` aborts the background task and bumps the
/// generation, so a tick that was already scheduled is dropped.
pub struct TickDriver {
    period: Duration,
    handler: Arc<Mutex<Option<TickHandler>>>,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl TickDriver {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handler: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnMut(u64) + Send + 'static,
    {
        match self.handler.lock() {
            Ok(mut slot) => *slot = Some(Box::new(handler)),
            Err(error) => warn!(%error, "tick handler slot poisoned"),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Returns false when the driver was already running.
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let handler = Arc::clone(&self.handler);
        let period = self.period;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if current.load(Ordering::SeqCst) != generation {
                    break;
                }
                let Ok(mut slot) = handler.lock() else {
                    warn!("tick handler slot poisoned, stopping driver");
                    break;
                };
                if let Some(handler) = slot.as_deref_mut() {
                    handler(generation);
                }
            }
            debug!(generation, "tick driver loop exited");
        }));
        debug!(generation, period_ms = self.period.as_millis() as u64, "tick driver started");
        true
    }

    /// Returns false when there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        task.abort();
        debug!("tick driver stopped");
        true
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> impl FnMut(u64) + Send + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_after_start() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut driver = TickDriver::new(Duration::from_secs(1));
        driver.set_handler(counting_handler(&counter));

        assert!(driver.start());
        assert!(!driver.start());
        sleep(Duration::from_millis(999)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_ticks_and_is_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut driver = TickDriver::new(Duration::from_secs(1));
        driver.set_handler(counting_handler(&counter));

        driver.start();
        sleep(Duration::from_millis(1_500)).await;
        assert!(driver.stop());
        assert!(!driver.stop());
        assert!(!driver.is_active());
        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_handler_receives_next_tick() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut driver = TickDriver::new(Duration::from_secs(1));
        driver.set_handler(counting_handler(&first));

        driver.start();
        sleep(Duration::from_millis(1_500)).await;
        driver.set_handler(counting_handler(&second));
        sleep(Duration::from_millis(1_000)).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn each_start_gets_a_new_generation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut driver = TickDriver::new(Duration::from_secs(1));
        let sink = Arc::clone(&seen);
        driver.set_handler(move |generation| {
            sink.lock().expect("seen lock").push(generation);
        });

        driver.start();
        sleep(Duration::from_millis(1_100)).await;
        driver.stop();
        driver.start();
        sleep(Duration::from_millis(1_100)).await;
        driver.stop();

        let seen = seen.lock().expect("seen lock").clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[1] > seen[0]);
    }
}
