use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};

/// Background once-a-second elapsed counter for an active session. Display
/// only: authoritative durations are always recomputed from the start
/// instant, so a missed tick or aborted task loses nothing.
#[derive(Debug)]
pub struct DisplayTicker {
    elapsed_ms: Arc<AtomicI64>,
    handle: JoinHandle<()>,
}

impl DisplayTicker {
    /// Must be called from within a tokio runtime.
    pub fn spawn(start: DateTime<Utc>) -> Self {
        let elapsed_ms = Arc::new(AtomicI64::new(
            (Utc::now() - start).num_milliseconds().max(0),
        ));
        let shared = Arc::clone(&elapsed_ms);
        let handle = tokio::spawn(async move {
            let mut tick = interval(TokioDuration::from_secs(1));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                shared.store(
                    (Utc::now() - start).num_milliseconds().max(0),
                    Ordering::Relaxed,
                );
            }
        });
        Self { elapsed_ms, handle }
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed_ms.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for DisplayTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
