use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::market_data::delta::DeltaDetector;
use crate::market_data::generator::TickGenerator;
use crate::market_data::types::{Direction, Snapshot, TickUpdate};
use crate::metrics::prometheus;

/// Receives every tick while the feed is running.
///
/// Called inline on the feed's timer task, so it must not block.
pub trait TickSink: Send + Sync {
    fn on_tick(&self, update: TickUpdate);
}

struct FeedHandle {
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl FeedHandle {
    fn is_live(&self) -> bool {
        !self.cancellation_token.is_cancelled() && !self.join_handle.is_finished()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        // A handle dropped without `stop` still takes its timer down with it.
        self.cancellation_token.cancel();
    }
}

/// Simulated realtime market feed with one timer at most.
pub struct MarketFeed {
    generator: Arc<Mutex<TickGenerator>>,
    seq: Arc<AtomicU64>,
    /// Serialises `start` and `stop` so a restart never overlaps another.
    transition: AsyncMutex<()>,
    running: Mutex<Option<FeedHandle>>,
}

impl MarketFeed {
    pub fn new(generator: TickGenerator) -> Self {
        Self {
            generator: Arc::new(Mutex::new(generator)),
            seq: Arc::new(AtomicU64::new(0)),
            transition: AsyncMutex::new(()),
            running: Mutex::new(None),
        }
    }

    /// Current snapshot, available before (and independent of) any tick.
    pub fn initial_data(&self) -> Snapshot {
        self.generator.lock().snapshot()
    }

    /// Sequence number of the last delivered tick (0 before the first).
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    /// False once stopped or cancelled, and also when the timer task died on its own.
    pub fn is_running(&self) -> bool {
        self.running.lock().as_ref().is_some_and(FeedHandle::is_live)
    }

    /// Deliver a tick to `sink` every `interval`, first one a full interval from now.
    /// A feed that is already running is stopped first.
    pub async fn start(&self, interval: Duration, sink: Arc<dyn TickSink>) {
        let _transition = self.transition.lock().await;
        let previous = self.running.lock().take();
        if let Some(previous) = previous {
            shutdown(previous).await;
            debug!("replaced running feed timer");
        }

        let period = interval.max(Duration::from_millis(1));
        let cancellation_token = CancellationToken::new();
        let join_handle = tokio::spawn(run_ticks(
            Arc::clone(&self.generator),
            Arc::clone(&self.seq),
            period,
            sink,
            cancellation_token.clone(),
        ));

        *self.running.lock() = Some(FeedHandle {
            cancellation_token,
            join_handle,
        });

        prometheus::record_feed_transition("started");
        info!(interval_ms = period.as_millis() as u64, "market feed started");
    }

    /// Stop the timer. Once this returns no further tick is delivered.
    /// Returns whether a timer was actually running.
    pub async fn stop(&self) -> bool {
        let _transition = self.transition.lock().await;
        let existing = self.running.lock().take();
        let Some(handle) = existing else {
            debug!("stop requested while feed idle");
            return false;
        };

        let was_running = shutdown(handle).await;
        prometheus::record_feed_transition("stopped");
        if was_running {
            info!(last_seq = self.last_seq(), "market feed stopped");
        }
        was_running
    }

    /// Cancel the timer without waiting for it, for teardown paths that cannot await.
    /// A tick already being delivered on another worker may still complete; a later
    /// `stop` joins the task.
    pub fn cancel(&self) -> bool {
        {
            let slot = self.running.lock();
            let Some(handle) = slot.as_ref().filter(|handle| handle.is_live()) else {
                return false;
            };
            handle.cancellation_token.cancel();
        }

        prometheus::record_feed_transition("cancelled");
        info!(last_seq = self.last_seq(), "market feed cancelled");
        true
    }
}

/// Cancel and join the timer task. Returns false if it had already died or been cancelled.
async fn shutdown(mut handle: FeedHandle) -> bool {
    let was_live = handle.is_live();
    handle.cancellation_token.cancel();
    match (&mut handle.join_handle).await {
        Ok(()) => was_live,
        Err(err) if err.is_panic() => {
            warn!(error = %err, "feed timer task panicked");
            false
        }
        Err(err) => {
            warn!(error = %err, "feed timer task was cancelled");
            false
        }
    }
}

async fn run_ticks(
    generator: Arc<Mutex<TickGenerator>>,
    seq: Arc<AtomicU64>,
    period: Duration,
    sink: Arc<dyn TickSink>,
    cancellation_token: CancellationToken,
) {
    let mut detector = DeltaDetector::new(generator.lock().snapshot().market);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let started = StdInstant::now();
        let generated_at = Utc::now();
        let snapshot = generator.lock().advance(generated_at);
        let highlights = detector.observe(&snapshot.market);
        let tick_seq = seq.fetch_add(1, Ordering::AcqRel) + 1;

        let up = highlights.values().filter(|d| **d == Direction::Up).count();
        let down = highlights.len() - up;
        prometheus::record_tick(snapshot.market.len(), up, down);
        debug!(seq = tick_seq, rows = snapshot.market.len(), up, down, "tick generated");

        sink.on_tick(TickUpdate {
            seq: tick_seq,
            snapshot,
            highlights,
            generated_at,
        });
        prometheus::record_tick_latency_us(started.elapsed().as_micros());
    }

    debug!("feed timer task exited");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market_data::catalog::CONTRACTS;
    use crate::market_data::delta::detect_moves;
    use tokio::time::sleep;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub updates: Mutex<Vec<TickUpdate>>,
    }

    impl RecordingSink {
        pub fn count(&self) -> usize {
            self.updates.lock().len()
        }
    }

    impl TickSink for RecordingSink {
        fn on_tick(&self, update: TickUpdate) {
            self.updates.lock().push(update);
        }
    }

    pub(crate) fn feed(seed: u64) -> MarketFeed {
        MarketFeed::new(TickGenerator::new(CONTRACTS, 50, seed, Utc::now()))
    }

    const PERIOD: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn delivers_one_tick_per_interval() {
        let feed = feed(1);
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;

        sleep(Duration::from_millis(350)).await;
        assert!(feed.stop().await);

        let updates = sink.updates.lock();
        assert_eq!(updates.len(), 3);
        let seqs: Vec<u64> = updates.iter().map(|u| u.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_interval_never_delivers() {
        let feed = feed(2);
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;
        feed.stop().await;

        sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let feed = feed(3);
        assert!(!feed.stop().await);
        assert!(!feed.stop().await);

        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;
        assert!(feed.stop().await);
        assert!(!feed.stop().await);
        assert!(!feed.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_delivered_after_stop_returns() {
        let feed = feed(4);
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;

        sleep(Duration::from_millis(250)).await;
        feed.stop().await;
        let at_stop = sink.count();

        sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.count(), at_stop);
    }

    struct PanickingSink;

    impl TickSink for PanickingSink {
        fn on_tick(&self, _update: TickUpdate) {
            panic!("sink failed");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dead_timer_task_is_reported_not_running() {
        let feed = feed(8);
        feed.start(PERIOD, Arc::new(PanickingSink)).await;
        assert!(feed.is_running());

        sleep(Duration::from_millis(150)).await;
        assert!(!feed.is_running());
        assert!(!feed.stop().await);
        assert!(!feed.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_await_stops_delivery() {
        let feed = feed(9);
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;

        sleep(Duration::from_millis(150)).await;
        assert!(feed.cancel());
        assert!(!feed.cancel());
        assert!(!feed.is_running());

        sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.count(), 1);
        assert!(!feed.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_cancel_joins_the_task() {
        let feed = feed(10);
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;

        assert!(feed.cancel());
        assert!(!feed.stop().await);
        assert!(feed.running.lock().is_none());

        feed.start(PERIOD, sink.clone()).await;
        assert!(feed.is_running());
        sleep(Duration::from_millis(150)).await;
        assert!(feed.stop().await);
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_timer() {
        let feed = feed(5);
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;
        feed.start(PERIOD, sink.clone()).await;

        sleep(Duration::from_millis(250)).await;
        feed.stop().await;
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn highlights_follow_consecutive_snapshots() {
        let feed = feed(6);
        let initial = feed.initial_data();
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;

        sleep(Duration::from_millis(550)).await;
        feed.stop().await;

        let updates = sink.updates.lock();
        assert_eq!(updates.len(), 5);
        let mut prev = initial.market;
        for update in updates.iter() {
            assert_eq!(update.highlights, detect_moves(&prev, &update.snapshot.market));
            prev = update.snapshot.market.clone();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn generation_resumes_from_last_prices() {
        let feed = feed(7);
        let sink = Arc::new(RecordingSink::default());
        feed.start(PERIOD, sink.clone()).await;
        sleep(Duration::from_millis(150)).await;
        feed.stop().await;

        let last = sink.updates.lock().last().map(|u| u.snapshot.market.clone());
        assert_eq!(Some(feed.initial_data().market), last);
        assert_eq!(feed.last_seq(), 1);
    }
}
