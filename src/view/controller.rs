use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::market_data::feed::{MarketFeed, TickSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Live,
    Offline,
}

impl FeedMode {
    pub fn label(&self) -> &'static str {
        match self {
            FeedMode::Live => "LIVE",
            FeedMode::Offline => "OFFLINE",
        }
    }
}

/// Single source of truth for whether the feed is ticking.
pub struct LiveController {
    feed: Arc<MarketFeed>,
    sink: Arc<dyn TickSink>,
    interval: Duration,
    mode: FeedMode,
}

impl LiveController {
    /// Starts in `Offline`; call `set_mode(FeedMode::Live)` to begin ticking.
    pub fn new(feed: Arc<MarketFeed>, sink: Arc<dyn TickSink>, interval: Duration) -> Self {
        Self {
            feed,
            sink,
            interval,
            mode: FeedMode::Offline,
        }
    }

    /// `Offline` also when the feed's timer task died while we were live.
    pub fn mode(&self) -> FeedMode {
        if self.mode == FeedMode::Live && !self.feed.is_running() {
            return FeedMode::Offline;
        }
        self.mode
    }

    pub async fn set_mode(&mut self, mode: FeedMode) {
        if mode == self.mode() {
            return;
        }
        if self.mode != self.mode() {
            warn!("feed died while live, restarting from offline");
        }
        match mode {
            FeedMode::Live => self.feed.start(self.interval, Arc::clone(&self.sink)).await,
            FeedMode::Offline => {
                self.feed.stop().await;
            }
        }
        self.mode = mode;
        info!(mode = mode.label(), "feed mode changed");
    }

    pub async fn toggle(&mut self) -> FeedMode {
        let next = match self.mode() {
            FeedMode::Live => FeedMode::Offline,
            FeedMode::Offline => FeedMode::Live,
        };
        self.set_mode(next).await;
        self.mode()
    }

    /// Teardown: stops the feed whatever the current mode. Always ends `Offline`.
    pub async fn shutdown(&mut self) {
        self.feed.stop().await;
        self.mode = FeedMode::Offline;
    }
}

impl Drop for LiveController {
    fn drop(&mut self) {
        // Dropped without `shutdown`: nothing left to receive ticks, so stop the timer now.
        if self.feed.cancel() {
            warn!("live controller dropped while feed running");
        }
    }
}
