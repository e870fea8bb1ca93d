use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::market_data::types::{
    HighlightState, InstrumentKey, MarketRow, Snapshot, TickUpdate, TickerRow,
};

#[derive(Debug, Default)]
struct BoardState {
    ticker: Vec<TickerRow>,
    market: Vec<MarketRow>,
    seq: u64,
    updated_at: Option<DateTime<Utc>>,
    highlights: HighlightState,
    /// Tick whose moves are currently in `highlights` (0 = none).
    highlight_seq: u64,
}

/// Rows and flashes taken under one read, so they always belong to the same tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardView {
    pub seq: u64,
    /// When the tick on display was generated; `None` before the first tick.
    pub updated_at: Option<DateTime<Utc>>,
    pub ticker: Vec<TickerRow>,
    pub market: Vec<MarketRow>,
    pub highlights: HighlightState,
}

/// What the market screen shows: latest rows plus the transient flash map.
///
/// Cheap to clone (just an Arc bump). Only the tick sink and the highlight
/// expiry timers write to it.
#[derive(Clone, Debug, Default)]
pub struct MarketBoard {
    inner: Arc<RwLock<BoardState>>,
}

impl MarketBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_initial(&self, snapshot: Snapshot) {
        let mut state = self.inner.write();
        state.ticker = snapshot.ticker;
        state.market = snapshot.market;
    }

    /// Replace rows and the highlight map with the contents of one tick.
    pub fn apply(&self, update: TickUpdate) {
        let mut state = self.inner.write();
        state.ticker = update.snapshot.ticker;
        state.market = update.snapshot.market;
        state.seq = update.seq;
        state.updated_at = Some(update.generated_at);
        state.highlight_seq = if update.highlights.is_empty() { 0 } else { update.seq };
        state.highlights = update.highlights;
    }

    /// Wipe the whole highlight map.
    pub fn clear_highlights(&self) {
        let mut state = self.inner.write();
        state.highlights.clear();
        state.highlight_seq = 0;
    }

    /// Wipe the highlight map only if it still holds the moves of tick `seq`.
    pub fn clear_highlights_of(&self, seq: u64) -> bool {
        let mut state = self.inner.write();
        if state.highlight_seq != seq {
            return false;
        }
        state.highlights.clear();
        state.highlight_seq = 0;
        true
    }

    pub fn seq(&self) -> u64 {
        self.inner.read().seq
    }

    pub fn ticker(&self) -> Vec<TickerRow> {
        self.inner.read().ticker.clone()
    }

    pub fn market(&self) -> Vec<MarketRow> {
        self.inner.read().market.clone()
    }

    pub fn highlights(&self) -> HighlightState {
        self.inner.read().highlights.clone()
    }

    pub fn row(&self, key: &InstrumentKey) -> Option<MarketRow> {
        self.inner
            .read()
            .market
            .iter()
            .find(|row| &row.key == key)
            .cloned()
    }

    /// Rows whose product name contains `query`, ignoring case.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<MarketRow> {
        let state = self.inner.read();
        filter_rows(&state.market, query)
    }

    /// Everything the screen draws, filtered by `query` like `search`.
    /// Only flashes of the rows that survive the filter are kept.
    pub fn view(&self, query: &str) -> BoardView {
        let state = self.inner.read();
        let market = filter_rows(&state.market, query);
        let highlights = state
            .highlights
            .iter()
            .filter(|(key, _)| market.iter().any(|row| row.key.to_string() == **key))
            .map(|(key, direction)| (key.clone(), *direction))
            .collect();

        BoardView {
            seq: state.seq,
            updated_at: state.updated_at,
            ticker: state.ticker.clone(),
            market,
            highlights,
        }
    }
}

fn filter_rows(market: &[MarketRow], query: &str) -> Vec<MarketRow> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return market.to_vec();
    }
    market
        .iter()
        .filter(|row| row.product_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
