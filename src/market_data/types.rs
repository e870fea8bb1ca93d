use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a tradable row: commodity symbol plus contract month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub symbol: String,
    pub expiry: String,
}

impl InstrumentKey {
    pub fn new(symbol: impl Into<String>, expiry: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            expiry: expiry.into(),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.symbol, self.expiry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Stringified instrument key -> direction of the last price move.
pub type HighlightState = BTreeMap<String, Direction>;

/// Compact quote for the scrolling ticker strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerRow {
    pub symbol: String,
    /// `None` for spot quotes.
    pub expiry: Option<String>,
    pub price: Decimal,
    pub change_pct: Decimal,
}

/// Full quote record for one futures contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub key: InstrumentKey,
    pub product_name: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Previous session close; the reference for `change`.
    pub close: Decimal,
    pub ltp: Decimal,
    pub change: Decimal,
    pub change_pct: Decimal,
    pub atp: Decimal,
    pub spot_price: Decimal,
    pub spot_at: DateTime<Utc>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub open_interest: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ticker: Vec<TickerRow>,
    pub market: Vec<MarketRow>,
}

/// What a subscriber receives on every tick.
#[derive(Debug, Clone)]
pub struct TickUpdate {
    pub seq: u64,
    pub snapshot: Snapshot,
    pub highlights: HighlightState,
    pub generated_at: DateTime<Utc>,
}
