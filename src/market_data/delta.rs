//! Price-move classification between consecutive market snapshots.

use std::collections::HashMap;

use crate::market_data::types::{Direction, HighlightState, InstrumentKey, MarketRow};

/// Classifies every row of `next` against the row with the same key in `prev`.
///
/// Rows with no counterpart in `prev` and rows whose LTP did not move are left
/// out of the result.
pub fn detect_moves(prev: &[MarketRow], next: &[MarketRow]) -> HighlightState {
    let previous: HashMap<&InstrumentKey, &MarketRow> =
        prev.iter().map(|row| (&row.key, row)).collect();

    let mut moves = HighlightState::new();
    for row in next {
        let Some(old) = previous.get(&row.key) else {
            continue;
        };
        let direction = if row.ltp > old.ltp {
            Direction::Up
        } else if row.ltp < old.ltp {
            Direction::Down
        } else {
            continue;
        };
        moves.insert(row.key.to_string(), direction);
    }
    moves
}

/// Holds the snapshot immediately prior in tick order.
#[derive(Debug, Default)]
pub struct DeltaDetector {
    previous: Vec<MarketRow>,
}

impl DeltaDetector {
    pub fn new(previous: Vec<MarketRow>) -> Self {
        Self { previous }
    }

    /// Diff `next` against the retained snapshot, then retain `next`.
    pub fn observe(&mut self, next: &[MarketRow]) -> HighlightState {
        let moves = detect_moves(&self.previous, next);
        self.previous = next.to_vec();
        moves
    }
}
