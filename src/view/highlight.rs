use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::trace;

use crate::metrics::prometheus;
use crate::state::board::MarketBoard;

pub const DEFAULT_HIGHLIGHT_DELAY: Duration = Duration::from_millis(500);

/// What an expiry timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Wipe the map, even if a newer tick has replaced the highlights meanwhile.
    #[default]
    Unconditional,
    /// Wipe only if the map still holds the highlights of the arming tick.
    PerTick,
}

impl ExpiryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryPolicy::Unconditional => "unconditional",
            ExpiryPolicy::PerTick => "per-tick",
        }
    }
}

impl fmt::Display for ExpiryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpiryPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unconditional" => Ok(ExpiryPolicy::Unconditional),
            "per-tick" | "per_tick" | "pertick" => Ok(ExpiryPolicy::PerTick),
            other => anyhow::bail!("unknown highlight expiry policy {other:?}"),
        }
    }
}

/// Arms one-shot timers that make the price flashes transient.
///
/// Timers are detached: stopping the feed does not cancel them.
#[derive(Clone)]
pub struct HighlightScheduler {
    board: MarketBoard,
    delay: Duration,
    policy: ExpiryPolicy,
}

impl HighlightScheduler {
    pub fn new(board: MarketBoard, delay: Duration, policy: ExpiryPolicy) -> Self {
        Self { board, delay, policy }
    }

    /// Schedule the expiry of the highlights set by tick `seq`.
    pub fn arm(&self, seq: u64) {
        let board = self.board.clone();
        let delay = self.delay;
        let policy = self.policy;

        tokio::spawn(async move {
            sleep(delay).await;
            let cleared = match policy {
                ExpiryPolicy::Unconditional => {
                    board.clear_highlights();
                    true
                }
                ExpiryPolicy::PerTick => board.clear_highlights_of(seq),
            };
            prometheus::record_highlight_clear(policy.as_str(), cleared);
            trace!(seq, %policy, cleared, "highlight expiry fired");
        });
    }
}
