use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use tracing::info;

use super::traits::{Assistant, ChatReply, ForecastSummary, Outcome};
use crate::market_data::catalog;
use crate::market_data::history::{forecast_change_pct, generate_forecast};
use crate::metrics::prometheus;

/// Used when no API key is configured. Chat always falls back; forecast
/// summaries are worked out from the synthetic forecast series.
pub struct OfflineAssistant {
    rng: Mutex<ChaCha8Rng>,
}

impl OfflineAssistant {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl Assistant for OfflineAssistant {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn chat(&self, prompt: &str) -> ChatReply {
        info!(prompt, "OFFLINE CHAT");
        prometheus::record_assistant_request("chat", Outcome::Fallback.as_str());
        ChatReply::fallback()
    }

    async fn forecast_summary(&self, commodity: &str, period_days: u32) -> ForecastSummary {
        let base = catalog::reference_price(commodity).and_then(|p| p.to_f64());
        let name = catalog::canonical_name(commodity);
        let (Some(name), Some(base), true) = (name, base, period_days > 0) else {
            prometheus::record_assistant_request("forecast", Outcome::Fallback.as_str());
            return ForecastSummary::fallback(commodity, period_days);
        };

        let today = Utc::now().date_naive();
        let points = generate_forecast(&mut *self.rng.lock(), period_days, base, today);
        let change = forecast_change_pct(&points).unwrap_or(0.0);
        let trend = if change >= 0.0 { "rise" } else { "fall" };
        let text = format!(
            "**{name}** prices are expected to {trend} about **{:.1}%** over the next \
             {period_days} days (from ₹{base:.0}/quintal). Confidence: **low**, simulated \
             estimate without live data.",
            change.abs()
        );

        prometheus::record_assistant_request("forecast", Outcome::Simulated.as_str());
        ForecastSummary {
            commodity: name.to_string(),
            period_days,
            text,
            outcome: Outcome::Simulated,
        }
    }
}
