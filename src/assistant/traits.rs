use async_trait::async_trait;
use serde::Serialize;

pub const CHAT_FALLBACK: &str =
    "Sorry, I'm having trouble connecting right now. Please try again later.";
pub const SUMMARY_FALLBACK: &str =
    "Could not load AI summary at this time. Please try again later.";

/// Where the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Produced by the model.
    Answered,
    /// Worked out locally from synthetic data, no model involved.
    Simulated,
    /// Canned stand-in after a failure or for an unsupported request.
    Fallback,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Answered => "answered",
            Outcome::Simulated => "simulated",
            Outcome::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub text: String,
    /// Web pages the answer was grounded on; `None` when there are none.
    pub sources: Option<Vec<Source>>,
    pub outcome: Outcome,
}

impl ChatReply {
    pub fn fallback() -> Self {
        Self {
            text: CHAT_FALLBACK.to_string(),
            sources: None,
            outcome: Outcome::Fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastSummary {
    pub commodity: String,
    pub period_days: u32,
    pub text: String,
    pub outcome: Outcome,
}

impl ForecastSummary {
    pub fn fallback(commodity: &str, period_days: u32) -> Self {
        Self {
            commodity: commodity.to_string(),
            period_days,
            text: SUMMARY_FALLBACK.to_string(),
            outcome: Outcome::Fallback,
        }
    }
}

/// Text-completion backend for the chat assistant and the forecast summary.
///
/// Infallible by contract: failures come back as `Outcome::Fallback`.
#[async_trait]
pub trait Assistant: Send + Sync {
    fn name(&self) -> &'static str;

    async fn chat(&self, prompt: &str) -> ChatReply;

    async fn forecast_summary(&self, commodity: &str, period_days: u32) -> ForecastSummary;
}
