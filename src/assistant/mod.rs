pub mod gemini;
pub mod offline;
pub mod traits;

use tracing::{info, warn};

use crate::config::Config;
use gemini::GeminiAssistant;
use offline::OfflineAssistant;
use traits::Assistant;

pub(crate) fn forecast_prompt(commodity: &str, period_days: u32) -> String {
    format!(
        "Provide a concise price forecast summary for {commodity} for the next {period_days} days \
         for an Indian farmer. Include a percentage prediction and a confidence level."
    )
}

/// Gemini when an API key is configured, the offline stand-in otherwise.
pub fn from_config(config: &Config) -> Box<dyn Assistant> {
    let Some(api_key) = config.gemini_api_key.clone() else {
        info!("no Gemini API key configured, assistant runs offline");
        return Box::new(OfflineAssistant::new(config.seed));
    };

    match GeminiAssistant::new(api_key, config.gemini_model.clone()) {
        Ok(assistant) => {
            info!(model = %config.gemini_model, "Gemini assistant ready");
            Box::new(assistant)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "Gemini client unavailable, assistant runs offline");
            Box::new(OfflineAssistant::new(config.seed))
        }
    }
}
