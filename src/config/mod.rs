use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::assistant::gemini::DEFAULT_MODEL;
use crate::market_data::generator::MAX_STEP_BPS;
use crate::view::highlight::{ExpiryPolicy, DEFAULT_HIGHLIGHT_DELAY};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(2_000);
const DEFAULT_MAX_STEP_BPS: u32 = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub tick_interval: Duration,
    pub highlight_delay: Duration,
    pub expiry_policy: ExpiryPolicy,
    /// Largest per-tick price move, in basis points of the last price.
    pub max_step_bps: u32,
    pub seed: u64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Prometheus exporter listen address; exporter is off when unset.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            highlight_delay: DEFAULT_HIGHLIGHT_DELAY,
            expiry_policy: ExpiryPolicy::default(),
            max_step_bps: DEFAULT_MAX_STEP_BPS,
            seed: 0,
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            metrics_addr: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let default_tick_ms = DEFAULT_TICK_INTERVAL.as_millis() as u64;
        let tick_ms: u64 = parse_or(&get, "AGRISURE_TICK_INTERVAL_MS", default_tick_ms)?;
        if tick_ms == 0 {
            bail!("AGRISURE_TICK_INTERVAL_MS must be greater than zero");
        }

        let highlight_ms: u64 =
            parse_or(&get, "AGRISURE_HIGHLIGHT_MS", DEFAULT_HIGHLIGHT_DELAY.as_millis() as u64)?;

        let max_step_bps: u32 = parse_or(&get, "AGRISURE_MAX_STEP_BPS", DEFAULT_MAX_STEP_BPS)?;
        if !(1..=MAX_STEP_BPS).contains(&max_step_bps) {
            bail!("AGRISURE_MAX_STEP_BPS must be within 1..={MAX_STEP_BPS}, got {max_step_bps}");
        }

        let seed: u64 = match get("AGRISURE_SEED") {
            Some(raw) => raw.parse().with_context(|| format!("invalid AGRISURE_SEED {raw:?}"))?,
            None => rand::random(),
        };

        let expiry_policy = match get("AGRISURE_HIGHLIGHT_EXPIRY") {
            Some(raw) => raw.parse()?,
            None => ExpiryPolicy::default(),
        };

        let metrics_addr = get("AGRISURE_METRICS_ADDR")
            .map(|raw| {
                raw.parse::<SocketAddr>()
                    .with_context(|| format!("invalid AGRISURE_METRICS_ADDR {raw:?}"))
            })
            .transpose()?;

        Ok(Self {
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            tick_interval: Duration::from_millis(tick_ms),
            highlight_delay: Duration::from_millis(highlight_ms),
            expiry_policy,
            max_step_bps,
            seed,
            gemini_api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            metrics_addr,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid {key} {raw:?}")),
        None => Ok(default),
    }
}
