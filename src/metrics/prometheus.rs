use std::net::SocketAddr;

use anyhow::Context;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus HTTP exporter on `addr`.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are exported at /metrics.
/// Without it the recording helpers below are no-ops.
pub fn init_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("failed to start Prometheus exporter on {addr}"))
}

// ── Feed metrics ─────────────────────────────────────────────────

pub fn record_tick(rows: usize, up: usize, down: usize) {
    counter!("feed_ticks_total").increment(1);
    counter!("feed_price_moves_total", "direction" => "up").increment(up as u64);
    counter!("feed_price_moves_total", "direction" => "down").increment(down as u64);
    histogram!("feed_tick_rows").record(rows as f64);
}

/// Time spent generating, diffing and delivering one tick.
pub fn record_tick_latency_us(latency_us: u128) {
    histogram!("feed_tick_latency_us").record(latency_us as f64);
}

pub fn record_feed_transition(state: &'static str) {
    counter!("feed_transitions_total", "state" => state).increment(1);
}

// ── Board metrics ────────────────────────────────────────────────

pub fn record_highlight_clear(policy: &'static str, cleared: bool) {
    let result = if cleared { "cleared" } else { "skipped" };
    counter!("highlight_expiries_total", "policy" => policy, "result" => result).increment(1);
}

// ── Assistant metrics ────────────────────────────────────────────

pub fn record_assistant_request(kind: &'static str, outcome: &'static str) {
    counter!("assistant_requests_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_assistant_latency_ms(kind: &'static str, latency_ms: f64) {
    histogram!("assistant_latency_ms", "kind" => kind).record(latency_ms);
}
