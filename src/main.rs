mod assistant;
mod config;
mod console;
mod market_data;
mod metrics;
mod state;
mod view;

use std::sync::Arc;

use anyhow::Result;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use console::Console;
use market_data::feed::MarketFeed;
use market_data::generator::TickGenerator;
use view::screen::{MarketScreen, ScreenSettings};

/// Console input buffer; a person types far slower than we drain it.
const STDIN_CHANNEL_BUFFER: usize = 64;

/// Blocking stdin reads live on their own thread so they never hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(STDIN_CHANNEL_BUFFER);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    if let Some(addr) = config.metrics_addr {
        metrics::prometheus::init_metrics_server(addr)?;
        info!(%addr, "metrics exporter listening");
    }

    let generator = TickGenerator::from_catalog(config.max_step_bps, config.seed);
    let assistant = assistant::from_config(&config);
    info!(
        tick_ms = config.tick_interval.as_millis() as u64,
        max_step_bps = generator.max_step_bps(),
        expiry = %config.expiry_policy,
        seed = config.seed,
        assistant = assistant.name(),
        "agrisure-engine starting"
    );

    // Owned by the screen for its whole lifetime; no global feed.
    let feed = Arc::new(MarketFeed::new(generator));
    let settings = ScreenSettings {
        tick_interval: config.tick_interval,
        highlight_delay: config.highlight_delay,
        expiry_policy: config.expiry_policy,
    };
    let screen = MarketScreen::mount(Arc::clone(&feed), &settings).await;
    let console = Console::new(screen, assistant, config.seed);

    let lines = spawn_stdin_reader();
    tokio::select! {
        _ = console.run(lines) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
    }

    // Dropping the console on Ctrl-C cancels the timer; join it before exiting.
    feed.stop().await;
    info!("agrisure-engine stopped");
    Ok(())
}
