//! Line-oriented front end standing in for the market screen.

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use std::fmt::Write as _;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::assistant::traits::{Assistant, Outcome};
use crate::market_data::history::generate_candles;
use crate::market_data::types::InstrumentKey;
use crate::view::controller::FeedMode;
use crate::view::screen::{MarketScreen, OPTIONS_UNAVAILABLE};

const CHART_DAYS: u32 = 90;
const CHART_TAIL: usize = 10;

pub const HELP: &str = "commands: live | offline | toggle | status | search <text> \
| chart <symbol> <expiry> | options | ask <question> | forecast <commodity> <days> | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Live,
    Offline,
    Toggle,
    Status,
    Search(String),
    Chart(InstrumentKey),
    Options,
    Ask(String),
    Forecast { commodity: String, days: u32 },
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map(|(h, r)| (h, r.trim()))
            .unwrap_or((line, ""));

        match head.to_ascii_lowercase().as_str() {
            "live" => Ok(Command::Live),
            "offline" => Ok(Command::Offline),
            "toggle" => Ok(Command::Toggle),
            "status" | "show" | "" => Ok(Command::Status),
            "search" => Ok(Command::Search(rest.to_string())),
            "chart" => {
                let (symbol, expiry) = split_last(rest).ok_or("usage: chart <symbol> <expiry>")?;
                Ok(Command::Chart(InstrumentKey::new(symbol, expiry)))
            }
            "options" => Ok(Command::Options),
            "ask" if !rest.is_empty() => Ok(Command::Ask(rest.to_string())),
            "ask" => Err("usage: ask <question>".to_string()),
            "forecast" => {
                let (commodity, days) =
                    split_last(rest).ok_or("usage: forecast <commodity> <days>")?;
                let days = days
                    .parse::<u32>()
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or_else(|| format!("invalid number of days {days:?}"))?;
                Ok(Command::Forecast {
                    commodity: commodity.to_string(),
                    days,
                })
            }
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command {other:?}; {HELP}")),
        }
    }
}

/// "Mustard Seed May26" -> ("Mustard Seed", "May26")
fn split_last(rest: &str) -> Option<(&str, &str)> {
    let (first, last) = rest.rsplit_once(char::is_whitespace)?;
    let first = first.trim();
    (!first.is_empty() && !last.is_empty()).then_some((first, last))
}

pub struct Console {
    screen: MarketScreen,
    assistant: Box<dyn Assistant>,
    filter: String,
    rng: ChaCha8Rng,
}

impl Console {
    pub fn new(screen: MarketScreen, assistant: Box<dyn Assistant>, seed: u64) -> Self {
        Self {
            screen,
            assistant,
            filter: String::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    #[cfg(test)]
    pub fn screen(&self) -> &MarketScreen {
        &self.screen
    }

    /// Run one command. Returns the text to show, or `None` on quit.
    pub async fn execute(&mut self, command: Command) -> Option<String> {
        debug!(?command, "console command");
        let text = match command {
            Command::Live => {
                self.screen.set_mode(FeedMode::Live).await;
                "LIVE".to_string()
            }
            Command::Offline => {
                self.screen.set_mode(FeedMode::Offline).await;
                "OFFLINE".to_string()
            }
            Command::Toggle => self.screen.toggle_live().await.label().to_string(),
            Command::Status => self.screen.render(&self.filter),
            Command::Search(query) => {
                self.filter = query;
                self.screen.render(&self.filter)
            }
            Command::Chart(key) => self.chart(&key),
            Command::Options => OPTIONS_UNAVAILABLE.to_string(),
            Command::Ask(question) => {
                let reply = self.assistant.chat(&question).await;
                let mut text = reply.text;
                for source in reply.sources.unwrap_or_default() {
                    let _ = write!(text, "\n  - {} <{}>", source.title, source.uri);
                }
                text
            }
            Command::Forecast { commodity, days } => {
                let summary = self.assistant.forecast_summary(&commodity, days).await;
                match summary.outcome {
                    Outcome::Answered => summary.text,
                    Outcome::Simulated => format!("[simulated] {}", summary.text),
                    Outcome::Fallback => {
                        warn!(commodity = %summary.commodity, "forecast summary unavailable");
                        summary.text
                    }
                }
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return None,
        };
        Some(text)
    }

    fn chart(&mut self, key: &InstrumentKey) -> String {
        let Some(row) = self.screen.board().row(key) else {
            return format!("no contract {key}");
        };
        let base = row.ltp.to_f64().unwrap_or_default();
        let candles = generate_candles(&mut self.rng, CHART_DAYS, base, Utc::now().date_naive());

        let mut out = format!(
            "{} ({}) last {CHART_TAIL} of {CHART_DAYS} days\n",
            row.product_name, key.expiry
        );
        for c in candles.iter().rev().take(CHART_TAIL).rev() {
            let _ = writeln!(
                out,
                "{}  O {:>6}  H {:>6}  L {:>6}  C {:>6}",
                c.date, c.open, c.high, c.low, c.close
            );
        }
        out
    }

    /// Read commands until `quit` or the input closes, then unmount the screen.
    pub async fn run(mut self, mut lines: mpsc::Receiver<String>) {
        println!("{}", self.screen.render(""));
        println!("{HELP}");

        while let Some(line) = lines.recv().await {
            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(hint) => {
                    println!("{hint}");
                    continue;
                }
            };
            match self.execute(command).await {
                Some(text) => println!("{text}"),
                None => break,
            }
        }

        self.screen.unmount().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::offline::OfflineAssistant;
    use crate::market_data::feed::tests::feed;
    use crate::view::highlight::ExpiryPolicy;
    use crate::view::screen::ScreenSettings;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn parses_multi_word_arguments() {
        assert_eq!(
            Command::parse("chart Mustard Seed May26"),
            Ok(Command::Chart(InstrumentKey::new("Mustard Seed", "May26")))
        );
        assert_eq!(
            Command::parse("forecast Sesame Seed 90"),
            Ok(Command::Forecast { commodity: "Sesame Seed".into(), days: 90 })
        );
        assert_eq!(Command::parse("  SEARCH  soy "), Ok(Command::Search("soy".into())));
        assert_eq!(
            Command::parse("ask what is hedging?"),
            Ok(Command::Ask("what is hedging?".into()))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse("chart Soybean").is_err());
        assert!(Command::parse("forecast Soybean soon").is_err());
        assert!(Command::parse("forecast Soybean 0").is_err());
        assert!(Command::parse("ask").is_err());
        assert!(Command::parse("sell everything").unwrap_err().contains("unknown command"));
    }

    #[test]
    fn empty_line_shows_status() {
        assert_eq!(Command::parse(""), Ok(Command::Status));
    }

    async fn console() -> Console {
        let settings = ScreenSettings {
            tick_interval: Duration::from_millis(1_000),
            highlight_delay: Duration::from_millis(500),
            expiry_policy: ExpiryPolicy::Unconditional,
        };
        let screen = MarketScreen::mount(Arc::new(feed(31)), &settings).await;
        Console::new(screen, Box::new(OfflineAssistant::new(31)), 31)
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_and_search() {
        let mut console = console().await;

        assert_eq!(console.execute(Command::Toggle).await.as_deref(), Some("OFFLINE"));
        assert_eq!(console.screen().mode(), FeedMode::Offline);

        let table = console.execute(Command::Search("groundnut".into())).await.unwrap();
        assert!(table.contains("Groundnut (Nov25)"));
        assert!(!table.contains("Soybean (Nov25)"));
        assert!(table.starts_with("[OFFLINE]"));

        assert_eq!(console.execute(Command::Quit).await, None);
        console.screen.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn chart_for_known_and_unknown_contract() {
        let mut console = console().await;

        let chart = console
            .execute(Command::Chart(InstrumentKey::new("Soybean", "Nov25")))
            .await
            .unwrap();
        assert!(chart.starts_with("Soybean (Nov25)"));
        assert_eq!(chart.lines().count(), 1 + CHART_TAIL);

        let missing = console
            .execute(Command::Chart(InstrumentKey::new("Soybean", "Jan30")))
            .await
            .unwrap();
        assert_eq!(missing, "no contract Soybean|Jan30");

        console.screen.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn offline_forecast_is_tagged_simulated() {
        let mut console = console().await;

        let forecast = Command::Forecast { commodity: "soybean".into(), days: 30 };
        let text = console.execute(forecast).await.unwrap();
        assert!(text.starts_with("[simulated] **Soybean**"), "{text}");

        let unknown = Command::Forecast { commodity: "Wheat".into(), days: 30 };
        let text = console.execute(unknown).await.unwrap();
        assert_eq!(text, crate::assistant::traits::SUMMARY_FALLBACK);

        console.screen.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_feed_at_end_of_input() {
        let feed = Arc::new(feed(32));
        let settings = ScreenSettings {
            tick_interval: Duration::from_millis(1_000),
            highlight_delay: Duration::from_millis(500),
            expiry_policy: ExpiryPolicy::PerTick,
        };
        let screen = MarketScreen::mount(Arc::clone(&feed), &settings).await;
        let console = Console::new(screen, Box::new(OfflineAssistant::new(1)), 1);

        let (tx, rx) = mpsc::channel(4);
        tx.send("status".to_string()).await.unwrap();
        tx.send("options".to_string()).await.unwrap();
        drop(tx);

        console.run(rx).await;
        assert!(!feed.is_running());
    }
}
