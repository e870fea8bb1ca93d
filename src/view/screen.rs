use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::market_data::feed::{MarketFeed, TickSink};
use crate::market_data::types::{Direction, HighlightState, MarketRow, TickUpdate, TickerRow};
use crate::state::board::MarketBoard;
use crate::view::controller::{FeedMode, LiveController};
use crate::view::highlight::{ExpiryPolicy, HighlightScheduler};

pub const OPTIONS_UNAVAILABLE: &str = "Options data is not available yet.";

/// Tick consumer: copies the tick onto the board, then arms the flash expiry.
struct BoardSink {
    board: MarketBoard,
    scheduler: HighlightScheduler,
}

impl TickSink for BoardSink {
    fn on_tick(&self, update: TickUpdate) {
        let seq = update.seq;
        let flashed = !update.highlights.is_empty();
        self.board.apply(update);
        if flashed {
            self.scheduler.arm(seq);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScreenSettings {
    pub tick_interval: Duration,
    pub highlight_delay: Duration,
    pub expiry_policy: ExpiryPolicy,
}

/// The market screen: owns its feed subscription for as long as it is mounted.
pub struct MarketScreen {
    board: MarketBoard,
    controller: LiveController,
}

impl MarketScreen {
    /// Load the initial snapshot and go live.
    pub async fn mount(feed: Arc<MarketFeed>, settings: &ScreenSettings) -> Self {
        let board = MarketBoard::new();
        board.load_initial(feed.initial_data());

        let scheduler = HighlightScheduler::new(
            board.clone(),
            settings.highlight_delay,
            settings.expiry_policy,
        );
        let sink = Arc::new(BoardSink {
            board: board.clone(),
            scheduler,
        });

        let mut controller = LiveController::new(feed, sink, settings.tick_interval);
        controller.set_mode(FeedMode::Live).await;
        info!(rows = board.market().len(), "market screen mounted");

        Self { board, controller }
    }

    /// Always leaves the feed stopped.
    pub async fn unmount(mut self) {
        self.controller.shutdown().await;
        info!("market screen unmounted");
    }

    pub fn board(&self) -> &MarketBoard {
        &self.board
    }

    pub fn mode(&self) -> FeedMode {
        self.controller.mode()
    }

    pub async fn toggle_live(&mut self) -> FeedMode {
        self.controller.toggle().await
    }

    pub async fn set_mode(&mut self, mode: FeedMode) {
        self.controller.set_mode(mode).await;
    }

    /// Ticker strip followed by the futures table, optionally filtered.
    pub fn render(&self, query: &str) -> String {
        let view = self.board.view(query);
        let mut out = String::new();
        let _ = write!(out, "[{}] tick #{}", self.mode().label(), view.seq);
        if let Some(at) = view.updated_at {
            let _ = write!(out, " @ {}", at.format("%H:%M:%S"));
        }
        out.push('\n');
        let _ = writeln!(out, "{}", render_ticker(&view.ticker));
        if view.market.is_empty() {
            let _ = writeln!(out, "no commodity matches {query:?}");
        } else {
            out.push_str(&render_table(&view.market, &view.highlights));
        }
        out
    }
}

pub fn render_ticker(rows: &[TickerRow]) -> String {
    rows.iter()
        .map(|t| {
            let arrow = if t.change_pct >= Decimal::ZERO { '↑' } else { '↓' };
            let label = match &t.expiry {
                Some(expiry) => format!("{} {}", t.symbol, expiry),
                None => t.symbol.clone(),
            };
            format!("{label} {:.2} {arrow}{:.2}%", t.price, t.change_pct.abs())
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn render_table(rows: &[MarketRow], highlights: &HighlightState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        concat!(
            "  {:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>8} {:>7}",
            " {:>9} {:>9} {:>21} {:>9} {:>9} {:>8}",
        ),
        "Product/Expiry", "Open", "Low", "LTP", "High", "Close", "Chg", "Chg%", "ATP", "Spot",
        "Spot Date|Time", "BestBuy", "BestSell", "OI"
    );
    for row in rows {
        let flash = highlights.get(&row.key.to_string()).copied();
        let _ = writeln!(out, "{}", render_row(row, flash));
    }
    out
}

pub fn render_row(row: &MarketRow, flash: Option<Direction>) -> String {
    let marker = match flash {
        Some(Direction::Up) => '▲',
        Some(Direction::Down) => '▼',
        None => ' ',
    };
    format!(
        concat!(
            "{} {:<24} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>8.2} {:>7.2}",
            " {:>9.2} {:>9.2} {:>21} {:>9} {:>9} {:>8}",
        ),
        marker,
        format!("{} ({})", row.product_name, row.key.expiry),
        row.open,
        row.low,
        row.ltp,
        row.high,
        row.close,
        row.change,
        row.change_pct,
        row.atp,
        row.spot_price,
        row.spot_at.format("%d-%b-%Y | %H:%M:%S").to_string(),
        quote_or_dash(row.best_bid),
        quote_or_dash(row.best_ask),
        row.open_interest,
    )
}

fn quote_or_dash(price: Option<Decimal>) -> String {
    price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::catalog::CONTRACTS;
    use crate::market_data::feed::tests::feed;
    use crate::market_data::generator::TickGenerator;
    use crate::market_data::types::InstrumentKey;
    use chrono::Utc;
    use tokio::time::sleep;

    async fn mounted(seed: u64, policy: ExpiryPolicy) -> (Arc<MarketFeed>, MarketScreen) {
        let feed = Arc::new(feed(seed));
        let screen = MarketScreen::mount(Arc::clone(&feed), &settings(policy)).await;
        (feed, screen)
    }

    fn settings(policy: ExpiryPolicy) -> ScreenSettings {
        ScreenSettings {
            tick_interval: Duration::from_millis(2_000),
            highlight_delay: Duration::from_millis(500),
            expiry_policy: policy,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mount_shows_initial_data_and_goes_live() {
        let (feed, screen) = mounted(21, ExpiryPolicy::Unconditional).await;

        assert_eq!(screen.mode(), FeedMode::Live);
        assert_eq!(screen.board().market(), feed.initial_data().market);
        assert_eq!(screen.board().seq(), 0);
        assert!(feed.is_running());

        screen.unmount().await;
        assert!(!feed.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_flashes_then_clears() {
        let (feed, screen) = mounted(22, ExpiryPolicy::Unconditional).await;

        sleep(Duration::from_millis(2_001)).await;
        assert_eq!(screen.board().seq(), 1);
        let flashed = screen.board().highlights();
        assert!(!flashed.is_empty(), "a 10-row tick with ±50bps steps should move something");
        let keys: Vec<String> =
            screen.board().market().iter().map(|r| r.key.to_string()).collect();
        assert!(flashed.keys().all(|k| keys.contains(k)));

        sleep(Duration::from_millis(500)).await;
        assert!(screen.board().highlights().is_empty());
        assert_eq!(screen.board().seq(), 1);

        screen.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_unmount() {
        let (feed, screen) = mounted(23, ExpiryPolicy::PerTick).await;
        let board = screen.board().clone();
        screen.unmount().await;

        sleep(Duration::from_secs(10)).await;
        assert_eq!(board.seq(), 0);
        assert_eq!(feed.last_seq(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_mounted_screen_stops_the_feed() {
        let (feed, screen) = mounted(25, ExpiryPolicy::Unconditional).await;
        let board = screen.board().clone();

        sleep(Duration::from_millis(2_001)).await;
        assert_eq!(board.seq(), 1);
        drop(screen);
        assert!(!feed.is_running());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(board.seq(), 1);
        assert_eq!(feed.last_seq(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn render_header_shows_tick_and_its_time() {
        let (_feed, screen) = mounted(26, ExpiryPolicy::Unconditional).await;
        assert!(screen.render("").starts_with("[LIVE] tick #0\n"));

        sleep(Duration::from_millis(2_001)).await;
        let out = screen.render("sesame");
        let header = out.lines().next().unwrap_or_default();
        assert!(header.starts_with("[LIVE] tick #1 @ "), "{header}");
        assert_eq!(out.lines().filter(|l| l.contains("(Dec25)")).count(), 1);

        screen.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn offline_freezes_the_board() {
        let (feed, mut screen) = mounted(24, ExpiryPolicy::Unconditional).await;

        sleep(Duration::from_millis(4_100)).await;
        assert_eq!(screen.toggle_live().await, FeedMode::Offline);
        let frozen = screen.board().market();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(screen.board().market(), frozen);
        assert_eq!(screen.board().seq(), 2);

        screen.unmount().await;
    }

    #[test]
    fn row_render_marks_flash_and_missing_book() {
        let snapshot = TickGenerator::new(CONTRACTS, 50, 1, Utc::now()).snapshot();
        let illiquid = snapshot
            .market
            .iter()
            .find(|r| r.key == InstrumentKey::new("Sesame Seed", "Dec25"))
            .unwrap();

        let line = render_row(illiquid, Some(Direction::Down));
        assert!(line.starts_with('▼'));
        assert!(line.contains("Sesame Seed (Dec25)"));
        assert!(line.contains(" - "));
        assert!(render_row(illiquid, None).starts_with(' '));
    }

    #[test]
    fn ticker_renders_spot_without_expiry() {
        let rows = vec![
            TickerRow {
                symbol: "Soybean".into(),
                expiry: None,
                price: Decimal::new(425012, 2),
                change_pct: Decimal::new(-47, 2),
            },
            TickerRow {
                symbol: "Soybean".into(),
                expiry: Some("Nov25".into()),
                price: Decimal::from(4300),
                change_pct: Decimal::new(117, 2),
            },
        ];
        assert_eq!(
            render_ticker(&rows),
            "Soybean 4250.12 ↓0.47% | Soybean Nov25 4300.00 ↑1.17%"
        );
    }
}
