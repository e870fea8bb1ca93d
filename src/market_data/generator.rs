use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::market_data::catalog::{ContractSpec, CONTRACTS};
use crate::market_data::types::{InstrumentKey, MarketRow, Snapshot, TickerRow};

/// Hard ceiling on the per-tick move: 100 bps = 1% of the last price.
pub const MAX_STEP_BPS: u32 = 100;

/// Basis of the spot price against LTP, in bps either way.
const SPOT_BASIS_BPS: i64 = 20;
/// Half spread around LTP for best bid / best ask, in bps.
const HALF_SPREAD_BPS: i64 = 5;
const OI_MAX_STEP: i64 = 150;

#[derive(Debug, Clone)]
struct ContractState {
    key: InstrumentKey,
    liquid: bool,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    ltp: Decimal,
    ltp_sum: Decimal,
    ltp_count: u32,
    spot_price: Decimal,
    spot_at: DateTime<Utc>,
    open_interest: u64,
}

impl ContractState {
    fn to_row(&self) -> MarketRow {
        let change = self.ltp - self.close;
        let change_pct = percent_of(change, self.close);
        let (best_bid, best_ask) = if self.liquid {
            let half = bps_of(self.ltp, HALF_SPREAD_BPS);
            (Some(self.ltp - half), Some(self.ltp + half))
        } else {
            (None, None)
        };

        MarketRow {
            key: self.key.clone(),
            product_name: self.key.symbol.clone(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            ltp: self.ltp,
            change,
            change_pct,
            atp: (self.ltp_sum / Decimal::from(self.ltp_count)).round_dp(2),
            spot_price: self.spot_price,
            spot_at: self.spot_at,
            best_bid,
            best_ask,
            open_interest: self.open_interest,
        }
    }

    fn observe(&mut self, ltp: Decimal) {
        self.ltp = ltp;
        self.high = self.high.max(ltp);
        self.low = self.low.min(ltp);
        self.ltp_sum += ltp;
        self.ltp_count += 1;
    }
}

/// Random-walk quote generator for the contracts on the board.
///
/// The generator owns the current session state; `snapshot` reads it and
/// `advance` moves every contract one tick forward.
pub struct TickGenerator {
    rng: ChaCha8Rng,
    max_step_bps: u32,
    contracts: Vec<ContractState>,
}

impl TickGenerator {
    pub fn from_catalog(max_step_bps: u32, seed: u64) -> Self {
        Self::new(CONTRACTS, max_step_bps, seed, Utc::now())
    }

    pub fn new(specs: &[ContractSpec], max_step_bps: u32, seed: u64, now: DateTime<Utc>) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut seen = HashSet::new();
        let mut contracts = Vec::with_capacity(specs.len());

        for spec in specs {
            let key = InstrumentKey::new(spec.symbol, spec.expiry);
            if !seen.insert(key.clone()) {
                tracing::warn!(%key, "duplicate contract in catalog, skipping");
                continue;
            }

            let close = Decimal::from(spec.base_price);
            let open = close + bps_of(close, rng.gen_range(-30..=30));
            let spot_price = open + bps_of(open, rng.gen_range(-SPOT_BASIS_BPS..=SPOT_BASIS_BPS));

            contracts.push(ContractState {
                key,
                liquid: spec.liquid,
                open,
                high: open,
                low: open,
                close,
                ltp: open,
                ltp_sum: open,
                ltp_count: 1,
                spot_price,
                spot_at: now,
                open_interest: spec.base_open_interest,
            });
        }

        Self {
            rng,
            max_step_bps: max_step_bps.clamp(1, MAX_STEP_BPS),
            contracts,
        }
    }

    pub fn max_step_bps(&self) -> u32 {
        self.max_step_bps
    }

    /// Current session state, without moving prices.
    pub fn snapshot(&self) -> Snapshot {
        let market: Vec<MarketRow> = self.contracts.iter().map(ContractState::to_row).collect();
        let ticker = ticker_rows(&market);
        Snapshot { ticker, market }
    }

    /// Move every contract one tick and return the new snapshot.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Snapshot {
        let max = self.max_step_bps as i64;

        for contract in &mut self.contracts {
            let step = bps_of(contract.ltp, self.rng.gen_range(-max..=max));
            let ltp = contract.ltp + step;
            contract.observe(ltp);

            let basis = self.rng.gen_range(-SPOT_BASIS_BPS..=SPOT_BASIS_BPS);
            contract.spot_price = ltp + bps_of(ltp, basis);
            contract.spot_at = now;

            let oi_step = self.rng.gen_range(-OI_MAX_STEP..=OI_MAX_STEP);
            contract.open_interest = contract.open_interest.saturating_add_signed(oi_step);
        }

        self.snapshot()
    }
}

/// One ticker entry per contract, plus a spot quote for each commodity.
fn ticker_rows(market: &[MarketRow]) -> Vec<TickerRow> {
    let mut spot_seen = HashSet::new();
    let mut ticker = Vec::with_capacity(market.len() * 2);

    for row in market {
        if spot_seen.insert(row.key.symbol.as_str()) {
            ticker.push(TickerRow {
                symbol: row.key.symbol.clone(),
                expiry: None,
                price: row.spot_price,
                change_pct: percent_of(row.spot_price - row.close, row.close),
            });
        }
        ticker.push(TickerRow {
            symbol: row.key.symbol.clone(),
            expiry: Some(row.key.expiry.clone()),
            price: row.ltp,
            change_pct: row.change_pct,
        });
    }

    ticker
}

/// `bps` basis points of `price`, rounded to paise.
fn bps_of(price: Decimal, bps: i64) -> Decimal {
    (price * Decimal::new(bps, 4)).round_dp(2)
}

fn percent_of(delta: Decimal, reference: Decimal) -> Decimal {
    if reference.is_zero() {
        return Decimal::ZERO;
    }
    (delta / reference * Decimal::ONE_HUNDRED).round_dp(2)
}
