//! Synthetic daily history for the chart view and the forecast chart.

use chrono::{Days, NaiveDate};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: i64,
    /// Only the historical part of the series has actuals.
    pub actual: Option<i64>,
}

const HISTORY_DAYS: u64 = 7;

/// `days` daily candles ending the day before `today`, walking from `base_price`.
pub fn generate_candles<R: Rng>(
    rng: &mut R,
    days: u32,
    base_price: f64,
    today: NaiveDate,
) -> Vec<Candle> {
    let mut date = today - Days::new(days as u64);
    let mut last_close = base_price;
    let mut candles = Vec::with_capacity(days as usize);

    for _ in 0..days {
        let open = last_close + (rng.r#gen::<f64>() - 0.5) * 20.0;
        let close = open + (rng.r#gen::<f64>() - 0.5) * 50.0;
        let high = open.max(close) + rng.r#gen::<f64>() * 30.0;
        let low = open.min(close) - rng.r#gen::<f64>() * 30.0;

        candles.push(Candle {
            date,
            open: open.round() as i64,
            high: high.round() as i64,
            low: low.round() as i64,
            close: close.round() as i64,
        });
        last_close = close;
        date = date + Days::new(1);
    }
    candles
}

/// A week of history followed by `days` of forecast, with a slight upward drift.
pub fn generate_forecast<R: Rng>(
    rng: &mut R,
    days: u32,
    base_price: f64,
    today: NaiveDate,
) -> Vec<ForecastPoint> {
    let lookback = HISTORY_DAYS.min(days as u64);
    let mut date = today - Days::new(lookback);
    let total = days as usize + HISTORY_DAYS as usize;
    let mut points: Vec<ForecastPoint> = Vec::with_capacity(total);
    let mut predicted = base_price;

    for i in 0..total {
        let fluctuation = (rng.r#gen::<f64>() - 0.45) * (base_price * 0.02);
        predicted += fluctuation;
        let actual = (i < HISTORY_DAYS as usize)
            .then(|| (predicted + (rng.r#gen::<f64>() - 0.5) * (base_price * 0.01)).round() as i64);

        points.push(ForecastPoint {
            date,
            predicted: predicted.round() as i64,
            actual,
        });
        date = date + Days::new(1);
    }
    points
}

/// Percent move from the first to the last predicted point.
pub fn forecast_change_pct(points: &[ForecastPoint]) -> Option<f64> {
    let first = points.first()?.predicted as f64;
    let last = points.last()?.predicted as f64;
    if first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    #[test]
    fn candles_are_consistent_and_dated() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let candles = generate_candles(&mut rng, 90, 4250.0, today());

        assert_eq!(candles.len(), 90);
        assert_eq!(candles[0].date, NaiveDate::from_ymd_opt(2025, 7, 17).unwrap());
        assert_eq!(candles[89].date, NaiveDate::from_ymd_opt(2025, 10, 14).unwrap());
        for c in &candles {
            assert!(c.low <= c.open.min(c.close));
            assert!(c.high >= c.open.max(c.close));
        }
        assert!((candles[0].open - 4250).abs() <= 10);
    }

    #[test]
    fn forecast_has_week_of_actuals() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let points = generate_forecast(&mut rng, 30, 5800.0, today());

        assert_eq!(points.len(), 37);
        assert!(points[..7].iter().all(|p| p.actual.is_some()));
        assert!(points[7..].iter().all(|p| p.actual.is_none()));
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2025, 10, 8).unwrap());
    }

    #[test]
    fn short_forecast_looks_back_at_most_its_length() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let points = generate_forecast(&mut rng, 3, 5800.0, today());
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2025, 10, 12).unwrap());
        assert_eq!(points.len(), 10);
    }

    #[test]
    fn series_are_one_calendar_day_apart_across_month_ends() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let candles = generate_candles(&mut rng, 45, 4250.0, today());
        for pair in candles.windows(2) {
            assert_eq!(pair[1].date, pair[0].date + Days::new(1));
        }

        let points = generate_forecast(&mut rng, 60, 5800.0, today());
        for pair in points.windows(2) {
            assert_eq!(pair[1].date, pair[0].date + Days::new(1));
        }
        assert_eq!(points[66].date, NaiveDate::from_ymd_opt(2025, 12, 13).unwrap());
    }

    #[test]
    fn change_pct_of_flat_series_is_zero() {
        let flat = vec![
            ForecastPoint { date: today(), predicted: 100, actual: None },
            ForecastPoint { date: today(), predicted: 100, actual: None },
        ];
        assert_eq!(forecast_change_pct(&flat), Some(0.0));
        assert_eq!(forecast_change_pct(&[]), None);
    }
}
