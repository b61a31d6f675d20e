#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
pub use cycletrader::domain::candle::{Candle, Timeframe};
use cycletrader::domain::cycle::CycleConfig;
use cycletrader::domain::error::CycletraderError;
use cycletrader::ports::price_port::PricePort;
use std::collections::{HashMap, HashSet};

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
}

pub struct MockPricePort {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashSet<String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashSet::new(),
        }
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_error(mut self, symbol: &str) -> Self {
        self.errors.insert(symbol.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, CycletraderError> {
        if self.errors.contains(symbol) {
            return Err(CycletraderError::PriceFetch {
                symbol: symbol.to_string(),
                reason: "simulated feed outage".to_string(),
            });
        }
        let candles = self.data.get(symbol).cloned().unwrap_or_default();
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }

    fn latest_price(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<(f64, DateTime<Utc>)>, CycletraderError> {
        Ok(self
            .data
            .get(symbol)
            .and_then(|candles| candles.last())
            .map(|c| (c.close, c.timestamp)))
    }
}

/// Uptrending candles ending at `end`: multiplicative drift per bar, a
/// configurable volume spike on the last bar.
pub fn trending_candles(
    symbol: &str,
    bars: usize,
    end: DateTime<Utc>,
    base_price: f64,
    step_pct: f64,
    volume: f64,
    last_volume: f64,
) -> Vec<Candle> {
    (0..bars)
        .map(|i| {
            let close = base_price * (1.0 + step_pct / 100.0).powi(i as i32);
            let open = if i == 0 {
                close
            } else {
                base_price * (1.0 + step_pct / 100.0).powi(i as i32 - 1)
            };
            Candle {
                symbol: symbol.to_string(),
                timeframe: Timeframe::H1,
                timestamp: end - Duration::hours((bars - 1 - i) as i64),
                open,
                high: close * 1.005,
                low: close.min(open) * 0.995,
                close,
                volume: if i == bars - 1 { last_volume } else { volume },
            }
        })
        .collect()
}

pub fn flat_candles(
    symbol: &str,
    bars: usize,
    end: DateTime<Utc>,
    price: f64,
    volume: f64,
) -> Vec<Candle> {
    trending_candles(symbol, bars, end, price, 0.0, volume, volume)
}

/// Downtrending candles ending at `end`.
pub fn falling_candles(
    symbol: &str,
    bars: usize,
    end: DateTime<Utc>,
    base_price: f64,
    volume: f64,
) -> Vec<Candle> {
    trending_candles(symbol, bars, end, base_price, -0.4, volume, volume)
}

pub fn test_cycle_config(symbols: &[&str]) -> CycleConfig {
    CycleConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        fetch_workers: 2,
        ..CycleConfig::default()
    }
}
