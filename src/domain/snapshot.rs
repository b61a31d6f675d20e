//! Per-symbol feature snapshot derived from a candle series.
//!
//! One row per symbol per cycle, computed from the last bar of the series
//! plus rolling context. Symbols with fewer than [`MIN_SNAPSHOT_BARS`] bars
//! are skipped by returning `None`; a thin symbol never fails the batch.

use crate::domain::candle::Candle;
use crate::domain::indicator::atr::calculate_atr_percent;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::range::{horizon_return_pct, prior_high};
use crate::domain::indicator::volume::volume_ratio;
use crate::domain::theme::{classify_symbol_theme, Theme};
use chrono::{DateTime, Utc};

pub const MIN_SNAPSHOT_BARS: usize = 60;

pub const ATR_PERIOD: usize = 14;
pub const EMA_FAST_PERIOD: usize = 20;
pub const EMA_SLOW_PERIOD: usize = 50;
pub const VOLUME_WINDOW: usize = 20;
pub const RANGE_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub ret_1_pct: f64,
    pub ret_4_pct: f64,
    pub volume_ratio: f64,
    /// ATR(14) / close for the last bar.
    pub atr_pct: f64,
    /// Last atr_pct over its trailing 20-bar mean.
    pub atr_expansion: f64,
    /// EMA20 over EMA50 minus one, in percent.
    pub trend_gap_pct: f64,
    /// Close versus the prior 20-bar high, in percent.
    pub breakout_pct: f64,
    pub ema_fast_above_slow: bool,
    pub theme: Theme,
    pub timestamp: DateTime<Utc>,
}

pub fn build_snapshot(symbol: &str, candles: &[Candle]) -> Option<SymbolSnapshot> {
    if candles.len() < MIN_SNAPSHOT_BARS {
        return None;
    }

    let last = candles.last()?;
    if last.close <= 0.0 {
        return None;
    }

    let ema_fast = calculate_ema(candles, EMA_FAST_PERIOD);
    let ema_slow = calculate_ema(candles, EMA_SLOW_PERIOD);
    let atr_pct_series = calculate_atr_percent(candles, ATR_PERIOD);
    let vol_ratio_series = volume_ratio(candles, VOLUME_WINDOW);
    let high_series = prior_high(candles, RANGE_WINDOW);

    let idx = candles.len() - 1;

    let ret_1_pct = horizon_return_pct(candles, 1)?;
    let ret_4_pct = horizon_return_pct(candles, 4).unwrap_or(ret_1_pct);

    let vr = &vol_ratio_series[idx];
    let volume_ratio = if vr.valid { vr.value } else { 0.0 };

    let atr_point = &atr_pct_series[idx];
    let atr_pct = if atr_point.valid { atr_point.value } else { 0.0 };

    // Trailing mean of valid atr_pct values over the volume window.
    let tail_start = idx.saturating_sub(VOLUME_WINDOW - 1);
    let tail: Vec<f64> = atr_pct_series[tail_start..=idx]
        .iter()
        .filter(|p| p.valid)
        .map(|p| p.value)
        .collect();
    let atr_pct_mean = if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };
    let atr_expansion = if atr_pct_mean > 0.0 {
        atr_pct / atr_pct_mean
    } else {
        0.0
    };

    let fast = &ema_fast[idx];
    let slow = &ema_slow[idx];
    let (trend_gap_pct, ema_fast_above_slow) = if fast.valid && slow.valid && slow.value > 0.0 {
        ((fast.value / slow.value - 1.0) * 100.0, fast.value > slow.value)
    } else {
        (0.0, false)
    };

    let hp = &high_series[idx];
    let breakout_pct = if hp.valid && hp.value > 0.0 {
        (last.close / hp.value - 1.0) * 100.0
    } else {
        f64::MIN
    };

    Some(SymbolSnapshot {
        symbol: symbol.to_string(),
        close: last.close,
        volume: last.volume,
        quote_volume: last.quote_volume(),
        ret_1_pct,
        ret_4_pct,
        volume_ratio,
        atr_pct,
        atr_expansion,
        trend_gap_pct,
        breakout_pct,
        ema_fast_above_slow,
        theme: classify_symbol_theme(symbol),
        timestamp: last.timestamp,
    })
}
