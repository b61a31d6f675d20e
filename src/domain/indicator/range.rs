//! Rolling range statistics for breakout detection.

use crate::domain::candle::Candle;
use crate::domain::indicator::IndicatorPoint;

/// Highest high over the `window` bars strictly before each bar.
///
/// The current bar is excluded so a close above the value is a genuine
/// break of the prior range.
pub fn prior_high(candles: &[Candle], window: usize) -> Vec<IndicatorPoint> {
    if window == 0 || candles.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::with_capacity(candles.len());
    for (i, candle) in candles.iter().enumerate() {
        if i < window {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: 0.0,
            });
        } else {
            let high = candles[i - window..i]
                .iter()
                .map(|c| c.high)
                .fold(f64::MIN, f64::max);
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: high,
            });
        }
    }

    values
}

/// Percent return of the last close versus the close `bars_back` bars earlier.
pub fn horizon_return_pct(candles: &[Candle], bars_back: usize) -> Option<f64> {
    if candles.len() <= bars_back {
        return None;
    }
    let last = candles.last()?.close;
    let base = candles[candles.len() - 1 - bars_back].close;
    if base <= 0.0 {
        return None;
    }
    Some((last / base - 1.0) * 100.0)
}
