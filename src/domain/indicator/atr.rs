//! Average True Range indicator.
//!
//! Wilder smoothing: seed with the mean of the first n true ranges, then
//! ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n. The first bar's true range is
//! high - low (no prior close).

use crate::domain::candle::Candle;
use crate::domain::indicator::IndicatorPoint;

pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<IndicatorPoint> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    let mut tr_values: Vec<f64> = Vec::with_capacity(candles.len());
    for (i, candle) in candles.iter().enumerate() {
        let tr = if i == 0 {
            candle.high - candle.low
        } else {
            candle.true_range(candles[i - 1].close)
        };
        tr_values.push(tr);
    }

    let mut results: Vec<IndicatorPoint> = Vec::with_capacity(candles.len());
    for i in 0..candles.len() {
        if i < period - 1 {
            results.push(IndicatorPoint {
                timestamp: candles[i].timestamp,
                valid: false,
                value: 0.0,
            });
        } else if i == period - 1 {
            let seed: f64 = tr_values[0..=i].iter().sum::<f64>() / period as f64;
            results.push(IndicatorPoint {
                timestamp: candles[i].timestamp,
                valid: true,
                value: seed,
            });
        } else {
            let prev_atr = results[i - 1].value;
            let atr = (prev_atr * (period - 1) as f64 + tr_values[i]) / period as f64;
            results.push(IndicatorPoint {
                timestamp: candles[i].timestamp,
                valid: true,
                value: atr,
            });
        }
    }

    results
}

/// ATR as a fraction of the close, usable across price magnitudes.
pub fn calculate_atr_percent(candles: &[Candle], period: usize) -> Vec<IndicatorPoint> {
    let atr = calculate_atr(candles, period);
    atr.into_iter()
        .zip(candles.iter())
        .map(|(point, candle)| {
            let value = if point.valid && candle.close > 0.0 {
                point.value / candle.close
            } else {
                0.0
            };
            IndicatorPoint {
                timestamp: point.timestamp,
                valid: point.valid && candle.close > 0.0,
                value,
            }
        })
        .collect()
}
