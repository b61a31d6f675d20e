//! Rolling volume statistics.

use crate::domain::candle::Candle;
use crate::domain::indicator::IndicatorPoint;

/// Rolling mean of volume over the trailing `window` bars (inclusive).
pub fn rolling_mean_volume(candles: &[Candle], window: usize) -> Vec<IndicatorPoint> {
    if window == 0 || candles.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::with_capacity(candles.len());
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        sum += candle.volume;
        if i >= window {
            sum -= candles[i - window].volume;
        }
        if i + 1 < window {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: 0.0,
            });
        } else {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: sum / window as f64,
            });
        }
    }

    values
}

/// Current volume over its trailing `window`-bar mean. Zero mean → ratio 0.
pub fn volume_ratio(candles: &[Candle], window: usize) -> Vec<IndicatorPoint> {
    let means = rolling_mean_volume(candles, window);
    means
        .into_iter()
        .zip(candles.iter())
        .map(|(mean, candle)| {
            let value = if mean.valid && mean.value > 0.0 {
                candle.volume / mean.value
            } else {
                0.0
            };
            IndicatorPoint {
                timestamp: mean.timestamp,
                valid: mean.valid && mean.value > 0.0,
                value,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{Candle, Timeframe};
    use chrono::{Duration, TimeZone, Utc};

    fn make_volume_candles(volumes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| Candle {
                symbol: "TEST-USD".into(),
                timeframe: Timeframe::H1,
                timestamp: start + Duration::hours(i as i64),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume,
            })
            .collect()
    }

    #[test]
    fn mean_warmup_and_values() {
        let candles = make_volume_candles(&[10.0, 20.0, 30.0, 40.0]);
        let series = rolling_mean_volume(&candles, 3);

        assert!(!series[0].valid);
        assert!(!series[1].valid);
        assert!((series[2].value - 20.0).abs() < f64::EPSILON);
        assert!((series[3].value - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_against_trailing_mean() {
        let candles = make_volume_candles(&[10.0, 10.0, 10.0, 40.0]);
        let series = volume_ratio(&candles, 3);

        // mean over [10,40,10] window ending at index 3 = [10,10,40]/3 = 20
        assert!(series[3].valid);
        assert!((series[3].value - 40.0 / 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_zero_mean_invalid() {
        let candles = make_volume_candles(&[0.0, 0.0, 0.0]);
        let series = volume_ratio(&candles, 3);
        assert!(!series[2].valid);
        assert!((series[2].value - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_input() {
        assert!(rolling_mean_volume(&[], 3).is_empty());
        let candles = make_volume_candles(&[1.0]);
        assert!(rolling_mean_volume(&candles, 0).is_empty());
    }
}
