//! Price/candle source port trait.
//!
//! The source is treated as fallible and rate-limited; callers absorb
//! per-symbol failures. `Send + Sync` so independent symbols can be fetched
//! from a bounded worker pool.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::CycletraderError;
use chrono::{DateTime, Utc};

pub trait PricePort: Send + Sync {
    /// The most recent `limit` candles in chronological order.
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, CycletraderError>;

    /// Latest close and its bar timestamp, if any data exists.
    fn latest_price(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(f64, DateTime<Utc>)>, CycletraderError>;
}
