//! Technical indicator implementations.
//!
//! Each indicator produces a series of [`IndicatorPoint`]s positionally
//! aligned with its input candle slice. Warmup bars are marked invalid.
//! Series operate positionally, so short gaps in the candle sequence are
//! tolerated rather than rejected.

pub mod ema;
pub mod atr;
pub mod volume;
pub mod range;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: f64,
}
