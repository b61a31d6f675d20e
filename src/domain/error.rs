//! Domain error types.

/// Top-level error type for cycletrader.
#[derive(Debug, thiserror::Error)]
pub enum CycletraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price fetch failed for {symbol}: {reason}")]
    PriceFetch { symbol: String, reason: String },

    #[error("insufficient candle history for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CycletraderError> for std::process::ExitCode {
    fn from(err: &CycletraderError) -> Self {
        let code: u8 = match err {
            CycletraderError::Io(_) => 1,
            CycletraderError::ConfigParse { .. }
            | CycletraderError::ConfigMissing { .. }
            | CycletraderError::ConfigInvalid { .. } => 2,
            CycletraderError::Database { .. } | CycletraderError::DatabaseQuery { .. } => 3,
            CycletraderError::OrderRejected { .. } => 4,
            CycletraderError::PriceFetch { .. } | CycletraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
