//! Configuration validation.
//!
//! Runs before any fetch or store write: invalid thresholds fail fast with
//! a config error rather than surfacing mid-cycle.

use crate::domain::candle::Timeframe;
use crate::domain::error::CycletraderError;
use crate::ports::config_port::ConfigPort;

pub fn validate_cycle_config(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    validate_timeframe(config)?;
    validate_interval(config)?;
    validate_positions(config)?;
    validate_quote_amount(config)?;
    validate_cooldown(config)?;
    validate_thresholds(config)?;
    validate_risk(config)?;
    validate_execution(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> CycletraderError {
    CycletraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    if let Some(value) = config.get_string("cycle", "timeframe") {
        value
            .parse::<Timeframe>()
            .map_err(|reason| invalid("cycle", "timeframe", &reason))?;
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    let interval = config.get_int("cycle", "interval_hours", 1);
    if !(1..=24).contains(&interval) {
        return Err(invalid(
            "cycle",
            "interval_hours",
            "interval_hours must be between 1 and 24",
        ));
    }
    let lookback = config.get_int("cycle", "lookback_bars", 120);
    if lookback < crate::domain::snapshot::MIN_SNAPSHOT_BARS as i64 {
        return Err(invalid(
            "cycle",
            "lookback_bars",
            "lookback_bars below the minimum snapshot history",
        ));
    }
    Ok(())
}

fn validate_positions(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    let max_positions = config.get_int("cycle", "max_positions", 3);
    if max_positions < 1 {
        return Err(invalid("cycle", "max_positions", "max_positions must be at least 1"));
    }
    let fallback = config.get_int("cycle", "fallback_max_entries", 1);
    if fallback < 1 {
        return Err(invalid(
            "cycle",
            "fallback_max_entries",
            "fallback_max_entries must be at least 1",
        ));
    }
    if fallback > max_positions {
        return Err(invalid(
            "cycle",
            "fallback_max_entries",
            "fallback_max_entries cannot exceed max_positions",
        ));
    }
    Ok(())
}

fn validate_quote_amount(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    let quote = config.get_double("cycle", "quote_amount", 100.0);
    if quote <= 0.0 {
        return Err(invalid("cycle", "quote_amount", "quote_amount must be positive"));
    }
    Ok(())
}

fn validate_cooldown(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    let cooldown = config.get_double("cycle", "rotation_reentry_cooldown_hours", 6.0);
    if cooldown < 0.0 {
        return Err(invalid(
            "cycle",
            "rotation_reentry_cooldown_hours",
            "cooldown must be non-negative",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    for key in [
        "volume_ratio_min",
        "ret1_min_pct",
        "ret4_min_pct",
        "breakout_volume_ratio_min",
        "volatility_tightening_factor",
        "anti_chase_atr_mult",
    ] {
        let value = config.get_double("triggers", key, 0.0);
        if value < 0.0 {
            return Err(invalid("triggers", key, "threshold must be non-negative"));
        }
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    let daily_loss = config.get_double("risk", "daily_loss_limit_pct", 5.0);
    if daily_loss <= 0.0 {
        return Err(invalid(
            "risk",
            "daily_loss_limit_pct",
            "daily_loss_limit_pct must be positive",
        ));
    }
    let feed_age = config.get_double("risk", "feed_max_age_hours", 3.0);
    if feed_age <= 0.0 {
        return Err(invalid(
            "risk",
            "feed_max_age_hours",
            "feed_max_age_hours must be positive",
        ));
    }
    let tolerance = config.get_double("risk", "slippage_tolerance_pct", 1.0);
    if tolerance <= 0.0 {
        return Err(invalid(
            "risk",
            "slippage_tolerance_pct",
            "slippage_tolerance_pct must be positive",
        ));
    }
    Ok(())
}

fn validate_execution(config: &dyn ConfigPort) -> Result<(), CycletraderError> {
    let fee = config.get_double("execution", "fee_rate_pct", 0.1);
    if fee < 0.0 {
        return Err(invalid("execution", "fee_rate_pct", "fee_rate_pct must be non-negative"));
    }
    let slippage = config.get_double("execution", "slippage_rate_pct", 0.05);
    if slippage < 0.0 {
        return Err(invalid(
            "execution",
            "slippage_rate_pct",
            "slippage_rate_pct must be non-negative",
        ));
    }
    match config
        .get_string("execution", "trade_mode")
        .unwrap_or_else(|| "paper".to_string())
        .as_str()
    {
        "paper" => Ok(()),
        "live" => Err(invalid(
            "execution",
            "trade_mode",
            "live trading is not supported; use paper",
        )),
        other => Err(invalid(
            "execution",
            "trade_mode",
            &format!("unknown trade_mode: {other}"),
        )),
    }
}
