//! Cross-cutting risk policy consulted before entries and exits.
//!
//! Entry vetoes are recorded as rejected attempts, never as cycle failures.
//! A stale feed freezes held positions rather than force-exiting them.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub max_positions: usize,
    /// Kill switch: realized loss over the current UTC day, as a percent of
    /// deployed equity, beyond which new entries are rejected.
    pub daily_loss_limit_pct: f64,
    /// A feed older than this freezes the symbol for the cycle.
    pub feed_max_age_hours: f64,
    /// Fill deviation from the reference price beyond this cancels the order.
    pub slippage_tolerance_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_positions: 3,
            daily_loss_limit_pct: 5.0,
            feed_max_age_hours: 3.0,
            slippage_tolerance_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryVeto {
    KillSwitch { daily_loss_pct: f64 },
    MaxPositions { open: usize },
    FeedStale { age_hours: f64 },
    StoppedOutThisCycle,
}

impl fmt::Display for EntryVeto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryVeto::KillSwitch { daily_loss_pct } => {
                write!(f, "kill switch active (daily loss {daily_loss_pct:.2}%)")
            }
            EntryVeto::MaxPositions { open } => {
                write!(f, "max concurrent positions reached ({open} open)")
            }
            EntryVeto::FeedStale { age_hours } => {
                write!(f, "price feed stale ({age_hours:.1}h old)")
            }
            EntryVeto::StoppedOutThisCycle => {
                write!(f, "stopped out this cycle, immediate re-entry blocked")
            }
        }
    }
}

/// Per-cycle inputs the guard evaluates against.
#[derive(Debug, Clone)]
pub struct RiskContext {
    pub open_positions: usize,
    /// Realized pnl in quote currency since UTC midnight; negative = loss.
    pub daily_realized_pnl: f64,
    /// Deployed equity base (quote amount × max positions).
    pub equity: f64,
    /// Symbols closed via stop loss earlier in this same cycle.
    pub stopped_out: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct RiskGuard {
    cfg: RiskConfig,
}

impl RiskGuard {
    pub fn new(cfg: RiskConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.cfg
    }

    fn daily_loss_pct(&self, ctx: &RiskContext) -> f64 {
        if ctx.equity <= 0.0 {
            return 0.0;
        }
        (-ctx.daily_realized_pnl / ctx.equity * 100.0).max(0.0)
    }

    /// Gate applied to every entry, primary and fallback alike.
    pub fn check_entry(
        &self,
        symbol: &str,
        feed_age_hours: Option<f64>,
        ctx: &RiskContext,
    ) -> Result<(), EntryVeto> {
        let daily_loss_pct = self.daily_loss_pct(ctx);
        if daily_loss_pct >= self.cfg.daily_loss_limit_pct {
            return Err(EntryVeto::KillSwitch { daily_loss_pct });
        }
        if ctx.open_positions >= self.cfg.max_positions {
            return Err(EntryVeto::MaxPositions {
                open: ctx.open_positions,
            });
        }
        match feed_age_hours {
            Some(age) if age <= self.cfg.feed_max_age_hours => {}
            Some(age) => return Err(EntryVeto::FeedStale { age_hours: age }),
            None => return Err(EntryVeto::FeedStale { age_hours: f64::INFINITY }),
        }
        if ctx.stopped_out.contains(symbol) {
            return Err(EntryVeto::StoppedOutThisCycle);
        }
        Ok(())
    }

    /// Exits are only gated by feed health: stale data freezes the holding.
    pub fn allows_exit(&self, feed_age_hours: Option<f64>) -> bool {
        matches!(feed_age_hours, Some(age) if age <= self.cfg.feed_max_age_hours)
    }

    /// Slippage guard at the execution boundary: whole-order cancel when the
    /// fill deviates from the reference beyond tolerance.
    pub fn fill_within_tolerance(&self, reference_price: f64, executed_price: f64) -> bool {
        if reference_price <= 0.0 {
            return false;
        }
        let deviation_pct = ((executed_price - reference_price) / reference_price).abs() * 100.0;
        deviation_pct <= self.cfg.slippage_tolerance_pct
    }
}

/// Feed age in hours from the newest candle timestamp.
pub fn feed_age_hours(last_candle: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
    let ts = last_candle?;
    let age = now - ts;
    Some(age.max(Duration::zero()).num_seconds() as f64 / 3600.0)
}
