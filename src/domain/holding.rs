//! Holding lifecycle: an open simulated position.
//!
//! At most one non-closed Holding exists per symbol. Status transitions are
//! strictly forward: pending_entry → open → closing → closed. The stop loss
//! only ever ratchets upward via trailing updates.

use crate::domain::execution::{ExitReasonType, ExitType};
use crate::domain::theme::Theme;
use crate::domain::trigger::TriggerType;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingStatus {
    PendingEntry,
    Open,
    Closing,
    Closed,
}

impl HoldingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldingStatus::PendingEntry => "pending_entry",
            HoldingStatus::Open => "open",
            HoldingStatus::Closing => "closing",
            HoldingStatus::Closed => "closed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            HoldingStatus::PendingEntry => 0,
            HoldingStatus::Open => 1,
            HoldingStatus::Closing => 2,
            HoldingStatus::Closed => 3,
        }
    }

    /// Forward-only transitions; `closed` is terminal.
    pub fn can_transition_to(&self, next: HoldingStatus) -> bool {
        next.rank() == self.rank() + 1
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HoldingStatus::Closed)
    }
}

impl fmt::Display for HoldingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HoldingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_entry" => Ok(HoldingStatus::PendingEntry),
            "open" => Ok(HoldingStatus::Open),
            "closing" => Ok(HoldingStatus::Closing),
            "closed" => Ok(HoldingStatus::Closed),
            other => Err(format!("unknown holding status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingConfig {
    /// Profit (percent of entry) at which the trail activates.
    pub activation_profit_pct: f64,
    /// Configured giveback floor from the peak, in percent.
    pub giveback_pct: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        TrailingConfig {
            activation_profit_pct: 3.0,
            giveback_pct: 2.5,
        }
    }
}

impl TrailingConfig {
    /// Trail widens as profit expands to reduce premature exits; the
    /// configured giveback is the floor.
    pub fn effective_giveback_pct(&self, peak_profit_pct: f64) -> f64 {
        let tier = if peak_profit_pct < 8.0 {
            2.5
        } else if peak_profit_pct < 15.0 {
            3.0
        } else {
            4.0
        };
        self.giveback_pct.max(tier)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub status: HoldingStatus,
    pub entry_price: f64,
    pub quantity: f64,
    pub quote_amount: f64,
    pub entry_time: DateTime<Utc>,
    /// Effective stop; ratchets upward, never loosens.
    pub stop_loss: f64,
    pub target_price: f64,
    /// Highest price observed since entry.
    pub peak_price: f64,
    pub trigger_type: TriggerType,
    pub theme: Theme,
    /// Composite score at admission, kept for rotation comparisons.
    pub entry_score: f64,
}

impl Holding {
    pub fn profit_pct(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        (price / self.entry_price - 1.0) * 100.0
    }

    pub fn holding_hours(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.entry_time).num_seconds() as f64 / 3600.0).max(0.0)
    }

    fn peak_profit_pct(&self) -> f64 {
        self.profit_pct(self.peak_price)
    }

    pub fn trailing_active(&self, trailing: &TrailingConfig) -> bool {
        self.peak_profit_pct() >= trailing.activation_profit_pct
    }

    /// Observe the latest price: raise the peak and ratchet the stop from
    /// the trailing reference once the trail is active. The stop is taken
    /// as `max(previous stop, peak × (1 − giveback))`, so it never moves
    /// down even across giveback tiers.
    pub fn refresh_trailing(&mut self, price: f64, trailing: &TrailingConfig) {
        if price <= 0.0 || self.entry_price <= 0.0 {
            return;
        }
        if price > self.peak_price {
            self.peak_price = price;
        }
        if !self.trailing_active(trailing) {
            return;
        }
        let giveback = trailing.effective_giveback_pct(self.peak_profit_pct()) / 100.0;
        let trail_stop = self.peak_price * (1.0 - giveback);
        if trail_stop > self.stop_loss {
            self.stop_loss = trail_stop;
        }
    }
}

/// Terminal exit details frozen onto the holding row at close.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingExit {
    pub exit_price: f64,
    pub realized_pnl_pct: f64,
    pub exit_type: Option<ExitType>,
    pub exit_reason: ExitReasonType,
    pub detail: String,
    pub closed_at: DateTime<Utc>,
}

/// A closed round trip, read back from the store for grading and dashboards.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub trigger_type: TriggerType,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub quote_amount: f64,
    pub realized_pnl_pct: f64,
    pub entry_time: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub exit_type: Option<ExitType>,
    pub exit_reason: ExitReasonType,
}

impl ClosedTrade {
    /// Realized pnl in quote currency.
    pub fn realized_pnl(&self) -> f64 {
        self.quote_amount * self.realized_pnl_pct / 100.0
    }
}
