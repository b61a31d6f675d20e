//! Trigger reliability grading.
//!
//! A pure recomputation over immutable decision outcomes and closed trades:
//! replaying the same ledger always reproduces the same grades. Nothing in
//! here mutates confidence in place.

use crate::domain::holding::ClosedTrade;
use crate::domain::trigger::TriggerType;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Pending,
    Completed,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Pending => "pending",
            TrackingStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for TrackingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TrackingStatus::Pending),
            "completed" => Ok(TrackingStatus::Completed),
            other => Err(format!("unknown tracking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingHorizon {
    H24,
    H72,
    H168,
}

impl TrackingHorizon {
    pub const ALL: [TrackingHorizon; 3] =
        [TrackingHorizon::H24, TrackingHorizon::H72, TrackingHorizon::H168];

    pub fn hours(&self) -> i64 {
        match self {
            TrackingHorizon::H24 => 24,
            TrackingHorizon::H72 => 72,
            TrackingHorizon::H168 => 168,
        }
    }
}

/// Longer-horizon outcome of one analyzed candidate, traded or not.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedOutcome {
    pub id: Option<i64>,
    pub symbol: String,
    pub trigger_type: TriggerType,
    pub decided_at: DateTime<Utc>,
    pub price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub entered: bool,
    pub return_24h: Option<f64>,
    pub return_72h: Option<f64>,
    pub return_168h: Option<f64>,
    pub hit_target: bool,
    pub hit_stop: bool,
    pub status: TrackingStatus,
}

impl TrackedOutcome {
    /// Earliest horizon that has elapsed but has no return yet.
    pub fn next_due_horizon(&self, now: DateTime<Utc>) -> Option<TrackingHorizon> {
        for horizon in TrackingHorizon::ALL {
            let filled = match horizon {
                TrackingHorizon::H24 => self.return_24h.is_some(),
                TrackingHorizon::H72 => self.return_72h.is_some(),
                TrackingHorizon::H168 => self.return_168h.is_some(),
            };
            if filled {
                continue;
            }
            if now >= self.decided_at + Duration::hours(horizon.hours()) {
                return Some(horizon);
            }
            return None;
        }
        None
    }

    /// Record the observed price at a horizon; completes on the last one.
    pub fn apply_horizon(&mut self, horizon: TrackingHorizon, observed_price: f64) {
        if self.price <= 0.0 || observed_price <= 0.0 {
            return;
        }
        let ret = (observed_price / self.price - 1.0) * 100.0;
        match horizon {
            TrackingHorizon::H24 => self.return_24h = Some(ret),
            TrackingHorizon::H72 => self.return_72h = Some(ret),
            TrackingHorizon::H168 => {
                self.return_168h = Some(ret);
                self.status = TrackingStatus::Completed;
            }
        }
        if self.target_price > 0.0 && observed_price >= self.target_price {
            self.hit_target = true;
        }
        if self.stop_loss > 0.0 && observed_price <= self.stop_loss {
            self.hit_stop = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TriggerReliability {
    pub trigger_type: TriggerType,
    pub tracked: usize,
    pub completed: usize,
    pub analysis_win_rate: f64,
    pub traded: usize,
    pub trade_win_rate: f64,
    pub profit_factor: f64,
    pub grade: Grade,
}

const MIN_COMPLETED_FOR_GRADE: usize = 2;
const GRADE_A_ANALYSIS_WIN: f64 = 0.7;
const GRADE_A_MIN_TRADES: usize = 5;
const GRADE_A_TRADE_WIN: f64 = 0.6;
const GRADE_B_ANALYSIS_WIN: f64 = 0.6;
const GRADE_C_ANALYSIS_WIN: f64 = 0.4;

fn grade(completed: usize, analysis_win: f64, traded: usize, trade_win: f64) -> Grade {
    if completed < MIN_COMPLETED_FOR_GRADE {
        return Grade::D;
    }
    if analysis_win >= GRADE_A_ANALYSIS_WIN
        && traded >= GRADE_A_MIN_TRADES
        && trade_win >= GRADE_A_TRADE_WIN
    {
        return Grade::A;
    }
    if analysis_win >= GRADE_B_ANALYSIS_WIN {
        return Grade::B;
    }
    if analysis_win >= GRADE_C_ANALYSIS_WIN {
        return Grade::C;
    }
    Grade::D
}

fn blank(trigger: TriggerType) -> TriggerReliability {
    TriggerReliability {
        trigger_type: trigger,
        tracked: 0,
        completed: 0,
        analysis_win_rate: 0.0,
        traded: 0,
        trade_win_rate: 0.0,
        profit_factor: 0.0,
        grade: Grade::D,
    }
}

/// Rebuild per-trigger reliability from the ledger. Output is sorted grade
/// first, completed count second, trigger name last for determinism.
pub fn compute_reliability(
    outcomes: &[TrackedOutcome],
    trades: &[ClosedTrade],
) -> Vec<TriggerReliability> {
    let mut by_trigger: HashMap<TriggerType, TriggerReliability> = HashMap::new();

    let mut analysis_wins: HashMap<TriggerType, usize> = HashMap::new();
    for outcome in outcomes {
        let entry = by_trigger
            .entry(outcome.trigger_type)
            .or_insert_with(|| blank(outcome.trigger_type));
        entry.tracked += 1;
        if outcome.status == TrackingStatus::Completed {
            entry.completed += 1;
            let win = outcome
                .return_72h
                .or(outcome.return_168h)
                .map(|r| r > 0.0)
                .unwrap_or(false);
            if win {
                *analysis_wins.entry(outcome.trigger_type).or_insert(0) += 1;
            }
        }
    }

    let mut trade_wins: HashMap<TriggerType, usize> = HashMap::new();
    let mut gross_win: HashMap<TriggerType, f64> = HashMap::new();
    let mut gross_loss: HashMap<TriggerType, f64> = HashMap::new();
    for trade in trades {
        let entry = by_trigger
            .entry(trade.trigger_type)
            .or_insert_with(|| blank(trade.trigger_type));
        entry.traded += 1;
        if trade.realized_pnl_pct > 0.0 {
            *trade_wins.entry(trade.trigger_type).or_insert(0) += 1;
            *gross_win.entry(trade.trigger_type).or_insert(0.0) += trade.realized_pnl_pct;
        } else if trade.realized_pnl_pct < 0.0 {
            *gross_loss.entry(trade.trigger_type).or_insert(0.0) += trade.realized_pnl_pct.abs();
        }
    }

    let mut result: Vec<TriggerReliability> = by_trigger
        .into_values()
        .map(|mut r| {
            r.analysis_win_rate = if r.completed > 0 {
                *analysis_wins.get(&r.trigger_type).unwrap_or(&0) as f64 / r.completed as f64
            } else {
                0.0
            };
            r.trade_win_rate = if r.traded > 0 {
                *trade_wins.get(&r.trigger_type).unwrap_or(&0) as f64 / r.traded as f64
            } else {
                0.0
            };
            let wins = *gross_win.get(&r.trigger_type).unwrap_or(&0.0);
            let losses = *gross_loss.get(&r.trigger_type).unwrap_or(&0.0);
            r.profit_factor = if losses > 0.0 {
                wins / losses
            } else if wins > 0.0 {
                f64::INFINITY
            } else {
                0.0
            };
            r.grade = grade(r.completed, r.analysis_win_rate, r.traded, r.trade_win_rate);
            r
        })
        .collect();

    result.sort_by(|a, b| {
        a.grade
            .cmp(&b.grade)
            .then(b.completed.cmp(&a.completed))
            .then_with(|| a.trigger_type.as_str().cmp(b.trigger_type.as_str()))
    });
    result
}

pub fn best_trigger(reliability: &[TriggerReliability]) -> Option<TriggerType> {
    reliability.first().map(|r| r.trigger_type)
}
