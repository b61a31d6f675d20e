//! Exit-rule evaluation and slot rotation for open holdings.
//!
//! Pure decision logic: the orchestrator feeds fresh prices and commits the
//! resulting transitions one at a time.

use crate::domain::execution::{ExitReasonType, ExitType};
use crate::domain::holding::{Holding, TrailingConfig};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct ExitRules {
    pub trailing: TrailingConfig,
    /// Unconditional loss cut, percent of entry.
    pub loss_guard_pct: f64,
    /// Take profit after this many hours when in sufficient profit.
    pub time_profit_hours: f64,
    pub time_profit_min_pct: f64,
    /// Clean up losers that have gone nowhere for this long.
    pub stale_hours: f64,
}

impl Default for ExitRules {
    fn default() -> Self {
        ExitRules {
            trailing: TrailingConfig::default(),
            loss_guard_pct: -5.0,
            time_profit_hours: 72.0,
            time_profit_min_pct: 4.0,
            stale_hours: 168.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    /// `None` only for rotation exits.
    pub exit_type: Option<ExitType>,
    pub reason: ExitReasonType,
    pub detail: String,
}

/// Evaluate exit conditions against the current cycle's fresh price.
///
/// Priority order: effective stop (trailing-aware), target, loss guard,
/// time-based take-profit, stale-loser cleanup. Rotation is decided
/// separately by [`plan_rotation`]. Exactly one signal is produced.
pub fn evaluate_exit(
    holding: &Holding,
    price: f64,
    now: DateTime<Utc>,
    rules: &ExitRules,
) -> Option<ExitSignal> {
    if price <= 0.0 || holding.entry_price <= 0.0 {
        return None;
    }

    let profit = holding.profit_pct(price);
    let held_hours = holding.holding_hours(now);

    if holding.stop_loss > 0.0 && price <= holding.stop_loss {
        let detail = if holding.trailing_active(&rules.trailing) && holding.stop_loss > holding.entry_price * 0.999
        {
            format!("trailing stop reached ({price:.6} <= {:.6})", holding.stop_loss)
        } else {
            format!("stop loss reached ({price:.6} <= {:.6})", holding.stop_loss)
        };
        return Some(ExitSignal {
            exit_type: Some(ExitType::StopLoss),
            reason: ExitReasonType::StopLoss,
            detail,
        });
    }

    if holding.target_price > 0.0 && price >= holding.target_price {
        return Some(ExitSignal {
            exit_type: Some(ExitType::TakeProfit),
            reason: ExitReasonType::Normal,
            detail: format!("target reached ({price:.6} >= {:.6})", holding.target_price),
        });
    }

    if profit <= rules.loss_guard_pct {
        return Some(ExitSignal {
            exit_type: Some(ExitType::StopLoss),
            reason: ExitReasonType::StopLoss,
            detail: format!("loss guard triggered ({profit:.2}%)"),
        });
    }

    if held_hours >= rules.time_profit_hours && profit >= rules.time_profit_min_pct {
        return Some(ExitSignal {
            exit_type: Some(ExitType::TakeProfit),
            reason: ExitReasonType::Normal,
            detail: format!("time-based take-profit ({held_hours:.1}h, {profit:.2}%)"),
        });
    }

    if held_hours >= rules.stale_hours && profit < 0.0 {
        return Some(ExitSignal {
            exit_type: Some(ExitType::Breakeven),
            reason: ExitReasonType::Normal,
            detail: format!("stale losing position cleanup ({held_hours:.1}h, {profit:.2}%)"),
        });
    }

    None
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotationPolicy {
    /// New candidate must beat the victim's score by at least this margin.
    pub min_score_delta: f64,
    /// Holdings at or below this pnl are rotated out first.
    pub loss_priority_pct: f64,
    /// Holdings younger than this are never rotated.
    pub min_holding_hours: f64,
    pub max_per_cycle: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy {
            min_score_delta: 0.12,
            loss_priority_pct: -2.0,
            min_holding_hours: 4.0,
            max_per_cycle: 1,
        }
    }
}

/// A holding with its live price, as seen by the rotation planner.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationView {
    pub holding: Holding,
    pub live_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotationPlan {
    pub victim_symbol: String,
    pub detail: String,
}

/// Pick the holding to replace with a stronger candidate when slots are full.
///
/// Eligible victims must trail the new score by at least the configured
/// delta and satisfy the minimum holding age. Among eligible victims,
/// losers below the loss-priority threshold go first, then deeper losses,
/// then weaker scores.
pub fn plan_rotation(
    new_symbol: &str,
    new_score: f64,
    holdings: &[RotationView],
    policy: &RotationPolicy,
    now: DateTime<Utc>,
) -> Result<RotationPlan, String> {
    if holdings.is_empty() {
        return Err("no holdings for rotation".to_string());
    }

    struct Ranked<'a> {
        view: &'a RotationView,
        score: f64,
        profit: f64,
        hours: f64,
    }

    let ranked: Vec<Ranked> = holdings
        .iter()
        .map(|view| Ranked {
            view,
            score: view.holding.entry_score,
            profit: view.holding.profit_pct(view.live_price),
            hours: view.holding.holding_hours(now),
        })
        .collect();

    let mut eligible: Vec<&Ranked> = ranked
        .iter()
        .filter(|r| new_score >= r.score + policy.min_score_delta)
        .filter(|r| r.hours >= policy.min_holding_hours)
        .collect();

    if eligible.is_empty() {
        let too_fresh: Vec<&Ranked> = ranked
            .iter()
            .filter(|r| r.hours < policy.min_holding_hours)
            .collect();
        if let Some(freshest) = too_fresh
            .iter()
            .min_by(|a, b| a.hours.total_cmp(&b.hours))
        {
            return Err(format!(
                "rotation blocked: min holding {:.1}h (freshest {}={:.2}h)",
                policy.min_holding_hours, freshest.view.holding.symbol, freshest.hours
            ));
        }
        let weakest = ranked
            .iter()
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| "no holdings for rotation".to_string())?;
        return Err(format!(
            "rotation blocked: new score {:.3} < weakest + delta ({:.3}+{:.2})",
            new_score, weakest.score, policy.min_score_delta
        ));
    }

    eligible.sort_by(|a, b| {
        let a_key = (
            a.profit >= 0.0,
            a.profit > policy.loss_priority_pct,
        );
        let b_key = (
            b.profit >= 0.0,
            b.profit > policy.loss_priority_pct,
        );
        a_key
            .cmp(&b_key)
            .then(a.profit.total_cmp(&b.profit))
            .then(a.score.total_cmp(&b.score))
    });

    let victim = eligible[0];
    Ok(RotationPlan {
        victim_symbol: victim.view.holding.symbol.clone(),
        detail: format!(
            "rotation replace: {} (score={:.3}, pnl={:.2}%, hold={:.1}h) -> {} (score={:.3})",
            victim.view.holding.symbol, victim.score, victim.profit, victim.hours, new_symbol, new_score
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::holding::HoldingStatus;
    use crate::domain::theme::Theme;
    use crate::domain::trigger::TriggerType;
    use chrono::{Duration, TimeZone};

    fn entry_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn holding(symbol: &str, entry_score: f64) -> Holding {
        Holding {
            symbol: symbol.into(),
            status: HoldingStatus::Open,
            entry_price: 100.0,
            quantity: 1.0,
            quote_amount: 100.0,
            entry_time: entry_time(),
            stop_loss: 95.0,
            target_price: 110.0,
            peak_price: 100.0,
            trigger_type: TriggerType::VolumeSurge,
            theme: Theme::Major,
            entry_score,
        }
    }

    fn hours_later(h: f64) -> DateTime<Utc> {
        entry_time() + Duration::seconds((h * 3600.0) as i64)
    }

    #[test]
    fn stop_loss_exit() {
        let h = holding("ETH-USD", 0.5);
        let signal = evaluate_exit(&h, 94.0, hours_later(1.0), &ExitRules::default()).unwrap();
        assert_eq!(signal.exit_type, Some(ExitType::StopLoss));
        assert_eq!(signal.reason, ExitReasonType::StopLoss);
        assert!(signal.detail.contains("stop loss reached"));
    }

    #[test]
    fn target_exit() {
        let h = holding("ETH-USD", 0.5);
        let signal = evaluate_exit(&h, 111.0, hours_later(1.0), &ExitRules::default()).unwrap();
        assert_eq!(signal.exit_type, Some(ExitType::TakeProfit));
        assert_eq!(signal.reason, ExitReasonType::Normal);
    }

    #[test]
    fn hold_between_stop_and_target() {
        let h = holding("ETH-USD", 0.5);
        assert!(evaluate_exit(&h, 100.0, hours_later(1.0), &ExitRules::default()).is_none());
    }

    #[test]
    fn trailing_retrace_exits_before_original_stop() {
        // Entry 100, stop 95, giveback 5%; prices 100 → 110 → 108 → 90.
        let mut h = holding("ETH-USD", 0.5);
        h.target_price = 120.0;
        let mut rules = ExitRules::default();
        rules.trailing.giveback_pct = 5.0;

        for price in [100.0, 110.0, 108.0] {
            h.refresh_trailing(price, &rules.trailing);
            assert!(evaluate_exit(&h, price, hours_later(1.0), &rules).is_none());
        }
        // Stop ratcheted to 110 × 0.95 = 104.5.
        assert!((h.stop_loss - 104.5).abs() < 1e-9);

        h.refresh_trailing(90.0, &rules.trailing);
        let signal = evaluate_exit(&h, 90.0, hours_later(4.0), &rules).unwrap();
        assert_eq!(signal.exit_type, Some(ExitType::StopLoss));
        assert!(signal.detail.contains("trailing stop reached"));
    }

    #[test]
    fn loss_guard_fires_below_threshold() {
        let mut h = holding("ETH-USD", 0.5);
        h.stop_loss = 0.0;
        let signal = evaluate_exit(&h, 94.0, hours_later(1.0), &ExitRules::default()).unwrap();
        assert_eq!(signal.exit_type, Some(ExitType::StopLoss));
        assert!(signal.detail.contains("loss guard"));
    }

    #[test]
    fn time_based_take_profit() {
        let h = holding("ETH-USD", 0.5);
        // +5% at 80h: above min profit, past the horizon.
        let signal = evaluate_exit(&h, 105.0, hours_later(80.0), &ExitRules::default()).unwrap();
        assert_eq!(signal.exit_type, Some(ExitType::TakeProfit));
        assert!(signal.detail.contains("time-based"));

        // Same price at 10h: hold.
        assert!(evaluate_exit(&h, 105.0, hours_later(10.0), &ExitRules::default()).is_none());
    }

    #[test]
    fn stale_loser_cleanup() {
        let h = holding("ETH-USD", 0.5);
        let signal = evaluate_exit(&h, 98.0, hours_later(170.0), &ExitRules::default()).unwrap();
        assert_eq!(signal.exit_type, Some(ExitType::Breakeven));
        assert_eq!(signal.reason, ExitReasonType::Normal);
        assert!(signal.detail.contains("stale"));
    }

    #[test]
    fn invalid_price_holds() {
        let h = holding("ETH-USD", 0.5);
        assert!(evaluate_exit(&h, 0.0, hours_later(1.0), &ExitRules::default()).is_none());
    }

    fn view(symbol: &str, score: f64, live_price: f64) -> RotationView {
        RotationView {
            holding: holding(symbol, score),
            live_price,
        }
    }

    #[test]
    fn rotation_picks_weakest_loser() {
        let holdings = vec![
            view("WIN-USD", 0.50, 108.0),
            view("LOSE-USD", 0.55, 96.0),
        ];
        let plan = plan_rotation(
            "NEW-USD",
            0.80,
            &holdings,
            &RotationPolicy::default(),
            hours_later(10.0),
        )
        .unwrap();
        // The loser goes first even though its score is higher.
        assert_eq!(plan.victim_symbol, "LOSE-USD");
        assert!(plan.detail.contains("rotation replace"));
    }

    #[test]
    fn rotation_blocked_by_score_delta() {
        let holdings = vec![view("A-USD", 0.70, 100.0)];
        let err = plan_rotation(
            "NEW-USD",
            0.75,
            &holdings,
            &RotationPolicy::default(),
            hours_later(10.0),
        )
        .unwrap_err();
        assert!(err.contains("weakest + delta"));
    }

    #[test]
    fn rotation_blocked_by_min_holding_age() {
        let holdings = vec![view("A-USD", 0.40, 100.0)];
        let err = plan_rotation(
            "NEW-USD",
            0.90,
            &holdings,
            &RotationPolicy::default(),
            hours_later(1.0),
        )
        .unwrap_err();
        assert!(err.contains("min holding"));
    }

    #[test]
    fn rotation_with_no_holdings() {
        let err = plan_rotation(
            "NEW-USD",
            0.9,
            &[],
            &RotationPolicy::default(),
            hours_later(1.0),
        )
        .unwrap_err();
        assert!(err.contains("no holdings"));
    }

    #[test]
    fn rotation_prefers_weaker_score_among_winners() {
        let holdings = vec![
            view("STRONG-USD", 0.60, 105.0),
            view("WEAK-USD", 0.30, 105.0),
        ];
        let plan = plan_rotation(
            "NEW-USD",
            0.90,
            &holdings,
            &RotationPolicy::default(),
            hours_later(10.0),
        )
        .unwrap();
        assert_eq!(plan.victim_symbol, "WEAK-USD");
    }
}
