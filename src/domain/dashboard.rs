//! Read-side dashboard projection.
//!
//! A pure function over store reads: recent cycle health, open holdings with
//! unrealized pnl, the recent execution tape, trigger reliability, and a
//! summary return versus a buy-and-hold benchmark. Regenerated on demand;
//! never part of the write path.

use crate::domain::cycle::CycleRun;
use crate::domain::execution::OrderExecution;
use crate::domain::holding::{ClosedTrade, Holding};
use crate::domain::reliability::{best_trigger, compute_reliability, TrackedOutcome, TriggerReliability};
use crate::domain::theme::Theme;
use crate::domain::trigger::TriggerType;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HoldingView {
    pub symbol: String,
    pub trigger_type: TriggerType,
    pub theme: Theme,
    pub status: String,
    pub entry_price: f64,
    pub current_price: Option<f64>,
    pub unrealized_pnl_pct: Option<f64>,
    pub stop_loss: f64,
    pub target_price: f64,
    pub entry_time: DateTime<Utc>,
    pub holding_hours: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Summary {
    pub closed_trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub avg_pnl_pct: f64,
    /// Realized pnl in quote currency across all closed trades.
    pub total_realized_pnl: f64,
    /// Realized pnl over deployed equity (quote amount × max positions).
    pub return_on_deployed_pct: f64,
    pub benchmark_symbol: String,
    pub benchmark_return_pct: Option<f64>,
    /// Strategy return minus benchmark return over the same window.
    pub alpha_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub cycles: Vec<CycleRun>,
    pub holdings: Vec<HoldingView>,
    pub executions: Vec<OrderExecution>,
    pub trigger_reliability: Vec<TriggerReliability>,
    pub best_trigger: Option<TriggerType>,
    pub summary: Summary,
}

#[allow(clippy::too_many_arguments)]
pub fn build_dashboard(
    generated_at: DateTime<Utc>,
    cycles: Vec<CycleRun>,
    holdings: &[(Holding, Option<f64>)],
    executions: Vec<OrderExecution>,
    outcomes: &[TrackedOutcome],
    trades: &[ClosedTrade],
    benchmark_symbol: &str,
    benchmark_window: Option<(f64, f64)>,
    deployed_equity: f64,
) -> DashboardSnapshot {
    let holding_views: Vec<HoldingView> = holdings
        .iter()
        .map(|(holding, price)| HoldingView {
            symbol: holding.symbol.clone(),
            trigger_type: holding.trigger_type,
            theme: holding.theme,
            status: holding.status.as_str().to_string(),
            entry_price: holding.entry_price,
            current_price: *price,
            unrealized_pnl_pct: price.map(|p| holding.profit_pct(p)),
            stop_loss: holding.stop_loss,
            target_price: holding.target_price,
            entry_time: holding.entry_time,
            holding_hours: holding.holding_hours(generated_at),
        })
        .collect();

    let closed = trades.len();
    let wins = trades.iter().filter(|t| t.realized_pnl_pct > 0.0).count();
    let win_rate = if closed > 0 {
        wins as f64 / closed as f64
    } else {
        0.0
    };
    let avg_pnl_pct = if closed > 0 {
        trades.iter().map(|t| t.realized_pnl_pct).sum::<f64>() / closed as f64
    } else {
        0.0
    };
    let total_realized_pnl: f64 = trades.iter().map(|t| t.realized_pnl()).sum();
    let return_on_deployed_pct = if deployed_equity > 0.0 {
        total_realized_pnl / deployed_equity * 100.0
    } else {
        0.0
    };

    let benchmark_return_pct = benchmark_window.and_then(|(first, last)| {
        (first > 0.0).then(|| (last / first - 1.0) * 100.0)
    });
    let alpha_pct = benchmark_return_pct.map(|b| return_on_deployed_pct - b);

    let reliability = compute_reliability(outcomes, trades);
    let best = best_trigger(&reliability);

    DashboardSnapshot {
        generated_at,
        cycles,
        holdings: holding_views,
        executions,
        trigger_reliability: reliability,
        best_trigger: best,
        summary: Summary {
            closed_trades: closed,
            wins,
            win_rate,
            avg_pnl_pct,
            total_realized_pnl,
            return_on_deployed_pct,
            benchmark_symbol: benchmark_symbol.to_string(),
            benchmark_return_pct,
            alpha_pct,
        },
    }
}
