//! Trigger scan: snapshots in, ranked candidates out.

use crate::domain::candidate::Candidate;
use crate::domain::scoring::{agent_fit_score, composite_score, risk_fields, saturate};
use crate::domain::snapshot::SymbolSnapshot;
use crate::domain::trigger::{evaluate, strongest, TriggerThresholds, TriggerType};
use chrono::{DateTime, Utc};

/// Candidate ordering: composite score descending, risk/reward descending,
/// then lexical symbol order for determinism.
fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then(b.risk_reward_ratio.total_cmp(&a.risk_reward_ratio))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

fn to_candidate(
    snapshot: &SymbolSnapshot,
    trigger: TriggerType,
    strength: f64,
    cost_drag_pct: f64,
    generated_at: DateTime<Utc>,
) -> Candidate {
    let risk = risk_fields(snapshot.close, snapshot.atr_pct);
    Candidate {
        symbol: snapshot.symbol.clone(),
        trigger_type: trigger,
        composite_score: composite_score(snapshot, strength),
        agent_fit_score: agent_fit_score(&risk, snapshot.volume_ratio, cost_drag_pct),
        current_price: snapshot.close,
        target_price: risk.target_price,
        stop_loss: risk.stop_loss_price,
        risk_reward_ratio: risk.risk_reward,
        stop_loss_pct: risk.stop_loss_pct,
        target_pct: risk.target_pct,
        ret_1_pct: snapshot.ret_1_pct,
        ret_4_pct: snapshot.ret_4_pct,
        volume_ratio: snapshot.volume_ratio,
        atr_pct: snapshot.atr_pct,
        theme: snapshot.theme,
        generated_at,
    }
}

/// Evaluate triggers over the whole snapshot batch. One candidate per symbol
/// that fired at least one trigger, carrying the strongest trigger type.
pub fn scan(
    snapshots: &[SymbolSnapshot],
    thresholds: &TriggerThresholds,
    cost_drag_pct: f64,
    generated_at: DateTime<Utc>,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = snapshots
        .iter()
        .filter_map(|snapshot| {
            let signals = evaluate(snapshot, thresholds);
            let best = strongest(&signals)?;
            Some(to_candidate(
                snapshot,
                best.trigger,
                best.strength,
                cost_drag_pct,
                generated_at,
            ))
        })
        .collect();

    rank(&mut candidates);
    candidates
}

const FALLBACK_MIN_VOLUME_RATIO: f64 = 0.9;

/// Relaxed scan used when every strict trigger comes up empty: prefer
/// trend-aligned, adequately liquid symbols ranked by a liquidity-weighted
/// momentum blend. Bounded by `limit`; subject to the same downstream risk
/// checks as primary candidates.
pub fn fallback_scan(
    snapshots: &[SymbolSnapshot],
    limit: usize,
    cost_drag_pct: f64,
    generated_at: DateTime<Utc>,
) -> Vec<Candidate> {
    if limit == 0 {
        return Vec::new();
    }

    let preferred: Vec<&SymbolSnapshot> = snapshots
        .iter()
        .filter(|s| s.ema_fast_above_slow && s.volume_ratio >= FALLBACK_MIN_VOLUME_RATIO)
        .collect();

    let pool: Vec<&SymbolSnapshot> = if preferred.is_empty() {
        snapshots.iter().collect()
    } else {
        preferred
    };

    let mut candidates: Vec<Candidate> = pool
        .into_iter()
        .map(|snapshot| {
            let strength = 0.45 * saturate(snapshot.quote_volume, 1e9)
                + 0.25 * saturate(snapshot.volume_ratio, 2.5)
                + 0.20 * saturate(snapshot.ret_4_pct, 5.0)
                + 0.10 * saturate(snapshot.trend_gap_pct, 5.0);
            to_candidate(
                snapshot,
                TriggerType::MomentumContinuation,
                strength,
                cost_drag_pct,
                generated_at,
            )
        })
        .collect();

    rank(&mut candidates);
    candidates.truncate(limit);
    candidates
}
