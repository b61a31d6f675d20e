//! Candidate scoring and derived risk fields.
//!
//! Scores combine saturating transforms of signal inputs so every score is
//! deterministic per symbol and monotonic non-decreasing in its positive
//! inputs. `composite_score` ranks raw trigger strength plus liquidity;
//! `agent_fit_score` folds in the achievable risk/reward net of estimated
//! round-trip cost drag.

use crate::domain::snapshot::SymbolSnapshot;

/// Clamp `x / cap` into [0, 1]. Negative inputs floor at zero.
pub fn saturate(x: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        return 0.0;
    }
    (x / cap).clamp(0.0, 1.0)
}

const LIQUIDITY_CAP: f64 = 2.5;
const RISK_REWARD_CAP: f64 = 2.0;

const STOP_ATR_MULT: f64 = 1.2;
const STOP_FLOOR_PCT: f64 = 0.02;
const STOP_CEIL_PCT: f64 = 0.06;
const TARGET_STOP_MULT: f64 = 2.0;
const TARGET_FLOOR_PCT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskFields {
    /// Stop distance as a fraction of price.
    pub stop_loss_pct: f64,
    /// Target distance as a fraction of price.
    pub target_pct: f64,
    pub risk_reward: f64,
    pub stop_loss_price: f64,
    pub target_price: f64,
}

/// Volatility-normalized stop and target:
/// stop = clamp(1.2 × ATR%, 2%, 6%), target = max(2 × stop, 5%).
pub fn risk_fields(price: f64, atr_pct: f64) -> RiskFields {
    let stop_loss_pct = (STOP_ATR_MULT * atr_pct.max(0.0)).clamp(STOP_FLOOR_PCT, STOP_CEIL_PCT);
    let target_pct = (TARGET_STOP_MULT * stop_loss_pct).max(TARGET_FLOOR_PCT);
    let risk_reward = target_pct / stop_loss_pct;

    RiskFields {
        stop_loss_pct,
        target_pct,
        risk_reward,
        stop_loss_price: price * (1.0 - stop_loss_pct),
        target_price: price * (1.0 + target_pct),
    }
}

/// Rank key for candidate ordering: trigger strength blended with liquidity.
pub fn composite_score(snapshot: &SymbolSnapshot, trigger_strength: f64) -> f64 {
    0.70 * trigger_strength.clamp(0.0, 1.0) + 0.30 * saturate(snapshot.volume_ratio, LIQUIDITY_CAP)
}

/// Fit of the candidate for slot capital: achievable risk/reward after the
/// estimated round-trip cost drag, blended with liquidity.
pub fn agent_fit_score(risk: &RiskFields, volume_ratio: f64, cost_drag_pct: f64) -> f64 {
    let net_target_pct = (risk.target_pct - cost_drag_pct.max(0.0) / 100.0).max(0.0);
    let net_risk_reward = if risk.stop_loss_pct > 0.0 {
        net_target_pct / risk.stop_loss_pct
    } else {
        0.0
    };
    0.65 * saturate(net_risk_reward, RISK_REWARD_CAP) + 0.35 * saturate(volume_ratio, LIQUIDITY_CAP)
}
