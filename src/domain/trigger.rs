//! Trigger predicates and thresholds.
//!
//! Each trigger is independently evaluable against a [`SymbolSnapshot`] and
//! yields a normalized strength in [0, 1]. Strengths use fixed saturating
//! caps rather than cross-sectional normalization, so a strictly stronger
//! input never lowers the strength.

use crate::domain::scoring::saturate;
use crate::domain::snapshot::SymbolSnapshot;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    VolumeSurge,
    Breakout,
    VolatilityExpansion,
    MomentumContinuation,
}

pub const ALL_TRIGGERS: [TriggerType; 4] = [
    TriggerType::VolumeSurge,
    TriggerType::Breakout,
    TriggerType::VolatilityExpansion,
    TriggerType::MomentumContinuation,
];

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::VolumeSurge => "volume_surge",
            TriggerType::Breakout => "breakout",
            TriggerType::VolatilityExpansion => "volatility_expansion",
            TriggerType::MomentumContinuation => "momentum_continuation",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "volume_surge" => Ok(TriggerType::VolumeSurge),
            "breakout" => Ok(TriggerType::Breakout),
            "volatility_expansion" => Ok(TriggerType::VolatilityExpansion),
            "momentum_continuation" => Ok(TriggerType::MomentumContinuation),
            other => Err(format!("unknown trigger type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerThresholds {
    pub volume_ratio_min: f64,
    pub ret1_min_pct: f64,
    pub ret4_min_pct: f64,
    pub breakout_volume_ratio_min: f64,
    pub volatility_tightening_factor: f64,
    /// Anti-chase cap: reject momentum continuation when the lookback return
    /// already exceeds this multiple of ATR.
    pub anti_chase_atr_mult: f64,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        TriggerThresholds {
            volume_ratio_min: 1.20,
            ret1_min_pct: 0.15,
            ret4_min_pct: 0.25,
            breakout_volume_ratio_min: 1.10,
            volatility_tightening_factor: 0.25,
            anti_chase_atr_mult: 4.0,
        }
    }
}

const MAX_TIGHTEN: f64 = 0.25;

/// Tighten base thresholds when the batch-median ATR expansion signals an
/// overheated market. The tightening is capped so thresholds stay bounded.
pub fn effective_thresholds(
    snapshots: &[SymbolSnapshot],
    base: &TriggerThresholds,
) -> TriggerThresholds {
    if snapshots.is_empty() {
        return base.clone();
    }

    let mut expansions: Vec<f64> = snapshots.iter().map(|s| s.atr_expansion).collect();
    expansions.sort_by(|a, b| a.total_cmp(b));
    let mid = expansions.len() / 2;
    let median = if expansions.len() % 2 == 0 {
        (expansions[mid - 1] + expansions[mid]) / 2.0
    } else {
        expansions[mid]
    };

    let overheat = (median - 1.0).max(0.0);
    let tighten = (overheat * base.volatility_tightening_factor.max(0.0)).min(MAX_TIGHTEN);

    TriggerThresholds {
        volume_ratio_min: base.volume_ratio_min * (1.0 + tighten),
        ret1_min_pct: base.ret1_min_pct * (1.0 + tighten),
        ret4_min_pct: base.ret4_min_pct * (1.0 + tighten),
        breakout_volume_ratio_min: base.breakout_volume_ratio_min * (1.0 + tighten),
        volatility_tightening_factor: base.volatility_tightening_factor,
        anti_chase_atr_mult: base.anti_chase_atr_mult,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSignal {
    pub trigger: TriggerType,
    pub strength: f64,
}

// Saturation caps for strength components.
const VOLUME_RATIO_CAP: f64 = 2.5;
const RET1_CAP: f64 = 2.0;
const RET4_CAP: f64 = 5.0;
const BREAKOUT_CAP: f64 = 2.0;
const EXPANSION_CAP: f64 = 1.0;
const TREND_GAP_CAP: f64 = 5.0;

// Breakout tolerance: a close within 0.05% of the prior high counts.
const BREAKOUT_MIN_PCT: f64 = -0.05;

/// Evaluate every trigger against one snapshot.
pub fn evaluate(snapshot: &SymbolSnapshot, thresholds: &TriggerThresholds) -> Vec<TriggerSignal> {
    let mut fired = Vec::new();

    if snapshot.volume_ratio >= thresholds.volume_ratio_min
        && snapshot.ret_1_pct >= thresholds.ret1_min_pct
        && snapshot.ema_fast_above_slow
    {
        let strength = 0.55 * saturate(snapshot.volume_ratio, VOLUME_RATIO_CAP)
            + 0.45 * saturate(snapshot.ret_1_pct, RET1_CAP);
        fired.push(TriggerSignal {
            trigger: TriggerType::VolumeSurge,
            strength,
        });
    }

    if snapshot.breakout_pct >= BREAKOUT_MIN_PCT
        && snapshot.volume_ratio >= thresholds.breakout_volume_ratio_min
        && snapshot.ret_1_pct >= 0.0
    {
        let strength = 0.55 * saturate(snapshot.breakout_pct - BREAKOUT_MIN_PCT, BREAKOUT_CAP)
            + 0.45 * saturate(snapshot.volume_ratio, VOLUME_RATIO_CAP);
        fired.push(TriggerSignal {
            trigger: TriggerType::Breakout,
            strength,
        });
    }

    if snapshot.atr_expansion >= 1.0 && snapshot.ema_fast_above_slow {
        let strength = 0.55 * saturate(snapshot.atr_expansion - 1.0, EXPANSION_CAP)
            + 0.45 * saturate(snapshot.trend_gap_pct, TREND_GAP_CAP);
        fired.push(TriggerSignal {
            trigger: TriggerType::VolatilityExpansion,
            strength,
        });
    }

    let chase_cap_pct = thresholds.anti_chase_atr_mult * snapshot.atr_pct * 100.0;
    if snapshot.ret_4_pct >= thresholds.ret4_min_pct
        && snapshot.ema_fast_above_slow
        && snapshot.ret_4_pct <= chase_cap_pct
    {
        let strength = 0.65 * saturate(snapshot.ret_4_pct, RET4_CAP)
            + 0.35 * saturate(snapshot.volume_ratio, VOLUME_RATIO_CAP);
        fired.push(TriggerSignal {
            trigger: TriggerType::MomentumContinuation,
            strength,
        });
    }

    fired
}

/// The strongest signal among those fired. Equal strengths resolve to the
/// later entry in the fired list, which is deterministic for a fixed
/// threshold set.
pub fn strongest(signals: &[TriggerSignal]) -> Option<TriggerSignal> {
    signals
        .iter()
        .copied()
        .max_by(|a, b| a.strength.total_cmp(&b.strength))
}
