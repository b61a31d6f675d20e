//! Candidate records produced by the trigger scan.
//!
//! Created fresh each cycle, never mutated; the next cycle's set supersedes
//! this one.

use crate::domain::theme::Theme;
use crate::domain::trigger::TriggerType;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub trigger_type: TriggerType,
    pub composite_score: f64,
    pub agent_fit_score: f64,
    pub current_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub risk_reward_ratio: f64,
    pub stop_loss_pct: f64,
    pub target_pct: f64,
    pub ret_1_pct: f64,
    pub ret_4_pct: f64,
    pub volume_ratio: f64,
    pub atr_pct: f64,
    pub theme: Theme,
    pub generated_at: DateTime<Utc>,
}

/// The candidate file written once per cycle and consumed by tracking.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateBatch {
    pub generated_at: DateTime<Utc>,
    pub timeframe: String,
    pub universe_size: usize,
    pub max_positions: usize,
    pub fallback_max_entries: usize,
    pub fallback_used: bool,
    pub candidates: Vec<Candidate>,
}
