//! Heuristic judgment adapter.
//!
//! Stands in for an external judgment service: a bounded rule over the
//! candidate's own metrics. It cannot time out or fail, so the
//! conservative-default contract of the port is trivially met.

use crate::domain::candidate::Candidate;
use crate::ports::judgment_port::{Decision, JudgmentContext, JudgmentPort, Verdict};

pub struct HeuristicJudgment {
    min_risk_reward: f64,
    min_composite_score: f64,
}

impl HeuristicJudgment {
    pub fn new(min_risk_reward: f64, min_composite_score: f64) -> Self {
        Self {
            min_risk_reward,
            min_composite_score,
        }
    }
}

impl Default for HeuristicJudgment {
    fn default() -> Self {
        Self::new(1.6, 0.45)
    }
}

impl JudgmentPort for HeuristicJudgment {
    fn decide(&self, candidate: &Candidate, _ctx: &JudgmentContext) -> Decision {
        let score_ok = candidate.composite_score >= self.min_composite_score;
        let rr_ok = candidate.risk_reward_ratio >= self.min_risk_reward;

        let buy_score = (candidate.composite_score * 10.0).round().clamp(1.0, 10.0) as i32;
        let min_score = 5;

        if score_ok && rr_ok {
            Decision {
                verdict: Verdict::Entry,
                buy_score,
                min_score,
                rationale: format!(
                    "rr {:.2} and composite {:.2} above entry bar",
                    candidate.risk_reward_ratio, candidate.composite_score
                ),
            }
        } else {
            Decision {
                verdict: Verdict::NoEntry,
                buy_score,
                min_score,
                rationale: format!(
                    "rr {:.2} / composite {:.2} below entry bar",
                    candidate.risk_reward_ratio, candidate.composite_score
                ),
            }
        }
    }
}
