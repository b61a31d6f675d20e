//! Candidate selection: universe filters, ranking, and capacity.
//!
//! Pure functions of the inputs: running the same selection twice over the
//! same state yields an identical admission list.

use crate::domain::candidate::Candidate;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    pub max_positions: usize,
    pub fallback_max_entries: usize,
    pub reentry_cooldown_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    AlreadyHeld,
    CooldownActive { until: DateTime<Utc> },
    NoCapacity,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyHeld => write!(f, "already held"),
            SkipReason::CooldownActive { until } => {
                write!(f, "re-entry cooldown active until {}", until.format("%Y-%m-%d %H:%M:%S"))
            }
            SkipReason::NoCapacity => write!(f, "no capacity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    /// Ordered admission list, strongest first. Never exceeds capacity and
    /// never repeats a symbol.
    pub admitted: Vec<Candidate>,
    /// Candidates retained for tracking with the reason they did not advance.
    pub passed_over: Vec<(Candidate, SkipReason)>,
    pub fallback_used: bool,
}

/// Cooldown check: a symbol sold at T is blocked until T + cooldown.
pub fn cooldown_until(
    symbol: &str,
    last_sells: &HashMap<String, DateTime<Utc>>,
    cooldown_hours: f64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if cooldown_hours <= 0.0 {
        return None;
    }
    let sold_at = last_sells.get(symbol)?;
    let until = *sold_at + Duration::seconds((cooldown_hours * 3600.0) as i64);
    (now < until).then_some(until)
}

fn filter_and_admit(
    candidates: &[Candidate],
    open_symbols: &HashSet<String>,
    last_sells: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
    cfg: &SelectorConfig,
    slots: usize,
    selection: &mut Selection,
) {
    let mut taken: HashSet<String> = selection
        .admitted
        .iter()
        .map(|c| c.symbol.clone())
        .collect();

    for candidate in candidates {
        if taken.contains(&candidate.symbol) {
            continue;
        }
        if open_symbols.contains(&candidate.symbol) {
            selection
                .passed_over
                .push((candidate.clone(), SkipReason::AlreadyHeld));
            continue;
        }
        if let Some(until) =
            cooldown_until(&candidate.symbol, last_sells, cfg.reentry_cooldown_hours, now)
        {
            selection
                .passed_over
                .push((candidate.clone(), SkipReason::CooldownActive { until }));
            continue;
        }
        if selection.admitted.len() >= slots {
            selection
                .passed_over
                .push((candidate.clone(), SkipReason::NoCapacity));
            continue;
        }
        taken.insert(candidate.symbol.clone());
        selection.admitted.push(candidate.clone());
    }
}

/// Composite score descending, risk/reward descending, symbol ascending.
fn ranked(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then(b.risk_reward_ratio.total_cmp(&a.risk_reward_ratio))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    sorted
}

/// Run the selection over the cycle's candidates, falling back to the
/// relaxed set only when no primary candidate survives the filters.
///
/// Guarantees: `admitted.len() ≤ max_positions − open_symbols.len()`, no
/// symbol appears twice, and fallback admissions are additionally capped at
/// `fallback_max_entries`.
pub fn select(
    primary: &[Candidate],
    fallback: &[Candidate],
    open_symbols: &HashSet<String>,
    last_sells: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
    cfg: &SelectorConfig,
) -> Selection {
    let slots = cfg.max_positions.saturating_sub(open_symbols.len());
    let mut selection = Selection::default();

    filter_and_admit(
        &ranked(primary),
        open_symbols,
        last_sells,
        now,
        cfg,
        slots,
        &mut selection,
    );

    if selection.admitted.is_empty() && !fallback.is_empty() {
        let fallback_slots = slots.min(cfg.fallback_max_entries);
        filter_and_admit(
            &ranked(fallback),
            open_symbols,
            last_sells,
            now,
            cfg,
            fallback_slots,
            &mut selection,
        );
        selection.fallback_used = !selection.admitted.is_empty();
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::theme::Theme;
    use crate::domain::trigger::TriggerType;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn candidate(symbol: &str, composite: f64) -> Candidate {
        Candidate {
            symbol: symbol.into(),
            trigger_type: TriggerType::VolumeSurge,
            composite_score: composite,
            agent_fit_score: 0.5,
            current_price: 100.0,
            target_price: 107.2,
            stop_loss: 96.4,
            risk_reward_ratio: 2.0,
            stop_loss_pct: 0.036,
            target_pct: 0.072,
            ret_1_pct: 0.5,
            ret_4_pct: 1.0,
            volume_ratio: 1.5,
            atr_pct: 0.03,
            theme: Theme::Other,
            generated_at: now(),
        }
    }

    fn cfg(max_positions: usize) -> SelectorConfig {
        SelectorConfig {
            max_positions,
            fallback_max_entries: 1,
            reentry_cooldown_hours: 6.0,
        }
    }

    #[test]
    fn admits_up_to_available_slots() {
        // max 3, 2 open, 5 passing candidates → exactly the top-ranked one.
        let primary: Vec<Candidate> = (0..5)
            .map(|i| candidate(&format!("C{i}-USD"), 0.9 - 0.1 * i as f64))
            .collect();
        let open: HashSet<String> = ["A-USD".to_string(), "B-USD".to_string()].into();

        let selection = select(&primary, &[], &open, &HashMap::new(), now(), &cfg(3));
        assert_eq!(selection.admitted.len(), 1);
        assert_eq!(selection.admitted[0].symbol, "C0-USD");
        assert_eq!(
            selection
                .passed_over
                .iter()
                .filter(|(_, r)| *r == SkipReason::NoCapacity)
                .count(),
            4
        );
    }

    #[test]
    fn drops_held_symbols() {
        let primary = vec![candidate("ETH-USD", 0.8), candidate("SOL-USD", 0.7)];
        let open: HashSet<String> = ["ETH-USD".to_string()].into();

        let selection = select(&primary, &[], &open, &HashMap::new(), now(), &cfg(3));
        assert_eq!(selection.admitted.len(), 1);
        assert_eq!(selection.admitted[0].symbol, "SOL-USD");
        assert!(selection
            .passed_over
            .iter()
            .any(|(c, r)| c.symbol == "ETH-USD" && *r == SkipReason::AlreadyHeld));
    }

    #[test]
    fn cooldown_blocks_until_window_elapses() {
        // Sold at 10:00 with a 6h window → blocked before 16:00, free after.
        let sold_at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut last_sells = HashMap::new();
        last_sells.insert("ETH-USD".to_string(), sold_at);
        let primary = vec![candidate("ETH-USD", 0.8)];

        let at_1500 = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        let selection = select(&primary, &[], &HashSet::new(), &last_sells, at_1500, &cfg(3));
        assert!(selection.admitted.is_empty());
        match &selection.passed_over[0].1 {
            SkipReason::CooldownActive { until } => {
                assert_eq!(*until, Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap());
            }
            other => panic!("expected cooldown, got {other:?}"),
        }

        let at_1601 = Utc.with_ymd_and_hms(2024, 3, 1, 16, 1, 0).unwrap();
        let selection = select(&primary, &[], &HashSet::new(), &last_sells, at_1601, &cfg(3));
        assert_eq!(selection.admitted.len(), 1);
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let mut last_sells = HashMap::new();
        last_sells.insert("ETH-USD".to_string(), now());
        let mut config = cfg(3);
        config.reentry_cooldown_hours = 0.0;

        let selection = select(
            &[candidate("ETH-USD", 0.8)],
            &[],
            &HashSet::new(),
            &last_sells,
            now(),
            &config,
        );
        assert_eq!(selection.admitted.len(), 1);
    }

    #[test]
    fn fallback_only_when_primary_empty() {
        let fallback = vec![candidate("FB-USD", 0.3)];

        let selection = select(
            &[candidate("ETH-USD", 0.8)],
            &fallback,
            &HashSet::new(),
            &HashMap::new(),
            now(),
            &cfg(3),
        );
        assert!(!selection.fallback_used);
        assert_eq!(selection.admitted[0].symbol, "ETH-USD");

        let selection = select(&[], &fallback, &HashSet::new(), &HashMap::new(), now(), &cfg(3));
        assert!(selection.fallback_used);
        assert_eq!(selection.admitted[0].symbol, "FB-USD");
    }

    #[test]
    fn fallback_capped_by_fallback_max_entries() {
        let fallback = vec![candidate("F1-USD", 0.4), candidate("F2-USD", 0.3)];
        let selection = select(&[], &fallback, &HashSet::new(), &HashMap::new(), now(), &cfg(3));
        assert_eq!(selection.admitted.len(), 1);
    }

    #[test]
    fn fallback_respects_filters() {
        // Primary filtered out by hold → fallback also filtered; nothing admitted.
        let open: HashSet<String> = ["ETH-USD".to_string()].into();
        let selection = select(
            &[candidate("ETH-USD", 0.8)],
            &[candidate("ETH-USD", 0.4)],
            &open,
            &HashMap::new(),
            now(),
            &cfg(3),
        );
        assert!(selection.admitted.is_empty());
        assert!(!selection.fallback_used);
    }

    #[test]
    fn selection_is_idempotent() {
        let primary = vec![candidate("A-USD", 0.9), candidate("B-USD", 0.8)];
        let open: HashSet<String> = ["C-USD".to_string()].into();
        let mut last_sells = HashMap::new();
        last_sells.insert(
            "B-USD".to_string(),
            Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
        );

        let first = select(&primary, &[], &open, &last_sells, now(), &cfg(3));
        let second = select(&primary, &[], &open, &last_sells, now(), &cfg(3));
        assert_eq!(first, second);
    }

    #[test]
    fn never_double_selects() {
        let primary = vec![candidate("A-USD", 0.9), candidate("A-USD", 0.8)];
        let selection = select(&primary, &[], &HashSet::new(), &HashMap::new(), now(), &cfg(3));
        assert_eq!(selection.admitted.len(), 1);
    }

    #[test]
    fn full_book_admits_nothing() {
        let open: HashSet<String> =
            ["A-USD", "B-USD", "C-USD"].iter().map(|s| s.to_string()).collect();
        let selection = select(
            &[candidate("D-USD", 0.9)],
            &[],
            &open,
            &HashMap::new(),
            now(),
            &cfg(3),
        );
        assert!(selection.admitted.is_empty());
        assert_eq!(selection.passed_over[0].1, SkipReason::NoCapacity);
    }
}
