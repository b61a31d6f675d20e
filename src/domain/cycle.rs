//! Cycle orchestration: one end-to-end scan/decide/execute/persist run.
//!
//! Every invocation is bracketed by a CycleRun row (running → success,
//! failed, or aborted) and the store-owned cycle lock, so concurrent
//! invocations abort instead of racing. Per-symbol failures are absorbed;
//! only store or configuration errors fail the cycle. Each holding
//! transition is committed individually, so a mid-cycle failure leaves a
//! consistent, if incomplete, state.

use crate::domain::candidate::{Candidate, CandidateBatch};
use crate::domain::candle::{Candle, Timeframe};
use crate::domain::engine::{fallback_scan, scan};
use crate::domain::error::CycletraderError;
use crate::domain::execution::{realized_pnl_pct, ExitReasonType, ExitType, OrderExecution, OrderStatus, Side};
use crate::domain::holding::{Holding, HoldingExit, HoldingStatus};
use crate::domain::position_manager::{
    evaluate_exit, plan_rotation, ExitRules, ExitSignal, RotationPolicy, RotationView,
};
use crate::domain::risk::{feed_age_hours, EntryVeto, RiskConfig, RiskContext, RiskGuard};
use crate::domain::selector::{select, Selection, SelectorConfig, SkipReason};
use crate::domain::snapshot::{build_snapshot, SymbolSnapshot};
use crate::domain::theme::classify_symbol_theme;
use crate::domain::trigger::{effective_thresholds, TriggerThresholds, TriggerType};
use crate::domain::universe::{apply_exclusions, DEFAULT_SYMBOLS};
use crate::domain::reliability::{TrackedOutcome, TrackingStatus};
use crate::ports::execution_port::{ExecutionPort, OrderOutcome};
use crate::ports::judgment_port::{JudgmentContext, JudgmentPort, Verdict};
use crate::ports::price_port::PricePort;
use crate::ports::store_port::StorePort;
use chrono::{DateTime, Timelike, Utc};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Running,
    Success,
    Failed,
    Aborted,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Running => "running",
            CycleStatus::Success => "success",
            CycleStatus::Failed => "failed",
            CycleStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(CycleStatus::Running),
            "success" => Ok(CycleStatus::Success),
            "failed" => Ok(CycleStatus::Failed),
            "aborted" => Ok(CycleStatus::Aborted),
            other => Err(format!("unknown cycle status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CycleCounts {
    pub entries: usize,
    pub no_entries: usize,
    pub sold: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CycleRun {
    pub id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: CycleStatus,
    pub counts: CycleCounts,
    pub error: Option<String>,
}

/// One row per analyzed candidate: what was decided and why.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub symbol: String,
    pub decided_at: DateTime<Utc>,
    pub price: f64,
    pub verdict: Verdict,
    pub skip_reason: Option<String>,
    pub target_price: f64,
    pub stop_loss: f64,
    pub risk_reward: f64,
    pub trigger_type: TriggerType,
    pub composite_score: f64,
    pub agent_fit_score: f64,
    pub buy_score: i32,
    pub min_score: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub timeframe: Timeframe,
    pub interval_hours: u32,
    pub lookback_bars: usize,
    pub symbols: Vec<String>,
    pub exclude_symbols: Vec<String>,
    pub max_positions: usize,
    pub fallback_max_entries: usize,
    pub quote_amount: f64,
    pub reentry_cooldown_hours: f64,
    pub fetch_workers: usize,
    pub thresholds: TriggerThresholds,
    pub exit_rules: ExitRules,
    pub rotation: RotationPolicy,
    pub risk: RiskConfig,
    /// Estimated round-trip fee + slippage drag, percent, for fit scoring.
    pub cost_drag_pct: f64,
    pub lock_ttl_secs: i64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig {
            timeframe: Timeframe::H1,
            interval_hours: 1,
            lookback_bars: 120,
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            exclude_symbols: Vec::new(),
            max_positions: 3,
            fallback_max_entries: 1,
            quote_amount: 100.0,
            reentry_cooldown_hours: 6.0,
            fetch_workers: 4,
            thresholds: TriggerThresholds::default(),
            exit_rules: ExitRules::default(),
            rotation: RotationPolicy::default(),
            risk: RiskConfig::default(),
            cost_drag_pct: 0.3,
            lock_ttl_secs: 3600,
        }
    }
}

/// Misfire safety: an invocation outside the hour-modulo cadence is a no-op.
pub fn cadence_due(now: DateTime<Utc>, interval_hours: u32) -> bool {
    interval_hours <= 1 || now.hour() % interval_hours == 0
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Off-cadence invocation; nothing ran, nothing recorded.
    Skipped { reason: String },
    /// Another cycle holds the lock.
    Aborted { run: CycleRun },
    Completed {
        run: CycleRun,
        batch: CandidateBatch,
    },
}

pub struct Orchestrator<'a> {
    pub price: &'a dyn PricePort,
    pub store: &'a dyn StorePort,
    pub execution: &'a dyn ExecutionPort,
    pub judgment: &'a dyn JudgmentPort,
    pub cfg: &'a CycleConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn run(&self, now: DateTime<Utc>, force: bool) -> Result<CycleOutcome, CycletraderError> {
        if !force && !cadence_due(now, self.cfg.interval_hours) {
            return Ok(CycleOutcome::Skipped {
                reason: format!(
                    "hour {} not on {}h cadence",
                    now.hour(),
                    self.cfg.interval_hours
                ),
            });
        }

        let holder = format!("cycle-{}", now.format("%Y%m%d%H%M%S"));
        if !self
            .store
            .try_acquire_cycle_lock(&holder, now, self.cfg.lock_ttl_secs)?
        {
            let id = self.store.cycle_started(now)?;
            let counts = CycleCounts::default();
            self.store.cycle_finished(
                id,
                CycleStatus::Aborted,
                &counts,
                Some("cycle lock held by a running instance"),
                now,
            )?;
            eprintln!("Warning: cycle aborted, lock held by a running instance");
            return Ok(CycleOutcome::Aborted {
                run: CycleRun {
                    id: Some(id),
                    started_at: now,
                    ended_at: Some(now),
                    status: CycleStatus::Aborted,
                    counts,
                    error: Some("cycle lock held by a running instance".into()),
                },
            });
        }

        let run_id = match self.store.cycle_started(now) {
            Ok(id) => id,
            Err(e) => {
                let _ = self.store.release_cycle_lock(&holder);
                return Err(e);
            }
        };

        let result = self.execute(now);
        let ended_at = Utc::now();
        let outcome = match result {
            Ok((counts, batch)) => self
                .store
                .cycle_finished(run_id, CycleStatus::Success, &counts, None, ended_at)
                .map(|()| CycleOutcome::Completed {
                    run: CycleRun {
                        id: Some(run_id),
                        started_at: now,
                        ended_at: Some(ended_at),
                        status: CycleStatus::Success,
                        counts,
                        error: None,
                    },
                    batch,
                }),
            Err(e) => {
                let _ = self.store.cycle_finished(
                    run_id,
                    CycleStatus::Failed,
                    &CycleCounts::default(),
                    Some(&e.to_string()),
                    ended_at,
                );
                Err(e)
            }
        };
        let _ = self.store.release_cycle_lock(&holder);
        outcome
    }

    /// Concurrent candle fetch over a bounded worker pool. Read-only and
    /// side-effect-free, so symbol order does not matter; failures are
    /// absorbed per symbol.
    fn fetch_candles(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Vec<Candle>>, CycletraderError> {
        let workers = self.cfg.fetch_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CycletraderError::Database {
                reason: format!("worker pool: {e}"),
            })?;

        let price = self.price;
        let timeframe = self.cfg.timeframe;
        let lookback = self.cfg.lookback_bars;
        let fetched: Vec<(String, Result<Vec<Candle>, CycletraderError>)> = pool.install(|| {
            symbols
                .par_iter()
                .map(|symbol| (symbol.clone(), price.fetch_candles(symbol, timeframe, lookback)))
                .collect()
        });

        let mut map = HashMap::new();
        for (symbol, result) in fetched {
            match result {
                Ok(candles) if !candles.is_empty() => {
                    map.insert(symbol, candles);
                }
                Ok(_) => eprintln!("Warning: skipping {symbol} (no candle data)"),
                Err(e) => eprintln!("Warning: skipping {symbol} ({e})"),
            }
        }
        Ok(map)
    }

    fn execute(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(CycleCounts, CandidateBatch), CycletraderError> {
        let universe = apply_exclusions(self.cfg.symbols.clone(), &self.cfg.exclude_symbols);

        let open_holdings = self.store.open_holdings()?;
        let mut fetch_list = universe.clone();
        for holding in &open_holdings {
            if !fetch_list.contains(&holding.symbol) {
                fetch_list.push(holding.symbol.clone());
            }
        }

        let candles = self.fetch_candles(&fetch_list)?;

        let snapshots: Vec<SymbolSnapshot> = universe
            .iter()
            .filter_map(|symbol| {
                let series = candles.get(symbol)?;
                let snap = build_snapshot(symbol, series);
                if snap.is_none() {
                    eprintln!(
                        "Warning: skipping {symbol} (insufficient history: {} bars)",
                        series.len()
                    );
                }
                snap
            })
            .collect();

        let thresholds = effective_thresholds(&snapshots, &self.cfg.thresholds);
        let primary = scan(&snapshots, &thresholds, self.cfg.cost_drag_pct, now);
        let fallback = if primary.is_empty() {
            let limit = self
                .cfg
                .fallback_max_entries
                .clamp(1, self.cfg.max_positions.max(1));
            fallback_scan(&snapshots, limit, self.cfg.cost_drag_pct, now)
        } else {
            Vec::new()
        };
        eprintln!(
            "Scan: {} snapshots, {} primary candidates, {} fallback",
            snapshots.len(),
            primary.len(),
            fallback.len()
        );

        let mut counts = CycleCounts::default();
        let mut stopped_out: HashSet<String> = HashSet::new();
        let guard = RiskGuard::new(self.cfg.risk.clone());

        self.manage_exits(&open_holdings, &candles, &guard, now, &mut counts, &mut stopped_out)?;

        let selection = self.run_selection(&primary, &fallback, now)?;
        self.process_admissions(&selection, &candles, &guard, now, &mut counts, &stopped_out)?;

        let batch_candidates = if primary.is_empty() { fallback } else { primary };
        let batch = CandidateBatch {
            generated_at: now,
            timeframe: self.cfg.timeframe.as_str().to_string(),
            universe_size: universe.len(),
            max_positions: self.cfg.max_positions,
            fallback_max_entries: self.cfg.fallback_max_entries,
            fallback_used: selection.fallback_used,
            candidates: batch_candidates,
        };

        Ok((counts, batch))
    }

    fn symbol_price(
        &self,
        symbol: &str,
        candles: &HashMap<String, Vec<Candle>>,
    ) -> Result<Option<(f64, DateTime<Utc>)>, CycletraderError> {
        if let Some(series) = candles.get(symbol) {
            if let Some(last) = series.last() {
                return Ok(Some((last.close, last.timestamp)));
            }
        }
        self.price.latest_price(symbol, self.cfg.timeframe)
    }

    fn manage_exits(
        &self,
        open_holdings: &[Holding],
        candles: &HashMap<String, Vec<Candle>>,
        guard: &RiskGuard,
        now: DateTime<Utc>,
        counts: &mut CycleCounts,
        stopped_out: &mut HashSet<String>,
    ) -> Result<(), CycletraderError> {
        for holding in open_holdings {
            let mut holding = holding.clone();

            // A pending_entry row left behind by an interrupted cycle never
            // committed capital; drop it.
            if holding.status == HoldingStatus::PendingEntry {
                eprintln!(
                    "Warning: dropping stale pending entry for {}",
                    holding.symbol
                );
                self.store.delete_unfilled_holding(&holding.symbol)?;
                continue;
            }

            let latest = self.symbol_price(&holding.symbol, candles)?;
            let age = feed_age_hours(latest.map(|(_, ts)| ts), now);
            if !guard.allows_exit(age) {
                eprintln!(
                    "Warning: freezing {} this cycle (stale or missing feed)",
                    holding.symbol
                );
                continue;
            }
            let Some((price, _)) = latest else { continue };

            holding.refresh_trailing(price, &self.cfg.exit_rules.trailing);
            self.store.update_holding(&holding)?;

            let signal = match evaluate_exit(&holding, price, now, &self.cfg.exit_rules) {
                Some(signal) => Some(signal),
                None if holding.status == HoldingStatus::Closing => Some(ExitSignal {
                    exit_type: Some(ExitType::Breakeven),
                    reason: ExitReasonType::Normal,
                    detail: "resuming interrupted exit".to_string(),
                }),
                None => None,
            };

            if let Some(signal) = signal {
                self.close_position(&mut holding, price, &signal, guard, now, counts, stopped_out)?;
            }
        }
        Ok(())
    }

    /// Sell one holding: closing transition, simulated fill, ledger row,
    /// terminal close. Each step is its own commit. Returns false when the
    /// order was rejected and the holding stays in closing for a retry on
    /// the next cycle.
    fn close_position(
        &self,
        holding: &mut Holding,
        price: f64,
        signal: &ExitSignal,
        guard: &RiskGuard,
        now: DateTime<Utc>,
        counts: &mut CycleCounts,
        stopped_out: &mut HashSet<String>,
    ) -> Result<bool, CycletraderError> {
        if holding.status == HoldingStatus::Open {
            holding.status = HoldingStatus::Closing;
            self.store.update_holding(holding)?;
        }

        let outcome = self.execution.sell(&holding.symbol, holding.quantity, price)?;
        let fill = match outcome {
            OrderOutcome::Filled(fill) => fill,
            OrderOutcome::Rejected { reason } => {
                eprintln!("Warning: sell rejected for {}: {reason}", holding.symbol);
                self.record_rejected(&holding.symbol, Side::Sell, price, &reason, now)?;
                return Ok(false);
            }
        };

        if !guard.fill_within_tolerance(price, fill.executed_price) {
            let reason = format!(
                "slippage guard: fill {:.6} deviates from reference {price:.6}",
                fill.executed_price
            );
            eprintln!("Warning: sell cancelled for {}: {reason}", holding.symbol);
            self.record_rejected(&holding.symbol, Side::Sell, price, &reason, now)?;
            return Ok(false);
        }

        let fee_rate_pct = if fill.quote_amount > 0.0 {
            fill.fee_amount / fill.quote_amount * 100.0
        } else {
            0.0
        };
        let pnl_pct = realized_pnl_pct(holding.entry_price, fill.executed_price, fee_rate_pct);

        self.store.record_execution(&OrderExecution {
            id: None,
            symbol: holding.symbol.clone(),
            side: Side::Sell,
            status: OrderStatus::Filled,
            requested_price: price,
            executed_price: fill.executed_price,
            quantity: fill.quantity,
            quote_amount: fill.quote_amount,
            fee_amount: fill.fee_amount,
            realized_pnl_pct: Some(pnl_pct),
            exit_type: signal.exit_type,
            exit_reason: Some(signal.reason),
            detail: signal.detail.clone(),
            created_at: now,
        })?;

        self.store.close_holding(
            &holding.symbol,
            &HoldingExit {
                exit_price: fill.executed_price,
                realized_pnl_pct: pnl_pct,
                exit_type: signal.exit_type,
                exit_reason: signal.reason,
                detail: signal.detail.clone(),
                closed_at: now,
            },
        )?;

        counts.sold += 1;
        if signal.reason == ExitReasonType::StopLoss {
            stopped_out.insert(holding.symbol.clone());
        }
        eprintln!(
            "SELL {} @ {:.6} (entry {:.6}, pnl {:.2}%) reason={} detail={}",
            holding.symbol,
            fill.executed_price,
            holding.entry_price,
            pnl_pct,
            signal.reason.as_str(),
            signal.detail
        );
        Ok(true)
    }

    fn run_selection(
        &self,
        primary: &[Candidate],
        fallback: &[Candidate],
        now: DateTime<Utc>,
    ) -> Result<Selection, CycletraderError> {
        let open_symbols: HashSet<String> = self
            .store
            .open_holdings()?
            .into_iter()
            .map(|h| h.symbol)
            .collect();
        let last_sells = self.store.last_sell_times()?;
        Ok(select(
            primary,
            fallback,
            &open_symbols,
            &last_sells,
            now,
            &SelectorConfig {
                max_positions: self.cfg.max_positions,
                fallback_max_entries: self.cfg.fallback_max_entries,
                reentry_cooldown_hours: self.cfg.reentry_cooldown_hours,
            },
        ))
    }

    fn process_admissions(
        &self,
        selection: &Selection,
        candles: &HashMap<String, Vec<Candle>>,
        guard: &RiskGuard,
        now: DateTime<Utc>,
        counts: &mut CycleCounts,
        stopped_out: &HashSet<String>,
    ) -> Result<(), CycletraderError> {
        // Capacity-blocked candidates stay in play: rotation may free a slot
        // for a sufficiently stronger one. Every other skip is final.
        let mut work: Vec<&Candidate> = selection.admitted.iter().collect();
        for (candidate, reason) in &selection.passed_over {
            match reason {
                SkipReason::NoCapacity => work.push(candidate),
                other => {
                    self.record_no_entry(candidate, &other.to_string(), now)?;
                    counts.no_entries += 1;
                }
            }
        }

        let mut rotations_done = 0usize;
        let day_start = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();

        for candidate in work {
            let open_now = self.store.open_holdings()?;
            let decision = self.judgment.decide(
                candidate,
                &JudgmentContext {
                    open_positions: open_now.len(),
                    max_positions: self.cfg.max_positions,
                },
            );
            if !decision.approves() {
                let reason = format!(
                    "judgment declined: score={}/{} ({})",
                    decision.buy_score, decision.min_score, decision.rationale
                );
                self.record_no_entry(candidate, &reason, now)?;
                counts.no_entries += 1;
                eprintln!("NO_ENTRY {} ({}): {reason}", candidate.symbol, candidate.trigger_type);
                continue;
            }

            let latest = self.symbol_price(&candidate.symbol, candles)?;
            let age = feed_age_hours(latest.map(|(_, ts)| ts), now);
            let risk_ctx = RiskContext {
                open_positions: open_now.len(),
                daily_realized_pnl: self.store.realized_pnl_since(day_start)?,
                equity: self.cfg.quote_amount * self.cfg.max_positions as f64,
                stopped_out: stopped_out.clone(),
            };

            match guard.check_entry(&candidate.symbol, age, &risk_ctx) {
                Ok(()) => {}
                Err(EntryVeto::MaxPositions { .. })
                    if rotations_done < self.cfg.rotation.max_per_cycle =>
                {
                    match self
                        .try_rotation(candidate, &open_now, candles, guard, now, counts, stopped_out)?
                    {
                        Ok(()) => rotations_done += 1,
                        Err(blocked) => {
                            self.record_no_entry(candidate, &blocked, now)?;
                            counts.no_entries += 1;
                            eprintln!(
                                "NO_ENTRY {} ({}): {blocked}",
                                candidate.symbol, candidate.trigger_type
                            );
                            continue;
                        }
                    }
                }
                Err(veto) => {
                    let reason = veto.to_string();
                    self.record_no_entry(candidate, &reason, now)?;
                    counts.no_entries += 1;
                    eprintln!(
                        "NO_ENTRY {} ({}): {reason}",
                        candidate.symbol, candidate.trigger_type
                    );
                    continue;
                }
            }

            if self.open_entry(candidate, guard, (decision.buy_score, decision.min_score), now)? {
                counts.entries += 1;
            } else {
                counts.no_entries += 1;
            }
        }

        Ok(())
    }

    /// Attempt to free a slot for a stronger candidate. Inner `Err` carries
    /// the human-readable blocked reason; outer `Err` is a store failure.
    fn try_rotation(
        &self,
        candidate: &Candidate,
        open_now: &[Holding],
        candles: &HashMap<String, Vec<Candle>>,
        guard: &RiskGuard,
        now: DateTime<Utc>,
        counts: &mut CycleCounts,
        stopped_out: &HashSet<String>,
    ) -> Result<Result<(), String>, CycletraderError> {
        let mut views = Vec::new();
        for holding in open_now {
            let live_price = match self.symbol_price(&holding.symbol, candles)? {
                Some((price, _)) => price,
                None => holding.entry_price,
            };
            views.push(RotationView {
                holding: holding.clone(),
                live_price,
            });
        }

        let plan = match plan_rotation(
            &candidate.symbol,
            candidate.composite_score,
            &views,
            &self.cfg.rotation,
            now,
        ) {
            Ok(plan) => plan,
            Err(blocked) => return Ok(Err(blocked)),
        };

        let Some(victim) = views.iter().find(|v| v.holding.symbol == plan.victim_symbol) else {
            return Ok(Err(format!(
                "rotation victim not found: {}",
                plan.victim_symbol
            )));
        };
        let mut victim_holding = victim.holding.clone();
        let signal = ExitSignal {
            exit_type: None,
            reason: ExitReasonType::Rotation,
            detail: plan.detail.clone(),
        };
        let mut throwaway = stopped_out.clone();
        let sold = self.close_position(
            &mut victim_holding,
            victim.live_price,
            &signal,
            guard,
            now,
            counts,
            &mut throwaway,
        )?;
        if !sold {
            return Ok(Err(format!(
                "rotation sell failed: {}",
                plan.victim_symbol
            )));
        }
        Ok(Ok(()))
    }

    /// Admission to fill: pending_entry row, simulated buy, open transition.
    /// Returns true when the position opened.
    fn open_entry(
        &self,
        candidate: &Candidate,
        guard: &RiskGuard,
        scores: (i32, i32),
        now: DateTime<Utc>,
    ) -> Result<bool, CycletraderError> {
        let mut holding = Holding {
            symbol: candidate.symbol.clone(),
            status: HoldingStatus::PendingEntry,
            entry_price: candidate.current_price,
            quantity: 0.0,
            quote_amount: self.cfg.quote_amount,
            entry_time: now,
            stop_loss: candidate.stop_loss,
            target_price: candidate.target_price,
            peak_price: candidate.current_price,
            trigger_type: candidate.trigger_type,
            theme: classify_symbol_theme(&candidate.symbol),
            entry_score: candidate.composite_score,
        };
        self.store.insert_holding(&holding)?;

        let outcome =
            self.execution
                .buy(&candidate.symbol, self.cfg.quote_amount, candidate.current_price)?;
        let fill = match outcome {
            OrderOutcome::Filled(fill) => fill,
            OrderOutcome::Rejected { reason } => {
                self.store.delete_unfilled_holding(&candidate.symbol)?;
                self.record_rejected(&candidate.symbol, Side::Buy, candidate.current_price, &reason, now)?;
                self.record_no_entry(candidate, &format!("buy rejected: {reason}"), now)?;
                eprintln!("NO_ENTRY {} ({}): buy rejected: {reason}", candidate.symbol, candidate.trigger_type);
                return Ok(false);
            }
        };

        if !guard.fill_within_tolerance(candidate.current_price, fill.executed_price) {
            let reason = format!(
                "slippage guard: fill {:.6} deviates from reference {:.6}",
                fill.executed_price, candidate.current_price
            );
            self.store.delete_unfilled_holding(&candidate.symbol)?;
            self.record_rejected(&candidate.symbol, Side::Buy, candidate.current_price, &reason, now)?;
            self.record_no_entry(candidate, &reason, now)?;
            eprintln!("NO_ENTRY {} ({}): {reason}", candidate.symbol, candidate.trigger_type);
            return Ok(false);
        }

        holding.status = HoldingStatus::Open;
        holding.entry_price = fill.executed_price;
        holding.quantity = fill.quantity;
        holding.quote_amount = fill.quote_amount;
        holding.peak_price = fill.executed_price;
        self.store.update_holding(&holding)?;

        self.store.record_execution(&OrderExecution {
            id: None,
            symbol: candidate.symbol.clone(),
            side: Side::Buy,
            status: OrderStatus::Filled,
            requested_price: candidate.current_price,
            executed_price: fill.executed_price,
            quantity: fill.quantity,
            quote_amount: fill.quote_amount,
            fee_amount: fill.fee_amount,
            realized_pnl_pct: None,
            exit_type: None,
            exit_reason: None,
            detail: format!("entry ({})", candidate.trigger_type),
            created_at: now,
        })?;

        self.store.record_decision(&DecisionRecord {
            symbol: candidate.symbol.clone(),
            decided_at: now,
            price: candidate.current_price,
            verdict: Verdict::Entry,
            skip_reason: None,
            target_price: candidate.target_price,
            stop_loss: candidate.stop_loss,
            risk_reward: candidate.risk_reward_ratio,
            trigger_type: candidate.trigger_type,
            composite_score: candidate.composite_score,
            agent_fit_score: candidate.agent_fit_score,
            buy_score: scores.0,
            min_score: scores.1,
        })?;
        self.insert_outcome(candidate, true, now)?;

        eprintln!(
            "ENTRY {} ({}) qty={:.8} @ {:.6}",
            candidate.symbol, candidate.trigger_type, fill.quantity, fill.executed_price
        );
        Ok(true)
    }

    fn record_no_entry(
        &self,
        candidate: &Candidate,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CycletraderError> {
        self.store.record_decision(&DecisionRecord {
            symbol: candidate.symbol.clone(),
            decided_at: now,
            price: candidate.current_price,
            verdict: Verdict::NoEntry,
            skip_reason: Some(reason.to_string()),
            target_price: candidate.target_price,
            stop_loss: candidate.stop_loss,
            risk_reward: candidate.risk_reward_ratio,
            trigger_type: candidate.trigger_type,
            composite_score: candidate.composite_score,
            agent_fit_score: candidate.agent_fit_score,
            buy_score: 0,
            min_score: 0,
        })?;
        self.insert_outcome(candidate, false, now)
    }

    /// Every analyzed candidate, traded or not, enters longer-horizon
    /// tracking so analysis accuracy can be graded later.
    fn insert_outcome(
        &self,
        candidate: &Candidate,
        entered: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CycletraderError> {
        self.store.insert_tracked_outcome(&TrackedOutcome {
            id: None,
            symbol: candidate.symbol.clone(),
            trigger_type: candidate.trigger_type,
            decided_at: now,
            price: candidate.current_price,
            target_price: candidate.target_price,
            stop_loss: candidate.stop_loss,
            entered,
            return_24h: None,
            return_72h: None,
            return_168h: None,
            hit_target: false,
            hit_stop: false,
            status: TrackingStatus::Pending,
        })
    }

    fn record_rejected(
        &self,
        symbol: &str,
        side: Side,
        reference_price: f64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CycletraderError> {
        self.store.record_execution(&OrderExecution {
            id: None,
            symbol: symbol.to_string(),
            side,
            status: OrderStatus::Rejected,
            requested_price: reference_price,
            executed_price: 0.0,
            quantity: 0.0,
            quote_amount: 0.0,
            fee_amount: 0.0,
            realized_pnl_pct: None,
            exit_type: None,
            exit_reason: None,
            detail: reason.to_string(),
            created_at: now,
        })?;
        Ok(())
    }
}
