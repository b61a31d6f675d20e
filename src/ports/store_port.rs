//! Persisted state store port trait.
//!
//! The store is the single source of truth between cycle invocations:
//! holdings, the execution ledger, cycle runs, decisions, tracked outcomes,
//! and the cycle lock marker. Writers serialize through the lock; readers
//! may snapshot concurrently.

use crate::domain::cycle::{CycleCounts, CycleRun, CycleStatus, DecisionRecord};
use crate::domain::error::CycletraderError;
use crate::domain::execution::OrderExecution;
use crate::domain::holding::{ClosedTrade, Holding, HoldingExit};
use crate::domain::reliability::TrackedOutcome;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub trait StorePort {
    fn initialize(&self) -> Result<(), CycletraderError>;

    /// Atomically take the single cycle lock. A lock older than `ttl_secs`
    /// is treated as abandoned and stolen. Returns false when held.
    fn try_acquire_cycle_lock(
        &self,
        holder: &str,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> Result<bool, CycletraderError>;

    fn release_cycle_lock(&self, holder: &str) -> Result<(), CycletraderError>;

    fn cycle_started(&self, started_at: DateTime<Utc>) -> Result<i64, CycletraderError>;

    fn cycle_finished(
        &self,
        id: i64,
        status: CycleStatus,
        counts: &CycleCounts,
        error: Option<&str>,
        ended_at: DateTime<Utc>,
    ) -> Result<(), CycletraderError>;

    fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleRun>, CycletraderError>;

    fn insert_holding(&self, holding: &Holding) -> Result<(), CycletraderError>;

    /// Update the non-closed row for this symbol (status, stop, peak).
    fn update_holding(&self, holding: &Holding) -> Result<(), CycletraderError>;

    /// Terminal transition: mark closed and freeze the exit fields.
    fn close_holding(&self, symbol: &str, exit: &HoldingExit) -> Result<(), CycletraderError>;

    /// Drop a pending_entry row whose fill never happened.
    fn delete_unfilled_holding(&self, symbol: &str) -> Result<(), CycletraderError>;

    /// All non-closed holdings.
    fn open_holdings(&self) -> Result<Vec<Holding>, CycletraderError>;

    fn closed_trades(&self) -> Result<Vec<ClosedTrade>, CycletraderError>;

    /// Most recent close time per symbol, for cooldown checks.
    fn last_sell_times(&self) -> Result<HashMap<String, DateTime<Utc>>, CycletraderError>;

    /// Sum of realized pnl in quote currency for trades closed since `since`.
    fn realized_pnl_since(&self, since: DateTime<Utc>) -> Result<f64, CycletraderError>;

    fn record_execution(&self, execution: &OrderExecution) -> Result<i64, CycletraderError>;

    fn recent_executions(&self, limit: usize) -> Result<Vec<OrderExecution>, CycletraderError>;

    fn record_decision(&self, decision: &DecisionRecord) -> Result<(), CycletraderError>;

    fn insert_tracked_outcome(&self, outcome: &TrackedOutcome) -> Result<(), CycletraderError>;

    fn pending_outcomes(&self) -> Result<Vec<TrackedOutcome>, CycletraderError>;

    fn update_tracked_outcome(&self, outcome: &TrackedOutcome) -> Result<(), CycletraderError>;

    fn all_outcomes(&self) -> Result<Vec<TrackedOutcome>, CycletraderError>;
}
