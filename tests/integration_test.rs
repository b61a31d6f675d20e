//! End-to-end cycle tests over mock price/execution ports and a real
//! in-memory SQLite store.

mod common;

use common::*;
use chrono::{Duration, Utc};
use cycletrader::adapters::heuristic_judgment::HeuristicJudgment;
use cycletrader::adapters::paper_execution::PaperExecutionAdapter;
use cycletrader::adapters::sqlite_store::SqliteStore;
use cycletrader::domain::cycle::{CycleOutcome, CycleStatus, Orchestrator};
use cycletrader::domain::execution::{ExitReasonType, OrderStatus, Side};
use cycletrader::domain::holding::{Holding, HoldingStatus};
use cycletrader::domain::theme::Theme;
use cycletrader::domain::trigger::TriggerType;
use cycletrader::ports::store_port::StorePort;

fn store() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.initialize().unwrap();
    store
}

fn open_holding(symbol: &str, entry_price: f64, entry_time: chrono::DateTime<Utc>) -> Holding {
    Holding {
        symbol: symbol.to_string(),
        status: HoldingStatus::Open,
        entry_price,
        quantity: 1.0,
        quote_amount: entry_price,
        entry_time,
        stop_loss: entry_price * 0.95,
        target_price: entry_price * 1.10,
        peak_price: entry_price,
        trigger_type: TriggerType::VolumeSurge,
        theme: Theme::Other,
        entry_score: 0.5,
    }
}

mod full_cycle {
    use super::*;

    #[test]
    fn enters_on_volume_surge_and_persists_everything() {
        let now = at(12, 0);
        let price = MockPricePort::new()
            .with_candles("SOL-USD", trending_candles("SOL-USD", 80, now, 100.0, 0.3, 1000.0, 3000.0))
            .with_candles("BTC-USD", flat_candles("BTC-USD", 80, now, 50_000.0, 1000.0));
        let store = store();
        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD", "BTC-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        let outcome = orchestrator.run(now, false).unwrap();
        let (run, batch) = match outcome {
            CycleOutcome::Completed { run, batch } => (run, batch),
            other => panic!("expected completed cycle, got {other:?}"),
        };

        assert_eq!(run.status, CycleStatus::Success);
        assert_eq!(run.counts.entries, 1);
        assert_eq!(run.counts.sold, 0);

        // Quiet BTC produced no candidate; the surge did.
        assert_eq!(batch.candidates.len(), 1);
        assert_eq!(batch.candidates[0].symbol, "SOL-USD");
        assert_eq!(batch.candidates[0].trigger_type, TriggerType::VolumeSurge);
        assert!(!batch.fallback_used);

        let holdings = store.open_holdings().unwrap();
        assert_eq!(holdings.len(), 1);
        let holding = &holdings[0];
        assert_eq!(holding.symbol, "SOL-USD");
        assert_eq!(holding.status, HoldingStatus::Open);
        assert!(holding.quantity > 0.0);
        assert!(holding.stop_loss < holding.entry_price);
        assert!(holding.entry_price < holding.target_price);

        let executions = store.recent_executions(10).unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].side, Side::Buy);
        assert_eq!(executions[0].status, OrderStatus::Filled);

        // The entry also went into longer-horizon tracking.
        let pending = store.pending_outcomes().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].entered);

        let cycles = store.recent_cycles(5).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].status, CycleStatus::Success);
    }

    #[test]
    fn feed_outage_for_one_symbol_does_not_fail_the_cycle() {
        let now = at(12, 0);
        let price = MockPricePort::new()
            .with_candles("SOL-USD", trending_candles("SOL-USD", 80, now, 100.0, 0.3, 1000.0, 3000.0))
            .with_error("BTC-USD");
        let store = store();
        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD", "BTC-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.status, CycleStatus::Success);
                assert_eq!(run.counts.entries, 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[test]
    fn thin_history_symbols_are_skipped() {
        let now = at(12, 0);
        let price = MockPricePort::new()
            .with_candles("NEW-USD", trending_candles("NEW-USD", 20, now, 5.0, 0.5, 1000.0, 4000.0));
        let store = store();
        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["NEW-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, batch } => {
                assert_eq!(run.status, CycleStatus::Success);
                assert_eq!(run.counts.entries, 0);
                // Fallback also has nothing to rank without a snapshot.
                assert!(batch.candidates.is_empty());
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[test]
    fn off_cadence_invocation_is_a_no_op() {
        let now = at(13, 0);
        let price = MockPricePort::new();
        let store = store();
        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let mut cfg = test_cycle_config(&["SOL-USD"]);
        cfg.interval_hours = 2;

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Skipped { .. } => {}
            other => panic!("expected skip, got {other:?}"),
        }
        assert!(store.recent_cycles(5).unwrap().is_empty());
    }
}

mod capacity_and_selection {
    use super::*;

    #[test]
    fn admits_only_up_to_free_slots() {
        // max_positions=3, 2 already open, 5 passing candidates → 1 entry.
        let now = at(12, 0);
        let mut price = MockPricePort::new();
        let symbols = ["A1-USD", "A2-USD", "A3-USD", "A4-USD", "A5-USD"];
        for (i, symbol) in symbols.iter().enumerate() {
            price = price.with_candles(
                symbol,
                trending_candles(symbol, 80, now, 50.0 + i as f64, 0.3, 1000.0, 3000.0),
            );
        }
        price = price
            .with_candles("H1-USD", flat_candles("H1-USD", 80, now, 100.0, 1000.0))
            .with_candles("H2-USD", flat_candles("H2-USD", 80, now, 100.0, 1000.0));

        let store = store();
        // Strong incumbents: the score delta keeps rotation out of play.
        let mut h1 = open_holding("H1-USD", 100.0, now - Duration::hours(5));
        h1.entry_score = 0.9;
        store.insert_holding(&h1).unwrap();
        let mut h2 = open_holding("H2-USD", 100.0, now - Duration::hours(5));
        h2.entry_score = 0.9;
        store.insert_holding(&h2).unwrap();

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&symbols);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        let open = store.open_holdings().unwrap();
        assert_eq!(open.len(), 3);
        assert!(open.len() <= cfg.max_positions);
    }

    #[test]
    fn held_symbol_is_never_doubled() {
        let now = at(12, 0);
        let price = MockPricePort::new().with_candles(
            "SOL-USD",
            trending_candles("SOL-USD", 80, now, 100.0, 0.3, 1000.0, 3000.0),
        );
        let store = store();
        // Entry near the current price so no exit rule fires this cycle.
        let last_close = price.data["SOL-USD"].last().unwrap().close;
        let mut held = open_holding("SOL-USD", last_close * 0.98, now - Duration::hours(5));
        held.stop_loss = last_close * 0.93;
        held.target_price = last_close * 1.10;
        held.peak_price = held.entry_price;
        store.insert_holding(&held).unwrap();

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 0);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        assert_eq!(store.open_holdings().unwrap().len(), 1);
    }
}

mod exits {
    use super::*;

    #[test]
    fn stop_loss_exit_closes_and_ledgers() {
        let now = at(12, 0);
        // Falling series drives the price through the stop.
        let price = MockPricePort::new().with_candles(
            "ETH-USD",
            falling_candles("ETH-USD", 80, now, 130.0, 1000.0),
        );
        let store = store();
        let last_close = price.data["ETH-USD"].last().unwrap().close;
        let mut held = open_holding("ETH-USD", last_close * 1.08, now - Duration::hours(10));
        held.stop_loss = last_close * 1.03;
        held.target_price = last_close * 1.30;
        store.insert_holding(&held).unwrap();

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["ETH-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.sold, 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }

        assert!(store.open_holdings().unwrap().is_empty());
        let trades = store.closed_trades().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReasonType::StopLoss);
        assert!(trades[0].realized_pnl_pct < 0.0);

        let executions = store.recent_executions(10).unwrap();
        let sell = executions.iter().find(|e| e.side == Side::Sell).unwrap();
        assert_eq!(sell.status, OrderStatus::Filled);
        assert!(sell.realized_pnl_pct.unwrap() < 0.0);
        assert_eq!(sell.exit_reason, Some(ExitReasonType::StopLoss));
    }

    #[test]
    fn stale_feed_freezes_instead_of_exiting() {
        let now = at(12, 0);
        // Candles end 8 hours ago, beyond the 3h feed gate.
        let price = MockPricePort::new().with_candles(
            "ETH-USD",
            falling_candles("ETH-USD", 80, now - Duration::hours(8), 130.0, 1000.0),
        );
        let store = store();
        let mut held = open_holding("ETH-USD", 140.0, now - Duration::hours(10));
        held.stop_loss = 135.0;
        store.insert_holding(&held).unwrap();

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["ETH-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.sold, 0);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        // Frozen, not force-exited.
        assert_eq!(store.open_holdings().unwrap().len(), 1);
    }
}

mod risk_guard {
    use super::*;
    use cycletrader::domain::execution::ExitType;
    use cycletrader::domain::holding::HoldingExit;

    #[test]
    fn kill_switch_blocks_new_entries_after_daily_loss() {
        let now = at(12, 0);
        let price = MockPricePort::new().with_candles(
            "SOL-USD",
            trending_candles("SOL-USD", 80, now, 100.0, 0.3, 1000.0, 3000.0),
        );
        let store = store();

        // A large realized loss earlier today: -20 quote on 300 deployed.
        store
            .insert_holding(&open_holding("BAD-USD", 100.0, now - Duration::hours(6)))
            .unwrap();
        store
            .close_holding(
                "BAD-USD",
                &HoldingExit {
                    exit_price: 80.0,
                    realized_pnl_pct: -20.0,
                    exit_type: Some(ExitType::StopLoss),
                    exit_reason: ExitReasonType::StopLoss,
                    detail: "stop loss reached".into(),
                    closed_at: now - Duration::hours(2),
                },
            )
            .unwrap();

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 0);
                assert!(run.counts.no_entries >= 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        assert!(store.open_holdings().unwrap().is_empty());
    }

    #[test]
    fn slippage_guard_cancels_whole_order() {
        let now = at(12, 0);
        let price = MockPricePort::new().with_candles(
            "SOL-USD",
            trending_candles("SOL-USD", 80, now, 100.0, 0.3, 1000.0, 3000.0),
        );
        let store = store();
        // 5% simulated slippage blows through the 1% tolerance.
        let execution = PaperExecutionAdapter::new(0.1, 5.0);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 0);
                assert!(run.counts.no_entries >= 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }

        // No position, and the attempt is on the ledger as rejected.
        assert!(store.open_holdings().unwrap().is_empty());
        let executions = store.recent_executions(10).unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, OrderStatus::Rejected);
        assert!(executions[0].detail.contains("slippage guard"));
    }
}

mod cooldown {
    use super::*;
    use cycletrader::domain::execution::ExitType;
    use cycletrader::domain::holding::HoldingExit;

    fn sell_at(store: &SqliteStore, symbol: &str, closed_at: chrono::DateTime<Utc>) {
        store
            .insert_holding(&open_holding(symbol, 100.0, closed_at - Duration::hours(8)))
            .unwrap();
        store
            .close_holding(
                symbol,
                &HoldingExit {
                    exit_price: 105.0,
                    realized_pnl_pct: 5.0,
                    exit_type: Some(ExitType::TakeProfit),
                    exit_reason: ExitReasonType::Normal,
                    detail: "target reached".into(),
                    closed_at,
                },
            )
            .unwrap();
    }

    #[test]
    fn six_hour_window_blocks_then_frees_reentry() {
        // Sold at 10:00, cooldown 6h → blocked at 15:00, eligible at 16:01.
        let store = store();
        sell_at(&store, "SOL-USD", at(10, 0));

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD"]);

        let blocked_now = at(15, 0);
        let price = MockPricePort::new().with_candles(
            "SOL-USD",
            trending_candles("SOL-USD", 80, blocked_now, 100.0, 0.3, 1000.0, 3000.0),
        );
        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };
        match orchestrator.run(blocked_now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 0);
                assert_eq!(run.counts.no_entries, 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        assert!(store.open_holdings().unwrap().is_empty());

        let free_now = at(16, 1);
        let price = MockPricePort::new().with_candles(
            "SOL-USD",
            trending_candles("SOL-USD", 80, free_now, 100.0, 0.3, 1000.0, 3000.0),
        );
        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };
        match orchestrator.run(free_now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        assert_eq!(store.open_holdings().unwrap().len(), 1);
    }
}

mod rotation {
    use super::*;

    #[test]
    fn stronger_candidate_rotates_out_the_weakest_holding() {
        let now = at(12, 0);
        let price = MockPricePort::new()
            .with_candles(
                "SOL-USD",
                trending_candles("SOL-USD", 80, now, 100.0, 0.3, 1000.0, 3000.0),
            )
            .with_candles("OLD-USD", flat_candles("OLD-USD", 80, now, 100.0, 1000.0));
        let store = store();
        let mut weak = open_holding("OLD-USD", 100.0, now - Duration::hours(10));
        weak.entry_score = 0.10;
        store.insert_holding(&weak).unwrap();

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let mut cfg = test_cycle_config(&["SOL-USD"]);
        cfg.max_positions = 1;
        cfg.fallback_max_entries = 1;

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 1);
                assert_eq!(run.counts.sold, 1);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }

        let open = store.open_holdings().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "SOL-USD");

        let trades = store.closed_trades().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].symbol, "OLD-USD");
        assert_eq!(trades[0].exit_reason, ExitReasonType::Rotation);
        assert_eq!(trades[0].exit_type, None);
    }

    #[test]
    fn fresh_holding_blocks_rotation() {
        let now = at(12, 0);
        let price = MockPricePort::new()
            .with_candles(
                "SOL-USD",
                trending_candles("SOL-USD", 80, now, 100.0, 0.3, 1000.0, 3000.0),
            )
            .with_candles("OLD-USD", flat_candles("OLD-USD", 80, now, 100.0, 1000.0));
        let store = store();
        let mut fresh = open_holding("OLD-USD", 100.0, now - Duration::hours(1));
        fresh.entry_score = 0.10;
        store.insert_holding(&fresh).unwrap();

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let mut cfg = test_cycle_config(&["SOL-USD"]);
        cfg.max_positions = 1;

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { run, .. } => {
                assert_eq!(run.counts.entries, 0);
                assert_eq!(run.counts.sold, 0);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        assert_eq!(store.open_holdings().unwrap()[0].symbol, "OLD-USD");
    }
}

mod locking {
    use super::*;

    #[test]
    fn held_lock_aborts_the_new_invocation() {
        let now = at(12, 0);
        let price = MockPricePort::new();
        let store = store();
        assert!(store.try_acquire_cycle_lock("other", now, 3600).unwrap());

        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Aborted { run } => {
                assert_eq!(run.status, CycleStatus::Aborted);
            }
            other => panic!("expected abort, got {other:?}"),
        }
        let cycles = store.recent_cycles(5).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].status, CycleStatus::Aborted);

        // After release the next invocation proceeds.
        store.release_cycle_lock("other").unwrap();
        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { .. } => {}
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[test]
    fn lock_is_released_after_a_cycle() {
        let now = at(12, 0);
        let price = MockPricePort::new();
        let store = store();
        let execution = PaperExecutionAdapter::new(0.1, 0.05);
        let judgment = HeuristicJudgment::default();
        let cfg = test_cycle_config(&["SOL-USD"]);

        let orchestrator = Orchestrator {
            price: &price,
            store: &store,
            execution: &execution,
            judgment: &judgment,
            cfg: &cfg,
        };

        match orchestrator.run(now, false).unwrap() {
            CycleOutcome::Completed { .. } => {}
            other => panic!("expected completed cycle, got {other:?}"),
        }
        // Lock free again for the next holder.
        assert!(store.try_acquire_cycle_lock("next", now, 3600).unwrap());
    }
}
