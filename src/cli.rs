//! CLI definition and dispatch.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::csv_candle_adapter::read_candles;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::heuristic_judgment::HeuristicJudgment;
use crate::adapters::paper_execution::PaperExecutionAdapter;
use crate::adapters::snapshot_writer::{write_candidate_file, write_dashboard_file};
use crate::adapters::sqlite_store::SqliteStore;
use crate::domain::candidate::CandidateBatch;
use crate::domain::candle::Timeframe;
use crate::domain::config_validation::validate_cycle_config;
use crate::domain::cycle::{CycleConfig, CycleOutcome, Orchestrator};
use crate::domain::dashboard::{build_dashboard, DashboardSnapshot};
use crate::domain::engine::{fallback_scan, scan};
use crate::domain::error::CycletraderError;
use crate::domain::holding::TrailingConfig;
use crate::domain::position_manager::{ExitRules, RotationPolicy};
use crate::domain::risk::RiskConfig;
use crate::domain::snapshot::{build_snapshot, SymbolSnapshot};
use crate::domain::trigger::{effective_thresholds, TriggerThresholds};
use crate::domain::universe::{apply_exclusions, parse_optional_symbols, parse_symbols, DEFAULT_SYMBOLS};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::store_port::StorePort;

#[derive(Parser, Debug)]
#[command(name = "cycletrader", about = "Crypto trigger scanner and paper-trading cycle runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Base trigger thresholds; flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ThresholdArgs {
    #[arg(long)]
    pub volume_ratio_min: Option<f64>,
    #[arg(long)]
    pub ret1_min_pct: Option<f64>,
    #[arg(long)]
    pub ret4_min_pct: Option<f64>,
    #[arg(long)]
    pub breakout_volume_ratio_min: Option<f64>,
    #[arg(long)]
    pub volatility_tightening_factor: Option<f64>,
    #[arg(long)]
    pub anti_chase_atr_mult: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one full trading cycle
    Cycle {
        #[arg(short, long)]
        config: PathBuf,
        /// Run even when off the hour-modulo cadence
        #[arg(long)]
        force: bool,
        /// Candidate file path (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Scan for candidates without touching positions
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Import candles from a CSV file
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Fill longer-horizon returns on pending tracked outcomes
    Track {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write the dashboard snapshot JSON
    Dashboard {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show a store summary
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Cycle {
            config,
            force,
            output,
            thresholds,
        } => run_cycle(&config, force, output.as_deref(), &thresholds),
        Command::Scan {
            config,
            output,
            thresholds,
        } => run_scan(&config, output.as_deref(), &thresholds),
        Command::Import {
            config,
            file,
            symbol,
            timeframe,
        } => run_import(&config, &file, &symbol, timeframe.as_deref()),
        Command::Track { config } => run_track(&config),
        Command::Dashboard { config, output } => run_dashboard(&config, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
    }
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = CycletraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: &CycletraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

fn parse_timeframe_config(config: &dyn ConfigPort) -> Result<Timeframe, CycletraderError> {
    match config.get_string("cycle", "timeframe") {
        None => Ok(Timeframe::H1),
        Some(value) => {
            Timeframe::from_str(&value).map_err(|reason| CycletraderError::ConfigInvalid {
                section: "cycle".into(),
                key: "timeframe".into(),
                reason,
            })
        }
    }
}

fn build_cycle_config(
    config: &dyn ConfigPort,
    overrides: &ThresholdArgs,
) -> Result<CycleConfig, CycletraderError> {
    let symbols = match config.get_string("cycle", "symbols") {
        Some(raw) => parse_symbols(&raw).map_err(|e| CycletraderError::ConfigInvalid {
            section: "cycle".into(),
            key: "symbols".into(),
            reason: e.to_string(),
        })?,
        None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
    };
    let exclude_symbols = config
        .get_string("cycle", "exclude_symbols")
        .map(|raw| parse_optional_symbols(&raw))
        .unwrap_or_default();

    let defaults = TriggerThresholds::default();
    let thresholds = TriggerThresholds {
        volume_ratio_min: overrides.volume_ratio_min.unwrap_or_else(|| {
            config.get_double("triggers", "volume_ratio_min", defaults.volume_ratio_min)
        }),
        ret1_min_pct: overrides.ret1_min_pct.unwrap_or_else(|| {
            config.get_double("triggers", "ret1_min_pct", defaults.ret1_min_pct)
        }),
        ret4_min_pct: overrides.ret4_min_pct.unwrap_or_else(|| {
            config.get_double("triggers", "ret4_min_pct", defaults.ret4_min_pct)
        }),
        breakout_volume_ratio_min: overrides.breakout_volume_ratio_min.unwrap_or_else(|| {
            config.get_double(
                "triggers",
                "breakout_volume_ratio_min",
                defaults.breakout_volume_ratio_min,
            )
        }),
        volatility_tightening_factor: overrides.volatility_tightening_factor.unwrap_or_else(|| {
            config.get_double(
                "triggers",
                "volatility_tightening_factor",
                defaults.volatility_tightening_factor,
            )
        }),
        anti_chase_atr_mult: overrides.anti_chase_atr_mult.unwrap_or_else(|| {
            config.get_double("triggers", "anti_chase_atr_mult", defaults.anti_chase_atr_mult)
        }),
    };

    let max_positions = config.get_int("cycle", "max_positions", 3).max(1) as usize;
    let fee_rate_pct = config.get_double("execution", "fee_rate_pct", 0.1);
    let slippage_rate_pct = config.get_double("execution", "slippage_rate_pct", 0.05);

    let exit_defaults = ExitRules::default();
    let trailing_defaults = TrailingConfig::default();
    let exit_rules = ExitRules {
        trailing: TrailingConfig {
            activation_profit_pct: config.get_double(
                "exits",
                "trailing_activation_profit_pct",
                trailing_defaults.activation_profit_pct,
            ),
            giveback_pct: config.get_double(
                "exits",
                "trailing_giveback_pct",
                trailing_defaults.giveback_pct,
            ),
        },
        loss_guard_pct: config.get_double("exits", "loss_guard_pct", exit_defaults.loss_guard_pct),
        time_profit_hours: config.get_double(
            "exits",
            "time_profit_hours",
            exit_defaults.time_profit_hours,
        ),
        time_profit_min_pct: config.get_double(
            "exits",
            "time_profit_min_pct",
            exit_defaults.time_profit_min_pct,
        ),
        stale_hours: config.get_double("exits", "stale_hours", exit_defaults.stale_hours),
    };

    let rotation_defaults = RotationPolicy::default();
    let rotation = RotationPolicy {
        min_score_delta: config.get_double(
            "rotation",
            "min_score_delta",
            rotation_defaults.min_score_delta,
        ),
        loss_priority_pct: config.get_double(
            "rotation",
            "loss_priority_pct",
            rotation_defaults.loss_priority_pct,
        ),
        min_holding_hours: config.get_double(
            "rotation",
            "min_holding_hours",
            rotation_defaults.min_holding_hours,
        ),
        max_per_cycle: config.get_int("rotation", "max_per_cycle", 1).max(0) as usize,
    };

    let risk_defaults = RiskConfig::default();
    let risk = RiskConfig {
        max_positions,
        daily_loss_limit_pct: config.get_double(
            "risk",
            "daily_loss_limit_pct",
            risk_defaults.daily_loss_limit_pct,
        ),
        feed_max_age_hours: config.get_double(
            "risk",
            "feed_max_age_hours",
            risk_defaults.feed_max_age_hours,
        ),
        slippage_tolerance_pct: config.get_double(
            "risk",
            "slippage_tolerance_pct",
            risk_defaults.slippage_tolerance_pct,
        ),
    };

    Ok(CycleConfig {
        timeframe: parse_timeframe_config(config)?,
        interval_hours: config.get_int("cycle", "interval_hours", 1).clamp(1, 24) as u32,
        lookback_bars: config.get_int("cycle", "lookback_bars", 120).max(1) as usize,
        symbols,
        exclude_symbols,
        max_positions,
        fallback_max_entries: config
            .get_int("cycle", "fallback_max_entries", 1)
            .clamp(1, max_positions as i64) as usize,
        quote_amount: config.get_double("cycle", "quote_amount", 100.0),
        reentry_cooldown_hours: config.get_double("cycle", "rotation_reentry_cooldown_hours", 6.0),
        fetch_workers: config.get_int("cycle", "fetch_workers", 4).max(1) as usize,
        thresholds,
        exit_rules,
        rotation,
        risk,
        cost_drag_pct: 2.0 * (fee_rate_pct + slippage_rate_pct),
        lock_ttl_secs: config.get_int("cycle", "lock_ttl_secs", 3600),
    })
}

fn open_store(config: &dyn ConfigPort) -> Result<SqliteStore, CycletraderError> {
    let store = SqliteStore::from_config(config)?;
    store.initialize()?;
    Ok(store)
}

fn candidate_file_path(
    config: &dyn ConfigPort,
    override_path: Option<&Path>,
) -> Option<PathBuf> {
    override_path
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("cycle", "candidate_file").map(PathBuf::from))
}

fn run_cycle(
    config_path: &Path,
    force: bool,
    output: Option<&Path>,
    thresholds: &ThresholdArgs,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_cycle_config(&adapter) {
        return fail(&e);
    }
    let cfg = match build_cycle_config(&adapter, thresholds) {
        Ok(cfg) => cfg,
        Err(e) => return fail(&e),
    };
    let store = match open_store(&adapter) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };

    let execution = PaperExecutionAdapter::new(
        adapter.get_double("execution", "fee_rate_pct", 0.1),
        adapter.get_double("execution", "slippage_rate_pct", 0.05),
    );
    let judgment = HeuristicJudgment::default();

    let orchestrator = Orchestrator {
        price: &store,
        store: &store,
        execution: &execution,
        judgment: &judgment,
        cfg: &cfg,
    };

    match orchestrator.run(Utc::now(), force) {
        Ok(CycleOutcome::Skipped { reason }) => {
            eprintln!("Cycle skipped: {reason}");
            ExitCode::SUCCESS
        }
        Ok(CycleOutcome::Aborted { .. }) => {
            eprintln!("Cycle aborted: another instance is running");
            ExitCode::SUCCESS
        }
        Ok(CycleOutcome::Completed { run, batch }) => {
            if let Some(path) = candidate_file_path(&adapter, output) {
                if let Err(e) = write_candidate_file(&path, &batch) {
                    return fail(&e);
                }
                eprintln!("Candidate file written to {}", path.display());
            }
            eprintln!(
                "Cycle complete: entries={}, no_entries={}, sold={}",
                run.counts.entries, run.counts.no_entries, run.counts.sold
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn collect_snapshots(
    price: &dyn PricePort,
    cfg: &CycleConfig,
) -> Result<Vec<SymbolSnapshot>, CycletraderError> {
    let universe = apply_exclusions(cfg.symbols.clone(), &cfg.exclude_symbols);
    let mut snapshots = Vec::new();
    for symbol in &universe {
        match price.fetch_candles(symbol, cfg.timeframe, cfg.lookback_bars) {
            Ok(candles) => match build_snapshot(symbol, &candles) {
                Some(snapshot) => snapshots.push(snapshot),
                None => eprintln!(
                    "Warning: skipping {symbol} (insufficient history: {} bars)",
                    candles.len()
                ),
            },
            Err(e) => eprintln!("Warning: skipping {symbol} ({e})"),
        }
    }
    Ok(snapshots)
}

fn run_scan(config_path: &Path, output: Option<&Path>, thresholds: &ThresholdArgs) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_cycle_config(&adapter) {
        return fail(&e);
    }
    let cfg = match build_cycle_config(&adapter, thresholds) {
        Ok(cfg) => cfg,
        Err(e) => return fail(&e),
    };
    let store = match open_store(&adapter) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };

    let snapshots = match collect_snapshots(&store, &cfg) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let now = Utc::now();
    let effective = effective_thresholds(&snapshots, &cfg.thresholds);
    let primary = scan(&snapshots, &effective, cfg.cost_drag_pct, now);
    let fallback_used = primary.is_empty();
    let candidates = if fallback_used {
        fallback_scan(&snapshots, cfg.fallback_max_entries, cfg.cost_drag_pct, now)
    } else {
        primary
    };

    let universe = apply_exclusions(cfg.symbols.clone(), &cfg.exclude_symbols);
    let batch = CandidateBatch {
        generated_at: now,
        timeframe: cfg.timeframe.as_str().to_string(),
        universe_size: universe.len(),
        max_positions: cfg.max_positions,
        fallback_max_entries: cfg.fallback_max_entries,
        fallback_used,
        candidates,
    };

    eprintln!(
        "Scan complete: {} snapshots, {} candidates{}",
        snapshots.len(),
        batch.candidates.len(),
        if batch.fallback_used { " (fallback)" } else { "" }
    );

    match output {
        Some(path) => {
            if let Err(e) = write_candidate_file(path, &batch) {
                return fail(&e);
            }
            eprintln!("Candidate file written to {}", path.display());
            ExitCode::SUCCESS
        }
        None => match serde_json::to_string_pretty(&batch) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&CycletraderError::Database {
                reason: format!("candidate serialization: {e}"),
            }),
        },
    }
}

fn run_import(
    config_path: &Path,
    file: &Path,
    symbol: &str,
    timeframe: Option<&str>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let tf = match timeframe {
        Some(raw) => match Timeframe::from_str(raw) {
            Ok(tf) => tf,
            Err(reason) => {
                return fail(&CycletraderError::ConfigInvalid {
                    section: "cycle".into(),
                    key: "timeframe".into(),
                    reason,
                })
            }
        },
        None => match parse_timeframe_config(&adapter) {
            Ok(tf) => tf,
            Err(e) => return fail(&e),
        },
    };
    let store = match open_store(&adapter) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };

    let symbol = symbol.to_uppercase();
    let candles = match read_candles(file, &symbol, tf) {
        Ok(candles) => candles,
        Err(e) => return fail(&e),
    };
    if let Err(e) = store.insert_candles(&candles) {
        return fail(&e);
    }
    eprintln!("Imported {} candles for {symbol} ({tf})", candles.len());
    ExitCode::SUCCESS
}

fn run_track(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let tf = match parse_timeframe_config(&adapter) {
        Ok(tf) => tf,
        Err(e) => return fail(&e),
    };
    let store = match open_store(&adapter) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };

    let pending = match store.pending_outcomes() {
        Ok(pending) => pending,
        Err(e) => return fail(&e),
    };
    let now = Utc::now();
    let mut updated = 0usize;
    let mut completed = 0usize;

    for mut outcome in pending {
        let mut touched = false;
        while let Some(horizon) = outcome.next_due_horizon(now) {
            let due_at = outcome.decided_at + chrono::Duration::hours(horizon.hours());
            match store.close_at_or_after(&outcome.symbol, tf, due_at) {
                Ok(Some(price)) => {
                    outcome.apply_horizon(horizon, price);
                    touched = true;
                }
                Ok(None) => break,
                Err(e) => return fail(&e),
            }
        }
        if touched {
            if let Err(e) = store.update_tracked_outcome(&outcome) {
                return fail(&e);
            }
            updated += 1;
            if outcome.status == crate::domain::reliability::TrackingStatus::Completed {
                completed += 1;
            }
        }
    }

    eprintln!("Tracking update: {updated} outcomes updated, {completed} completed");
    ExitCode::SUCCESS
}

fn run_dashboard(config_path: &Path, output: Option<&Path>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let tf = match parse_timeframe_config(&adapter) {
        Ok(tf) => tf,
        Err(e) => return fail(&e),
    };
    let store = match open_store(&adapter) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };

    let now = Utc::now();
    let result = (|| -> Result<DashboardSnapshot, CycletraderError> {
        let cycles = store.recent_cycles(20)?;
        let open = store.open_holdings()?;
        let mut holdings = Vec::new();
        for holding in open {
            let price = store
                .latest_price(&holding.symbol, tf)?
                .map(|(price, _)| price);
            holdings.push((holding, price));
        }
        let executions = store.recent_executions(50)?;
        let outcomes = store.all_outcomes()?;
        let trades = store.closed_trades()?;

        let benchmark_symbol = adapter
            .get_string("cycle", "benchmark_symbol")
            .unwrap_or_else(|| "BTC-USD".to_string());
        let window_start = trades
            .iter()
            .map(|t| t.entry_time)
            .min()
            .or_else(|| cycles.iter().map(|c| c.started_at).min());
        let benchmark_window = match window_start {
            Some(start) => {
                let first = store.close_at_or_after(&benchmark_symbol, tf, start)?;
                let last = store.latest_price(&benchmark_symbol, tf)?.map(|(p, _)| p);
                first.zip(last)
            }
            None => None,
        };

        let quote_amount = adapter.get_double("cycle", "quote_amount", 100.0);
        let max_positions = adapter.get_int("cycle", "max_positions", 3).max(1) as f64;
        Ok(build_dashboard(
            now,
            cycles,
            &holdings,
            executions,
            &outcomes,
            &trades,
            &benchmark_symbol,
            benchmark_window,
            quote_amount * max_positions,
        ))
    })();

    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(e) => return fail(&e),
    };

    match output {
        Some(path) => {
            if let Err(e) = write_dashboard_file(path, &snapshot) {
                return fail(&e);
            }
            eprintln!("Dashboard snapshot written to {}", path.display());
            ExitCode::SUCCESS
        }
        None => match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&CycletraderError::Database {
                reason: format!("dashboard serialization: {e}"),
            }),
        },
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match validate_cycle_config(&adapter) {
        Ok(()) => {
            eprintln!("Configuration OK");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_info(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let store = match open_store(&adapter) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };

    let result = (|| -> Result<(), CycletraderError> {
        let open = store.open_holdings()?;
        let trades = store.closed_trades()?;
        let cycles = store.recent_cycles(1)?;
        let pending = store.pending_outcomes()?;

        println!("Open holdings:     {}", open.len());
        for holding in &open {
            println!(
                "  {} {} entry={:.6} stop={:.6} target={:.6}",
                holding.symbol,
                holding.status.as_str(),
                holding.entry_price,
                holding.stop_loss,
                holding.target_price
            );
        }
        println!("Closed trades:     {}", trades.len());
        println!("Pending outcomes:  {}", pending.len());
        match cycles.first() {
            Some(run) => println!(
                "Last cycle:        {} (entries={}, no_entries={}, sold={})",
                run.status, run.counts.entries, run.counts.no_entries, run.counts.sold
            ),
            None => println!("Last cycle:        none"),
        }
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}
