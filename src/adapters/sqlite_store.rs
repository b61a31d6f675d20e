//! SQLite persisted store adapter.
//!
//! Single source of truth across cycle invocations: candles, holdings, the
//! execution ledger, cycle runs, decisions, tracked outcomes, and the cycle
//! lock marker. WAL journal mode lets the dashboard read while a cycle
//! writes; writers serialize through the lock row.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::cycle::{CycleCounts, CycleRun, CycleStatus, DecisionRecord};
use crate::domain::error::CycletraderError;
use crate::domain::execution::{ExitReasonType, ExitType, OrderExecution, OrderStatus, Side};
use crate::domain::holding::{ClosedTrade, Holding, HoldingExit, HoldingStatus};
use crate::domain::reliability::{TrackedOutcome, TrackingStatus};
use crate::domain::theme::classify_symbol_theme;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::store_port::StorePort;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::HashMap;
use std::str::FromStr;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, CycletraderError> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| CycletraderError::Database {
            reason: format!("invalid timestamp {value}: {e}"),
        })
}

fn text_conv_err(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::other(message)),
    )
}

fn parse_ts_column(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| text_conv_err(idx, format!("invalid timestamp {value}: {e}")))
}

#[derive(Debug)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CycletraderError> {
        let db_path = config
            .get_string("store", "path")
            .ok_or_else(|| CycletraderError::ConfigMissing {
                section: "store".into(),
                key: "path".into(),
            })?;
        let pool_size = config.get_int("store", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| CycletraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, CycletraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| CycletraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CycletraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| CycletraderError::Database {
                reason: e.to_string(),
            })
    }

    fn query_err(e: rusqlite::Error) -> CycletraderError {
        CycletraderError::DatabaseQuery {
            reason: e.to_string(),
        }
    }

    /// Bulk candle ingest; re-imports overwrite on the natural key.
    pub fn insert_candles(&self, candles: &[Candle]) -> Result<(), CycletraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(Self::query_err)?;

        for candle in candles {
            tx.execute(
                "INSERT OR REPLACE INTO candles
                 (symbol, timeframe, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    candle.symbol,
                    candle.timeframe.as_str(),
                    format_ts(candle.timestamp),
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume
                ],
            )
            .map_err(Self::query_err)?;
        }

        tx.commit().map_err(Self::query_err)
    }

    /// Close at or after `at`, for horizon tracking.
    pub fn close_at_or_after(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>, CycletraderError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT close FROM candles
             WHERE symbol = ?1 AND timeframe = ?2 AND timestamp >= ?3
             ORDER BY timestamp ASC LIMIT 1",
            params![symbol, timeframe.as_str(), format_ts(at)],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Self::query_err(other)),
        })
    }

    fn map_holding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Holding> {
        let status_str: String = row.get(1)?;
        let entry_time_str: String = row.get(5)?;
        let trigger_str: String = row.get(9)?;
        let symbol: String = row.get(0)?;

        Ok(Holding {
            symbol: symbol.clone(),
            status: HoldingStatus::from_str(&status_str).map_err(|e| text_conv_err(1, e))?,
            entry_price: row.get(2)?,
            quantity: row.get(3)?,
            quote_amount: row.get(4)?,
            entry_time: parse_ts_column(5, &entry_time_str)?,
            stop_loss: row.get(6)?,
            target_price: row.get(7)?,
            peak_price: row.get(8)?,
            trigger_type: TriggerTypeCol::parse(9, &trigger_str)?,
            theme: classify_symbol_theme(&symbol),
            entry_score: row.get(10)?,
        })
    }

    fn map_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderExecution> {
        let side_str: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        let exit_type_str: Option<String> = row.get(10)?;
        let exit_reason_str: Option<String> = row.get(11)?;
        let created_str: String = row.get(13)?;

        Ok(OrderExecution {
            id: Some(row.get(0)?),
            symbol: row.get(1)?,
            side: Side::from_str(&side_str).map_err(|e| text_conv_err(2, e))?,
            status: OrderStatus::from_str(&status_str).map_err(|e| text_conv_err(3, e))?,
            requested_price: row.get(4)?,
            executed_price: row.get(5)?,
            quantity: row.get(6)?,
            quote_amount: row.get(7)?,
            fee_amount: row.get(8)?,
            realized_pnl_pct: row.get(9)?,
            exit_type: exit_type_str
                .map(|s| ExitType::from_str(&s).map_err(|e| text_conv_err(10, e)))
                .transpose()?,
            exit_reason: exit_reason_str
                .map(|s| ExitReasonType::from_str(&s).map_err(|e| text_conv_err(11, e)))
                .transpose()?,
            detail: row.get(12)?,
            created_at: parse_ts_column(13, &created_str)?,
        })
    }

    fn map_outcome(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedOutcome> {
        let trigger_str: String = row.get(2)?;
        let decided_str: String = row.get(3)?;
        let status_str: String = row.get(13)?;

        Ok(TrackedOutcome {
            id: Some(row.get(0)?),
            symbol: row.get(1)?,
            trigger_type: TriggerTypeCol::parse(2, &trigger_str)?,
            decided_at: parse_ts_column(3, &decided_str)?,
            price: row.get(4)?,
            target_price: row.get(5)?,
            stop_loss: row.get(6)?,
            entered: row.get::<_, i64>(7)? != 0,
            return_24h: row.get(8)?,
            return_72h: row.get(9)?,
            return_168h: row.get(10)?,
            hit_target: row.get::<_, i64>(11)? != 0,
            hit_stop: row.get::<_, i64>(12)? != 0,
            status: TrackingStatus::from_str(&status_str).map_err(|e| text_conv_err(13, e))?,
        })
    }
}

/// Column-level TriggerType parsing shared by row mappers.
struct TriggerTypeCol;

impl TriggerTypeCol {
    fn parse(idx: usize, value: &str) -> rusqlite::Result<crate::domain::trigger::TriggerType> {
        crate::domain::trigger::TriggerType::from_str(value).map_err(|e| text_conv_err(idx, e))
    }
}

impl StorePort for SqliteStore {
    fn initialize(&self) -> Result<(), CycletraderError> {
        let conn = self.conn()?;

        conn.pragma_update(None, "journal_mode", "WAL").ok();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candles (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, timeframe, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_candles_symbol_tf ON candles(symbol, timeframe);

            CREATE TABLE IF NOT EXISTS holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                status TEXT NOT NULL,
                entry_price REAL NOT NULL,
                quantity REAL NOT NULL,
                quote_amount REAL NOT NULL,
                entry_time TEXT NOT NULL,
                stop_loss REAL NOT NULL,
                target_price REAL NOT NULL,
                peak_price REAL NOT NULL,
                trigger_type TEXT NOT NULL,
                entry_score REAL NOT NULL,
                exit_price REAL,
                realized_pnl_pct REAL,
                exit_type TEXT,
                exit_reason TEXT,
                exit_detail TEXT,
                closed_at TEXT,
                last_updated TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_holdings_active
                ON holdings(symbol) WHERE status != 'closed';
            CREATE INDEX IF NOT EXISTS idx_holdings_status ON holdings(status);
            CREATE INDEX IF NOT EXISTS idx_holdings_closed_at ON holdings(closed_at);

            CREATE TABLE IF NOT EXISTS order_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                status TEXT NOT NULL,
                requested_price REAL NOT NULL,
                executed_price REAL NOT NULL,
                quantity REAL NOT NULL,
                quote_amount REAL NOT NULL,
                fee_amount REAL NOT NULL,
                realized_pnl_pct REAL,
                exit_type TEXT,
                exit_reason TEXT,
                detail TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_exec_symbol ON order_executions(symbol);
            CREATE INDEX IF NOT EXISTS idx_exec_created ON order_executions(created_at);

            CREATE TABLE IF NOT EXISTS cycle_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                status TEXT NOT NULL,
                entry_count INTEGER NOT NULL DEFAULT 0,
                no_entry_count INTEGER NOT NULL DEFAULT 0,
                sold_count INTEGER NOT NULL DEFAULT 0,
                error TEXT
            );

            CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                decided_at TEXT NOT NULL,
                price REAL NOT NULL,
                decision TEXT NOT NULL,
                skip_reason TEXT,
                target_price REAL NOT NULL,
                stop_loss REAL NOT NULL,
                risk_reward REAL NOT NULL,
                trigger_type TEXT NOT NULL,
                composite_score REAL NOT NULL,
                agent_fit_score REAL NOT NULL,
                buy_score INTEGER NOT NULL,
                min_score INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_symbol ON decisions(symbol);

            CREATE TABLE IF NOT EXISTS tracked_outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                decided_at TEXT NOT NULL,
                price REAL NOT NULL,
                target_price REAL NOT NULL,
                stop_loss REAL NOT NULL,
                entered INTEGER NOT NULL DEFAULT 0,
                return_24h REAL,
                return_72h REAL,
                return_168h REAL,
                hit_target INTEGER NOT NULL DEFAULT 0,
                hit_stop INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                last_updated TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_outcomes_status ON tracked_outcomes(status);
            CREATE INDEX IF NOT EXISTS idx_outcomes_symbol ON tracked_outcomes(symbol);

            CREATE TABLE IF NOT EXISTS cycle_lock (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                holder TEXT,
                acquired_at TEXT
            );
            INSERT OR IGNORE INTO cycle_lock (id, holder, acquired_at) VALUES (1, NULL, NULL);",
        )
        .map_err(Self::query_err)
    }

    fn try_acquire_cycle_lock(
        &self,
        holder: &str,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> Result<bool, CycletraderError> {
        let conn = self.conn()?;
        let cutoff = format_ts(now - Duration::seconds(ttl_secs.max(0)));
        let updated = conn
            .execute(
                "UPDATE cycle_lock SET holder = ?1, acquired_at = ?2
                 WHERE id = 1
                   AND (holder IS NULL OR acquired_at IS NULL OR acquired_at < ?3)",
                params![holder, format_ts(now), cutoff],
            )
            .map_err(Self::query_err)?;
        Ok(updated == 1)
    }

    fn release_cycle_lock(&self, holder: &str) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE cycle_lock SET holder = NULL, acquired_at = NULL
             WHERE id = 1 AND holder = ?1",
            params![holder],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn cycle_started(&self, started_at: DateTime<Utc>) -> Result<i64, CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cycle_runs (started_at, status) VALUES (?1, ?2)",
            params![format_ts(started_at), CycleStatus::Running.as_str()],
        )
        .map_err(Self::query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn cycle_finished(
        &self,
        id: i64,
        status: CycleStatus,
        counts: &CycleCounts,
        error: Option<&str>,
        ended_at: DateTime<Utc>,
    ) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE cycle_runs
             SET ended_at = ?2, status = ?3, entry_count = ?4,
                 no_entry_count = ?5, sold_count = ?6, error = ?7
             WHERE id = ?1",
            params![
                id,
                format_ts(ended_at),
                status.as_str(),
                counts.entries as i64,
                counts.no_entries as i64,
                counts.sold as i64,
                error
            ],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleRun>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, started_at, ended_at, status, entry_count, no_entry_count,
                        sold_count, error
                 FROM cycle_runs ORDER BY id DESC LIMIT ?1",
            )
            .map_err(Self::query_err)?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let started_str: String = row.get(1)?;
                let ended_str: Option<String> = row.get(2)?;
                let status_str: String = row.get(3)?;
                Ok(CycleRun {
                    id: Some(row.get(0)?),
                    started_at: parse_ts_column(1, &started_str)?,
                    ended_at: ended_str.map(|s| parse_ts_column(2, &s)).transpose()?,
                    status: CycleStatus::from_str(&status_str)
                        .map_err(|e| text_conv_err(3, e))?,
                    counts: CycleCounts {
                        entries: row.get::<_, i64>(4)? as usize,
                        no_entries: row.get::<_, i64>(5)? as usize,
                        sold: row.get::<_, i64>(6)? as usize,
                    },
                    error: row.get(7)?,
                })
            })
            .map_err(Self::query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Self::query_err)
    }

    fn insert_holding(&self, holding: &Holding) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO holdings
             (symbol, status, entry_price, quantity, quote_amount, entry_time,
              stop_loss, target_price, peak_price, trigger_type, entry_score, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                holding.symbol,
                holding.status.as_str(),
                holding.entry_price,
                holding.quantity,
                holding.quote_amount,
                format_ts(holding.entry_time),
                holding.stop_loss,
                holding.target_price,
                holding.peak_price,
                holding.trigger_type.as_str(),
                holding.entry_score,
                format_ts(holding.entry_time)
            ],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn update_holding(&self, holding: &Holding) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE holdings
             SET status = ?2, entry_price = ?3, quantity = ?4, quote_amount = ?5,
                 stop_loss = ?6, target_price = ?7, peak_price = ?8,
                 last_updated = ?9
             WHERE symbol = ?1 AND status != 'closed'",
            params![
                holding.symbol,
                holding.status.as_str(),
                holding.entry_price,
                holding.quantity,
                holding.quote_amount,
                holding.stop_loss,
                holding.target_price,
                holding.peak_price,
                format_ts(Utc::now())
            ],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn close_holding(&self, symbol: &str, exit: &HoldingExit) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE holdings
             SET status = 'closed', exit_price = ?2, realized_pnl_pct = ?3,
                 exit_type = ?4, exit_reason = ?5, exit_detail = ?6,
                 closed_at = ?7, last_updated = ?7
             WHERE symbol = ?1 AND status != 'closed'",
            params![
                symbol,
                exit.exit_price,
                exit.realized_pnl_pct,
                exit.exit_type.map(|t| t.as_str()),
                exit.exit_reason.as_str(),
                exit.detail,
                format_ts(exit.closed_at)
            ],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn delete_unfilled_holding(&self, symbol: &str) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM holdings WHERE symbol = ?1 AND status = 'pending_entry'",
            params![symbol],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn open_holdings(&self) -> Result<Vec<Holding>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, status, entry_price, quantity, quote_amount, entry_time,
                        stop_loss, target_price, peak_price, trigger_type, entry_score
                 FROM holdings WHERE status != 'closed' ORDER BY symbol",
            )
            .map_err(Self::query_err)?;

        let rows = stmt.query_map([], Self::map_holding).map_err(Self::query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Self::query_err)
    }

    fn closed_trades(&self) -> Result<Vec<ClosedTrade>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, trigger_type, entry_price, exit_price, quantity, quote_amount,
                        realized_pnl_pct, entry_time, closed_at, exit_type, exit_reason
                 FROM holdings WHERE status = 'closed' ORDER BY closed_at",
            )
            .map_err(Self::query_err)?;

        let rows = stmt
            .query_map([], |row| {
                let trigger_str: String = row.get(1)?;
                let entry_str: String = row.get(7)?;
                let closed_str: String = row.get(8)?;
                let exit_type_str: Option<String> = row.get(9)?;
                let exit_reason_str: String = row.get(10)?;
                Ok(ClosedTrade {
                    symbol: row.get(0)?,
                    trigger_type: TriggerTypeCol::parse(1, &trigger_str)?,
                    entry_price: row.get(2)?,
                    exit_price: row.get(3)?,
                    quantity: row.get(4)?,
                    quote_amount: row.get(5)?,
                    realized_pnl_pct: row.get(6)?,
                    entry_time: parse_ts_column(7, &entry_str)?,
                    closed_at: parse_ts_column(8, &closed_str)?,
                    exit_type: exit_type_str
                        .map(|s| ExitType::from_str(&s).map_err(|e| text_conv_err(9, e)))
                        .transpose()?,
                    exit_reason: ExitReasonType::from_str(&exit_reason_str)
                        .map_err(|e| text_conv_err(10, e))?,
                })
            })
            .map_err(Self::query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Self::query_err)
    }

    fn last_sell_times(&self) -> Result<HashMap<String, DateTime<Utc>>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, MAX(closed_at) FROM holdings
                 WHERE status = 'closed' AND closed_at IS NOT NULL
                 GROUP BY symbol",
            )
            .map_err(Self::query_err)?;

        let rows = stmt
            .query_map([], |row| {
                let symbol: String = row.get(0)?;
                let ts: String = row.get(1)?;
                Ok((symbol, ts))
            })
            .map_err(Self::query_err)?;

        let mut map = HashMap::new();
        for row in rows {
            let (symbol, ts) = row.map_err(Self::query_err)?;
            map.insert(symbol, parse_ts(&ts)?);
        }
        Ok(map)
    }

    fn realized_pnl_since(&self, since: DateTime<Utc>) -> Result<f64, CycletraderError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COALESCE(SUM(quote_amount * realized_pnl_pct / 100.0), 0.0)
             FROM holdings
             WHERE status = 'closed' AND closed_at >= ?1",
            params![format_ts(since)],
            |row| row.get(0),
        )
        .map_err(Self::query_err)
    }

    fn record_execution(&self, execution: &OrderExecution) -> Result<i64, CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO order_executions
             (symbol, side, status, requested_price, executed_price, quantity,
              quote_amount, fee_amount, realized_pnl_pct, exit_type, exit_reason,
              detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                execution.symbol,
                execution.side.as_str(),
                execution.status.as_str(),
                execution.requested_price,
                execution.executed_price,
                execution.quantity,
                execution.quote_amount,
                execution.fee_amount,
                execution.realized_pnl_pct,
                execution.exit_type.map(|t| t.as_str()),
                execution.exit_reason.map(|r| r.as_str()),
                execution.detail,
                format_ts(execution.created_at)
            ],
        )
        .map_err(Self::query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn recent_executions(&self, limit: usize) -> Result<Vec<OrderExecution>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, symbol, side, status, requested_price, executed_price, quantity,
                        quote_amount, fee_amount, realized_pnl_pct, exit_type, exit_reason,
                        detail, created_at
                 FROM order_executions ORDER BY id DESC LIMIT ?1",
            )
            .map_err(Self::query_err)?;

        let rows = stmt
            .query_map(params![limit as i64], Self::map_execution)
            .map_err(Self::query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Self::query_err)
    }

    fn record_decision(&self, decision: &DecisionRecord) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        let verdict = match decision.verdict {
            crate::ports::judgment_port::Verdict::Entry => "entry",
            crate::ports::judgment_port::Verdict::NoEntry => "no_entry",
        };
        conn.execute(
            "INSERT INTO decisions
             (symbol, decided_at, price, decision, skip_reason, target_price, stop_loss,
              risk_reward, trigger_type, composite_score, agent_fit_score, buy_score, min_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                decision.symbol,
                format_ts(decision.decided_at),
                decision.price,
                verdict,
                decision.skip_reason,
                decision.target_price,
                decision.stop_loss,
                decision.risk_reward,
                decision.trigger_type.as_str(),
                decision.composite_score,
                decision.agent_fit_score,
                decision.buy_score,
                decision.min_score
            ],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn insert_tracked_outcome(&self, outcome: &TrackedOutcome) -> Result<(), CycletraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tracked_outcomes
             (symbol, trigger_type, decided_at, price, target_price, stop_loss, entered,
              return_24h, return_72h, return_168h, hit_target, hit_stop, status, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                outcome.symbol,
                outcome.trigger_type.as_str(),
                format_ts(outcome.decided_at),
                outcome.price,
                outcome.target_price,
                outcome.stop_loss,
                outcome.entered as i64,
                outcome.return_24h,
                outcome.return_72h,
                outcome.return_168h,
                outcome.hit_target as i64,
                outcome.hit_stop as i64,
                outcome.status.as_str(),
                format_ts(outcome.decided_at)
            ],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn pending_outcomes(&self) -> Result<Vec<TrackedOutcome>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, symbol, trigger_type, decided_at, price, target_price, stop_loss,
                        entered, return_24h, return_72h, return_168h, hit_target, hit_stop, status
                 FROM tracked_outcomes WHERE status = 'pending' ORDER BY id",
            )
            .map_err(Self::query_err)?;

        let rows = stmt.query_map([], Self::map_outcome).map_err(Self::query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Self::query_err)
    }

    fn update_tracked_outcome(&self, outcome: &TrackedOutcome) -> Result<(), CycletraderError> {
        let id = outcome.id.ok_or_else(|| CycletraderError::DatabaseQuery {
            reason: "tracked outcome update requires an id".to_string(),
        })?;
        let conn = self.conn()?;
        conn.execute(
            "UPDATE tracked_outcomes
             SET return_24h = ?2, return_72h = ?3, return_168h = ?4,
                 hit_target = ?5, hit_stop = ?6, status = ?7, last_updated = ?8
             WHERE id = ?1",
            params![
                id,
                outcome.return_24h,
                outcome.return_72h,
                outcome.return_168h,
                outcome.hit_target as i64,
                outcome.hit_stop as i64,
                outcome.status.as_str(),
                format_ts(Utc::now())
            ],
        )
        .map_err(Self::query_err)?;
        Ok(())
    }

    fn all_outcomes(&self) -> Result<Vec<TrackedOutcome>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, symbol, trigger_type, decided_at, price, target_price, stop_loss,
                        entered, return_24h, return_72h, return_168h, hit_target, hit_stop, status
                 FROM tracked_outcomes ORDER BY id",
            )
            .map_err(Self::query_err)?;

        let rows = stmt.query_map([], Self::map_outcome).map_err(Self::query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Self::query_err)
    }
}

impl PricePort for SqliteStore {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, CycletraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, timeframe, timestamp, open, high, low, close, volume
                 FROM candles
                 WHERE symbol = ?1 AND timeframe = ?2
                 ORDER BY timestamp DESC LIMIT ?3",
            )
            .map_err(Self::query_err)?;

        let rows = stmt
            .query_map(params![symbol, timeframe.as_str(), limit as i64], |row| {
                let tf_str: String = row.get(1)?;
                let ts_str: String = row.get(2)?;
                Ok(Candle {
                    symbol: row.get(0)?,
                    timeframe: Timeframe::from_str(&tf_str).map_err(|e| text_conv_err(1, e))?,
                    timestamp: parse_ts_column(2, &ts_str)?,
                    open: row.get(3)?,
                    high: row.get(4)?,
                    low: row.get(5)?,
                    close: row.get(6)?,
                    volume: row.get(7)?,
                })
            })
            .map_err(Self::query_err)?;

        let mut candles = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Self::query_err)?;
        candles.reverse();
        Ok(candles)
    }

    fn latest_price(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(f64, DateTime<Utc>)>, CycletraderError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT close, timestamp FROM candles
             WHERE symbol = ?1 AND timeframe = ?2
             ORDER BY timestamp DESC LIMIT 1",
            params![symbol, timeframe.as_str()],
            |row| {
                let close: f64 = row.get(0)?;
                let ts_str: String = row.get(1)?;
                Ok((close, ts_str))
            },
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Self::query_err(other)),
        })?
        .map(|(close, ts)| Ok((close, parse_ts(&ts)?)))
        .transpose()
    }
}
