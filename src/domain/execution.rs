//! Order execution records and fill arithmetic.
//!
//! The `order_executions` ledger is append-only: one row per simulated fill
//! or rejected attempt. Slippage and fee helpers are shared by the paper
//! adapter and any future live adapter.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Filled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Filled => "filled",
            OrderStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filled" => Ok(OrderStatus::Filled),
            "rejected" => Ok(OrderStatus::Rejected),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    TakeProfit,
    StopLoss,
    Breakeven,
}

impl ExitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitType::TakeProfit => "take_profit",
            ExitType::StopLoss => "stop_loss",
            ExitType::Breakeven => "breakeven",
        }
    }
}

impl FromStr for ExitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "take_profit" => Ok(ExitType::TakeProfit),
            "stop_loss" => Ok(ExitType::StopLoss),
            "breakeven" => Ok(ExitType::Breakeven),
            other => Err(format!("unknown exit type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReasonType {
    StopLoss,
    Rotation,
    Normal,
}

impl ExitReasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReasonType::StopLoss => "stop_loss",
            ExitReasonType::Rotation => "rotation",
            ExitReasonType::Normal => "normal",
        }
    }
}

impl FromStr for ExitReasonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop_loss" => Ok(ExitReasonType::StopLoss),
            "rotation" => Ok(ExitReasonType::Rotation),
            "normal" => Ok(ExitReasonType::Normal),
            other => Err(format!("unknown exit reason: {other}")),
        }
    }
}

/// A successful simulated fill.
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub symbol: String,
    pub side: Side,
    pub executed_price: f64,
    pub quantity: f64,
    pub quote_amount: f64,
    pub fee_amount: f64,
}

/// One row of the append-only execution ledger.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OrderExecution {
    pub id: Option<i64>,
    pub symbol: String,
    pub side: Side,
    pub status: OrderStatus,
    pub requested_price: f64,
    pub executed_price: f64,
    pub quantity: f64,
    pub quote_amount: f64,
    pub fee_amount: f64,
    /// Only set on sell fills.
    pub realized_pnl_pct: Option<f64>,
    pub exit_type: Option<ExitType>,
    pub exit_reason: Option<ExitReasonType>,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

/// Buy fills execute above the reference, sell fills below.
pub fn apply_slippage(reference_price: f64, slippage_rate_pct: f64, side: Side) -> f64 {
    let factor = slippage_rate_pct / 100.0;
    match side {
        Side::Buy => reference_price * (1.0 + factor),
        Side::Sell => reference_price * (1.0 - factor),
    }
}

/// Flat percent of notional.
pub fn fee_amount(notional: f64, fee_rate_pct: f64) -> f64 {
    notional * fee_rate_pct / 100.0
}

/// Percent return of a round trip net of the modeled fee on both legs.
pub fn realized_pnl_pct(entry_price: f64, exit_price: f64, fee_rate_pct: f64) -> f64 {
    if entry_price <= 0.0 {
        return 0.0;
    }
    (exit_price / entry_price - 1.0) * 100.0 - 2.0 * fee_rate_pct
}
