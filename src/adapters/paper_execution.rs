//! Paper execution adapter.
//!
//! Fills at the caller's reference price with a deterministic fee and
//! slippage model. No order book, no real capital. A live-exchange adapter
//! slots in behind the same [`ExecutionPort`] contract.

use crate::domain::error::CycletraderError;
use crate::domain::execution::{apply_slippage, fee_amount, FillReport, Side};
use crate::ports::execution_port::{ExecutionPort, OrderOutcome};

pub struct PaperExecutionAdapter {
    fee_rate_pct: f64,
    slippage_rate_pct: f64,
}

impl PaperExecutionAdapter {
    pub fn new(fee_rate_pct: f64, slippage_rate_pct: f64) -> Self {
        Self {
            fee_rate_pct: fee_rate_pct.max(0.0),
            slippage_rate_pct: slippage_rate_pct.max(0.0),
        }
    }
}

impl Default for PaperExecutionAdapter {
    fn default() -> Self {
        // 0.10% taker fee, 0.05% slippage.
        Self::new(0.1, 0.05)
    }
}

impl ExecutionPort for PaperExecutionAdapter {
    fn buy(
        &self,
        symbol: &str,
        quote_amount: f64,
        reference_price: f64,
    ) -> Result<OrderOutcome, CycletraderError> {
        if reference_price <= 0.0 {
            return Ok(OrderOutcome::Rejected {
                reason: "price unavailable".to_string(),
            });
        }
        if quote_amount <= 0.0 {
            return Ok(OrderOutcome::Rejected {
                reason: "invalid quote amount".to_string(),
            });
        }

        let executed_price = apply_slippage(reference_price, self.slippage_rate_pct, Side::Buy);
        let quantity = quote_amount / executed_price;
        let fee = fee_amount(quote_amount, self.fee_rate_pct);

        Ok(OrderOutcome::Filled(FillReport {
            symbol: symbol.to_string(),
            side: Side::Buy,
            executed_price,
            quantity,
            quote_amount,
            fee_amount: fee,
        }))
    }

    fn sell(
        &self,
        symbol: &str,
        quantity: f64,
        reference_price: f64,
    ) -> Result<OrderOutcome, CycletraderError> {
        if reference_price <= 0.0 || quantity <= 0.0 {
            return Ok(OrderOutcome::Rejected {
                reason: "invalid price or quantity".to_string(),
            });
        }

        let executed_price = apply_slippage(reference_price, self.slippage_rate_pct, Side::Sell);
        let gross = quantity * executed_price;
        let fee = fee_amount(gross, self.fee_rate_pct);

        Ok(OrderOutcome::Filled(FillReport {
            symbol: symbol.to_string(),
            side: Side::Sell,
            executed_price,
            quantity,
            quote_amount: gross,
            fee_amount: fee,
        }))
    }
}
