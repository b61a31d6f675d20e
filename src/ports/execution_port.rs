//! Order execution port trait.
//!
//! The paper adapter and a future live-exchange adapter sit behind the same
//! contract; the position manager never learns which one it is talking to.

use crate::domain::error::CycletraderError;
use crate::domain::execution::FillReport;

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Filled(FillReport),
    Rejected { reason: String },
}

pub trait ExecutionPort {
    /// Market buy sized by quote amount at the given reference price.
    fn buy(
        &self,
        symbol: &str,
        quote_amount: f64,
        reference_price: f64,
    ) -> Result<OrderOutcome, CycletraderError>;

    /// Market sell of the full quantity at the given reference price.
    fn sell(
        &self,
        symbol: &str,
        quantity: f64,
        reference_price: f64,
    ) -> Result<OrderOutcome, CycletraderError>;
}
