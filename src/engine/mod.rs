//! Valuation reconstruction engine
//!
//! Turns sparse, irregularly-timed transaction events plus sparse market
//! price series into dense day-by-day valuations. Every computation is a
//! pure function of (transactions before the cutoff, fetched market data);
//! nothing derived is persisted.

pub mod accrual;
pub mod cost_basis;
pub mod populate;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;
use crate::pricing::MarketDataProvider;

/// Per-request computation context. Replaces any process-wide session or
/// engine object: it borrows the store connection and the market data
/// provider for the duration of one valuation and is dropped with it.
pub struct ValuationContext<'a> {
    pub conn: &'a Connection,
    pub provider: &'a dyn MarketDataProvider,
    pub portfolio_id: i64,
    /// Exclusive upper bound for transactions; the produced series still
    /// include this date itself.
    pub cutoff: NaiveDate,
}

impl ValuationContext<'_> {
    /// The cutoff as a timestamp bound: transactions strictly before
    /// midnight of the cutoff date participate in the computation.
    pub fn cutoff_bound(&self) -> Result<NaiveDateTime> {
        self.cutoff
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid cutoff date {}", self.cutoff))
    }
}

/// Point aggregate of an equity position, valid only at its listed date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSnapshot {
    pub ticker: String,
    pub date: NaiveDate,
    pub total_shares: Decimal,
    pub avg_cost_basis: Decimal,
}

/// One densified output row: the unit produced by the populator and
/// consumed by the report aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub key: String,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub price: Decimal,
    pub value: Decimal,
}
