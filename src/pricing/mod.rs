// Pricing module - market data provider seam and calendar densification

pub mod gapfill;
pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One external daily price observation. Non-trading calendar days are
/// absent from provider output and synthesized by the gap-filler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub close: Decimal,
    pub dividend: Decimal,
}

/// Bounds on a single provider round-trip.
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Additional attempts after the first failure.
    pub retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retries: 2,
        }
    }
}

/// Source of daily OHLC history. The engine consumes this only through the
/// gap-filler; a fetch failure must surface as an error, never as zeros.
#[async_trait]
pub trait MarketDataProvider {
    /// Daily bars for `ticker` over `[start, end]` inclusive, sorted by
    /// date ascending. May omit non-trading days.
    async fn history(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<PricePoint>>;
}
