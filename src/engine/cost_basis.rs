//! Cost basis aggregator
//!
//! Reduces an ordered equity transaction log into per-(ticker, date)
//! position snapshots carrying the running share count and average cost.
//!
//! The average is Σ(buy cost incl. fees) / Σ(bought shares): removes reduce
//! the share count but not the cost numerator, so a partially-sold position
//! keeps its pre-sale average cost. This is a documented simplification of
//! lot-level accounting, not an approximation of it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::db::models::{Action, StockTx};
use crate::error::{PortfolioError, Result};

use super::PositionSnapshot;

#[derive(Debug, Default, Clone)]
struct RunningPosition {
    shares: Decimal,
    cost: Decimal,
    bought_shares: Decimal,
}

/// Reduce ordered equity transactions into snapshots, one per
/// (ticker, transaction date), carrying the running totals as of that date.
///
/// Dates where the running share count is not positive yield no snapshot:
/// full divestment is a normal state, not an error. A remove that would
/// drive the count negative is a data-integrity error, and out-of-order
/// timestamps within a ticker are an invalid-input error.
pub fn aggregate_cost_basis(txs: &[StockTx]) -> Result<Vec<PositionSnapshot>> {
    let mut positions: HashMap<String, RunningPosition> = HashMap::new();
    let mut last_seen: HashMap<String, chrono::NaiveDateTime> = HashMap::new();
    let mut by_key: BTreeMap<(String, NaiveDate), RunningPosition> = BTreeMap::new();

    for tx in txs {
        if let Some(prev) = last_seen.get(&tx.ticker) {
            if tx.timestamp < *prev {
                return Err(PortfolioError::InvalidInput(format!(
                    "transactions for {} are not in ascending timestamp order ({} after {})",
                    tx.ticker, tx.timestamp, prev
                ))
                .into());
            }
        }
        last_seen.insert(tx.ticker.clone(), tx.timestamp);

        let position = positions.entry(tx.ticker.clone()).or_default();

        match tx.action {
            Action::Add => {
                position.shares += tx.shares;
                position.bought_shares += tx.shares;
                position.cost += tx.shares * tx.price + tx.fees;
            }
            Action::Remove => {
                if tx.shares > position.shares {
                    return Err(PortfolioError::DataIntegrity(format!(
                        "removing {} shares of {} on {} but only {} held",
                        tx.shares,
                        tx.ticker,
                        tx.timestamp.date(),
                        position.shares
                    ))
                    .into());
                }
                position.shares -= tx.shares;
            }
        }

        // Same-day transactions collapse into one snapshot with the
        // day's final totals
        by_key.insert((tx.ticker.clone(), tx.timestamp.date()), position.clone());
    }

    let snapshots = by_key
        .into_iter()
        .filter(|(_, p)| p.shares > Decimal::ZERO && p.bought_shares > Decimal::ZERO)
        .map(|((ticker, date), p)| PositionSnapshot {
            ticker,
            date,
            total_shares: p.shares,
            avg_cost_basis: p.cost / p.bought_shares,
        })
        .collect();

    Ok(snapshots)
}
