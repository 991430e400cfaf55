//! Point-in-time holdings view
//!
//! The net signed sum of all transactions grouped by instrument key,
//! independent of date. This is the "what do I hold right now" display,
//! not a historical valuation; fully divested keys are dropped.

use rust_decimal::Decimal;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::{self, models::AssetClass};
use crate::engine::accrual::signed_delta;
use crate::error::{PortfolioError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct StockHolding {
    pub ticker: String,
    pub shares: Decimal,
    pub avg_cost_basis: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceHolding {
    pub name: String,
    /// Signed: cash positive, debt negative.
    pub amount: Decimal,
    /// The rate stated on the key's most recent transaction.
    pub annual_rate_pct: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealEstateHolding {
    pub name: String,
    pub worth: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioHoldings {
    pub portfolio: String,
    pub stocks: Vec<StockHolding>,
    pub cash: Vec<BalanceHolding>,
    pub debt: Vec<BalanceHolding>,
    pub real_estate: Vec<RealEstateHolding>,
}

/// Net current holdings per asset class for one portfolio.
pub fn current_holdings(conn: &Connection, portfolio_id: i64) -> Result<PortfolioHoldings> {
    let portfolio = db::get_portfolio_name(conn, portfolio_id)?
        .unwrap_or_else(|| format!("portfolio {}", portfolio_id));

    Ok(PortfolioHoldings {
        portfolio,
        stocks: stock_holdings(conn, portfolio_id)?,
        cash: balance_holdings(conn, portfolio_id, AssetClass::Cash)?,
        debt: balance_holdings(conn, portfolio_id, AssetClass::Debt)?,
        real_estate: real_estate_holdings(conn, portfolio_id)?,
    })
}

/// Net share count currently held for one ticker. Used by the CLI to
/// refuse removals that exceed the position.
pub fn remaining_shares(conn: &Connection, portfolio_id: i64, ticker: &str) -> Result<Decimal> {
    let holdings = stock_holdings(conn, portfolio_id)?;
    Ok(holdings
        .into_iter()
        .find(|h| h.ticker == ticker)
        .map(|h| h.shares)
        .unwrap_or(Decimal::ZERO))
}

/// Net amount currently held for one cash/debt key (signed).
pub fn remaining_balance(
    conn: &Connection,
    portfolio_id: i64,
    asset_class: AssetClass,
    name: &str,
) -> Result<Decimal> {
    let holdings = balance_holdings(conn, portfolio_id, asset_class)?;
    Ok(holdings
        .into_iter()
        .find(|h| h.name == name)
        .map(|h| h.amount)
        .unwrap_or(Decimal::ZERO))
}

fn stock_holdings(conn: &Connection, portfolio_id: i64) -> Result<Vec<StockHolding>> {
    let txs = db::list_stock_transactions(conn, portfolio_id, None)?;
    let snapshots = crate::engine::cost_basis::aggregate_cost_basis(&txs)?;

    // The last surviving snapshot per ticker is the current position
    let mut latest: BTreeMap<String, StockHolding> = BTreeMap::new();
    let mut net: BTreeMap<String, Decimal> = BTreeMap::new();
    for tx in &txs {
        let delta = match tx.action {
            db::Action::Add => tx.shares,
            db::Action::Remove => -tx.shares,
        };
        *net.entry(tx.ticker.clone()).or_insert(Decimal::ZERO) += delta;
    }
    for snap in snapshots {
        latest.insert(
            snap.ticker.clone(),
            StockHolding {
                ticker: snap.ticker,
                shares: snap.total_shares,
                avg_cost_basis: snap.avg_cost_basis,
            },
        );
    }

    Ok(latest
        .into_values()
        .filter(|h| net.get(&h.ticker).copied().unwrap_or(Decimal::ZERO) > Decimal::ZERO)
        .collect())
}

fn balance_holdings(
    conn: &Connection,
    portfolio_id: i64,
    asset_class: AssetClass,
) -> Result<Vec<BalanceHolding>> {
    let txs = db::list_balance_transactions(conn, portfolio_id, asset_class, None)?;

    let mut net: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut last_rate: BTreeMap<String, Decimal> = BTreeMap::new();
    for tx in &txs {
        *net.entry(tx.name.clone()).or_insert(Decimal::ZERO) += signed_delta(tx);
        last_rate.insert(tx.name.clone(), tx.annual_rate_pct);

        let running = net[&tx.name];
        let overdrawn = match asset_class {
            AssetClass::Debt => running > Decimal::ZERO,
            _ => running < Decimal::ZERO,
        };
        if overdrawn {
            return Err(PortfolioError::DataIntegrity(format!(
                "net {} balance of {} is {}",
                asset_class.as_str(),
                tx.name,
                running
            ))
            .into());
        }
    }

    Ok(net
        .into_iter()
        .filter(|(_, amount)| *amount != Decimal::ZERO)
        .map(|(name, amount)| BalanceHolding {
            annual_rate_pct: last_rate.get(&name).copied().unwrap_or(Decimal::ZERO),
            name,
            amount,
        })
        .collect())
}

fn real_estate_holdings(conn: &Connection, portfolio_id: i64) -> Result<Vec<RealEstateHolding>> {
    let txs = db::list_real_estate_transactions(conn, portfolio_id, None)?;

    let mut net: BTreeMap<String, Decimal> = BTreeMap::new();
    for tx in &txs {
        let delta = match tx.action {
            db::Action::Add => tx.worth,
            db::Action::Remove => -tx.worth,
        };
        *net.entry(tx.name.clone()).or_insert(Decimal::ZERO) += delta;

        if net[&tx.name] < Decimal::ZERO {
            return Err(PortfolioError::DataIntegrity(format!(
                "net worth of property {} is {}",
                tx.name, net[&tx.name]
            ))
            .into());
        }
    }

    Ok(net
        .into_iter()
        .filter(|(_, worth)| *worth != Decimal::ZERO)
        .map(|(name, worth)| RealEstateHolding { name, worth })
        .collect())
}
