use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::PortfolioError;

/// Asset classes tracked by the system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Stock,
    Cash,
    Debt,
    RealEstate,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "STOCK",
            AssetClass::Cash => "CASH",
            AssetClass::Debt => "DEBT",
            AssetClass::RealEstate => "REAL_ESTATE",
        }
    }
}

impl FromStr for AssetClass {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "STOCK" | "STOCKS" => Ok(AssetClass::Stock),
            "CASH" => Ok(AssetClass::Cash),
            "DEBT" => Ok(AssetClass::Debt),
            "REAL_ESTATE" | "REALESTATE" => Ok(AssetClass::RealEstate),
            _ => Err(PortfolioError::ParseError(format!(
                "unknown asset class '{}'",
                s
            ))),
        }
    }
}

/// Transaction direction (position opened/increased vs reduced/closed)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Remove => "remove",
        }
    }
}

impl FromStr for Action {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" | "buy" => Ok(Action::Add),
            // "sell" survives from older event logs
            "remove" | "sell" => Ok(Action::Remove),
            _ => Err(PortfolioError::ParseError(format!(
                "unknown action '{}'",
                s
            ))),
        }
    }
}

/// Equity transaction (buy or sell of a listed ticker)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTx {
    pub id: Option<i64>,
    pub portfolio_id: i64,
    pub ticker: String,
    pub action: Action,
    pub shares: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub timestamp: NaiveDateTime,
}

/// Cash or debt transaction; the two classes share a shape and differ only
/// in sign convention at valuation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTx {
    pub id: Option<i64>,
    pub portfolio_id: i64,
    pub asset_class: AssetClass,
    pub name: String,
    pub action: Action,
    pub amount: Decimal,
    pub annual_rate_pct: Decimal,
    pub timestamp: NaiveDateTime,
}

/// Real estate transaction (property acquired or divested at a stated worth)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealEstateTx {
    pub id: Option<i64>,
    pub portfolio_id: i64,
    pub name: String,
    pub action: Action,
    pub worth: Decimal,
    pub timestamp: NaiveDateTime,
}
