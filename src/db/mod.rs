// Database module - SQLite transaction store

pub mod models;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::error::PortfolioError;

pub use models::{Action, AssetClass, BalanceTx, RealEstateTx, StockTx};

/// Get the default database path (~/.worth/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let worth_dir = PathBuf::from(home).join(".worth");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&worth_dir).context("Failed to create .worth directory")?;

    Ok(worth_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = db_path.unwrap_or(get_default_db_path()?);
    let conn = Connection::open(&path).map_err(|e| {
        PortfolioError::DbError(format!("failed to open database at {:?}: {}", path, e))
    })?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .map_err(|e| PortfolioError::DbError(format!("failed to enable foreign keys: {}", e)))?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// Creates the database file and runs the schema SQL to set up all tables
/// and indexes.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = db_path.unwrap_or(get_default_db_path()?);

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;

    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;

    info!("Database initialized successfully");
    Ok(())
}

/// Find a portfolio by name or create it, returning its id
pub fn ensure_portfolio(conn: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM portfolios WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute("INSERT INTO portfolios (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

/// Look up a portfolio's display name
pub fn get_portfolio_name(conn: &Connection, portfolio_id: i64) -> Result<Option<String>> {
    let name = conn
        .query_row(
            "SELECT name FROM portfolios WHERE id = ?1",
            [portfolio_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(name)
}

/// Insert an equity transaction
pub fn insert_stock_transaction(conn: &Connection, tx: &StockTx) -> Result<i64> {
    conn.execute(
        "INSERT INTO stock_transactions (
            portfolio_id, ticker, action, shares, price, fees, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.portfolio_id,
            tx.ticker,
            tx.action.as_str(),
            tx.shares.to_string(),
            tx.price.to_string(),
            tx.fees.to_string(),
            tx.timestamp,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Insert a cash or debt transaction
pub fn insert_balance_transaction(conn: &Connection, tx: &BalanceTx) -> Result<i64> {
    conn.execute(
        "INSERT INTO balance_transactions (
            portfolio_id, asset_class, name, action, amount, annual_rate_pct, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.portfolio_id,
            tx.asset_class.as_str(),
            tx.name,
            tx.action.as_str(),
            tx.amount.to_string(),
            tx.annual_rate_pct.to_string(),
            tx.timestamp,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Insert a real estate transaction
pub fn insert_real_estate_transaction(conn: &Connection, tx: &RealEstateTx) -> Result<i64> {
    conn.execute(
        "INSERT INTO real_estate_transactions (
            portfolio_id, name, action, worth, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tx.portfolio_id,
            tx.name,
            tx.action.as_str(),
            tx.worth.to_string(),
            tx.timestamp,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// List equity transactions for a portfolio, ascending by timestamp,
/// optionally restricted to timestamps strictly before a cutoff.
pub fn list_stock_transactions(
    conn: &Connection,
    portfolio_id: i64,
    before: Option<NaiveDateTime>,
) -> Result<Vec<StockTx>> {
    let mut stmt = conn.prepare(
        "SELECT id, portfolio_id, ticker, action, shares, price, fees, timestamp
         FROM stock_transactions
         WHERE portfolio_id = ?1 AND (?2 IS NULL OR timestamp < ?2)
         ORDER BY timestamp ASC, id ASC",
    )?;

    let txs = stmt
        .query_map(params![portfolio_id, before], |row| {
            Ok(StockTx {
                id: Some(row.get(0)?),
                portfolio_id: row.get(1)?,
                ticker: row.get(2)?,
                action: parse_action(row, 3)?,
                shares: get_decimal_value(row, 4)?,
                price: get_decimal_value(row, 5)?,
                fees: get_decimal_value(row, 6)?,
                timestamp: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(txs)
}

/// List cash or debt transactions for a portfolio, ascending by timestamp.
pub fn list_balance_transactions(
    conn: &Connection,
    portfolio_id: i64,
    asset_class: AssetClass,
    before: Option<NaiveDateTime>,
) -> Result<Vec<BalanceTx>> {
    let mut stmt = conn.prepare(
        "SELECT id, portfolio_id, asset_class, name, action, amount, annual_rate_pct, timestamp
         FROM balance_transactions
         WHERE portfolio_id = ?1 AND asset_class = ?2 AND (?3 IS NULL OR timestamp < ?3)
         ORDER BY timestamp ASC, id ASC",
    )?;

    let txs = stmt
        .query_map(params![portfolio_id, asset_class.as_str(), before], |row| {
            Ok(BalanceTx {
                id: Some(row.get(0)?),
                portfolio_id: row.get(1)?,
                asset_class: parse_asset_class(row, 2)?,
                name: row.get(3)?,
                action: parse_action(row, 4)?,
                amount: get_decimal_value(row, 5)?,
                annual_rate_pct: get_decimal_value(row, 6)?,
                timestamp: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(txs)
}

/// List real estate transactions for a portfolio, ascending by timestamp.
pub fn list_real_estate_transactions(
    conn: &Connection,
    portfolio_id: i64,
    before: Option<NaiveDateTime>,
) -> Result<Vec<RealEstateTx>> {
    let mut stmt = conn.prepare(
        "SELECT id, portfolio_id, name, action, worth, timestamp
         FROM real_estate_transactions
         WHERE portfolio_id = ?1 AND (?2 IS NULL OR timestamp < ?2)
         ORDER BY timestamp ASC, id ASC",
    )?;

    let txs = stmt
        .query_map(params![portfolio_id, before], |row| {
            Ok(RealEstateTx {
                id: Some(row.get(0)?),
                portfolio_id: row.get(1)?,
                name: row.get(2)?,
                action: parse_action(row, 3)?,
                worth: get_decimal_value(row, 4)?,
                timestamp: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(txs)
}

fn parse_action(row: &Row, idx: usize) -> Result<Action, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    Action::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_asset_class(row: &Row, idx: usize) -> Result<AssetClass, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    AssetClass::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Helper to read Decimal from SQLite (handles TEXT, INTEGER and REAL affinity)
fn get_decimal_value(row: &Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    if let Ok(s) = row.get::<_, String>(idx) {
        return Decimal::from_str(&s)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)));
    }

    if let Ok(i) = row.get::<_, i64>(idx) {
        return Ok(Decimal::from(i));
    }

    if let Ok(f) = row.get::<_, f64>(idx) {
        return Decimal::try_from(f)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)));
    }

    Err(rusqlite::Error::InvalidColumnType(
        idx,
        "amount".to_string(),
        rusqlite::types::Type::Null,
    ))
}
