//! Integration tests for the valuation pipeline
//!
//! These tests verify end-to-end functionality against a real SQLite
//! database and a canned market data provider:
//! - Derived equity prices anchored at cost basis snapshots
//! - Weekend/holiday gap filling at the report level
//! - Daily interest compounding for cash and debt
//! - Carry-forward real estate series
//! - The combined assets report and its per-date totals
//! - Integrity errors surfacing instead of silent zeros

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rusqlite::Connection;
use std::collections::HashMap;
use tempfile::TempDir;

use worth::db::{
    self, ensure_portfolio, init_database, open_db, Action, AssetClass, BalanceTx, RealEstateTx,
    StockTx,
};
use worth::engine::ValuationContext;
use worth::error::PortfolioError;
use worth::pricing::{MarketDataProvider, PricePoint};
use worth::reports::history;

/// Test helper: Create a temporary database with one portfolio
fn create_test_db() -> Result<(TempDir, Connection, i64)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    init_database(Some(db_path.clone()))?;
    let conn = open_db(Some(db_path))?;
    let portfolio_id = ensure_portfolio(&conn, "test")?;
    Ok((temp_dir, conn, portfolio_id))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(0, 0, 0).unwrap()
}

fn point(ticker: &str, d: NaiveDate, close: Decimal) -> PricePoint {
    PricePoint {
        ticker: ticker.to_string(),
        date: d,
        open: close,
        close,
        dividend: Decimal::ZERO,
    }
}

/// Serves a fixed per-ticker price history, clipped to the requested range.
struct MockProvider {
    points: HashMap<String, Vec<PricePoint>>,
}

impl MockProvider {
    fn new(points: Vec<PricePoint>) -> Self {
        let mut map: HashMap<String, Vec<PricePoint>> = HashMap::new();
        for p in points {
            map.entry(p.ticker.clone()).or_default().push(p);
        }
        Self { points: map }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> worth::error::Result<Vec<PricePoint>> {
        Ok(self
            .points
            .get(ticker)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.date >= start && p.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Always fails, as if the upstream API were down.
struct FailingProvider;

#[async_trait]
impl MarketDataProvider for FailingProvider {
    async fn history(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> worth::error::Result<Vec<PricePoint>> {
        Err(PortfolioError::MarketData {
            ticker: ticker.to_string(),
            reason: "connection refused".to_string(),
        }
        .into())
    }
}

fn stock_tx(
    portfolio_id: i64,
    ticker: &str,
    action: Action,
    shares: Decimal,
    price: Decimal,
    ts: NaiveDateTime,
) -> StockTx {
    StockTx {
        id: None,
        portfolio_id,
        ticker: ticker.to_string(),
        action,
        shares,
        price,
        fees: Decimal::ZERO,
        timestamp: ts,
    }
}

fn balance_tx(
    portfolio_id: i64,
    asset_class: AssetClass,
    name: &str,
    action: Action,
    amount: Decimal,
    rate: Decimal,
    ts: NaiveDateTime,
) -> BalanceTx {
    BalanceTx {
        id: None,
        portfolio_id,
        asset_class,
        name: name.to_string(),
        action,
        amount,
        annual_rate_pct: rate,
        timestamp: ts,
    }
}

#[tokio::test]
async fn stock_prices_are_anchored_at_cost_basis_not_market() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_stock_transaction(
        &conn,
        &stock_tx(pid, "AAPL", Action::Add, dec!(10), dec!(100), midnight(2024, 1, 1)),
    )?;

    // Market trades well above the purchase price; the report must start at
    // the average cost and drift by close-to-close deltas only.
    let provider = MockProvider::new(vec![
        point("AAPL", date(2024, 1, 1), dec!(110)),
        point("AAPL", date(2024, 1, 2), dec!(112)),
        point("AAPL", date(2024, 1, 3), dec!(111)),
    ]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 3),
    };

    let records = history::historical_stocks(&ctx).await?;
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].date, date(2024, 1, 1));
    assert_eq!(records[0].price, dec!(100.00));
    assert_eq!(records[0].value, dec!(1000.00));

    // +2 then -1 from the market closes
    assert_eq!(records[1].price, dec!(102.00));
    assert_eq!(records[1].value, dec!(1020.00));
    assert_eq!(records[2].price, dec!(101.00));
    assert_eq!(records[2].value, dec!(1010.00));
    Ok(())
}

#[tokio::test]
async fn stock_series_is_dense_across_market_gaps() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_stock_transaction(
        &conn,
        &stock_tx(pid, "AAPL", Action::Add, dec!(5), dec!(50), midnight(2024, 1, 5)),
    )?;

    // Friday and the following Monday only; the weekend must be filled in
    let provider = MockProvider::new(vec![
        point("AAPL", date(2024, 1, 5), dec!(50)),
        point("AAPL", date(2024, 1, 8), dec!(52)),
    ]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 8),
    };

    let records = history::historical_stocks(&ctx).await?;
    let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
    assert_eq!(
        dates,
        vec![
            date(2024, 1, 5),
            date(2024, 1, 6),
            date(2024, 1, 7),
            date(2024, 1, 8)
        ]
    );

    // Weekend days hold Friday's value, Monday moves by the +2 close delta
    assert_eq!(records[0].value, dec!(250.00));
    assert_eq!(records[1].value, dec!(250.00));
    assert_eq!(records[2].value, dec!(250.00));
    assert_eq!(records[3].value, dec!(260.00));
    Ok(())
}

#[tokio::test]
async fn stock_report_is_independent_of_insertion_order() -> Result<()> {
    let market = vec![
        point("AAPL", date(2024, 1, 1), dec!(100)),
        point("AAPL", date(2024, 1, 2), dec!(101)),
        point("MSFT", date(2024, 1, 1), dec!(300)),
        point("MSFT", date(2024, 1, 2), dec!(305)),
    ];

    let mut runs = Vec::new();
    for reversed in [false, true] {
        let (_tmp, conn, pid) = create_test_db()?;
        let mut txs = vec![
            stock_tx(pid, "AAPL", Action::Add, dec!(10), dec!(100), midnight(2024, 1, 1)),
            stock_tx(pid, "MSFT", Action::Add, dec!(2), dec!(300), midnight(2024, 1, 1)),
        ];
        if reversed {
            txs.reverse();
        }
        for tx in &txs {
            db::insert_stock_transaction(&conn, tx)?;
        }

        let provider = MockProvider::new(market.clone());
        let ctx = ValuationContext {
            conn: &conn,
            provider: &provider,
            portfolio_id: pid,
            cutoff: date(2024, 1, 2),
        };
        runs.push(history::historical_stocks(&ctx).await?);
    }

    assert_eq!(runs[0], runs[1]);
    Ok(())
}

#[tokio::test]
async fn cash_compounds_daily_over_a_year() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_balance_transaction(
        &conn,
        &balance_tx(
            pid,
            AssetClass::Cash,
            "savings",
            Action::Add,
            dec!(1000),
            dec!(5),
            midnight(2024, 1, 1),
        ),
    )?;

    let provider = MockProvider::new(vec![]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 12, 31),
    };

    let records = history::historical_cash(&ctx)?;
    // 2024 is a leap year: one row per calendar day
    assert_eq!(records.len(), 366);
    assert_eq!(records[0].value, dec!(1000.00));
    assert_eq!(records[0].price, Decimal::ONE);

    // 365 daily applications of 5%/365, rounded to cents each day
    let last = records.last().unwrap();
    assert_eq!(last.date, date(2024, 12, 31));
    assert_eq!(last.value, dec!(1051.10));
    Ok(())
}

#[tokio::test]
async fn debt_series_is_negative_and_accrues() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_balance_transaction(
        &conn,
        &balance_tx(
            pid,
            AssetClass::Debt,
            "mortgage",
            Action::Add,
            dec!(1000),
            dec!(10),
            midnight(2024, 1, 1),
        ),
    )?;

    let provider = MockProvider::new(vec![]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 2),
    };

    let records = history::historical_debt(&ctx)?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].value, dec!(-1000.00));
    assert_eq!(records[1].value, dec!(-1000.27));
    Ok(())
}

#[tokio::test]
async fn real_estate_carries_worth_forward() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_real_estate_transaction(
        &conn,
        &RealEstateTx {
            id: None,
            portfolio_id: pid,
            name: "house".to_string(),
            action: Action::Add,
            worth: dec!(200000),
            timestamp: midnight(2024, 1, 1),
        },
    )?;

    let provider = MockProvider::new(vec![]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 10),
    };

    let records = history::historical_real_estate(&ctx)?;
    assert_eq!(records.len(), 10);
    assert!(records.iter().all(|r| r.value == dec!(200000)));
    assert!(records.iter().all(|r| r.key == "house"));
    Ok(())
}

#[tokio::test]
async fn combined_assets_report_stocks_zero_before_purchase() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    // Cash opens the portfolio on Jan 1, the stock arrives Jan 5
    db::insert_balance_transaction(
        &conn,
        &balance_tx(
            pid,
            AssetClass::Cash,
            "checking",
            Action::Add,
            dec!(500),
            dec!(0),
            midnight(2024, 1, 1),
        ),
    )?;
    db::insert_stock_transaction(
        &conn,
        &stock_tx(pid, "AAPL", Action::Add, dec!(10), dec!(100), midnight(2024, 1, 5)),
    )?;

    let provider = MockProvider::new(vec![
        point("AAPL", date(2024, 1, 5), dec!(100)),
        point("AAPL", date(2024, 1, 6), dec!(102)),
    ]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 6),
    };

    let records = history::historical_assets(&ctx).await?;
    let stock_rows: Vec<_> = records.iter().filter(|r| r.key == "AAPL").collect();

    // Jan 1 through Jan 6, zero until the purchase date
    assert_eq!(stock_rows.len(), 6);
    for row in &stock_rows[..4] {
        assert_eq!(row.value, Decimal::ZERO);
        assert_eq!(row.quantity, Decimal::ZERO);
    }
    assert_eq!(stock_rows[4].value, dec!(1000.00));
    assert_eq!(stock_rows[5].value, dec!(1020.00));

    // Totals are the elementwise sum of the stock and cash rows
    let totals = history::sum_by_date(&records);
    assert_eq!(totals[&date(2024, 1, 1)], dec!(500.00));
    assert_eq!(totals[&date(2024, 1, 5)], dec!(1500.00));
    assert_eq!(totals[&date(2024, 1, 6)], dec!(1520.00));
    Ok(())
}

#[tokio::test]
async fn oversell_surfaces_as_data_integrity_error() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_stock_transaction(
        &conn,
        &stock_tx(pid, "AAPL", Action::Add, dec!(5), dec!(100), midnight(2024, 1, 1)),
    )?;
    db::insert_stock_transaction(
        &conn,
        &stock_tx(pid, "AAPL", Action::Remove, dec!(10), dec!(100), midnight(2024, 1, 2)),
    )?;

    let provider = MockProvider::new(vec![point("AAPL", date(2024, 1, 1), dec!(100))]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 3),
    };

    let err = history::historical_stocks(&ctx).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PortfolioError>(),
        Some(PortfolioError::DataIntegrity(_))
    ));
    Ok(())
}

#[tokio::test]
async fn cash_overdraw_surfaces_as_data_integrity_error() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_balance_transaction(
        &conn,
        &balance_tx(
            pid,
            AssetClass::Cash,
            "checking",
            Action::Add,
            dec!(100),
            dec!(0),
            midnight(2024, 1, 1),
        ),
    )?;
    db::insert_balance_transaction(
        &conn,
        &balance_tx(
            pid,
            AssetClass::Cash,
            "checking",
            Action::Remove,
            dec!(200),
            dec!(0),
            midnight(2024, 1, 2),
        ),
    )?;

    let provider = MockProvider::new(vec![]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 3),
    };

    let err = history::historical_cash(&ctx).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PortfolioError>(),
        Some(PortfolioError::DataIntegrity(_))
    ));
    Ok(())
}

#[tokio::test]
async fn provider_failure_propagates_instead_of_zeroing() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_stock_transaction(
        &conn,
        &stock_tx(pid, "AAPL", Action::Add, dec!(10), dec!(100), midnight(2024, 1, 1)),
    )?;

    let provider = FailingProvider;
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 3),
    };

    let err = history::historical_stocks(&ctx).await.unwrap_err();
    match err.downcast_ref::<PortfolioError>() {
        Some(PortfolioError::MarketData { ticker, .. }) => assert_eq!(ticker, "AAPL"),
        other => panic!("expected MarketData error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn transactions_after_cutoff_are_excluded() -> Result<()> {
    let (_tmp, conn, pid) = create_test_db()?;
    db::insert_balance_transaction(
        &conn,
        &balance_tx(
            pid,
            AssetClass::Cash,
            "savings",
            Action::Add,
            dec!(1000),
            dec!(0),
            midnight(2024, 1, 1),
        ),
    )?;
    // Deposited after the cutoff, must not appear
    db::insert_balance_transaction(
        &conn,
        &balance_tx(
            pid,
            AssetClass::Cash,
            "savings",
            Action::Add,
            dec!(9999),
            dec!(0),
            midnight(2024, 2, 1),
        ),
    )?;

    let provider = MockProvider::new(vec![]);
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id: pid,
        cutoff: date(2024, 1, 5),
    };

    let records = history::historical_cash(&ctx)?;
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.value == dec!(1000.00)));
    Ok(())
}
