//! Historical valuation reports
//!
//! Orchestrates the engine per asset class: list transactions before the
//! cutoff, reduce them to sparse snapshots, join equities with gap-filled
//! market data, and densify everything into [`DailyRecord`] rows.
//!
//! Tickers are processed in sorted order so identical inputs always produce
//! identical output.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::db::{self, models::AssetClass, StockTx};
use crate::engine::accrual::accrue_daily_balances;
use crate::engine::cost_basis::aggregate_cost_basis;
use crate::engine::populate::{
    net_daily_deltas_real_estate, populate_carry_forward_series, populate_equity_series,
};
use crate::engine::{DailyRecord, PositionSnapshot, ValuationContext};
use crate::error::Result;
use crate::pricing::gapfill::fill_calendar_gaps;

/// Dense per-ticker equity series for the portfolio, each ticker starting
/// at its own first snapshot date.
pub async fn historical_stocks(ctx: &ValuationContext<'_>) -> Result<Vec<DailyRecord>> {
    let txs = db::list_stock_transactions(ctx.conn, ctx.portfolio_id, Some(ctx.cutoff_bound()?))?;
    stock_series(ctx, &txs, None).await
}

/// Dense per-account cash series (compounding view).
pub fn historical_cash(ctx: &ValuationContext<'_>) -> Result<Vec<DailyRecord>> {
    let txs = db::list_balance_transactions(
        ctx.conn,
        ctx.portfolio_id,
        AssetClass::Cash,
        Some(ctx.cutoff_bound()?),
    )?;
    let balances = accrue_daily_balances(&txs, ctx.cutoff)?;
    Ok(balance_records(balances))
}

/// Dense per-account debt series (compounding view, signed negative).
pub fn historical_debt(ctx: &ValuationContext<'_>) -> Result<Vec<DailyRecord>> {
    let txs = db::list_balance_transactions(
        ctx.conn,
        ctx.portfolio_id,
        AssetClass::Debt,
        Some(ctx.cutoff_bound()?),
    )?;
    let balances = accrue_daily_balances(&txs, ctx.cutoff)?;
    Ok(balance_records(balances))
}

/// Dense per-property real estate series (carry-forward view, no interest).
pub fn historical_real_estate(ctx: &ValuationContext<'_>) -> Result<Vec<DailyRecord>> {
    let txs =
        db::list_real_estate_transactions(ctx.conn, ctx.portfolio_id, Some(ctx.cutoff_bound()?))?;

    let mut records = Vec::new();
    let mut by_key: BTreeMap<String, Vec<_>> = BTreeMap::new();
    for tx in txs {
        by_key.entry(tx.name.clone()).or_default().push(tx);
    }

    for (key, key_txs) in by_key {
        let deltas = net_daily_deltas_real_estate(&key_txs);
        let Some(first) = deltas.first().map(|(date, _)| *date) else {
            continue;
        };
        records.extend(populate_carry_forward_series(
            &key,
            &deltas,
            AssetClass::RealEstate,
            first,
            ctx.cutoff,
        )?);
    }

    Ok(records)
}

/// Combined "all assets" report: the concatenation of the stock and cash
/// dense series. Equities are populated from the earliest transaction date
/// across all asset classes, so a ticker reports zero before purchase.
pub async fn historical_assets(ctx: &ValuationContext<'_>) -> Result<Vec<DailyRecord>> {
    let bound = ctx.cutoff_bound()?;
    let stock_txs = db::list_stock_transactions(ctx.conn, ctx.portfolio_id, Some(bound))?;
    let cash_txs =
        db::list_balance_transactions(ctx.conn, ctx.portfolio_id, AssetClass::Cash, Some(bound))?;
    let debt_txs =
        db::list_balance_transactions(ctx.conn, ctx.portfolio_id, AssetClass::Debt, Some(bound))?;
    let re_txs = db::list_real_estate_transactions(ctx.conn, ctx.portfolio_id, Some(bound))?;

    let first_relevant = [
        stock_txs.first().map(|tx| tx.timestamp.date()),
        cash_txs.first().map(|tx| tx.timestamp.date()),
        debt_txs.first().map(|tx| tx.timestamp.date()),
        re_txs.first().map(|tx| tx.timestamp.date()),
    ]
    .into_iter()
    .flatten()
    .min();

    let mut records = stock_series(ctx, &stock_txs, first_relevant).await?;
    records.extend(balance_records(accrue_daily_balances(
        &cash_txs, ctx.cutoff,
    )?));

    Ok(records)
}

/// Collapse any record set into per-date totals.
pub fn sum_by_date(records: &[DailyRecord]) -> BTreeMap<NaiveDate, Decimal> {
    let mut totals = BTreeMap::new();
    for record in records {
        *totals.entry(record.date).or_insert(Decimal::ZERO) += record.value;
    }
    totals
}

async fn stock_series(
    ctx: &ValuationContext<'_>,
    txs: &[StockTx],
    first_relevant: Option<NaiveDate>,
) -> Result<Vec<DailyRecord>> {
    let snapshots = aggregate_cost_basis(txs)?;

    // Sorted ticker order keeps the output independent of input ordering
    let mut by_ticker: BTreeMap<String, Vec<PositionSnapshot>> = BTreeMap::new();
    for snap in snapshots {
        by_ticker.entry(snap.ticker.clone()).or_default().push(snap);
    }

    let mut records = Vec::new();
    for (ticker, snaps) in by_ticker {
        // snaps is non-empty by construction
        let first_snapshot = snaps[0].date;
        let start = first_relevant.unwrap_or(first_snapshot);

        let raw = ctx
            .provider
            .history(&ticker, first_snapshot, ctx.cutoff)
            .await?;
        let market = fill_calendar_gaps(raw);
        debug!(
            "Populating {} from {} to {} over {} market days",
            ticker,
            start,
            ctx.cutoff,
            market.len()
        );

        records.extend(populate_equity_series(
            &ticker, &snaps, &market, start, ctx.cutoff,
        ));
    }

    Ok(records)
}

fn balance_records(balances: BTreeMap<String, BTreeMap<NaiveDate, Decimal>>) -> Vec<DailyRecord> {
    let mut records = Vec::new();
    for (key, series) in balances {
        for (date, value) in series {
            records.push(DailyRecord {
                key: key.clone(),
                date,
                quantity: value,
                price: Decimal::ONE,
                value,
            });
        }
    }
    records
}
