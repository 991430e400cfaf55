//! Daily series populator
//!
//! Projects sparse snapshots across a full date range into dense
//! per-instrument valuation rows.
//!
//! Equities track an anchored price: each position snapshot re-anchors the
//! price at the average cost basis, and every subsequent day moves it by
//! that day's close-to-close change from the gap-filled market series. The
//! resulting value is an unrealized-P&L proxy, not a statement of market
//! value.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::db::models::{AssetClass, BalanceTx, RealEstateTx};
use crate::error::{PortfolioError, Result};
use crate::pricing::PricePoint;

use super::{DailyRecord, PositionSnapshot};

/// Densify one ticker's cost-basis snapshots over `[first_relevant, cutoff]`.
///
/// `market` must be the gap-filled history for the ticker. Days before the
/// first snapshot report zero; from the first snapshot on, the carried
/// `(price, quantity)` baseline is re-anchored whenever a snapshot exists at
/// that exact date and drifts by the daily close delta otherwise.
pub fn populate_equity_series(
    ticker: &str,
    snapshots: &[PositionSnapshot],
    market: &[PricePoint],
    first_relevant: NaiveDate,
    cutoff: NaiveDate,
) -> Vec<DailyRecord> {
    let closes: BTreeMap<NaiveDate, Decimal> =
        market.iter().map(|p| (p.date, p.close)).collect();
    let by_date: HashMap<NaiveDate, &PositionSnapshot> = snapshots
        .iter()
        .filter(|s| s.ticker == ticker)
        .map(|s| (s.date, s))
        .collect();

    let mut records = Vec::new();
    let mut carried: Option<(Decimal, Decimal)> = None; // (price, quantity)

    let mut day = first_relevant;
    while day <= cutoff {
        if let Some(snap) = by_date.get(&day) {
            carried = Some((snap.avg_cost_basis, snap.total_shares));
        }

        let delta = match (day.pred_opt().and_then(|d| closes.get(&d)), closes.get(&day)) {
            (Some(prev), Some(today)) => *today - *prev,
            _ => Decimal::ZERO,
        };

        let record = match carried.as_mut() {
            Some((price, quantity)) => {
                *price += delta;
                DailyRecord {
                    key: ticker.to_string(),
                    date: day,
                    quantity: *quantity,
                    price: price.round_dp(2),
                    value: (*price * *quantity).round_dp(2),
                }
            }
            None => DailyRecord {
                key: ticker.to_string(),
                date: day,
                quantity: Decimal::ZERO,
                price: Decimal::ZERO,
                value: Decimal::ZERO,
            },
        };
        records.push(record);

        let Some(next) = day.succ_opt() else { break };
        day = next;
    }

    records
}

/// Densify per-date signed net changes into a carried-forward prefix sum
/// over `[first_relevant, cutoff]`. This is the non-compounding "holdings
/// as of date" view of cash/debt/real estate; interest-bearing reporting
/// uses [`super::accrual`] instead.
pub fn populate_carry_forward_series(
    key: &str,
    deltas: &[(NaiveDate, Decimal)],
    class: AssetClass,
    first_relevant: NaiveDate,
    cutoff: NaiveDate,
) -> Result<Vec<DailyRecord>> {
    let mut running = Decimal::ZERO;
    let mut iter = deltas.iter().peekable();

    // Fold anything dated before the window into the opening balance
    while let Some((date, delta)) = iter.peek() {
        if *date >= first_relevant {
            break;
        }
        running += *delta;
        iter.next();
    }

    let mut records = Vec::new();
    let mut day = first_relevant;
    while day <= cutoff {
        while let Some((date, delta)) = iter.peek() {
            if *date != day {
                break;
            }
            running += *delta;
            iter.next();
        }

        let negative_holding = match class {
            AssetClass::Debt => running > Decimal::ZERO,
            _ => running < Decimal::ZERO,
        };
        if negative_holding {
            return Err(PortfolioError::DataIntegrity(format!(
                "running balance of {} went to {} on {}",
                key, running, day
            ))
            .into());
        }

        let value = running.round_dp(2);
        records.push(DailyRecord {
            key: key.to_string(),
            date: day,
            quantity: value,
            price: Decimal::ONE,
            value,
        });

        let Some(next) = day.succ_opt() else { break };
        day = next;
    }

    Ok(records)
}

/// Same-day net signed change per calendar date for cash/debt transactions.
pub fn net_daily_deltas_balance(txs: &[BalanceTx]) -> Vec<(NaiveDate, Decimal)> {
    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for tx in txs {
        *by_date.entry(tx.timestamp.date()).or_insert(Decimal::ZERO) +=
            super::accrual::signed_delta(tx);
    }
    by_date.into_iter().collect()
}

/// Same-day net signed change per calendar date for real estate transactions.
pub fn net_daily_deltas_real_estate(txs: &[RealEstateTx]) -> Vec<(NaiveDate, Decimal)> {
    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for tx in txs {
        let signed = match tx.action {
            crate::db::models::Action::Add => tx.worth,
            crate::db::models::Action::Remove => -tx.worth,
        };
        *by_date.entry(tx.timestamp.date()).or_insert(Decimal::ZERO) += signed;
    }
    by_date.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn snap(day: u32, shares: Decimal, avg: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            ticker: "AAPL".to_string(),
            date: d(day),
            total_shares: shares,
            avg_cost_basis: avg,
        }
    }

    fn bar(day: u32, close: Decimal) -> PricePoint {
        PricePoint {
            ticker: "AAPL".to_string(),
            date: d(day),
            open: close,
            close,
            dividend: Decimal::ZERO,
        }
    }

    #[test]
    fn test_equity_price_is_anchored_not_market() {
        let snapshots = vec![snap(1, dec!(10), dec!(100))];
        let market = vec![bar(1, dec!(50)), bar(2, dec!(52)), bar(3, dec!(51))];

        let records = populate_equity_series("AAPL", &snapshots, &market, d(1), d(3));
        assert_eq!(records.len(), 3);

        // Day 1: no previous close, anchored at the cost basis
        assert_eq!(records[0].price, dec!(100));
        assert_eq!(records[0].value, dec!(1000));

        // Day 2: +2 close-to-close, applied to the anchored price
        assert_eq!(records[1].price, dec!(102));
        assert_eq!(records[1].value, dec!(1020));

        // Day 3: -1; the price never equals the raw market close
        assert_eq!(records[2].price, dec!(101));
        assert_eq!(records[2].value, dec!(1010));
        assert!(records.iter().all(|r| r.price != dec!(50)));
    }

    #[test]
    fn test_equity_snapshot_reanchors_baseline() {
        let snapshots = vec![snap(1, dec!(10), dec!(100)), snap(3, dec!(20), dec!(150))];
        let market = vec![bar(1, dec!(50)), bar(2, dec!(52)), bar(3, dec!(51))];

        let records = populate_equity_series("AAPL", &snapshots, &market, d(1), d(3));

        // Day 3 adopts the new snapshot, then applies that day's delta (-1)
        assert_eq!(records[2].quantity, dec!(20));
        assert_eq!(records[2].price, dec!(149));
        assert_eq!(records[2].value, dec!(2980));
    }

    #[test]
    fn test_equity_zero_before_first_snapshot() {
        let snapshots = vec![snap(3, dec!(10), dec!(100))];
        let market = vec![bar(3, dec!(50)), bar(4, dec!(51))];

        let records = populate_equity_series("AAPL", &snapshots, &market, d(1), d(4));
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].value, Decimal::ZERO);
        assert_eq!(records[1].value, Decimal::ZERO);
        assert_eq!(records[2].value, dec!(1000));
        assert_eq!(records[3].value, dec!(1010));
    }

    #[test]
    fn test_equity_missing_market_data_means_no_drift() {
        let snapshots = vec![snap(1, dec!(10), dec!(100))];
        // No market data at all: value holds at the anchored cost
        let records = populate_equity_series("AAPL", &snapshots, &[], d(1), d(3));
        assert!(records.iter().all(|r| r.value == dec!(1000)));
    }

    #[test]
    fn test_carry_forward_prefix_sum() {
        let deltas = vec![(d(1), dec!(100)), (d(5), dec!(50))];

        let records =
            populate_carry_forward_series("checking", &deltas, AssetClass::Cash, d(1), d(6))
                .unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].value, dec!(100));
        assert_eq!(records[3].value, dec!(100)); // carried over inactive days
        assert_eq!(records[4].value, dec!(150));
        assert_eq!(records[5].value, dec!(150));
        assert!(records.iter().all(|r| r.price == Decimal::ONE));
    }

    #[test]
    fn test_carry_forward_zero_before_first_activity() {
        let deltas = vec![(d(4), dec!(100))];

        let records =
            populate_carry_forward_series("checking", &deltas, AssetClass::Cash, d(1), d(5))
                .unwrap();
        assert_eq!(records[0].value, Decimal::ZERO);
        assert_eq!(records[2].value, Decimal::ZERO);
        assert_eq!(records[3].value, dec!(100));
    }

    #[test]
    fn test_carry_forward_overdraw_is_rejected() {
        let deltas = vec![(d(1), dec!(100)), (d(2), dec!(-150))];

        let err =
            populate_carry_forward_series("checking", &deltas, AssetClass::Cash, d(1), d(5))
                .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PortfolioError>(),
            Some(PortfolioError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_carry_forward_debt_stays_non_positive() {
        let deltas = vec![(d(1), dec!(-1000)), (d(3), dec!(400))];

        let records =
            populate_carry_forward_series("loan", &deltas, AssetClass::Debt, d(1), d(4)).unwrap();
        assert_eq!(records[0].value, dec!(-1000));
        assert_eq!(records[3].value, dec!(-600));

        let over = vec![(d(1), dec!(-100)), (d(2), dec!(150))];
        assert!(
            populate_carry_forward_series("loan", &over, AssetClass::Debt, d(1), d(4)).is_err()
        );
    }
}
