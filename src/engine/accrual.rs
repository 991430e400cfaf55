//! Interest accrual engine
//!
//! Replays cash/debt transaction logs one simulated day at a time,
//! compounding interest daily between events. Rates are annual percentages
//! applied at `rate/100/365` per day; the balance is rounded to 2 decimals
//! after every simulated day.
//!
//! Rate updates are asymmetric: an `add` blends the running rate with the
//! contribution's rate (value-weighted), a `remove` replaces the rate with
//! the one stated on the removal. This mirrors the historical behavior of
//! the system and is kept intentionally; see DESIGN.md.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::db::models::{Action, AssetClass, BalanceTx};
use crate::error::{PortfolioError, Result};

const DAYS_PER_YEAR: u32 = 365;

/// Dense signed daily balances for every instrument key in `txs`, from each
/// key's first transaction date to the cutoff inclusive.
///
/// Cash balances are positive; debt balances are recorded as negative
/// net-worth contributions (`add` grows the liability, `remove` repays it).
pub fn accrue_daily_balances(
    txs: &[BalanceTx],
    cutoff: NaiveDate,
) -> Result<BTreeMap<String, BTreeMap<NaiveDate, Decimal>>> {
    let mut by_key: BTreeMap<String, Vec<&BalanceTx>> = BTreeMap::new();
    for tx in txs {
        by_key.entry(tx.name.clone()).or_default().push(tx);
    }

    let mut out = BTreeMap::new();
    for (key, key_txs) in by_key {
        let series = accrue_key(&key, &key_txs, cutoff)?;
        out.insert(key, series);
    }

    Ok(out)
}

fn daily_rate(annual_pct: Decimal) -> Decimal {
    annual_pct / Decimal::from(100) / Decimal::from(DAYS_PER_YEAR)
}

pub(crate) fn signed_delta(tx: &BalanceTx) -> Decimal {
    match (tx.asset_class, tx.action) {
        (AssetClass::Debt, Action::Add) => -tx.amount,
        (AssetClass::Debt, Action::Remove) => tx.amount,
        (_, Action::Add) => tx.amount,
        (_, Action::Remove) => -tx.amount,
    }
}

fn accrue_key(
    key: &str,
    txs: &[&BalanceTx],
    cutoff: NaiveDate,
) -> Result<BTreeMap<NaiveDate, Decimal>> {
    let mut series = BTreeMap::new();
    let Some(first) = txs.first() else {
        return Ok(series);
    };

    // Ordering is checked up front: a transaction dated before the first
    // one would never match a simulated day and would vanish silently
    for pair in txs.windows(2) {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(PortfolioError::InvalidInput(format!(
                "transactions for {} are not in ascending timestamp order ({} after {})",
                key, pair[1].timestamp, pair[0].timestamp
            ))
            .into());
        }
    }

    let class = first.asset_class;
    let mut balance = Decimal::ZERO;
    let mut rate = daily_rate(first.annual_rate_pct);
    let mut idx = 0;

    let mut day = first.timestamp.date();
    while day <= cutoff {
        let prev = balance;
        let mut delta = Decimal::ZERO;

        while idx < txs.len() && txs[idx].timestamp.date() == day {
            let tx = txs[idx];

            match tx.action {
                Action::Add => {
                    // Value-weighted blend with whatever is already held
                    let held = (prev + delta).abs();
                    let incoming = daily_rate(tx.annual_rate_pct);
                    rate = if held > Decimal::ZERO {
                        (held * rate + tx.amount * incoming) / (held + tx.amount)
                    } else {
                        incoming
                    };
                }
                Action::Remove => {
                    // A removal restates the rate outright
                    rate = daily_rate(tx.annual_rate_pct);
                }
            }

            delta += signed_delta(tx);

            let running = prev + delta;
            let overdrawn = match class {
                AssetClass::Debt => running > Decimal::ZERO,
                _ => running < Decimal::ZERO,
            };
            if overdrawn {
                return Err(PortfolioError::DataIntegrity(format!(
                    "{} of {} on {} overdraws the {} balance of {}",
                    tx.action.as_str(),
                    tx.amount,
                    day,
                    key,
                    prev + delta - signed_delta(tx)
                ))
                .into());
            }

            idx += 1;
        }

        // Interest accrues on yesterday's balance, after today's
        // transactions have restated the rate
        balance = (prev + delta + prev * rate).round_dp(2);
        series.insert(day, balance);

        let Some(next) = day.succ_opt() else { break };
        day = next;
    }

    Ok(series)
}
