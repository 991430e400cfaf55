//! Calendar gap-filler
//!
//! Market data providers omit weekends and holidays; valuation needs one
//! price per calendar day. Each synthesized day opens and closes at the
//! previous day's close, so a pure gap day contributes no price movement.

use rust_decimal::Decimal;

use super::PricePoint;

/// Densify a sorted single-ticker price series so that every calendar day
/// between the first and last observation has exactly one entry.
///
/// Runs as an iterative fixed point: each pass inserts the first missing
/// day after every gap wider than one day, shrinking the widest remaining
/// gap by at least one day per pass. Re-running on dense input is a no-op.
pub fn fill_calendar_gaps(mut series: Vec<PricePoint>) -> Vec<PricePoint> {
    if series.len() < 2 {
        return series;
    }

    series.sort_by_key(|p| p.date);

    loop {
        let mut inserts: Vec<PricePoint> = Vec::new();

        for pair in series.windows(2) {
            let gap_days = (pair[1].date - pair[0].date).num_days();
            if gap_days <= 1 {
                continue;
            }

            let prev = &pair[0];
            let Some(next_day) = prev.date.succ_opt() else {
                continue;
            };

            inserts.push(PricePoint {
                ticker: prev.ticker.clone(),
                date: next_day,
                open: prev.close,
                close: prev.close,
                dividend: Decimal::ZERO,
            });
        }

        if inserts.is_empty() {
            break;
        }

        series.extend(inserts);
        series.sort_by_key(|p| p.date);
    }

    series
}
