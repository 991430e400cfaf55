//! Yahoo Finance market data provider
//!
//! Talks to the public chart API and maps its gappy daily bars into
//! [`PricePoint`]s. Every request is bounded by a timeout and a small retry
//! budget; exhausting the budget surfaces a `MarketData` error naming the
//! ticker rather than degrading to zero-filled data.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{FetchConfig, MarketDataProvider, PricePoint};
use crate::error::{PortfolioError, Result};

/// Yahoo Finance chart response
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<Events>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct Events {
    dividends: Option<HashMap<String, DividendEvent>>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

/// Market data provider backed by the Yahoo Finance chart API.
pub struct YahooProvider {
    client: Client,
    config: FetchConfig,
}

impl YahooProvider {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; WorthBot/1.0)")
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    async fn fetch_once(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let from_timestamp = from
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid from date"))?
            .and_utc()
            .timestamp();

        let to_timestamp = to
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| anyhow!("Invalid to date"))?
            .and_utc()
            .timestamp();

        let url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=div",
            ticker, from_timestamp, to_timestamp
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to Yahoo Finance")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Yahoo Finance returned error status: {}",
                response.status()
            ));
        }

        let data: YahooChartResponse = response
            .json()
            .await
            .context("Failed to parse Yahoo Finance response")?;

        if let Some(error) = data.chart.error {
            return Err(anyhow!(
                "Yahoo Finance API error: {} - {}",
                error.code,
                error.description
            ));
        }

        let result = data
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| anyhow!("No data returned from Yahoo Finance"))?;

        chart_to_points(ticker, result)
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    async fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        info!(
            "Fetching daily history for {} from {} to {}",
            ticker, start, end
        );

        let mut last_err = None;
        for attempt in 0..=self.config.retries {
            match self.fetch_once(ticker, start, end).await {
                Ok(points) => {
                    debug!("Fetched {} price points for {}", points.len(), ticker);
                    return Ok(points);
                }
                Err(e) => {
                    warn!(
                        "Fetch attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        self.config.retries + 1,
                        ticker,
                        e
                    );
                    last_err = Some(e);
                    if attempt < self.config.retries {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            250 * (attempt as u64 + 1),
                        ))
                        .await;
                    }
                }
            }
        }

        Err(PortfolioError::MarketData {
            ticker: ticker.to_string(),
            reason: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }
        .into())
    }
}

/// Map one chart result into sorted price points, skipping days the
/// provider reports without a close.
fn chart_to_points(ticker: &str, result: ChartResult) -> Result<Vec<PricePoint>> {
    let timestamps = result
        .timestamp
        .ok_or_else(|| anyhow!("No timestamp data"))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No quote data"))?;

    let opens = quote.open.unwrap_or_default();
    let closes = quote.close.ok_or_else(|| anyhow!("No close prices"))?;

    // Dividends arrive keyed by epoch second; re-key by calendar day
    let mut dividends_by_date: HashMap<NaiveDate, Decimal> = HashMap::new();
    if let Some(events) = result.events {
        for event in events.dividends.unwrap_or_default().into_values() {
            let Some(date) = chrono::DateTime::from_timestamp(event.date, 0) else {
                continue;
            };
            let amount = Decimal::from_f64_retain(event.amount).unwrap_or(Decimal::ZERO);
            *dividends_by_date
                .entry(date.date_naive())
                .or_insert(Decimal::ZERO) += amount;
        }
    }

    let mut points = Vec::new();

    for (i, &timestamp) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| anyhow!("Invalid timestamp"))?
            .date_naive();

        let Some(close) = closes.get(i).and_then(|&v| v) else {
            debug!("Skipping {} on {}: no close reported", ticker, date);
            continue;
        };
        let close =
            Decimal::from_f64_retain(close).ok_or_else(|| anyhow!("Invalid close price"))?;

        let open = opens
            .get(i)
            .and_then(|&v| v)
            .and_then(Decimal::from_f64_retain)
            .unwrap_or(close);

        points.push(PricePoint {
            ticker: ticker.to_string(),
            date,
            open,
            close,
            dividend: dividends_by_date
                .get(&date)
                .copied()
                .unwrap_or(Decimal::ZERO),
        });
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn should_skip_online_tests() -> bool {
        std::env::var("WORTH_SKIP_ONLINE_TESTS")
            .map(|v| v != "0")
            .unwrap_or(false)
    }

    #[test]
    fn test_chart_to_points_maps_and_skips_nulls() {
        let raw = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704153600, 1704240000, 1704326400],
                    "indicators": {
                        "quote": [{
                            "open": [10.0, null, 12.0],
                            "close": [11.0, null, 13.0]
                        }]
                    },
                    "events": {
                        "dividends": {
                            "1704326400": {"amount": 0.5, "date": 1704326400}
                        }
                    }
                }],
                "error": null
            }
        }"#;

        let parsed: YahooChartResponse = serde_json::from_str(raw).unwrap();
        let result = parsed.chart.result.unwrap().into_iter().next().unwrap();
        let points = chart_to_points("AAPL", result).unwrap();

        // The null middle day is dropped, not zero-filled
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].open, dec!(10));
        assert_eq!(points[0].close, dec!(11));
        assert_eq!(points[0].dividend, Decimal::ZERO);
        assert_eq!(points[1].close, dec!(13));
        assert_eq!(points[1].dividend, dec!(0.5));
    }

    #[test]
    fn test_chart_to_points_missing_open_falls_back_to_close() {
        let raw = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704153600],
                    "indicators": {
                        "quote": [{"open": [null], "close": [11.0]}]
                    }
                }],
                "error": null
            }
        }"#;

        let parsed: YahooChartResponse = serde_json::from_str(raw).unwrap();
        let result = parsed.chart.result.unwrap().into_iter().next().unwrap();
        let points = chart_to_points("AAPL", result).unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].open, points[0].close);
    }

    #[tokio::test]
    async fn test_fetch_history_online() {
        if should_skip_online_tests() {
            return;
        }

        let provider = YahooProvider::new(FetchConfig::default()).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 12).unwrap();

        let result = provider.history("AAPL", from, to).await;
        if let Err(e) = &result {
            eprintln!("Skipping Yahoo history test: {}", e);
            return;
        }
        let points = result.unwrap();
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.close > Decimal::ZERO));
    }
}
