//! Error handling for Worth
//!
//! Defines custom error types and establishes a unified Result type
//! using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for portfolio valuation
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("database error: {0}")]
    DbError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    /// Caller contract violation, e.g. transactions out of ascending order.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Upstream event log is inconsistent, e.g. a remove that would drive a
    /// holding negative. Never corrected implicitly.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Market data could not be retrieved; never degraded to zero values.
    #[error("market data unavailable for ticker {ticker}: {reason}")]
    MarketData { ticker: String, reason: String },

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for portfolio operations
pub type Result<T> = anyhow::Result<T>;
