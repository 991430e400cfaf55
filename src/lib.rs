//! Worth - personal net worth tracker
//!
//! This library tracks a portfolio of stocks, cash accounts, debts, and
//! real estate as append-only transaction logs, and reconstructs dense
//! day-by-day valuations from them on demand.

pub mod db;
pub mod engine;
pub mod error;
pub mod pricing;
pub mod reports;
pub mod utils;
