use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(name = "worth")]
#[command(version, about = "Personal net worth tracker")]
#[command(
    long_about = "Track stocks, cash accounts, debts, and real estate as append-only transaction logs, with dense day-by-day historical valuations rebuilt from market data and interest accrual."
)]
pub struct Cli {
    /// Path to the SQLite database (defaults to ~/.worth/data.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Portfolio name
    #[arg(long, global = true, default_value = "default")]
    pub portfolio: String,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema and the portfolio
    Init,

    /// Stock transactions
    Stock {
        #[command(subcommand)]
        action: StockCommands,
    },

    /// Cash account transactions
    Cash {
        #[command(subcommand)]
        action: BalanceCommands,
    },

    /// Debt transactions
    Debt {
        #[command(subcommand)]
        action: BalanceCommands,
    },

    /// Real estate transactions
    RealEstate {
        #[command(subcommand)]
        action: RealEstateCommands,
    },

    /// Dense day-by-day valuation series
    History {
        /// Asset class to report on
        #[arg(value_enum, default_value = "assets")]
        class: HistoryClass,

        /// Print only the per-date totals instead of every row
        #[arg(long)]
        totals: bool,
    },

    /// Current holdings per asset class
    Holdings,
}

#[derive(Subcommand)]
pub enum StockCommands {
    /// Record a purchase
    Add {
        /// Ticker symbol (e.g. AAPL)
        ticker: String,

        /// Number of shares
        shares: Decimal,

        /// Price paid per share
        price: Decimal,

        /// Transaction fees
        #[arg(long, default_value = "0")]
        fees: Decimal,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a sale
    Remove {
        /// Ticker symbol (e.g. AAPL)
        ticker: String,

        /// Number of shares
        shares: Decimal,

        /// Price received per share
        price: Decimal,

        /// Transaction fees
        #[arg(long, default_value = "0")]
        fees: Decimal,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BalanceCommands {
    /// Record a deposit (cash) or newly incurred debt
    Add {
        /// Account or obligation name (e.g. "savings", "mortgage")
        name: String,

        /// Amount, always positive
        amount: Decimal,

        /// Annual interest rate in percent (e.g. 5 for 5%)
        #[arg(long, default_value = "0")]
        rate: Decimal,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a withdrawal (cash) or repayment (debt)
    Remove {
        /// Account or obligation name
        name: String,

        /// Amount, always positive
        amount: Decimal,

        /// Annual interest rate in percent going forward
        #[arg(long, default_value = "0")]
        rate: Decimal,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RealEstateCommands {
    /// Record a property purchase or appraisal increase
    Add {
        /// Property name
        name: String,

        /// Worth added
        worth: Decimal,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a sale or appraisal decrease
    Remove {
        /// Property name
        name: String,

        /// Worth removed
        worth: Decimal,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HistoryClass {
    Stocks,
    Cash,
    Debt,
    RealEstate,
    /// Stocks and cash combined
    Assets,
}
