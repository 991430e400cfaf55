mod cli;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Parser;
use colored::Colorize;
use rust_decimal::Decimal;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use cli::{BalanceCommands, Cli, Commands, HistoryClass, RealEstateCommands, StockCommands};
use worth::db::{self, Action, AssetClass, BalanceTx, RealEstateTx, StockTx};
use worth::engine::{DailyRecord, ValuationContext};
use worth::error::{PortfolioError, Result};
use worth::pricing::yahoo::YahooProvider;
use worth::pricing::FetchConfig;
use worth::reports::{history, holdings};
use worth::utils::format_currency;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match &cli.command {
        Commands::Init => handle_init(&cli),

        Commands::Stock { action } => handle_stock(&cli, action),

        Commands::Cash { action } => handle_balance(&cli, AssetClass::Cash, action),

        Commands::Debt { action } => handle_balance(&cli, AssetClass::Debt, action),

        Commands::RealEstate { action } => handle_real_estate(&cli, action),

        Commands::History { class, totals } => handle_history(&cli, *class, *totals).await,

        Commands::Holdings => handle_holdings(&cli),
    }
}

fn parse_date(date: &Option<String>) -> Result<NaiveDateTime> {
    match date {
        Some(s) => {
            let parsed = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
                PortfolioError::InvalidInput(format!("invalid date {:?}: {}", s, e))
            })?;
            Ok(parsed.and_time(NaiveTime::MIN))
        }
        None => Ok(Local::now().naive_local()),
    }
}

fn open_portfolio(cli: &Cli) -> Result<(rusqlite::Connection, i64)> {
    let conn = db::open_db(cli.db.clone())?;
    let portfolio_id = db::ensure_portfolio(&conn, &cli.portfolio)?;
    Ok((conn, portfolio_id))
}

fn handle_init(cli: &Cli) -> Result<()> {
    db::init_database(cli.db.clone())?;
    let (_, portfolio_id) = open_portfolio(cli)?;
    info!("Initialized portfolio {} (id {})", cli.portfolio, portfolio_id);
    println!(
        "{} Database ready, portfolio {:?} created",
        "✓".green().bold(),
        cli.portfolio
    );
    Ok(())
}

fn handle_stock(cli: &Cli, action: &StockCommands) -> Result<()> {
    let (conn, portfolio_id) = open_portfolio(cli)?;

    let (ticker, shares, price, fees, date, tx_action) = match action {
        StockCommands::Add {
            ticker,
            shares,
            price,
            fees,
            date,
        } => (ticker, shares, price, fees, date, Action::Add),
        StockCommands::Remove {
            ticker,
            shares,
            price,
            fees,
            date,
        } => (ticker, shares, price, fees, date, Action::Remove),
    };

    let ticker = ticker.to_uppercase();
    if *shares <= Decimal::ZERO || *price < Decimal::ZERO {
        return Err(PortfolioError::InvalidInput(format!(
            "shares must be positive and price non-negative, got {} @ {}",
            shares, price
        ))
        .into());
    }

    if tx_action == Action::Remove {
        let held = holdings::remaining_shares(&conn, portfolio_id, &ticker)?;
        if *shares > held {
            return Err(PortfolioError::DataIntegrity(format!(
                "cannot sell {} shares of {}, only {} held",
                shares, ticker, held
            ))
            .into());
        }
    }

    let tx = StockTx {
        id: None,
        portfolio_id,
        ticker: ticker.clone(),
        action: tx_action,
        shares: *shares,
        price: *price,
        fees: *fees,
        timestamp: parse_date(date)?,
    };
    db::insert_stock_transaction(&conn, &tx)?;

    println!(
        "{} Recorded {} of {} x {} @ {}",
        "✓".green().bold(),
        tx_action.as_str(),
        shares,
        ticker,
        format_currency(*price)
    );
    Ok(())
}

fn handle_balance(cli: &Cli, asset_class: AssetClass, action: &BalanceCommands) -> Result<()> {
    let (conn, portfolio_id) = open_portfolio(cli)?;

    let (name, amount, rate, date, tx_action) = match action {
        BalanceCommands::Add {
            name,
            amount,
            rate,
            date,
        } => (name, amount, rate, date, Action::Add),
        BalanceCommands::Remove {
            name,
            amount,
            rate,
            date,
        } => (name, amount, rate, date, Action::Remove),
    };

    if *amount <= Decimal::ZERO {
        return Err(PortfolioError::InvalidInput(format!(
            "amount must be positive, got {}",
            amount
        ))
        .into());
    }

    if tx_action == Action::Remove {
        // remaining_balance is signed: cash positive, debt negative
        let held = holdings::remaining_balance(&conn, portfolio_id, asset_class, name)?;
        let available = held.abs();
        if *amount > available {
            return Err(PortfolioError::DataIntegrity(format!(
                "cannot remove {} from {} {:?}, only {} outstanding",
                amount,
                asset_class.as_str(),
                name,
                available
            ))
            .into());
        }
    }

    let tx = BalanceTx {
        id: None,
        portfolio_id,
        asset_class,
        name: name.clone(),
        action: tx_action,
        amount: *amount,
        annual_rate_pct: *rate,
        timestamp: parse_date(date)?,
    };
    db::insert_balance_transaction(&conn, &tx)?;

    println!(
        "{} Recorded {} of {} on {} {:?} at {}% annual",
        "✓".green().bold(),
        tx_action.as_str(),
        format_currency(*amount),
        asset_class.as_str(),
        name,
        rate
    );
    Ok(())
}

fn handle_real_estate(cli: &Cli, action: &RealEstateCommands) -> Result<()> {
    let (conn, portfolio_id) = open_portfolio(cli)?;

    let (name, worth, date, tx_action) = match action {
        RealEstateCommands::Add { name, worth, date } => (name, worth, date, Action::Add),
        RealEstateCommands::Remove { name, worth, date } => (name, worth, date, Action::Remove),
    };

    if *worth <= Decimal::ZERO {
        return Err(PortfolioError::InvalidInput(format!(
            "worth must be positive, got {}",
            worth
        ))
        .into());
    }

    if tx_action == Action::Remove {
        let held = holdings::current_holdings(&conn, portfolio_id)?
            .real_estate
            .into_iter()
            .find(|h| h.name == *name)
            .map(|h| h.worth)
            .unwrap_or(Decimal::ZERO);
        if *worth > held {
            return Err(PortfolioError::DataIntegrity(format!(
                "cannot remove {} from property {:?}, only {} recorded",
                worth, name, held
            ))
            .into());
        }
    }

    let tx = RealEstateTx {
        id: None,
        portfolio_id,
        name: name.clone(),
        action: tx_action,
        worth: *worth,
        timestamp: parse_date(date)?,
    };
    db::insert_real_estate_transaction(&conn, &tx)?;

    println!(
        "{} Recorded {} of {} on property {:?}",
        "✓".green().bold(),
        tx_action.as_str(),
        format_currency(*worth),
        name
    );
    Ok(())
}

async fn handle_history(cli: &Cli, class: HistoryClass, totals: bool) -> Result<()> {
    let (conn, portfolio_id) = open_portfolio(cli)?;
    let provider = YahooProvider::new(FetchConfig::default())?;
    let ctx = ValuationContext {
        conn: &conn,
        provider: &provider,
        portfolio_id,
        cutoff: Local::now().date_naive(),
    };

    let records = match class {
        HistoryClass::Stocks => history::historical_stocks(&ctx).await?,
        HistoryClass::Cash => history::historical_cash(&ctx)?,
        HistoryClass::Debt => history::historical_debt(&ctx)?,
        HistoryClass::RealEstate => history::historical_real_estate(&ctx)?,
        HistoryClass::Assets => history::historical_assets(&ctx).await?,
    };

    if totals {
        let by_date = history::sum_by_date(&records);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&by_date)?);
        } else {
            print_totals_table(&by_date);
        }
        return Ok(());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_history_table(&records);
    }
    Ok(())
}

fn handle_holdings(cli: &Cli) -> Result<()> {
    let (conn, portfolio_id) = open_portfolio(cli)?;
    let holdings = holdings::current_holdings(&conn, portfolio_id)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&holdings)?);
        return Ok(());
    }

    println!("\nPortfolio: {}\n", holdings.portfolio.bold());

    if !holdings.stocks.is_empty() {
        #[derive(Tabled)]
        struct StockRow {
            #[tabled(rename = "Ticker")]
            ticker: String,
            #[tabled(rename = "Shares")]
            shares: String,
            #[tabled(rename = "Avg Cost")]
            avg_cost: String,
        }

        let rows: Vec<StockRow> = holdings
            .stocks
            .iter()
            .map(|h| StockRow {
                ticker: h.ticker.clone(),
                shares: h.shares.to_string(),
                avg_cost: format_currency(h.avg_cost_basis.round_dp(2)),
            })
            .collect();
        println!("{}", "Stocks".bold());
        println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    }

    for (label, entries) in [("Cash", &holdings.cash), ("Debt", &holdings.debt)] {
        if entries.is_empty() {
            continue;
        }

        #[derive(Tabled)]
        struct BalanceRow {
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Amount")]
            amount: String,
            #[tabled(rename = "Rate %")]
            rate: String,
        }

        let rows: Vec<BalanceRow> = entries
            .iter()
            .map(|h| BalanceRow {
                name: h.name.clone(),
                amount: format_currency(h.amount),
                rate: h.annual_rate_pct.to_string(),
            })
            .collect();
        println!("{}", label.bold());
        println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    }

    if !holdings.real_estate.is_empty() {
        #[derive(Tabled)]
        struct PropertyRow {
            #[tabled(rename = "Property")]
            name: String,
            #[tabled(rename = "Worth")]
            worth: String,
        }

        let rows: Vec<PropertyRow> = holdings
            .real_estate
            .iter()
            .map(|h| PropertyRow {
                name: h.name.clone(),
                worth: format_currency(h.worth),
            })
            .collect();
        println!("{}", "Real Estate".bold());
        println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    }

    Ok(())
}

fn print_history_table(records: &[DailyRecord]) {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    let rows: Vec<HistoryRow> = records
        .iter()
        .map(|r| HistoryRow {
            date: r.date.to_string(),
            key: r.key.clone(),
            quantity: r.quantity.to_string(),
            price: format_currency(r.price),
            value: format_currency(r.value),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
}

fn print_totals_table(by_date: &std::collections::BTreeMap<NaiveDate, Decimal>) {
    #[derive(Tabled)]
    struct TotalRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Total")]
        total: String,
    }

    let rows: Vec<TotalRow> = by_date
        .iter()
        .map(|(date, total)| TotalRow {
            date: date.to_string(),
            total: format_currency(*total),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
}
