//! Statement Parse - CLI tool for detecting and normalizing statement files.

use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, Read, Write};
use statement_parser::{Error, ParseOptions, ParseResult, ParserFactory, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON `ParseResult`
    Json,
    /// One line per record plus warnings
    Summary,
}

#[derive(Parser)]
#[command(name = "statement_parse")]
#[command(about = "Detect and parse a bank, card or brokerage statement (CSV, OFX/QFX, PDF)", long_about = None)]
struct Cli {
    /// Input file path (or stdin if not provided)
    #[arg(short, long)]
    input: Option<String>,

    /// File name used as a detection hint when reading stdin
    #[arg(long)]
    filename: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Currency for sources that do not state one
    #[arg(long)]
    currency: Option<String>,

    /// Year for PDF dates printed without one
    #[arg(long)]
    year: Option<i32>,

    /// Output file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("{}: {}", e.reason_code(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut options = ParseOptions::default();
    if let Some(currency) = cli.currency {
        options.default_currency = currency.to_uppercase();
    }
    if let Some(year) = cli.year {
        options.default_year = year;
    }
    let factory = ParserFactory::with_options(options);

    // Read input from file or stdin
    let mut bytes = Vec::new();
    if let Some(ref input_path) = cli.input {
        File::open(input_path)?.read_to_end(&mut bytes)?;
    } else {
        io::stdin().read_to_end(&mut bytes)?;
    }
    let filename = cli.filename.as_deref().or(cli.input.as_deref());

    let (_, result) = factory.parse_auto(&bytes, filename)?;

    if let Some(ref output_path) = cli.output {
        let mut file = File::create(output_path)?;
        write_output(&mut file, &result, cli.format)?;
    } else {
        let mut stdout = io::stdout();
        write_output(&mut stdout, &result, cli.format)?;
    }

    Ok(())
}

fn write_output<W: Write>(writer: &mut W, result: &ParseResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, result)?;
            writeln!(writer)?;
        }
        OutputFormat::Summary => write_summary(writer, result).map_err(Error::Io)?,
    }
    Ok(())
}

fn write_summary<W: Write>(writer: &mut W, result: &ParseResult) -> io::Result<()> {
    writeln!(
        writer,
        "{} {}: {} transactions, {} holdings, {} investment transactions, {} warnings",
        result.institution,
        result.format,
        result.transactions.len(),
        result.holdings.len(),
        result.investment_transactions.len(),
        result.warnings.len()
    )?;

    for tx in &result.transactions {
        writeln!(
            writer,
            "{}  {:>12}  {:<9}  {}",
            tx.posted_date,
            tx.amount,
            tx.transaction_type.as_str(),
            tx.description
        )?;
    }
    for holding in &result.holdings {
        writeln!(
            writer,
            "{:<10}  {:>14} @ {:>10}  {:?}{}",
            holding.symbol,
            holding.quantity,
            holding.price,
            holding.asset_class,
            if holding.value_mismatch { "  (value mismatch)" } else { "" }
        )?;
    }
    for tx in &result.investment_transactions {
        writeln!(
            writer,
            "{}  {:<12?}  {:<10}  {:>12}",
            tx.trade_date, tx.action, tx.symbol, tx.amount
        )?;
    }
    for balance in &result.balances {
        writeln!(
            writer,
            "balance {}  {:>12} {}  {}",
            balance.as_of,
            balance.balance,
            balance.currency,
            balance.account_type
        )?;
    }
    for warning in &result.warnings {
        writeln!(writer, "warning: {}", warning)?;
    }
    Ok(())
}
