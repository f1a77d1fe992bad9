//! Statement Compare - CLI tool for checking that two exports of one account
//! normalize to the same transactions.

use clap::Parser;
use std::fs;
use std::io;
use statement_parser::{parse_auto, BankTransaction, Result};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statement_compare")]
#[command(about = "Compare the normalized transactions of two statement files", long_about = None)]
struct Cli {
    /// First file path
    #[arg(long = "file1")]
    file1: String,

    /// Second file path
    #[arg(long = "file2")]
    file2: String,
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

    let bytes1 = fs::read(&cli.file1)?;
    let (_, result1) = parse_auto(&bytes1, Some(&cli.file1))?;

    let bytes2 = fs::read(&cli.file2)?;
    let (_, result2) = parse_auto(&bytes2, Some(&cli.file2))?;

    let differences = compare_transactions(&result1.transactions, &result2.transactions);
    if differences.is_empty() {
        println!(
            "The transaction records in '{}' and '{}' are identical.",
            cli.file1, cli.file2
        );
    } else {
        println!("Differences found:");
        for diff in differences {
            println!("  - {}", diff);
        }
    }

    Ok(())
}

/// Compare by date, amount and description, ignoring source order.
fn compare_transactions(left: &[BankTransaction], right: &[BankTransaction]) -> Vec<String> {
    let mut differences = Vec::new();

    if left.len() != right.len() {
        differences.push(format!(
            "Number of transactions differs: {} vs {}",
            left.len(),
            right.len()
        ));
    }

    let mut left: Vec<_> = left.iter().map(key).collect();
    let mut right: Vec<_> = right.iter().map(key).collect();
    left.sort();
    right.sort();

    let mut i = 0;
    let mut j = 0;
    while i < left.len() || j < right.len() {
        match (left.get(i), right.get(j)) {
            (Some(a), Some(b)) if a == b => {
                i += 1;
                j += 1;
            }
            (Some(a), Some(b)) if a < b => {
                differences.push(format!("Only in file 1: {} {} {}", a.0, a.1, a.2));
                i += 1;
            }
            (_, Some(b)) => {
                differences.push(format!("Only in file 2: {} {} {}", b.0, b.1, b.2));
                j += 1;
            }
            (Some(a), None) => {
                differences.push(format!("Only in file 1: {} {} {}", a.0, a.1, a.2));
                i += 1;
            }
            (None, None) => break,
        }
    }

    differences
}

fn key(tx: &BankTransaction) -> (chrono::NaiveDate, rust_decimal::Decimal, String) {
    (tx.posted_date, tx.amount.normalize(), normalize_string(&tx.description))
}

fn normalize_string(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}
