//! Fallback parsers for files no registered signature recognizes.
//!
//! The CSV parser infers its columns from common header aliases and decides
//! the sign convention from the data. The PDF grammar accepts the usual
//! `date description amount [balance]` statement line.

use tracing::debug;

use crate::csv_format::{
    column_has_explicit_sign, read_rows, Aliases, AmountColumns, BankColumns, CsvLayout, CsvRow, HeaderIndex,
    HeaderSpec, HoldingColumns, RecordColumns, HEADER_SCAN_ROWS,
};
use crate::error::Result;
use crate::normalize::{decode_text, SignConvention};
use crate::options::ParseOptions;
use crate::pdf_format::{LinePattern, LineSign, PdfLayout, AMOUNT};
use crate::registry::StatementParser;
use crate::types::{AccountType, FileFormat, Institution, ParseResult, ResultBuilder, TransactionType};

const DATE: &[&str] = &[
    "Date",
    "Transaction Date",
    "Trans. Date",
    "Posted Date",
    "Post Date",
    "Posting Date",
    "Trade Date",
    "Value Date",
];
const DESCRIPTION: &[&str] = &[
    "Description",
    "Payee",
    "Merchant",
    "Name",
    "Transaction Description",
    "Narrative",
    "Memo",
];
const AMOUNT_COLUMN: &[&str] = &["Amount", "Transaction Amount", "Amount ($)", "Net Amount"];
const DEBIT: &[&str] = &["Debit", "Debit Amount", "Withdrawal", "Withdrawals", "Money Out"];
const CREDIT: &[&str] = &["Credit", "Credit Amount", "Deposit", "Deposits", "Money In"];
const KIND: &[&str] = &["Type", "Transaction Type", "Debit/Credit", "Dr/Cr", "CR/DR"];
const DEBIT_VALUES: &[&str] = &["DEBIT", "DR", "D", "WITHDRAWAL", "PURCHASE", "SALE"];
const BALANCE: &[&str] = &["Balance", "Running Balance", "Running Bal.", "Available Balance"];
const ACCOUNT: &[&str] = &["Account", "Account Number", "Account #", "Card No."];
const CHECK_NUMBER: &[&str] = &["Check Number", "Check #", "Check No.", "Check or Slip #"];
const REFERENCE: &[&str] = &["Reference", "Reference Number", "Transaction ID"];

const SYMBOL: &[&str] = &["Symbol", "Ticker", "CUSIP", "Security ID"];
const QUANTITY: &[&str] = &["Quantity", "Shares", "Units", "Qty"];

/// Map common type column values.
pub fn generic_type(value: &str) -> Option<TransactionType> {
    let kind = match value.trim().to_uppercase().as_str() {
        "DEBIT" | "DR" | "D" | "WITHDRAWAL" => TransactionType::Debit,
        "CREDIT" | "CR" | "C" | "DEPOSIT" => TransactionType::Credit,
        "PURCHASE" | "SALE" | "POS" => TransactionType::Purchase,
        "PAYMENT" => TransactionType::Payment,
        "TRANSFER" | "XFER" => TransactionType::Transfer,
        "FEE" => TransactionType::Fee,
        "INTEREST" => TransactionType::Interest,
        _ => return None,
    };
    Some(kind)
}

fn layout(columns: RecordColumns) -> CsvLayout {
    CsvLayout {
        institution: Institution::Generic,
        name: "generic",
        header: HeaderSpec::Named {
            required: &[],
            exact: false,
        },
        date_formats: &[],
        columns,
        type_map: generic_type,
        skip_prefixes: &["beginning balance", "ending balance", "opening balance", "closing balance"],
        sample: "",
    }
}

fn holdings_columns() -> RecordColumns {
    RecordColumns::Holdings(HoldingColumns {
        account: Some(ACCOUNT),
        account_name: Some(&["Account Name", "Account Type"]),
        symbol: SYMBOL,
        description: Some(&["Description", "Name", "Security Name", "Security Description"]),
        quantity: QUANTITY,
        price: Some(&["Price", "Last Price", "Current Price", "Unit Price", "Price ($)"]),
        market_value: Some(&["Market Value", "Current Value", "Value", "Total Value"]),
        cost_basis_total: Some(&["Cost Basis", "Cost Basis Total", "Total Cost"]),
        cost_basis_per_unit: Some(&["Average Cost", "Average Cost Basis", "Cost Per Share", "Unit Cost"]),
        unrealized_gain: Some(&["Gain/Loss", "Unrealized Gain", "Total Gain/Loss Dollar", "Gain/Loss Dollar"]),
        security_type: Some(&["Security Type", "Asset Class", "Type"]),
    })
}

/// Pick the amount columns and their sign from the header and data rows.
fn amount_columns(header: &HeaderIndex, rows: &[CsvRow]) -> Option<AmountColumns> {
    if let Some(column) = header.position(AMOUNT_COLUMN) {
        if column_has_explicit_sign(rows, column) {
            return Some(AmountColumns::Signed {
                column: AMOUNT_COLUMN,
                convention: SignConvention::DebitNegative,
            });
        }
        if header.position(KIND).is_some() {
            return Some(AmountColumns::TypeColumn {
                amount: AMOUNT_COLUMN,
                column: KIND,
                debit_values: DEBIT_VALUES,
            });
        }
        // Nothing in the file says which way money moves.
        return Some(AmountColumns::Signed {
            column: AMOUNT_COLUMN,
            convention: SignConvention::DebitPositive,
        });
    }
    if header.position(DEBIT).is_some() || header.position(CREDIT).is_some() {
        return Some(AmountColumns::SplitColumns {
            debit: DEBIT,
            credit: CREDIT,
        });
    }
    None
}

/// Columns inferred for one header row.
fn infer_columns(header: &HeaderIndex, rows: &[CsvRow]) -> Option<RecordColumns> {
    let has_date = header.position(DATE).is_some();
    if !has_date && header.position(SYMBOL).is_some() && header.position(QUANTITY).is_some() {
        return Some(holdings_columns());
    }
    if !has_date || header.position(DESCRIPTION).is_none() {
        return None;
    }
    let amount = amount_columns(header, rows)?;
    Some(RecordColumns::Bank(BankColumns {
        account_type: AccountType::Other,
        date: DATE,
        description: DESCRIPTION,
        amount,
        kind: Some(KIND),
        balance: Some(BALANCE),
        category: Some(&["Category"]),
        account: Some(ACCOUNT),
        check_number: Some(CHECK_NUMBER),
        memo: Some(&["Memo", "Notes"]),
        reference: Some(REFERENCE),
    }))
}

/// CSV parser for unrecognized exports.
#[derive(Debug, Clone)]
pub struct GenericCsvParser {
    options: ParseOptions,
}

impl GenericCsvParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }
}

impl StatementParser for GenericCsvParser {
    fn parse(&self, bytes: &[u8], filename: Option<&str>) -> Result<ParseResult> {
        let text = decode_text(bytes)?;
        let table = read_rows(&text);
        let mut builder = ResultBuilder::new(Institution::Generic, FileFormat::Csv);

        let found = table.rows.iter().take(HEADER_SCAN_ROWS).enumerate().find_map(|(at, row)| {
            let header = HeaderIndex::from_record(&row.record);
            infer_columns(&header, &table.rows[at + 1..]).map(|columns| (at, header, columns))
        });

        match found {
            Some((at, header, columns)) => {
                debug!(file = filename.unwrap_or("-"), "generic CSV header at row {}: {:?}", table.rows[at].line, columns);
                for (line, message) in &table.broken {
                    builder.warn(*line, message.clone());
                }
                layout(columns).parse_rows(&header, &table.rows[at + 1..], &self.options, &mut builder);
            }
            None => builder.warn(None, "no date/description/amount columns found"),
        }

        debug!("Parsed {} generic CSV records", builder.record_count());
        Ok(builder.finish())
    }

    fn institution(&self) -> Institution {
        Institution::Generic
    }

    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }
}

const MONTH_DAY: &str = r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2}";

fn generic_patterns() -> Vec<LinePattern> {
    let tail = format!(r"\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})(?:\s+(?P<balance>{AMOUNT}))?$");
    [
        r"\d{1,2}/\d{1,2}/\d{2,4}",
        r"\d{4}-\d{2}-\d{2}",
        r"\d{1,2}/\d{1,2}",
        MONTH_DAY,
    ]
    .iter()
    .map(|date| LinePattern::builtin(&format!(r"^(?P<date>{date}){tail}"), LineSign::Inferred))
    .collect()
}

/// Generic line grammar detected by `markers`.
pub fn marker_layout(institution: Institution, markers: Aliases, sample: &'static str) -> PdfLayout {
    PdfLayout {
        institution,
        markers,
        sample,
        patterns: generic_patterns(),
    }
}

/// Fallback PDF layout for statements without a registered marker.
pub fn pdf_layout() -> PdfLayout {
    marker_layout(Institution::Generic, &[], "")
}
