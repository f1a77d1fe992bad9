//! Canonical records produced by every parser, regardless of source format.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Error, Result};

/// Financial institution that issued a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Institution {
    Chase,
    Discover,
    AmericanExpress,
    CapitalOne,
    BankOfAmerica,
    WellsFargo,
    Citibank,
    Fidelity,
    /// No registered signature matched; routed to the generic parser.
    Generic,
    /// The file names no institution at all.
    Unknown,
    /// Named in the file but not registered.
    Other(String),
}

impl Institution {
    /// Human-readable institution name.
    pub fn name(&self) -> &str {
        match self {
            Institution::Chase => "Chase",
            Institution::Discover => "Discover",
            Institution::AmericanExpress => "American Express",
            Institution::CapitalOne => "Capital One",
            Institution::BankOfAmerica => "Bank of America",
            Institution::WellsFargo => "Wells Fargo",
            Institution::Citibank => "Citibank",
            Institution::Fidelity => "Fidelity",
            Institution::Generic => "generic",
            Institution::Unknown => "unknown",
            Institution::Other(name) => name,
        }
    }

    /// Resolve a free-form name (OFX `<ORG>`, CLI input) to an institution.
    pub fn from_name(name: &str) -> Self {
        let lowered = name.trim().to_lowercase();
        match lowered.as_str() {
            "" | "unknown" => Institution::Unknown,
            "generic" => Institution::Generic,
            "chase" | "jpmorgan chase" | "jpmorgan chase bank" | "jpmc" => Institution::Chase,
            "discover" | "discover card" | "discover bank" => Institution::Discover,
            "american express" | "amex" => Institution::AmericanExpress,
            "capital one" | "capitalone" => Institution::CapitalOne,
            "bank of america" | "bofa" | "boa" => Institution::BankOfAmerica,
            "wells fargo" | "wellsfargo" => Institution::WellsFargo,
            "citibank" | "citi" => Institution::Citibank,
            "fidelity" | "fidelity investments" => Institution::Fidelity,
            _ => Institution::Other(name.trim().to_string()),
        }
    }

    /// True for the catch-all routing keys.
    pub fn is_generic(&self) -> bool {
        matches!(self, Institution::Generic | Institution::Unknown)
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Institution {
    fn from(name: String) -> Self {
        Institution::from_name(&name)
    }
}

impl From<Institution> for String {
    fn from(institution: Institution) -> Self {
        institution.name().to_string()
    }
}

/// Container format of a statement file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    /// OFX and QFX share one container grammar.
    Ofx,
    Pdf,
    Unknown,
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "ofx" | "qfx" => Ok(FileFormat::Ofx),
            "pdf" => Ok(FileFormat::Pdf),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

impl FileFormat {
    /// Get file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Ofx => "ofx",
            FileFormat::Pdf => "pdf",
            FileFormat::Unknown => "",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Csv => "CSV",
            FileFormat::Ofx => "OFX",
            FileFormat::Pdf => "PDF",
            FileFormat::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Kind of bank or card transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Payment,
    Debit,
    Credit,
    Transfer,
    Fee,
    Interest,
    Unknown,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Payment => "payment",
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
            TransactionType::Transfer => "transfer",
            TransactionType::Fee => "fee",
            TransactionType::Interest => "interest",
            TransactionType::Unknown => "unknown",
        }
    }
}

/// A single normalized bank, checking or card transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub institution: Institution,

    /// Account identifier (number, last four digits or OFX `ACCTID`).
    pub account: Option<String>,

    /// Posted date. Calendar date only, never a timestamp.
    pub posted_date: NaiveDate,

    /// Description exactly as found in the source (trimmed).
    pub raw_description: String,

    /// Cleaned merchant/description text. Never empty.
    pub description: String,

    /// Signed amount: debits negative, credits positive.
    pub amount: Decimal,

    /// ISO-4217 currency code.
    pub currency: String,

    pub transaction_type: TransactionType,

    /// Running balance after this transaction, when the source has one.
    pub balance: Option<Decimal>,

    /// Category from the source, or a hint derived from the description.
    pub category: Option<String>,

    pub check_number: Option<String>,

    pub memo: Option<String>,

    /// Source-assigned transaction id (OFX `FITID`).
    pub reference: Option<String>,
}

/// Broad asset class of a holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equity,
    Bond,
    Cash,
    Fund,
    Other,
}

/// Kind of account a statement, balance or position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    CreditCard,
    Brokerage,
    /// Individual retirement account of unspecified tax treatment.
    Ira,
    RothIra,
    TraditionalIra,
    #[serde(rename = "401k")]
    K401,
    Mortgage,
    Loan,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::CreditCard => "credit_card",
            AccountType::Brokerage => "brokerage",
            AccountType::Ira => "ira",
            AccountType::RothIra => "roth_ira",
            AccountType::TraditionalIra => "traditional_ira",
            AccountType::K401 => "401k",
            AccountType::Mortgage => "mortgage",
            AccountType::Loan => "loan",
            AccountType::Other => "other",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Balance of one account as reported by the statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: Option<String>,

    pub account_type: AccountType,

    /// Date the balance was reported for.
    pub as_of: NaiveDate,

    /// Ledger balance. For card accounts a debt is negative.
    pub balance: Decimal,

    pub available_balance: Option<Decimal>,

    pub currency: String,
}

/// A position held in an investment account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentHolding {
    pub account: Option<String>,

    pub account_type: AccountType,

    /// Ticker symbol or CUSIP-like code.
    pub symbol: String,

    pub description: String,

    /// Number of units held; may be fractional.
    pub quantity: Decimal,

    pub cost_basis_per_unit: Option<Decimal>,

    pub cost_basis_total: Option<Decimal>,

    /// Price per unit as of `as_of`.
    pub price: Decimal,

    /// Market value reported by the source.
    pub market_value: Option<Decimal>,

    pub as_of: Option<NaiveDate>,

    pub unrealized_gain: Option<Decimal>,

    pub asset_class: AssetClass,

    /// Set when quantity × price disagrees with the reported market value.
    pub value_mismatch: bool,
}

/// Action recorded by an investment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentAction {
    Buy,
    Sell,
    Dividend,
    Reinvestment,
    Fee,
    Transfer,
}

/// A trade, income or transfer in an investment account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentTransaction {
    pub account: Option<String>,

    pub trade_date: NaiveDate,

    pub symbol: String,

    pub description: String,

    pub action: InvestmentAction,

    pub quantity: Decimal,

    pub price: Decimal,

    /// Cash effect on the account, as reported.
    pub amount: Decimal,

    pub fees: Decimal,
}

/// A non-fatal problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// 1-based row (CSV) or line (PDF) number, when the warning is about one.
    pub row: Option<usize>,

    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {}: {}", row, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Normalized output bundle of a single parse call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub institution: Institution,

    pub format: FileFormat,

    pub transactions: Vec<BankTransaction>,

    pub holdings: Vec<InvestmentHolding>,

    pub investment_transactions: Vec<InvestmentTransaction>,

    /// Account balance snapshots. Not counted as records.
    pub balances: Vec<AccountBalance>,

    pub warnings: Vec<ParseWarning>,

    /// True when at least one record was extracted.
    pub has_records: bool,
}

impl ParseResult {
    /// An empty result carrying a single warning.
    pub fn empty(institution: Institution, format: FileFormat, warning: impl Into<String>) -> Self {
        let mut builder = ResultBuilder::new(institution, format);
        builder.warn(None, warning);
        builder.finish()
    }

    /// Total number of records of all kinds.
    pub fn record_count(&self) -> usize {
        self.transactions.len() + self.holdings.len() + self.investment_transactions.len()
    }
}

/// Collects records while a parser runs; the result is frozen by `finish`.
#[derive(Debug)]
pub(crate) struct ResultBuilder {
    institution: Institution,
    format: FileFormat,
    transactions: Vec<BankTransaction>,
    holdings: Vec<InvestmentHolding>,
    investment_transactions: Vec<InvestmentTransaction>,
    balances: Vec<AccountBalance>,
    warnings: Vec<ParseWarning>,
}

impl ResultBuilder {
    pub(crate) fn new(institution: Institution, format: FileFormat) -> Self {
        Self {
            institution,
            format,
            transactions: Vec::new(),
            holdings: Vec::new(),
            investment_transactions: Vec::new(),
            balances: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn institution(&self) -> &Institution {
        &self.institution
    }

    pub(crate) fn push_transaction(&mut self, transaction: BankTransaction) {
        self.transactions.push(transaction);
    }

    pub(crate) fn push_holding(&mut self, holding: InvestmentHolding) {
        self.holdings.push(holding);
    }

    pub(crate) fn push_investment_transaction(&mut self, transaction: InvestmentTransaction) {
        self.investment_transactions.push(transaction);
    }

    pub(crate) fn push_balance(&mut self, balance: AccountBalance) {
        self.balances.push(balance);
    }

    pub(crate) fn warn(&mut self, row: Option<usize>, message: impl Into<String>) {
        let warning = ParseWarning {
            row,
            message: message.into(),
        };
        warn!(institution = %self.institution, format = %self.format, "{}", warning);
        self.warnings.push(warning);
    }

    pub(crate) fn record_count(&self) -> usize {
        self.transactions.len() + self.holdings.len() + self.investment_transactions.len()
    }

    pub(crate) fn finish(self) -> ParseResult {
        let has_records = self.record_count() > 0;
        ParseResult {
            institution: self.institution,
            format: self.format,
            transactions: self.transactions,
            holdings: self.holdings,
            investment_transactions: self.investment_transactions,
            balances: self.balances,
            warnings: self.warnings,
            has_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("csv".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert_eq!("QFX".parse::<FileFormat>().unwrap(), FileFormat::Ofx);
        assert_eq!(".pdf".parse::<FileFormat>().unwrap(), FileFormat::Pdf);
        assert!("xlsx".parse::<FileFormat>().is_err());
    }

    #[test]
    fn test_institution_names_round_trip() {
        assert_eq!(Institution::from_name("AMEX"), Institution::AmericanExpress);
        assert_eq!(Institution::from_name(" Bank of America "), Institution::BankOfAmerica);
        assert_eq!(
            Institution::from_name("First Credit Union"),
            Institution::Other("First Credit Union".into())
        );
        assert_eq!(Institution::from_name(""), Institution::Unknown);

        let json = serde_json::to_string(&Institution::CapitalOne).unwrap();
        assert_eq!(json, "\"Capital One\"");
        let back: Institution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Institution::CapitalOne);
    }

    #[test]
    fn test_builder_sets_has_records() {
        let empty = ResultBuilder::new(Institution::Generic, FileFormat::Csv).finish();
        assert!(!empty.has_records);
        assert_eq!(empty.record_count(), 0);

        let result = ParseResult::empty(Institution::Generic, FileFormat::Pdf, "no transactions recognized");
        assert!(!result.has_records);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].to_string(), "no transactions recognized");
    }

    #[test]
    fn test_account_type_names() {
        assert_eq!(serde_json::to_string(&AccountType::K401).unwrap(), "\"401k\"");
        assert_eq!(serde_json::to_string(&AccountType::CreditCard).unwrap(), "\"credit_card\"");
        assert_eq!(AccountType::RothIra.to_string(), "roth_ira");
    }

    #[test]
    fn test_balances_are_not_records() {
        let mut builder = ResultBuilder::new(Institution::Chase, FileFormat::Ofx);
        builder.push_balance(AccountBalance {
            account: Some("1234".into()),
            account_type: AccountType::Checking,
            as_of: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            balance: Decimal::new(95800, 2),
            available_balance: None,
            currency: "USD".into(),
        });
        let result = builder.finish();
        assert_eq!(result.balances.len(), 1);
        assert_eq!(result.record_count(), 0);
        assert!(!result.has_records);
    }

    #[test]
    fn test_warning_display() {
        let warning = ParseWarning {
            row: Some(4),
            message: "unparseable date '13/45/2024'".into(),
        };
        assert_eq!(warning.to_string(), "row 4: unparseable date '13/45/2024'");
    }
}
