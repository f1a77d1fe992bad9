//! Data-driven CSV statement parsing.
//!
//! Every institution export is described by a [`CsvLayout`]: how its header
//! is recognized, which columns hold which fields (by name, with aliases),
//! the date formats it uses and its sign convention. One engine applies the
//! layout, so adding an institution means adding a table, not code.

use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::normalize::{
    account_type_hint, asset_class_hint, category_hint, decode_text, infer_transaction_type, investment_action,
    normalize_description, normalize_symbol, parse_amount, parse_amount_detail, parse_date,
    parse_optional_amount, raw_description, SignConvention,
};
use crate::options::ParseOptions;
use crate::registry::StatementParser;
use crate::types::{
    AccountBalance, AccountType, AssetClass, BankTransaction, FileFormat, Institution, InvestmentAction, InvestmentHolding,
    InvestmentTransaction, ParseResult, ResultBuilder, TransactionType,
};

/// Accepted names for one column, most common first. Matched case-insensitively.
pub type Aliases = &'static [&'static str];

/// Number of non-blank rows searched for a header.
pub const HEADER_SCAN_ROWS: usize = 20;

/// Check on the data rows under a header, given that header.
pub type RowGuard = fn(&HeaderIndex, &[CsvRow]) -> bool;

/// How a layout's header is found.
#[derive(Clone, Copy)]
pub enum HeaderSpec {
    /// A header row containing every `required` column. With `exact` the row
    /// must contain nothing else.
    Named { required: Aliases, exact: bool },
    /// Like `Named`, but the data rows under the header must also pass
    /// `accepts`. For bare headers that several institutions share.
    Guarded {
        required: Aliases,
        exact: bool,
        accepts: RowGuard,
    },
    /// Headerless export. Columns are named by position and the first row
    /// accepted by `row_check` starts the data.
    Fixed {
        columns: Aliases,
        row_check: fn(&StringRecord) -> bool,
    },
}

impl fmt::Debug for HeaderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderSpec::Named { required, exact } => f
                .debug_struct("Named")
                .field("required", required)
                .field("exact", exact)
                .finish(),
            HeaderSpec::Guarded { required, exact, .. } => f
                .debug_struct("Guarded")
                .field("required", required)
                .field("exact", exact)
                .finish(),
            HeaderSpec::Fixed { columns, .. } => f.debug_struct("Fixed").field("columns", columns).finish(),
        }
    }
}

/// Where the amount of a bank row comes from and which sign it carries.
#[derive(Debug, Clone, Copy)]
pub enum AmountColumns {
    /// A single signed column.
    Signed {
        column: Aliases,
        convention: SignConvention,
    },
    /// Separate unsigned debit and credit columns.
    SplitColumns { debit: Aliases, credit: Aliases },
    /// An unsigned amount plus a column naming the direction.
    TypeColumn {
        amount: Aliases,
        column: Aliases,
        debit_values: Aliases,
    },
}

/// Columns of a bank or card export.
#[derive(Debug, Clone, Copy)]
pub struct BankColumns {
    /// Account type of the closing balance snapshot.
    pub account_type: AccountType,
    pub date: Aliases,
    pub description: Aliases,
    pub amount: AmountColumns,
    /// Institution transaction-type column, fed to the layout's `type_map`.
    pub kind: Option<Aliases>,
    pub balance: Option<Aliases>,
    pub category: Option<Aliases>,
    pub account: Option<Aliases>,
    pub check_number: Option<Aliases>,
    pub memo: Option<Aliases>,
    /// Institution-assigned transaction id.
    pub reference: Option<Aliases>,
}

/// Columns of a positions export.
#[derive(Debug, Clone, Copy)]
pub struct HoldingColumns {
    pub account: Option<Aliases>,
    /// Free-form account name (`ROTH IRA`, `INDIVIDUAL`) that decides the
    /// account type.
    pub account_name: Option<Aliases>,
    pub symbol: Aliases,
    pub description: Option<Aliases>,
    pub quantity: Aliases,
    pub price: Option<Aliases>,
    pub market_value: Option<Aliases>,
    pub cost_basis_total: Option<Aliases>,
    pub cost_basis_per_unit: Option<Aliases>,
    pub unrealized_gain: Option<Aliases>,
    pub security_type: Option<Aliases>,
}

/// Columns of an investment activity export.
#[derive(Debug, Clone, Copy)]
pub struct HistoryColumns {
    pub date: Aliases,
    pub account: Option<Aliases>,
    pub action: Aliases,
    pub symbol: Option<Aliases>,
    pub description: Option<Aliases>,
    pub quantity: Option<Aliases>,
    pub price: Option<Aliases>,
    pub commission: Option<Aliases>,
    pub fees: Option<Aliases>,
    pub amount: Aliases,
}

/// Which record kind a layout produces.
#[derive(Debug, Clone, Copy)]
pub enum RecordColumns {
    Bank(BankColumns),
    Holdings(HoldingColumns),
    History(HistoryColumns),
}

/// Description of one institution's CSV export.
#[derive(Clone)]
pub struct CsvLayout {
    pub institution: Institution,
    /// Short identifier used in logs.
    pub name: &'static str,
    pub header: HeaderSpec,
    /// Tried before the shared fallback formats.
    pub date_formats: Aliases,
    pub columns: RecordColumns,
    /// Maps the institution's type column onto a transaction type.
    pub type_map: fn(&str) -> Option<TransactionType>,
    /// Summary or disclaimer rows, skipped silently. A row is one when its
    /// first populated cell or its label cell (description of a bank row,
    /// symbol of a position) starts with one of these, case-insensitive.
    pub skip_prefixes: Aliases,
    /// Sample header line, for documentation of the signature table.
    pub sample: &'static str,
}

impl fmt::Debug for CsvLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvLayout")
            .field("institution", &self.institution)
            .field("name", &self.name)
            .field("header", &self.header)
            .field("columns", &self.columns)
            .finish()
    }
}

/// `type_map` for layouts without a type column.
pub fn no_type_map(_: &str) -> Option<TransactionType> {
    None
}

/// A non-blank CSV row with its 1-based line number.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub line: usize,
    pub record: StringRecord,
}

/// All non-blank rows of a CSV text plus rows the reader could not split.
#[derive(Debug, Default)]
pub struct CsvRows {
    pub rows: Vec<CsvRow>,
    pub broken: Vec<(Option<usize>, String)>,
}

/// Split decoded text into rows. Blank rows are dropped.
pub fn read_rows(text: &str) -> CsvRows {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut out = CsvRows::default();
    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                if record.iter().all(|field| field.trim().is_empty()) {
                    continue;
                }
                let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 1);
                out.rows.push(CsvRow { line, record });
            }
            Err(err) => {
                let line = err.position().map(|p| p.line() as usize);
                out.broken.push((line, err.to_string()));
            }
        }
    }
    out
}

/// Header names of a table, normalized for lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    names: Vec<String>,
}

fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl HeaderIndex {
    pub fn from_record(record: &StringRecord) -> Self {
        Self {
            names: record.iter().map(normalize_header).collect(),
        }
    }

    pub fn from_names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| normalize_header(n)).collect(),
        }
    }

    /// Position of the first alias present in the header.
    pub fn position(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let alias = normalize_header(alias);
            self.names.iter().position(|name| *name == alias)
        })
    }

    pub fn contains_all(&self, required: &[&str]) -> bool {
        required.iter().all(|column| self.position(&[*column]).is_some())
    }

    pub fn len(&self) -> usize {
        self.names.iter().filter(|name| !name.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require(&self, aliases: Aliases) -> Result<usize> {
        self.position(aliases)
            .ok_or_else(|| Error::MissingField(aliases.first().copied().unwrap_or("column").to_string()))
    }

    fn optional(&self, aliases: Option<Aliases>) -> Option<usize> {
        aliases.and_then(|a| self.position(a))
    }
}

/// Trimmed, non-empty field at `index`.
fn field(record: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn text_field(record: &StringRecord, index: Option<usize>) -> Option<String> {
    field(record, index).map(str::to_string)
}

impl CsvLayout {
    /// Check whether `record` is this layout's header (or first data row for
    /// headerless layouts).
    pub fn header_matches(&self, record: &StringRecord) -> bool {
        match self.header {
            HeaderSpec::Named { required, exact } | HeaderSpec::Guarded { required, exact, .. } => {
                let index = HeaderIndex::from_record(record);
                index.contains_all(required) && (!exact || index.len() == required.len())
            }
            HeaderSpec::Fixed { columns, row_check } => record.len() >= columns.len() && row_check(record),
        }
    }

    /// [`header_matches`](Self::header_matches) on `rows[at]`, plus the row
    /// guard of a guarded header.
    pub fn matches_at(&self, rows: &[CsvRow], at: usize) -> bool {
        let Some(row) = rows.get(at) else {
            return false;
        };
        if !self.header_matches(&row.record) {
            return false;
        }
        match self.header {
            HeaderSpec::Guarded { accepts, .. } => accepts(&HeaderIndex::from_record(&row.record), &rows[at + 1..]),
            HeaderSpec::Named { .. } | HeaderSpec::Fixed { .. } => true,
        }
    }

    /// Header index and the position of the first data row, given the row
    /// that matched [`header_matches`](Self::header_matches).
    fn header_at(&self, rows: &[CsvRow], at: usize) -> (HeaderIndex, usize) {
        match self.header {
            HeaderSpec::Named { .. } | HeaderSpec::Guarded { .. } => {
                (HeaderIndex::from_record(&rows[at].record), at + 1)
            }
            HeaderSpec::Fixed { columns, .. } => (HeaderIndex::from_names(columns), at),
        }
    }

    fn skip_row(&self, record: &StringRecord, label: Option<usize>) -> bool {
        if self.skip_prefixes.is_empty() {
            return false;
        }
        let first = record.iter().map(str::trim).find(|value| !value.is_empty());
        [first, field(record, label)].into_iter().flatten().any(|value| {
            let value = value.to_lowercase();
            self.skip_prefixes.iter().any(|prefix| value.starts_with(prefix))
        })
    }

    /// Parse data rows under a located header into `builder`.
    pub(crate) fn parse_rows(
        &self,
        header: &HeaderIndex,
        rows: &[CsvRow],
        options: &ParseOptions,
        builder: &mut ResultBuilder,
    ) {
        match &self.columns {
            RecordColumns::Bank(columns) => match BankIndex::resolve(header, columns) {
                Ok(index) => {
                    let mut parsed = Vec::new();
                    for row in rows.iter().filter(|r| !self.skip_row(&r.record, index.description)) {
                        match self.bank_transaction(&index, row, options, builder) {
                            Ok(transaction) => parsed.push(transaction),
                            Err(err) => builder.warn(Some(row.line), err.to_string()),
                        }
                    }
                    if let Some(balance) = closing_balance(&parsed, columns.account_type, options) {
                        builder.push_balance(balance);
                    }
                    for transaction in parsed {
                        builder.push_transaction(transaction);
                    }
                }
                Err(err) => builder.warn(None, err.to_string()),
            },
            RecordColumns::Holdings(columns) => match HoldingIndex::resolve(header, columns) {
                Ok(index) => {
                    for row in rows.iter().filter(|r| !self.skip_row(&r.record, Some(index.symbol))) {
                        match self.holding(&index, row, options) {
                            Ok(holding) => {
                                if holding.value_mismatch {
                                    builder.warn(
                                        Some(row.line),
                                        format!(
                                            "{}: quantity x price = {} but market value is {}",
                                            holding.symbol,
                                            (holding.quantity * holding.price).round_dp(2),
                                            holding.market_value.unwrap_or_default()
                                        ),
                                    );
                                }
                                builder.push_holding(holding);
                            }
                            Err(err) => builder.warn(Some(row.line), err.to_string()),
                        }
                    }
                }
                Err(err) => builder.warn(None, err.to_string()),
            },
            RecordColumns::History(columns) => match HistoryIndex::resolve(header, columns) {
                Ok(index) => {
                    for row in rows.iter().filter(|r| !self.skip_row(&r.record, None)) {
                        match self.investment_transaction(&index, row) {
                            Ok(transaction) => builder.push_investment_transaction(transaction),
                            Err(err) => builder.warn(Some(row.line), err.to_string()),
                        }
                    }
                }
                Err(err) => builder.warn(None, err.to_string()),
            },
        }
    }

    fn bank_transaction(
        &self,
        index: &BankIndex,
        row: &CsvRow,
        options: &ParseOptions,
        builder: &mut ResultBuilder,
    ) -> Result<BankTransaction> {
        let record = &row.record;
        let raw_date = field(record, Some(index.date)).ok_or_else(|| Error::MissingField("date".to_string()))?;
        let posted_date = parse_date(raw_date, self.date_formats)?;
        let amount = index.amount.resolve(record)?;

        let raw = field(record, index.description).unwrap_or("");
        let transaction_type = field(record, index.kind)
            .and_then(self.type_map)
            .unwrap_or_else(|| infer_transaction_type(amount, raw));
        let category = text_field(record, index.category).or_else(|| category_hint(raw));
        let balance = match parse_optional_amount(field(record, index.balance)) {
            Ok(balance) => balance,
            Err(err) => {
                builder.warn(Some(row.line), format!("balance ignored: {}", err));
                None
            }
        };

        Ok(BankTransaction {
            institution: self.institution.clone(),
            account: text_field(record, index.account),
            posted_date,
            raw_description: raw_description(raw),
            description: normalize_description(raw),
            amount,
            currency: options.default_currency.clone(),
            transaction_type,
            balance,
            category,
            check_number: text_field(record, index.check_number),
            memo: text_field(record, index.memo),
            reference: text_field(record, index.reference),
        })
    }

    fn holding(&self, index: &HoldingIndex, row: &CsvRow, options: &ParseOptions) -> Result<InvestmentHolding> {
        let record = &row.record;
        let symbol = field(record, Some(index.symbol))
            .map(normalize_symbol)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MissingField("symbol".to_string()))?;
        let description = text_field(record, index.description).unwrap_or_default();
        let asset_class = asset_class_hint(&symbol, &description, field(record, index.security_type));

        let market_value = parse_optional_amount(field(record, index.market_value))?;
        let quantity = parse_optional_amount(field(record, Some(index.quantity)))?;
        let price = parse_optional_amount(field(record, index.price))?;

        let (quantity, price) = match (quantity, price, market_value) {
            (Some(q), Some(p), _) => (q, p),
            (Some(q), None, Some(mv)) if !q.is_zero() => (q, (mv / q).round_dp(4)),
            // Cash sweep positions only report a value.
            (None, _, Some(mv)) if asset_class == AssetClass::Cash => (mv, Decimal::ONE),
            (None, _, _) => return Err(Error::MissingField("quantity".to_string())),
            _ => return Err(Error::MissingField("price".to_string())),
        };

        let cost_basis_total = parse_optional_amount(field(record, index.cost_basis_total))?;
        let cost_basis_per_unit = match parse_optional_amount(field(record, index.cost_basis_per_unit))? {
            Some(per_unit) => Some(per_unit),
            None => cost_basis_total
                .filter(|_| !quantity.is_zero())
                .map(|total| (total / quantity).round_dp(4)),
        };

        Ok(InvestmentHolding {
            account: text_field(record, index.account),
            account_type: field(record, index.account_name)
                .map(account_type_hint)
                .unwrap_or(AccountType::Brokerage),
            symbol,
            description,
            quantity,
            cost_basis_per_unit,
            cost_basis_total,
            price,
            market_value,
            as_of: None,
            unrealized_gain: parse_optional_amount(field(record, index.unrealized_gain))?,
            asset_class,
            value_mismatch: options.value_mismatch(quantity, price, market_value),
        })
    }

    fn investment_transaction(&self, index: &HistoryIndex, row: &CsvRow) -> Result<InvestmentTransaction> {
        let record = &row.record;
        let raw_date = field(record, Some(index.date)).ok_or_else(|| Error::MissingField("date".to_string()))?;
        let trade_date = parse_date(raw_date, self.date_formats)?;

        let raw_action = field(record, Some(index.action)).ok_or_else(|| Error::MissingField("action".to_string()))?;
        let action = investment_action(raw_action).ok_or_else(|| Error::UnrecognizedValue(raw_action.to_string()))?;

        let amount = field(record, Some(index.amount))
            .map(parse_amount)
            .transpose()?
            .ok_or_else(|| Error::MissingField("amount".to_string()))?;

        let commission = parse_optional_amount(field(record, index.commission))?.unwrap_or_default();
        let fees = parse_optional_amount(field(record, index.fees))?.unwrap_or_default();
        let symbol = field(record, index.symbol).map(normalize_symbol).unwrap_or_default();
        if symbol.is_empty() && matches!(action, InvestmentAction::Buy | InvestmentAction::Sell | InvestmentAction::Reinvestment) {
            return Err(Error::MissingField("symbol".to_string()));
        }

        Ok(InvestmentTransaction {
            account: text_field(record, index.account),
            trade_date,
            symbol,
            description: text_field(record, index.description).unwrap_or_else(|| raw_action.to_string()),
            action,
            quantity: parse_optional_amount(field(record, index.quantity))?.unwrap_or_default(),
            price: parse_optional_amount(field(record, index.price))?.unwrap_or_default(),
            amount,
            fees: commission + fees,
        })
    }
}

/// Running balance after the newest transaction. Exports list rows either
/// oldest or newest first; the direction is read from the first and last
/// dates.
fn closing_balance(
    transactions: &[BankTransaction],
    account_type: AccountType,
    options: &ParseOptions,
) -> Option<AccountBalance> {
    let (first, last) = (transactions.first()?, transactions.last()?);
    let newest = if first.posted_date <= last.posted_date {
        transactions.iter().rev().find(|t| t.balance.is_some())?
    } else {
        transactions.iter().find(|t| t.balance.is_some())?
    };
    Some(AccountBalance {
        account: newest.account.clone(),
        account_type,
        as_of: newest.posted_date,
        balance: newest.balance?,
        available_balance: None,
        currency: options.default_currency.clone(),
    })
}

#[derive(Debug, Clone, Copy)]
enum AmountIndex {
    Signed(usize, SignConvention),
    Split { debit: Option<usize>, credit: Option<usize> },
    TypeColumn { amount: usize, column: usize, debit_values: Aliases },
}

impl AmountIndex {
    fn resolve(&self, record: &StringRecord) -> Result<Decimal> {
        let missing = || Error::MissingField("amount".to_string());
        match *self {
            AmountIndex::Signed(index, convention) => {
                let raw = field(record, Some(index)).ok_or_else(missing)?;
                Ok(convention.normalize(parse_amount(raw)?))
            }
            AmountIndex::Split { debit, credit } => {
                if let Some(raw) = field(record, debit) {
                    Ok(-parse_amount(raw)?.abs())
                } else if let Some(raw) = field(record, credit) {
                    Ok(parse_amount(raw)?.abs())
                } else {
                    Err(missing())
                }
            }
            AmountIndex::TypeColumn { amount, column, debit_values } => {
                let value = parse_amount(field(record, Some(amount)).ok_or_else(missing)?)?.abs();
                let direction = field(record, Some(column)).unwrap_or("").to_uppercase();
                if debit_values.iter().any(|d| d.eq_ignore_ascii_case(&direction)) {
                    Ok(-value)
                } else {
                    Ok(value)
                }
            }
        }
    }
}

#[derive(Debug)]
struct BankIndex {
    date: usize,
    description: Option<usize>,
    amount: AmountIndex,
    kind: Option<usize>,
    balance: Option<usize>,
    category: Option<usize>,
    account: Option<usize>,
    check_number: Option<usize>,
    memo: Option<usize>,
    reference: Option<usize>,
}

impl BankIndex {
    fn resolve(header: &HeaderIndex, columns: &BankColumns) -> Result<Self> {
        let amount = match columns.amount {
            AmountColumns::Signed { column, convention } => AmountIndex::Signed(header.require(column)?, convention),
            AmountColumns::SplitColumns { debit, credit } => {
                let (debit, credit) = (header.position(debit), header.position(credit));
                if debit.is_none() && credit.is_none() {
                    return Err(Error::MissingField("debit/credit".to_string()));
                }
                AmountIndex::Split { debit, credit }
            }
            AmountColumns::TypeColumn {
                amount,
                column,
                debit_values,
            } => AmountIndex::TypeColumn {
                amount: header.require(amount)?,
                column: header.require(column)?,
                debit_values,
            },
        };

        Ok(Self {
            date: header.require(columns.date)?,
            description: header.position(columns.description),
            amount,
            kind: header.optional(columns.kind),
            balance: header.optional(columns.balance),
            category: header.optional(columns.category),
            account: header.optional(columns.account),
            check_number: header.optional(columns.check_number),
            memo: header.optional(columns.memo),
            reference: header.optional(columns.reference),
        })
    }
}

#[derive(Debug)]
struct HoldingIndex {
    account: Option<usize>,
    account_name: Option<usize>,
    symbol: usize,
    description: Option<usize>,
    quantity: usize,
    price: Option<usize>,
    market_value: Option<usize>,
    cost_basis_total: Option<usize>,
    cost_basis_per_unit: Option<usize>,
    unrealized_gain: Option<usize>,
    security_type: Option<usize>,
}

impl HoldingIndex {
    fn resolve(header: &HeaderIndex, columns: &HoldingColumns) -> Result<Self> {
        Ok(Self {
            account: header.optional(columns.account),
            account_name: header.optional(columns.account_name),
            symbol: header.require(columns.symbol)?,
            description: header.optional(columns.description),
            quantity: header.require(columns.quantity)?,
            price: header.optional(columns.price),
            market_value: header.optional(columns.market_value),
            cost_basis_total: header.optional(columns.cost_basis_total),
            cost_basis_per_unit: header.optional(columns.cost_basis_per_unit),
            unrealized_gain: header.optional(columns.unrealized_gain),
            security_type: header.optional(columns.security_type),
        })
    }
}

#[derive(Debug)]
struct HistoryIndex {
    date: usize,
    account: Option<usize>,
    action: usize,
    symbol: Option<usize>,
    description: Option<usize>,
    quantity: Option<usize>,
    price: Option<usize>,
    commission: Option<usize>,
    fees: Option<usize>,
    amount: usize,
}

impl HistoryIndex {
    fn resolve(header: &HeaderIndex, columns: &HistoryColumns) -> Result<Self> {
        Ok(Self {
            date: header.require(columns.date)?,
            account: header.optional(columns.account),
            action: header.require(columns.action)?,
            symbol: header.optional(columns.symbol),
            description: header.optional(columns.description),
            quantity: header.optional(columns.quantity),
            price: header.optional(columns.price),
            commission: header.optional(columns.commission),
            fees: header.optional(columns.fees),
            amount: header.require(columns.amount)?,
        })
    }
}

/// Find the first row (within the scan window) that one of `layouts`
/// recognizes. Returns the layout, its header and the index of the first
/// data row.
pub fn locate_header<'a>(layouts: &'a [CsvLayout], rows: &[CsvRow]) -> Option<(&'a CsvLayout, HeaderIndex, usize)> {
    (0..rows.len().min(HEADER_SCAN_ROWS)).find_map(|at| {
        layouts.iter().find(|layout| layout.matches_at(rows, at)).map(|layout| {
            let (header, start) = layout.header_at(rows, at);
            (layout, header, start)
        })
    })
}

/// Parser for one institution's CSV exports, trying its layouts in order.
#[derive(Debug, Clone)]
pub struct CsvStatementParser {
    institution: Institution,
    layouts: Vec<CsvLayout>,
    options: ParseOptions,
}

impl CsvStatementParser {
    pub fn new(institution: Institution, layouts: Vec<CsvLayout>, options: ParseOptions) -> Self {
        Self {
            institution,
            layouts,
            options,
        }
    }

    pub fn layouts(&self) -> &[CsvLayout] {
        &self.layouts
    }
}

impl StatementParser for CsvStatementParser {
    fn parse(&self, bytes: &[u8], filename: Option<&str>) -> Result<ParseResult> {
        let text = decode_text(bytes)?;
        let table = read_rows(&text);
        let mut builder = ResultBuilder::new(self.institution.clone(), FileFormat::Csv);

        match locate_header(&self.layouts, &table.rows) {
            Some((layout, header, start)) => {
                debug!(layout = layout.name, file = filename.unwrap_or("-"), "CSV header located");
                for (line, message) in &table.broken {
                    builder.warn(*line, message.clone());
                }
                layout.parse_rows(&header, &table.rows[start..], &self.options, &mut builder);
            }
            None => builder.warn(None, "header row not found"),
        }

        debug!(
            "Parsed {} {} CSV records",
            builder.record_count(),
            self.institution
        );
        Ok(builder.finish())
    }

    fn institution(&self) -> Institution {
        self.institution.clone()
    }

    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }
}

/// True when any value in the amount column spells out its sign.
pub fn column_has_explicit_sign(rows: &[CsvRow], column: usize) -> bool {
    rows.iter().any(|row| {
        field(&row.record, Some(column))
            .and_then(|raw| parse_amount_detail(raw).ok())
            .is_some_and(|parsed| parsed.explicit_sign && !parsed.value.is_zero())
    })
}
