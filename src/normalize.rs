//! Normalization shared by all parsers: text decoding, amounts and sign
//! conventions, dates, descriptions, and type/category heuristics.

use chrono::{Datelike, NaiveDate};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{AccountType, AssetClass, InvestmentAction, TransactionType};

/// Placeholder used when the source description is blank.
pub const EMPTY_DESCRIPTION: &str = "(no description)";

/// Date formats tried after an institution's own formats, in order.
///
/// Two-digit-year forms come first: `%Y` would read `24` as the year 24.
pub const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%m-%d-%y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d-%b-%Y",
    "%Y%m%d",
];

/// Decode raw statement bytes into text.
///
/// Honors UTF-8 and UTF-16 byte order marks, accepts strict UTF-8, and falls
/// back to Windows-1252 for legacy exports. Bytes carrying NUL without a
/// UTF-16 BOM are binary and cannot be decoded.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors && encoding != UTF_8 {
            return Err(Error::UnreadableInput(format!(
                "invalid {} byte sequence",
                encoding.name()
            )));
        }
        return Ok(text.into_owned());
    }

    if bytes.contains(&0) {
        return Err(Error::UnreadableInput("binary content is not text".to_string()));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            Ok(text.into_owned())
        }
    }
}

/// How a source represents money leaving the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignConvention {
    /// Debits are negative (canonical).
    DebitNegative,
    /// Debits are positive, e.g. charges on most card exports.
    DebitPositive,
}

impl SignConvention {
    /// Convert a source amount to the canonical debit-negative convention.
    pub fn normalize(&self, amount: Decimal) -> Decimal {
        match self {
            SignConvention::DebitNegative => amount,
            SignConvention::DebitPositive => -amount,
        }
    }
}

/// An amount together with whether the source spelled out its sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAmount {
    pub value: Decimal,
    pub explicit_sign: bool,
}

/// Parse an amount string, handling currency symbols, thousands separators,
/// accounting parentheses, trailing minus and `CR`/`DR` suffixes.
pub fn parse_amount_detail(raw: &str) -> Result<ParsedAmount> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '"' | '\'' | ' ' | '\u{a0}'))
        .collect();

    let mut negative = false;
    let mut explicit_sign = false;

    let upper = s.to_uppercase();
    if let Some(stripped) = upper.strip_suffix("CR") {
        s = stripped.to_string();
        explicit_sign = true;
    } else if let Some(stripped) = upper.strip_suffix("DR") {
        s = stripped.to_string();
        negative = true;
        explicit_sign = true;
    }

    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        s = inner.to_string();
        negative = !negative;
        explicit_sign = true;
    }
    if let Some(inner) = s.strip_suffix('-') {
        s = inner.to_string();
        negative = !negative;
        explicit_sign = true;
    }
    if let Some(inner) = s.strip_prefix('-') {
        s = inner.to_string();
        negative = !negative;
        explicit_sign = true;
    } else if let Some(inner) = s.strip_prefix('+') {
        s = inner.to_string();
        explicit_sign = true;
    }

    // Currency symbol after the sign: "-$5.00" becomes "-" then "$5.00".
    let s = s.trim_start_matches('$');
    if s.is_empty() {
        return Err(Error::InvalidAmount(raw.trim().to_string()));
    }

    let value = Decimal::from_str(s).map_err(|_| Error::InvalidAmount(raw.trim().to_string()))?;
    Ok(ParsedAmount {
        value: if negative { -value } else { value },
        explicit_sign,
    })
}

/// Parse an amount string into a signed decimal.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    parse_amount_detail(raw).map(|parsed| parsed.value)
}

/// Parse an optional amount column: blank means absent.
pub fn parse_optional_amount(raw: Option<&str>) -> Result<Option<Decimal>> {
    match raw.map(str::trim) {
        None | Some("") | Some("--") | Some("n/a") | Some("N/A") => Ok(None),
        Some(value) => parse_amount(value).map(Some),
    }
}

/// Parse a date trying `primary` formats first, then the shared fallbacks.
///
/// A trailing time component (`01/15/2024 10:32:00`) is ignored.
pub fn parse_date(raw: &str, primary: &[&str]) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidDate(String::new()));
    }

    let first_token = trimmed.split_whitespace().next().unwrap_or(trimmed);
    for candidate in [trimmed, first_token] {
        for format in primary.iter().chain(FALLBACK_DATE_FORMATS.iter()) {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
                if date.year() >= 1900 {
                    return Ok(date);
                }
            }
        }
    }

    Err(Error::InvalidDate(trimmed.to_string()))
}

/// Build a date from month/day text plus an externally known year.
///
/// Accepts `MM/DD`, `MM-DD` and `Mon DD`.
pub fn parse_month_day(raw: &str, year: i32) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let invalid = || Error::InvalidDate(trimmed.to_string());

    if let Some((month, day)) = trimmed.split_once(['/', '-']) {
        let month: u32 = month.trim().parse().map_err(|_| invalid())?;
        let day: u32 = day.trim().parse().map_err(|_| invalid())?;
        return NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid);
    }

    let mut parts = trimmed.split_whitespace();
    let month = parts.next().and_then(month_number).ok_or_else(invalid)?;
    let day: u32 = parts
        .next()
        .and_then(|d| d.trim_end_matches(',').parse().ok())
        .ok_or_else(invalid)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Month number for an English month name or abbreviation.
pub fn month_number(name: &str) -> Option<u32> {
    let lowered = name.trim().trim_end_matches('.').to_lowercase();
    let prefix = lowered.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

const DESCRIPTION_PREFIXES: &[&str] = &[
    "POS PURCHASE ",
    "POS DEBIT ",
    "DEBIT CARD PURCHASE ",
    "CHECKCARD ",
    "PURCHASE AUTHORIZED ON ",
    "APLPAY ",
    "APPLE PAY ",
    "GOOGLE PAY ",
    "GPAY ",
    "SQ *",
    "TST* ",
    "TST *",
];

/// Clean a raw description into a merchant-like string.
///
/// Collapses whitespace, drops payment-rail prefixes and trailing store or
/// reference numbers. Falls back to [`EMPTY_DESCRIPTION`] when nothing is left.
pub fn normalize_description(raw: &str) -> String {
    let collapsed = raw
        .trim()
        .trim_matches('"')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut text = collapsed.as_str();
    let upper = text.to_uppercase();
    for prefix in DESCRIPTION_PREFIXES {
        if upper.starts_with(prefix) && text.len() > prefix.len() {
            text = text[prefix.len()..].trim_start();
            break;
        }
    }

    let mut words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
    while words.len() > 1 {
        let Some(last) = words.last() else { break };
        let is_store_number = last.starts_with('#') && last[1..].chars().all(|c| c.is_ascii_digit());
        let is_reference = last.len() >= 5 && last.chars().all(|c| c.is_ascii_digit());
        if is_store_number || is_reference {
            words.pop();
        } else {
            break;
        }
    }

    // "STARBUCKS #123" style numbers glued onto the name.
    let cleaned = words.join(" ");
    let cleaned = match cleaned.rfind(" #") {
        Some(idx) if cleaned[idx + 2..].chars().all(|c| c.is_ascii_digit()) => cleaned[..idx].to_string(),
        _ => cleaned,
    };

    if cleaned.is_empty() {
        if collapsed.is_empty() {
            EMPTY_DESCRIPTION.to_string()
        } else {
            collapsed
        }
    } else {
        cleaned
    }
}

/// Raw description with the empty-field placeholder applied.
pub fn raw_description(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        EMPTY_DESCRIPTION.to_string()
    } else {
        trimmed.to_string()
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == needle)
}

/// Infer a transaction type from description keywords, then from the sign.
pub fn infer_transaction_type(amount: Decimal, description: &str) -> TransactionType {
    let desc = description.to_lowercase();

    if contains_word(&desc, "fee") || desc.contains("service charge") || desc.contains("overdraft") {
        return TransactionType::Fee;
    }
    if contains_word(&desc, "interest") || desc.contains("int earned") {
        return TransactionType::Interest;
    }
    if contains_word(&desc, "transfer")
        || contains_word(&desc, "xfer")
        || contains_word(&desc, "zelle")
        || contains_word(&desc, "venmo")
    {
        return TransactionType::Transfer;
    }
    if contains_word(&desc, "payment") || contains_word(&desc, "autopay") || desc.contains("thank you") {
        return TransactionType::Payment;
    }
    if contains_word(&desc, "deposit") || contains_word(&desc, "payroll") || desc.contains("direct dep") {
        return TransactionType::Credit;
    }
    if contains_word(&desc, "withdrawal") || contains_word(&desc, "atm") {
        return TransactionType::Debit;
    }
    if contains_word(&desc, "purchase") || contains_word(&desc, "pos") {
        return TransactionType::Purchase;
    }

    if amount.is_sign_negative() && !amount.is_zero() {
        TransactionType::Debit
    } else {
        TransactionType::Credit
    }
}

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("groceries", &["whole foods", "trader joe", "safeway", "kroger", "h-e-b", "grocery", "aldi", "costco"]),
    (
        "dining",
        &["starbucks", "restaurant", "cafe", "coffee", "pizza", "doordash", "grubhub", "uber eats", "mcdonald", "chipotle"],
    ),
    (
        "transportation",
        &["uber", "lyft", "shell", "chevron", "exxon", "parking", "transit", "clipper", "gas station"],
    ),
    (
        "subscriptions",
        &["netflix", "spotify", "hulu", "youtube", "apple.com/bill", "icloud", "github", "openai", "adobe"],
    ),
    ("utilities", &["electric", "water bill", "comcast", "xfinity", "verizon", "at&t", "t-mobile", "utility"]),
    ("housing", &["rent", "mortgage", "hoa", "property mgmt", "apartment"]),
    ("travel", &["airline", "delta air", "united air", "american air", "hotel", "airbnb", "marriott", "expedia"]),
    ("shopping", &["amazon", "amzn", "target", "walmart", "best buy", "ebay", "etsy"]),
    ("health", &["pharmacy", "cvs", "walgreens", "medical", "dental", "clinic"]),
    ("income", &["payroll", "direct dep", "salary"]),
    ("transfer", &["zelle", "venmo", "transfer", "xfer"]),
    ("fees", &["service charge", "overdraft", "late fee", "annual fee", "foreign transaction fee"]),
];

/// Derive a coarse spending category from description keywords.
pub fn category_hint(description: &str) -> Option<String> {
    let desc = description.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| desc.contains(k)))
        .map(|(category, _)| category.to_string())
}

/// Canonical security identifier: trimmed, upper-case, no footnote stars.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().trim_end_matches('*').trim().to_uppercase()
}

const CASH_SYMBOLS: &[&str] = &["SPAXX", "FDRXX", "FZFXX", "SPRXX", "CORE", "CASH", "PENDING ACTIVITY"];

/// Guess an asset class from the symbol, description and an optional
/// source-provided security type.
pub fn asset_class_hint(symbol: &str, description: &str, security_type: Option<&str>) -> AssetClass {
    let symbol = normalize_symbol(symbol);
    if CASH_SYMBOLS.contains(&symbol.as_str()) {
        return AssetClass::Cash;
    }

    let desc = description.to_lowercase();
    let kind = security_type.unwrap_or("").to_lowercase();

    if kind.contains("cash") || kind.contains("money market") || desc.contains("money market") {
        return AssetClass::Cash;
    }
    if kind.contains("bond")
        || kind.contains("debt")
        || kind.contains("fixed income")
        || desc.contains("treasury")
        || desc.contains(" bond")
        || desc.contains(" note ")
    {
        return AssetClass::Bond;
    }
    if kind.contains("fund")
        || kind.contains("etf")
        || kind.contains("mutual")
        || desc.contains(" fund")
        || desc.contains(" etf")
        || desc.contains("index")
        || desc.contains("trust")
    {
        return AssetClass::Fund;
    }
    if kind.contains("stock") || kind.contains("equity") || kind.contains("common") {
        return AssetClass::Equity;
    }

    // Mutual fund tickers are five letters ending in X.
    if symbol.len() == 5 && symbol.ends_with('X') && symbol.chars().all(|c| c.is_ascii_alphabetic()) {
        return AssetClass::Fund;
    }
    if !symbol.is_empty() && symbol.len() <= 5 && symbol.chars().all(|c| c.is_ascii_alphabetic() || c == '.') {
        return AssetClass::Equity;
    }
    // Nine-character CUSIPs are mostly bonds and CDs in brokerage exports.
    if symbol.len() == 9 && symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return AssetClass::Bond;
    }
    AssetClass::Other
}

/// Map a free-text investment action ("YOU BOUGHT", "REINVESTMENT", ...) onto
/// an [`InvestmentAction`].
pub fn investment_action(raw: &str) -> Option<InvestmentAction> {
    let action = raw.to_uppercase();
    if action.contains("REINVEST") {
        Some(InvestmentAction::Reinvestment)
    } else if action.contains("DIVIDEND") || action.contains("INCOME") || contains_word(&action, "DIV") || action.contains("INTEREST") {
        Some(InvestmentAction::Dividend)
    } else if action.contains("BOUGHT") || contains_word(&action, "BUY") || action.contains("PURCHASE") {
        Some(InvestmentAction::Buy)
    } else if action.contains("SOLD") || contains_word(&action, "SELL") || action.contains("REDEMPTION") {
        Some(InvestmentAction::Sell)
    } else if contains_word(&action, "FEE") || action.contains("COMMISSION") || action.contains("EXPENSE") {
        Some(InvestmentAction::Fee)
    } else if action.contains("TRANSFER") || action.contains("JOURNAL") || action.contains("CONTRIBUTION") || action.contains("DISTRIBUTION") {
        Some(InvestmentAction::Transfer)
    } else {
        None
    }
}

/// Account type from a brokerage account name such as `ROTH IRA` or
/// `INDIVIDUAL`. Unrecognized names are brokerage accounts.
pub fn account_type_hint(name: &str) -> AccountType {
    let name = name.to_uppercase();
    if name.contains("ROTH") {
        AccountType::RothIra
    } else if contains_word(&name, "IRA") || name.contains("ROLLOVER") {
        AccountType::TraditionalIra
    } else if name.contains("401K") || name.contains("401(K)") || contains_word(&name, "401") {
        AccountType::K401
    } else {
        AccountType::Brokerage
    }
}
