//! Best-effort transaction recovery from PDF statement text.
//!
//! Each institution contributes a [`PdfLayout`]: marker tokens used for
//! detection and an ordered list of [`LinePattern`]s. Every extracted line is
//! tried against the patterns in order and the first match becomes a
//! transaction. A statement where nothing matches is a valid, empty result.

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::debug;

use crate::csv_format::Aliases;
use crate::error::{Error, Result};
use crate::normalize::{
    category_hint, infer_transaction_type, normalize_description, parse_amount_detail, parse_date,
    parse_month_day, raw_description, ParsedAmount, SignConvention,
};
use crate::options::ParseOptions;
use crate::pdf_extract::PdfDocument;
use crate::registry::StatementParser;
use crate::types::{BankTransaction, FileFormat, Institution, ParseResult, ResultBuilder};

/// Amount token: optional sign, parentheses, `$`, thousands separators,
/// two decimals, optional `CR`/`DR`.
pub const AMOUNT: &str =
    r"\(?(?:-\s?)?\$?\s?(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}\)?-?(?:\s?(?:CR|DR))?";

/// Lines scanned for the statement period.
const PERIOD_SCAN_LINES: usize = 40;

/// How the amounts matched by a pattern are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSign {
    Convention(SignConvention),
    /// Decided per document: debit-negative when any matched amount carries
    /// an explicit sign, otherwise every amount is a debit.
    Inferred,
}

/// One line grammar.
///
/// Named groups: `date` and `desc` and `amount` are required; `post` (posted
/// date) and `balance` are optional.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
    sign: LineSign,
}

impl LinePattern {
    pub fn new(pattern: &str, sign: LineSign) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::InvalidFormat(e.to_string()))?;
        for group in ["date", "desc", "amount"] {
            if !regex.capture_names().flatten().any(|name| name == group) {
                return Err(Error::InvalidFormat(format!("line pattern lacks a '{}' group", group)));
            }
        }
        Ok(Self { regex, sign })
    }

    /// Compile a pattern known to be valid at build time.
    pub(crate) fn builtin(pattern: &str, sign: LineSign) -> Self {
        Self::new(pattern, sign).expect("built-in line pattern must compile")
    }

    pub fn sign(&self) -> LineSign {
        self.sign
    }

    pub fn captures<'t>(&self, line: &'t str) -> Option<Captures<'t>> {
        self.regex.captures(line)
    }
}

/// Line grammar and detection markers of one institution's PDF statements.
#[derive(Debug, Clone)]
pub struct PdfLayout {
    pub institution: Institution,
    /// Lower-case tokens searched near the top of the first page.
    pub markers: Aliases,
    pub sample: &'static str,
    pub patterns: Vec<LinePattern>,
}

/// Year context for dates printed without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementPeriod {
    pub end_year: i32,
    pub end_month: Option<u32>,
}

fn period_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:through|thru|to|-)\s*(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b")
            .expect("valid period end regex")
    })
}

fn full_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid full date regex"))
}

fn month_name_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},\s*(\d{4})\b")
            .expect("valid month name date regex")
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid year regex"))
}

fn full_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + year } else { year })
}

impl StatementPeriod {
    /// Find the statement period in header lines, falling back to
    /// `default_year`.
    pub fn find(lines: &[String], default_year: i32) -> Self {
        let header = lines.iter().take(PERIOD_SCAN_LINES).cloned().collect::<Vec<_>>().join("\n");

        if let Some(caps) = period_end_re().captures(&header) {
            let month = caps[1].parse::<u32>().ok().filter(|m| (1..=12).contains(m));
            if let (Some(month), Some(year)) = (month, full_year(&caps[3])) {
                return Self {
                    end_year: year,
                    end_month: Some(month),
                };
            }
        }

        let mut latest: Option<(i32, u32)> = None;
        for caps in full_date_re().captures_iter(&header) {
            if let (Ok(month), Ok(year)) = (caps[1].parse::<u32>(), caps[3].parse::<i32>()) {
                if (1..=12).contains(&month) {
                    latest = latest.max(Some((year, month)));
                }
            }
        }
        for caps in month_name_date_re().captures_iter(&header) {
            if let (Some(month), Ok(year)) = (crate::normalize::month_number(&caps[1]), caps[2].parse::<i32>()) {
                latest = latest.max(Some((year, month)));
            }
        }
        if let Some((year, month)) = latest {
            return Self {
                end_year: year,
                end_month: Some(month),
            };
        }

        let year = year_re()
            .captures_iter(&header)
            .filter_map(|caps| caps[1].parse::<i32>().ok())
            .max();
        Self {
            end_year: year.unwrap_or(default_year),
            end_month: None,
        }
    }

    /// Resolve a date token. Dates without a year take the statement year,
    /// or the previous year when they fall after the period's end month.
    pub fn resolve(&self, raw: &str) -> Result<NaiveDate> {
        let raw = raw.trim();
        let has_year = raw.matches(['/', '-']).count() >= 2 || raw.contains(',') || raw.len() >= 8 && !raw.contains(' ');
        if has_year {
            return parse_date(raw, &[]);
        }

        let date = parse_month_day(raw, self.end_year)?;
        match self.end_month {
            Some(end) if date.month() > end => parse_month_day(raw, self.end_year - 1),
            _ => Ok(date),
        }
    }
}

fn is_header_line(line: &str) -> bool {
    let lowered = line.to_lowercase();
    lowered.contains("description") && (lowered.contains("amount") || lowered.contains("date"))
}

struct Candidate {
    line: usize,
    date: Result<NaiveDate>,
    raw_description: String,
    amount: Result<ParsedAmount>,
    balance: Option<ParsedAmount>,
    sign: LineSign,
}

/// Parser for PDF statements following one [`PdfLayout`].
#[derive(Debug, Clone)]
pub struct PdfStatementParser {
    layout: PdfLayout,
    options: ParseOptions,
}

impl PdfStatementParser {
    pub fn new(layout: PdfLayout, options: ParseOptions) -> Self {
        Self { layout, options }
    }

    pub fn layout(&self) -> &PdfLayout {
        &self.layout
    }

    fn match_line(&self, line_no: usize, text: &str, period: &StatementPeriod) -> Option<Candidate> {
        self.layout.patterns.iter().find_map(|pattern| {
            let caps = pattern.captures(text)?;
            let date_token = caps.name("post").or_else(|| caps.name("date"))?.as_str();
            Some(Candidate {
                line: line_no,
                date: period.resolve(date_token),
                raw_description: caps.name("desc").map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                amount: parse_amount_detail(caps.name("amount")?.as_str()),
                balance: caps.name("balance").and_then(|m| parse_amount_detail(m.as_str()).ok()),
                sign: pattern.sign(),
            })
        })
    }
}

impl StatementParser for PdfStatementParser {
    fn parse(&self, bytes: &[u8], filename: Option<&str>) -> Result<ParseResult> {
        let document = PdfDocument::load(bytes)?;
        let mut builder = ResultBuilder::new(self.layout.institution.clone(), FileFormat::Pdf);

        let first_page = document.pages().next().map(|page| page.line_texts()).unwrap_or_default();
        let period = StatementPeriod::find(&first_page, self.options.default_year);
        debug!(
            institution = %self.layout.institution,
            file = filename.unwrap_or("-"),
            "PDF statement year {} (end month {:?})",
            period.end_year,
            period.end_month
        );

        let mut candidates = Vec::new();
        let mut line_no = 0;
        for page in document.pages() {
            for warning in &page.warnings {
                builder.warn(None, warning.clone());
            }
            for text in page.line_texts() {
                line_no += 1;
                if is_header_line(&text) {
                    continue;
                }
                if let Some(candidate) = self.match_line(line_no, &text, &period) {
                    candidates.push(candidate);
                }
            }
        }

        if candidates.is_empty() {
            builder.warn(None, "no transactions recognized");
            return Ok(builder.finish());
        }

        let any_signed = candidates
            .iter()
            .any(|c| c.amount.as_ref().is_ok_and(|a| a.explicit_sign));
        let inferred = if any_signed {
            SignConvention::DebitNegative
        } else {
            SignConvention::DebitPositive
        };

        for candidate in candidates {
            let convention = match candidate.sign {
                LineSign::Convention(convention) => convention,
                LineSign::Inferred => inferred,
            };
            let posted_date = match candidate.date {
                Ok(date) => date,
                Err(err) => {
                    builder.warn(Some(candidate.line), err.to_string());
                    continue;
                }
            };
            let amount = match candidate.amount {
                Ok(parsed) => convention.normalize(parsed.value),
                Err(err) => {
                    builder.warn(Some(candidate.line), err.to_string());
                    continue;
                }
            };
            let raw = candidate.raw_description;
            builder.push_transaction(BankTransaction {
                institution: self.layout.institution.clone(),
                account: None,
                posted_date,
                raw_description: raw_description(&raw),
                description: normalize_description(&raw),
                amount,
                currency: self.options.default_currency.clone(),
                transaction_type: infer_transaction_type(amount, &raw),
                balance: candidate.balance.map(|b| b.value),
                category: category_hint(&raw),
                check_number: None,
                memo: None,
                reference: None,
            });
        }

        debug!(
            "Parsed {} {} PDF transactions",
            builder.record_count(),
            self.layout.institution
        );
        Ok(builder.finish())
    }

    fn institution(&self) -> Institution {
        self.layout.institution.clone()
    }

    fn format(&self) -> FileFormat {
        FileFormat::Pdf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_period_from_through_date() {
        let period = StatementPeriod::find(&lines("CHASE\nDecember 15, 2023 through January 14, 2024\nOpening/Closing Date 12/15/23 - 01/14/24"), 2000);
        assert_eq!(
            period,
            StatementPeriod {
                end_year: 2024,
                end_month: Some(1)
            }
        );
        assert_eq!(period.resolve("12/20").unwrap(), NaiveDate::from_ymd_opt(2023, 12, 20).unwrap());
        assert_eq!(period.resolve("01/05").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_period_falls_back_to_default_year() {
        let period = StatementPeriod::find(&lines("ACCOUNT ACTIVITY"), 2026);
        assert_eq!(period.end_year, 2026);
        assert_eq!(period.end_month, None);
        assert_eq!(period.resolve("Jul 20").unwrap(), NaiveDate::from_ymd_opt(2026, 7, 20).unwrap());
    }

    #[test]
    fn test_resolve_full_dates() {
        let period = StatementPeriod {
            end_year: 2020,
            end_month: None,
        };
        assert_eq!(period.resolve("01/15/2024").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(period.resolve("01/15/24").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(period.resolve("13/45").is_err());
    }

    #[test]
    fn test_line_pattern_requires_groups() {
        assert!(LinePattern::new(r"(?P<date>\d+) (?P<desc>.+)", LineSign::Inferred).is_err());
        assert!(LinePattern::new(r"(", LineSign::Inferred).is_err());
        let pattern = LinePattern::new(
            &format!(r"^(?P<date>\d{{2}}/\d{{2}})\s+(?P<desc>.+?)\s+(?P<amount>{})$", AMOUNT),
            LineSign::Inferred,
        )
        .unwrap();
        let caps = pattern.captures("07/28  WALMART.COM  - $14.05").unwrap();
        assert_eq!(&caps["desc"], "WALMART.COM");
        assert_eq!(&caps["amount"], "- $14.05");
    }

    #[test]
    fn test_header_lines_are_ignored() {
        assert!(is_header_line("DATE   DESCRIPTION   AMOUNT   BALANCE"));
        assert!(!is_header_line("01/15  STARBUCKS  -5.75"));
    }
}
