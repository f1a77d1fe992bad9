//! Capital One card exports.
//!
//! The CSV splits amounts into unsigned `Debit` and `Credit` columns. PDF
//! statements print `Mon DD` dates and mark credits with a leading minus,
//! e.g. `- $14.05`.

use crate::csv_format::{no_type_map, AmountColumns, BankColumns, CsvLayout, HeaderSpec, RecordColumns};
use crate::normalize::SignConvention;
use crate::pdf_format::{LinePattern, LineSign, PdfLayout, AMOUNT};
use crate::types::{AccountType, Institution};

pub const CARD: CsvLayout = CsvLayout {
    institution: Institution::CapitalOne,
    name: "capital-one-card",
    header: HeaderSpec::Named {
        required: &["Transaction Date", "Posted Date", "Card No.", "Description", "Debit", "Credit"],
        exact: false,
    },
    date_formats: &["%Y-%m-%d", "%m/%d/%Y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::CreditCard,
        date: &["Posted Date", "Transaction Date"],
        description: &["Description"],
        amount: AmountColumns::SplitColumns {
            debit: &["Debit"],
            credit: &["Credit"],
        },
        kind: None,
        balance: None,
        category: Some(&["Category"]),
        account: Some(&["Card No."]),
        check_number: None,
        memo: None,
        reference: None,
    }),
    type_map: no_type_map,
    skip_prefixes: &[],
    sample: "Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit",
};

const MONTH_DAY: &str = r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2}";

pub fn pdf_layout() -> PdfLayout {
    PdfLayout {
        institution: Institution::CapitalOne,
        markers: &["capital one"],
        sample: "Capital One Platinum Card",
        patterns: vec![
            LinePattern::builtin(
                &format!(
                    r"^(?P<date>{MONTH_DAY})\s+(?P<post>{MONTH_DAY})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})$"
                ),
                LineSign::Convention(SignConvention::DebitPositive),
            ),
            LinePattern::builtin(
                &format!(r"^(?P<date>{MONTH_DAY})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})$"),
                LineSign::Convention(SignConvention::DebitPositive),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_format::CsvStatementParser;
    use crate::options::ParseOptions;
    use crate::registry::StatementParser;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_debit_and_credit_columns() {
        let text = "Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit\n\
                    2024-01-14,2024-01-15,1234,TARGET 00012345,Merchandise,31.07,\n\
                    2024-01-18,2024-01-19,1234,CAPITAL ONE AUTOPAY PYMT,Payment/Credit,,250.00\n";
        let parser = CsvStatementParser::new(Institution::CapitalOne, vec![CARD], ParseOptions::default());
        let result = parser.parse(text.as_bytes(), None).unwrap();

        assert_eq!(result.transactions.len(), 2);
        assert_eq!(result.transactions[0].amount, Decimal::from_str("-31.07").unwrap());
        assert_eq!(result.transactions[0].posted_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(result.transactions[0].account.as_deref(), Some("1234"));
        assert_eq!(result.transactions[1].amount, Decimal::from_str("250.00").unwrap());
    }

    #[test]
    fn test_pdf_credit_polarity() {
        let layout = pdf_layout();
        let caps = layout.patterns[0].captures("Jul 27  Jul 28  WALMART.COM  - $14.05").unwrap();
        assert_eq!(&caps["post"], "Jul 28");
        assert_eq!(&caps["amount"], "- $14.05");
    }
}
