//! Bank of America checking exports.
//!
//! The CSV opens with a summary block (`Description,,Summary Amt.`) before
//! the real header, and repeats the opening balance as a data row.

use crate::csv_format::{no_type_map, AmountColumns, BankColumns, CsvLayout, HeaderSpec, RecordColumns};
use crate::normalize::SignConvention;
use crate::pdf_format::{LinePattern, LineSign, PdfLayout, AMOUNT};
use crate::types::{AccountType, Institution};

pub const CHECKING: CsvLayout = CsvLayout {
    institution: Institution::BankOfAmerica,
    name: "bofa-checking",
    header: HeaderSpec::Named {
        required: &["Date", "Description", "Amount", "Running Bal."],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::Checking,
        date: &["Date"],
        description: &["Description"],
        amount: AmountColumns::Signed {
            column: &["Amount"],
            convention: SignConvention::DebitNegative,
        },
        kind: None,
        balance: Some(&["Running Bal."]),
        category: None,
        account: None,
        check_number: None,
        memo: None,
        reference: None,
    }),
    type_map: no_type_map,
    skip_prefixes: &["beginning balance", "ending balance", "total credits", "total debits"],
    sample: "Date,Description,Amount,Running Bal.",
};

/// `MM/DD/YY description amount [balance]`, debits negative.
pub fn pdf_layout() -> PdfLayout {
    PdfLayout {
        institution: Institution::BankOfAmerica,
        markers: &["bank of america"],
        sample: "Bank of America, N.A.",
        patterns: vec![LinePattern::builtin(
            &format!(
                r"^(?P<date>\d{{2}}/\d{{2}}/\d{{2,4}})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})(?:\s+(?P<balance>{AMOUNT}))?$"
            ),
            LineSign::Convention(SignConvention::DebitNegative),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_format::CsvStatementParser;
    use crate::options::ParseOptions;
    use crate::registry::StatementParser;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_summary_block_and_opening_balance_are_skipped() {
        let text = "Description,,Summary Amt.\n\
                    Beginning balance as of 01/01/2024,,\"1,000.00\"\n\
                    Total credits,,\"1,500.00\"\n\
                    Ending balance as of 01/31/2024,,\"2,494.25\"\n\
                    \n\
                    Date,Description,Amount,Running Bal.\n\
                    01/01/2024,Beginning balance as of 01/01/2024,,\"1,000.00\"\n\
                    01/02/2024,\"STARBUCKS STORE 00123 01/02 PURCHASE\",\"-5.75\",\"994.25\"\n\
                    01/05/2024,\"ACME CORP DES:PAYROLL\",\"1,500.00\",\"2,494.25\"\n";
        let parser = CsvStatementParser::new(Institution::BankOfAmerica, vec![CHECKING], ParseOptions::default());
        let result = parser.parse(text.as_bytes(), Some("stmt.csv")).unwrap();

        assert_eq!(result.transactions.len(), 2);
        assert!(result.warnings.is_empty());
        assert_eq!(result.transactions[0].amount, Decimal::from_str("-5.75").unwrap());
        assert_eq!(result.transactions[0].balance, Some(Decimal::from_str("994.25").unwrap()));
        assert_eq!(result.transactions[1].amount, Decimal::from_str("1500.00").unwrap());
    }
}
