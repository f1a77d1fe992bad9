//! Discover card exports. Purchases are positive, payments and credits
//! negative.

use crate::csv_format::{no_type_map, AmountColumns, BankColumns, CsvLayout, HeaderSpec, RecordColumns};
use crate::normalize::SignConvention;
use crate::pdf_format::{LinePattern, LineSign, PdfLayout, AMOUNT};
use crate::types::{AccountType, Institution};

pub const CARD: CsvLayout = CsvLayout {
    institution: Institution::Discover,
    name: "discover-card",
    header: HeaderSpec::Named {
        required: &["Trans. Date", "Post Date", "Description", "Amount", "Category"],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::CreditCard,
        date: &["Post Date", "Trans. Date"],
        description: &["Description"],
        amount: AmountColumns::Signed {
            column: &["Amount"],
            convention: SignConvention::DebitPositive,
        },
        kind: None,
        balance: None,
        category: Some(&["Category"]),
        account: None,
        check_number: None,
        memo: None,
        reference: None,
    }),
    type_map: no_type_map,
    skip_prefixes: &[],
    sample: "Trans. Date,Post Date,Description,Amount,Category",
};

/// `MM/DD [MM/DD] description amount`, transaction date first.
pub fn pdf_layout() -> PdfLayout {
    PdfLayout {
        institution: Institution::Discover,
        markers: &["discover"],
        sample: "Discover Card Statement",
        patterns: vec![
            LinePattern::builtin(
                &format!(
                    r"^(?P<date>\d{{2}}/\d{{2}})\s+(?P<post>\d{{2}}/\d{{2}})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})$"
                ),
                LineSign::Convention(SignConvention::DebitPositive),
            ),
            LinePattern::builtin(
                &format!(r"^(?P<date>\d{{2}}/\d{{2}})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})$"),
                LineSign::Convention(SignConvention::DebitPositive),
            ),
        ],
    }
}
