//! Wells Fargo's headerless export:
//! `"date","amount","*","check number","description"`.

use csv::StringRecord;

use crate::csv_format::{no_type_map, AmountColumns, BankColumns, CsvLayout, HeaderSpec, RecordColumns};
use crate::normalize::{parse_amount, parse_date, SignConvention};
use crate::pdf_format::PdfLayout;
use crate::types::{AccountType, Institution};

use super::generic;

const COLUMNS: &[&str] = &["Date", "Amount", "Marker", "Check Number", "Description"];

/// A data row has five fields, a `*` marker, a date and an amount.
fn is_data_row(record: &StringRecord) -> bool {
    record.len() == COLUMNS.len()
        && record.get(2).is_some_and(|marker| marker.trim() == "*")
        && record.get(0).is_some_and(|date| parse_date(date, &["%m/%d/%Y"]).is_ok())
        && record.get(1).is_some_and(|amount| parse_amount(amount).is_ok())
}

pub const CHECKING: CsvLayout = CsvLayout {
    institution: Institution::WellsFargo,
    name: "wells-fargo-checking",
    header: HeaderSpec::Fixed {
        columns: COLUMNS,
        row_check: is_data_row,
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
        balance: None,
        category: None,
        account: None,
        check_number: Some(&["Check Number"]),
        memo: None,
        reference: None,
    }),
    type_map: no_type_map,
    skip_prefixes: &[],
    sample: "\"01/15/2024\",\"-5.75\",\"*\",\"\",\"STARBUCKS\"",
};

pub fn pdf_layout() -> PdfLayout {
    generic::marker_layout(Institution::WellsFargo, &["wells fargo"], "Wells Fargo Everyday Checking")
}
