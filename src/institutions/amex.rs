//! American Express exports. Charges are positive.
//!
//! The extended download carries card member, account and reference
//! columns; the simple download has exactly three columns and is the
//! last CSV signature tried, since its columns are a subset of several
//! others. Bank exports share that bare header, so the simple layout is
//! only taken when charges outnumber credits.

use crate::csv_format::{
    no_type_map, AmountColumns, BankColumns, CsvLayout, CsvRow, HeaderIndex, HeaderSpec, RecordColumns,
};
use crate::normalize::{parse_amount, SignConvention};
use crate::pdf_format::PdfLayout;
use crate::types::{AccountType, Institution};

use super::generic;

const CHARGES_POSITIVE: AmountColumns = AmountColumns::Signed {
    column: &["Amount"],
    convention: SignConvention::DebitPositive,
};

/// Card exports list mostly charges, as positive numbers. A bank export under
/// the same header lists mostly debits, as negative numbers.
fn charges_outnumber_credits(header: &HeaderIndex, rows: &[CsvRow]) -> bool {
    let Some(column) = header.position(&["Amount"]) else {
        return false;
    };
    let (mut charges, mut credits) = (0usize, 0usize);
    for value in rows
        .iter()
        .filter_map(|row| row.record.get(column))
        .filter_map(|raw| parse_amount(raw).ok())
    {
        if value.is_zero() {
            continue;
        }
        if value.is_sign_negative() {
            credits += 1;
        } else {
            charges += 1;
        }
    }
    charges > credits
}

pub const EXTENDED: CsvLayout = CsvLayout {
    institution: Institution::AmericanExpress,
    name: "amex-extended",
    header: HeaderSpec::Named {
        required: &["Date", "Description", "Card Member", "Account #", "Amount"],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::CreditCard,
        date: &["Date"],
        description: &["Description"],
        amount: CHARGES_POSITIVE,
        kind: None,
        balance: None,
        category: Some(&["Category"]),
        account: Some(&["Account #"]),
        check_number: None,
        memo: Some(&["Extended Details"]),
        reference: Some(&["Reference"]),
    }),
    type_map: no_type_map,
    skip_prefixes: &[],
    sample: "Date,Description,Card Member,Account #,Amount,Extended Details,Appears On Your Statement As,Address,City/State,Zip Code,Country,Reference,Category",
};

pub const SIMPLE: CsvLayout = CsvLayout {
    institution: Institution::AmericanExpress,
    name: "amex-simple",
    header: HeaderSpec::Guarded {
        required: &["Date", "Description", "Amount"],
        exact: true,
        accepts: charges_outnumber_credits,
    },
    date_formats: &["%m/%d/%Y", "%m/%d/%y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::CreditCard,
        date: &["Date"],
        description: &["Description"],
        amount: CHARGES_POSITIVE,
        kind: None,
        balance: None,
        category: None,
        account: None,
        check_number: None,
        memo: None,
        reference: None,
    }),
    type_map: no_type_map,
    skip_prefixes: &[],
    sample: "Date,Description,Amount",
};

pub fn pdf_layout() -> PdfLayout {
    generic::marker_layout(
        Institution::AmericanExpress,
        &["american express", "amex"],
        "American Express Blue Cash",
    )
}
