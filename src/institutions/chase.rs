//! Chase checking and credit card exports.
//!
//! Chase writes debits as negative amounts in every CSV flavor. The `Type`
//! column carries Chase's own codes (`ACH_DEBIT`, `Sale`, `Payment`, ...).

use crate::csv_format::{AmountColumns, BankColumns, CsvLayout, HeaderSpec, RecordColumns};
use crate::normalize::SignConvention;
use crate::pdf_format::{LinePattern, LineSign, PdfLayout, AMOUNT};
use crate::types::{AccountType, Institution, TransactionType};

/// Map Chase `Type`/`Details` codes.
pub fn chase_type(code: &str) -> Option<TransactionType> {
    let code = code.trim().to_uppercase().replace(' ', "_");
    let kind = match code.as_str() {
        "SALE" | "PURCHASE" | "DEBIT_CARD" => TransactionType::Purchase,
        "PAYMENT" | "LOAN_PMT" | "BILLPAY" => TransactionType::Payment,
        "RETURN" | "REFUND" | "ADJUSTMENT" => TransactionType::Credit,
        "FEE" | "FEE_TRANSACTION" => TransactionType::Fee,
        "INTEREST" => TransactionType::Interest,
        "DEBIT" | "ACH_DEBIT" | "ATM" | "MISC_DEBIT" | "CHECK" | "CHECK_PAID" | "DSLIP" => TransactionType::Debit,
        "CREDIT" | "ACH_CREDIT" | "DEP" | "DEPOSIT" | "CHECK_DEPOSIT" | "MISC_CREDIT" => TransactionType::Credit,
        "ACCT_XFER" | "QUICKPAY_CREDIT" | "QUICKPAY_DEBIT" | "WIRE_INCOMING" | "WIRE_OUTGOING" => {
            TransactionType::Transfer
        }
        _ => return None,
    };
    Some(kind)
}

const SIGNED: AmountColumns = AmountColumns::Signed {
    column: &["Amount"],
    convention: SignConvention::DebitNegative,
};

/// Credit card activity download.
pub const CREDIT_CARD: CsvLayout = CsvLayout {
    institution: Institution::Chase,
    name: "chase-credit-card",
    header: HeaderSpec::Named {
        required: &["Transaction Date", "Post Date", "Description", "Category", "Type", "Amount"],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::CreditCard,
        date: &["Post Date", "Transaction Date"],
        description: &["Description"],
        amount: SIGNED,
        kind: Some(&["Type"]),
        balance: None,
        category: Some(&["Category"]),
        account: None,
        check_number: None,
        memo: Some(&["Memo"]),
        reference: None,
    }),
    type_map: chase_type,
    skip_prefixes: &[],
    sample: "Transaction Date,Post Date,Description,Category,Type,Amount,Memo",
};

/// Checking download with the leading `Details` column.
pub const CHECKING_LEGACY: CsvLayout = CsvLayout {
    institution: Institution::Chase,
    name: "chase-checking-details",
    header: HeaderSpec::Named {
        required: &["Details", "Posting Date", "Description", "Amount"],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::Checking,
        date: &["Posting Date"],
        description: &["Description"],
        amount: SIGNED,
        kind: Some(&["Type", "Details"]),
        balance: Some(&["Balance"]),
        category: None,
        account: None,
        check_number: Some(&["Check or Slip #"]),
        memo: None,
        reference: None,
    }),
    type_map: chase_type,
    skip_prefixes: &[],
    sample: "Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #",
};

/// Simplified checking export.
pub const CHECKING: CsvLayout = CsvLayout {
    institution: Institution::Chase,
    name: "chase-checking",
    header: HeaderSpec::Named {
        required: &["Date", "Description", "Amount", "Type", "Balance"],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::Bank(BankColumns {
        account_type: AccountType::Checking,
        date: &["Date"],
        description: &["Description"],
        amount: SIGNED,
        kind: Some(&["Type"]),
        balance: Some(&["Balance"]),
        category: None,
        account: None,
        check_number: None,
        memo: None,
        reference: None,
    }),
    type_map: chase_type,
    skip_prefixes: &[],
    sample: "Date,Description,Amount,Type,Balance",
};

/// Statement lines are `MM/DD  description  amount [balance]`. Checking
/// statements carry a running balance and print debits negative; card
/// statements have no balance column and print purchases positive.
pub fn pdf_layout() -> PdfLayout {
    PdfLayout {
        institution: Institution::Chase,
        markers: &["jpmorgan chase", "chase.com", "chase"],
        sample: "JPMorgan Chase Bank, N.A.",
        patterns: vec![
            LinePattern::builtin(
                &format!(
                    r"^(?P<date>\d{{2}}/\d{{2}})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})\s+(?P<balance>{AMOUNT})$"
                ),
                LineSign::Convention(SignConvention::DebitNegative),
            ),
            LinePattern::builtin(
                &format!(r"^(?P<date>\d{{2}}/\d{{2}})\s+(?P<desc>.+?)\s+(?P<amount>{AMOUNT})$"),
                LineSign::Convention(SignConvention::DebitPositive),
            ),
        ],
    }
}
