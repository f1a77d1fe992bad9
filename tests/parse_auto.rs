mod common;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use statement_parser::{
    detect, parse_auto, AccountType, AssetClass, FileFormat, Institution, ParseOptions, ParserFactory, ReasonCode,
    TransactionType,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const OFX: &str = "OFXHEADER:100
DATA:OFXSGML
VERSION:102
SECURITY:NONE
ENCODING:USASCII

<OFX>
<SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS><DTSERVER>20240131<LANGUAGE>ENG<FI><ORG>Acme Credit Union<FID>1234</FI></SONRS></SIGNONMSGSRSV1>
<BANKMSGSRSV1><STMTTRNRS><TRNUID>1<STMTRS><CURDEF>USD<BANKACCTFROM><BANKID>123<ACCTID>555<ACCTTYPE>CHECKING</BANKACCTFROM>
<BANKTRANLIST><DTSTART>20240101<DTEND>20240131
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20240115
<TRNAMT>-42.00
<FITID>1
<NAME>ACME STORE
</STMTTRN>
</BANKTRANLIST>
<LEDGERBAL><BALAMT>958.00<DTASOF>20240131</LEDGERBAL>
</STMTRS></STMTTRNRS></BANKMSGSRSV1>
</OFX>
";

#[test]
fn test_chase_checking_csv() {
    let text = "Date,Description,Amount,Type,Balance\n01/15/2024,\"STARBUCKS #123\",-5.75,DEBIT,1000.00\n";
    let (institution, result) = parse_auto(text.as_bytes(), Some("chase.csv")).unwrap();

    assert_eq!(institution, Institution::Chase);
    assert_eq!(result.format, FileFormat::Csv);
    assert_eq!(result.transactions.len(), 1);
    let tx = &result.transactions[0];
    assert_eq!(tx.posted_date, date(2024, 1, 15));
    assert!(tx.description.contains("STARBUCKS"));
    assert_eq!(tx.amount, dec("-5.75"));
    assert_eq!(tx.transaction_type, TransactionType::Debit);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_balance_column_gives_closing_balance() {
    let text = "Date,Description,Amount,Type,Balance
                01/15/2024,STARBUCKS #123,-5.75,DEBIT,1000.00
                01/17/2024,PAYROLL,250.00,CREDIT,1250.00
";
    let (institution, result) = parse_auto(text.as_bytes(), Some("chase.csv")).unwrap();

    assert_eq!(institution, Institution::Chase);
    assert_eq!(result.transactions[1].balance, Some(dec("1250.00")));
    assert_eq!(result.balances.len(), 1);
    let closing = &result.balances[0];
    assert_eq!(closing.balance, dec("1250.00"));
    assert_eq!(closing.as_of, date(2024, 1, 17));
    assert_eq!(closing.account_type, AccountType::Checking);
    assert_eq!(closing.currency, "USD");
    assert!(result.warnings.is_empty());
}

#[test]
fn test_signed_three_column_file_is_generic() {
    let text = "Date,Description,Amount
01/15/2024,COFFEE SHOP,-5.75
01/16/2024,PAYROLL DEPOSIT,1500.00
";
    let (institution, result) = parse_auto(text.as_bytes(), Some("export.csv")).unwrap();

    assert_eq!(institution, Institution::Generic);
    assert_eq!(result.transactions.len(), 2);
    assert_eq!(result.transactions[0].amount, dec("-5.75"));
    assert_eq!(result.transactions[1].amount, dec("1500.00"));
    assert!(result.balances.is_empty());
}

#[test]
fn test_ofx_statement() {
    let (institution, result) = parse_auto(OFX.as_bytes(), Some("download.qfx")).unwrap();

    assert_eq!(institution, Institution::Other("Acme Credit Union".to_string()));
    assert_eq!(result.format, FileFormat::Ofx);
    assert_eq!(result.transactions.len(), 1);
    let tx = &result.transactions[0];
    assert_eq!(tx.amount, dec("-42.00"));
    assert_eq!(tx.posted_date, date(2024, 1, 15));
    assert_eq!(tx.description, "ACME STORE");
    assert_eq!(tx.account.as_deref(), Some("555"));

    assert_eq!(result.balances.len(), 1);
    assert_eq!(result.balances[0].balance, dec("958.00"));
    assert_eq!(result.balances[0].as_of, date(2024, 1, 31));
    assert_eq!(result.balances[0].account_type, AccountType::Checking);
    assert_eq!(result.balances[0].account.as_deref(), Some("555"));
}

#[test]
fn test_content_overrides_extension() {
    let (_, ofx) = parse_auto(OFX.as_bytes(), Some("renamed.csv")).unwrap();
    assert_eq!(ofx.format, FileFormat::Ofx);

    let pdf = common::build_pdf(&[(50, 700, "Nothing to see here")]);
    let (_, result) = parse_auto(&pdf, Some("renamed.csv")).unwrap();
    assert_eq!(result.format, FileFormat::Pdf);
}

#[test]
fn test_pdf_without_matching_lines_is_empty() {
    let pdf = common::build_pdf(&[(50, 700, "Thank you for banking with us"), (50, 680, "Page 1 of 1")]);
    let (institution, result) = parse_auto(&pdf, Some("statement.pdf")).unwrap();

    assert_eq!(institution, Institution::Generic);
    assert!(!result.has_records);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].message, "no transactions recognized");
}

#[test]
fn test_chase_pdf_statement() {
    let fragments = common::statement_rows(
        &["JPMorgan Chase Bank, N.A.", "Statement Period 12/15/2023 through 01/14/2024"],
        &[
            ["DATE", "DESCRIPTION", "AMOUNT", "BALANCE"],
            ["12/20", "AMAZON MKTPL", "-25.99", "974.01"],
            ["01/05", "PAYROLL ACME", "1,500.00", "2,474.01"],
        ],
    );
    let pdf = common::build_pdf(&fragments);

    assert_eq!(detect(&pdf, None).institution, Institution::Chase);
    let (institution, result) = parse_auto(&pdf, Some("chase.pdf")).unwrap();

    assert_eq!(institution, Institution::Chase);
    assert_eq!(result.transactions.len(), 2);
    assert_eq!(result.transactions[0].posted_date, date(2023, 12, 20));
    assert_eq!(result.transactions[0].amount, dec("-25.99"));
    assert_eq!(result.transactions[0].balance, Some(dec("974.01")));
    assert_eq!(result.transactions[1].posted_date, date(2024, 1, 5));
    assert_eq!(result.transactions[1].amount, dec("1500.00"));
}

#[test]
fn test_generic_pdf_uses_default_year() {
    let fragments = common::statement_rows(
        &["Community Savings"],
        &[["03/02", "FARMERS MARKET", "18.00", ""], ["03/09", "BOOKSHOP", "12.50", ""]],
    );
    let pdf = common::build_pdf(&fragments);
    let factory = ParserFactory::with_options(ParseOptions {
        default_year: 2023,
        ..ParseOptions::default()
    });
    let (_, result) = factory.parse_auto(&pdf, None).unwrap();

    assert_eq!(result.transactions.len(), 2);
    assert_eq!(result.transactions[0].posted_date, date(2023, 3, 2));
    // No amount is signed, so all of them are debits.
    assert_eq!(result.transactions[0].amount, dec("-18.00"));
}

#[test]
fn test_one_malformed_row_among_ten() {
    let mut text = String::from("Date,Description,Amount,Type,Balance\n");
    for day in 1..=10 {
        if day == 6 {
            text.push_str("01/32/2024,BROKEN ROW,-1.00,DEBIT,100.00\n");
        } else {
            text.push_str(&format!("01/{:02}/2024,COFFEE {},-{}.00,DEBIT,100.00\n", day, day, day));
        }
    }
    let (_, result) = parse_auto(text.as_bytes(), Some("chase.csv")).unwrap();

    assert_eq!(result.transactions.len(), 9);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].row, Some(7));
    assert!(result.warnings[0].message.contains("01/32/2024"));
}

#[test]
fn test_sign_conventions_agree() {
    let chase = "Date,Description,Amount,Type,Balance\n01/15/2024,STARBUCKS,-5.75,Sale,100.00\n";
    let amex = "Date,Description,Amount\n01/15/2024,STARBUCKS,5.75\n";
    let discover = "Trans. Date,Post Date,Description,Amount,Category\n01/15/2024,01/15/2024,STARBUCKS,5.75,Restaurants\n";
    let capital_one = "Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit\n2024-01-15,2024-01-15,1234,STARBUCKS,Dining,5.75,\n";

    let amounts: Vec<(Institution, Decimal)> = [chase, amex, discover, capital_one]
        .iter()
        .map(|text| {
            let (institution, result) = parse_auto(text.as_bytes(), None).unwrap();
            (institution, result.transactions[0].amount)
        })
        .collect();

    assert_eq!(
        amounts,
        vec![
            (Institution::Chase, dec("-5.75")),
            (Institution::AmericanExpress, dec("-5.75")),
            (Institution::Discover, dec("-5.75")),
            (Institution::CapitalOne, dec("-5.75")),
        ]
    );
}

#[test]
fn test_parsing_is_deterministic() {
    let text = "Trans. Date,Post Date,Description,Amount,Category\n01/14/2024,01/15/2024,SHELL OIL,42.10,Gasoline\n";
    let first = parse_auto(text.as_bytes(), None).unwrap();
    let second = parse_auto(text.as_bytes(), None).unwrap();
    assert_eq!(first, second);

    let pdf = common::build_pdf(&[(50, 700, "01/15/2024"), (130, 700, "CAFE"), (400, 700, "-4.00")]);
    assert_eq!(parse_auto(&pdf, None).unwrap(), parse_auto(&pdf, None).unwrap());
}

#[test]
fn test_fidelity_positions() {
    let text = "Account Number,Account Name,Symbol,Description,Quantity,Last Price,Current Value,Cost Basis Total\n\
                X1,INDIVIDUAL,FDRXX**,HELD IN MONEY MARKET,,,$500.00,\n\
                X1,INDIVIDUAL,VTI,VANGUARD TOTAL STOCK MARKET ETF,3,$250.00,$750.00,$600.00\n";
    let (institution, result) = parse_auto(text.as_bytes(), Some("Portfolio_Positions.csv")).unwrap();

    assert_eq!(institution, Institution::Fidelity);
    assert_eq!(result.holdings.len(), 2);
    assert_eq!(result.holdings[0].asset_class, AssetClass::Cash);
    assert_eq!(result.holdings[1].asset_class, AssetClass::Fund);
    assert_eq!(result.holdings[1].cost_basis_per_unit, Some(dec("200")));
    assert!(result.transactions.is_empty());
}

#[test]
fn test_fidelity_fund_named_after_the_firm() {
    let text = r#"Account Number,Account Name,Symbol,Description,Quantity,Last Price,Current Value,Cost Basis Total
                Z9,ROTH IRA,AAPL,APPLE INC,5,$190.00,$950.00,$800.00
                Z9,ROTH IRA,FIGXX,FIDELITY INVESTMENTS MONEY MARKET GOVERNMENT PORTFOLIO CLASS I,100,$1.00,$100.00,$100.00
                
                "The data and information in this spreadsheet is provided to you solely for your use."
                "Fidelity Investments and its affiliates make no warranties."
"#;
    let (institution, result) = parse_auto(text.as_bytes(), Some("Portfolio_Positions.csv")).unwrap();

    assert_eq!(institution, Institution::Fidelity);
    assert_eq!(result.holdings.len(), 2);
    assert_eq!(result.holdings[1].symbol, "FIGXX");
    assert_eq!(result.holdings[1].quantity, dec("100"));
    assert_eq!(result.holdings[0].account_type, AccountType::RothIra);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_result_serializes_to_json() {
    let text = "Date,Description,Amount\n01/15/2024,NETFLIX.COM,15.49\n";
    let (_, result) = parse_auto(text.as_bytes(), None).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["institution"], "American Express");
    assert_eq!(json["format"], "csv");
    assert_eq!(json["transactions"][0]["posted_date"], "2024-01-15");
    assert_eq!(json["transactions"][0]["transaction_type"], "debit");
}

#[test]
fn test_hard_failures() {
    let empty = parse_auto(b"", None).unwrap_err();
    assert_eq!(empty.reason_code(), ReasonCode::UnsupportedFormat);

    let binary = parse_auto(&[0x00, 0x9f, 0x92, 0x96], None).unwrap_err();
    assert_eq!(binary.reason_code(), ReasonCode::UnsupportedFormat);

    let corrupt = parse_auto(b"%PDF-1.4\nnot really a pdf", Some("x.pdf")).unwrap_err();
    assert_eq!(corrupt.reason_code(), ReasonCode::CorruptContainer);
    assert_eq!(corrupt.reason_code().as_str(), "CORRUPT_CONTAINER");

    let no_body = parse_auto(b"OFXHEADER:100\nDATA:OFXSGML\n", None).unwrap_err();
    assert_eq!(no_body.reason_code(), ReasonCode::UnreadableInput);
}

#[test]
fn test_windows_1252_export() {
    let mut bytes = b"Date,Description,Amount\n01/15/2024,CAF".to_vec();
    bytes.push(0xC9);
    bytes.extend_from_slice(b" DU MONDE,4.50\n");
    let (_, result) = parse_auto(&bytes, None).unwrap();
    assert_eq!(result.transactions[0].raw_description, "CAFÉ DU MONDE");
}
