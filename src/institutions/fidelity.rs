//! Fidelity brokerage exports: portfolio positions and account history.
//!
//! Both files end with a block of disclaimer lines, and positions include a
//! `Pending Activity` pseudo-row. Cash sweep funds (`SPAXX**`, `FDRXX**`,
//! `CORE**`) report only a value.

use crate::csv_format::{no_type_map, CsvLayout, HeaderSpec, HistoryColumns, HoldingColumns, RecordColumns};
use crate::pdf_format::PdfLayout;
use crate::types::Institution;

use super::generic;

const FOOTER: &[&str] = &[
    "the data and information",
    "date downloaded",
    "brokerage services",
    "pending activity",
    "fidelity investments",
    "informational purposes",
];

pub const POSITIONS: CsvLayout = CsvLayout {
    institution: Institution::Fidelity,
    name: "fidelity-positions",
    header: HeaderSpec::Named {
        required: &["Symbol", "Description", "Quantity", "Last Price", "Current Value"],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::Holdings(HoldingColumns {
        account: Some(&["Account Number", "Account Name"]),
        account_name: Some(&["Account Name"]),
        symbol: &["Symbol"],
        description: Some(&["Description"]),
        quantity: &["Quantity"],
        price: Some(&["Last Price"]),
        market_value: Some(&["Current Value"]),
        cost_basis_total: Some(&["Cost Basis Total"]),
        cost_basis_per_unit: Some(&["Average Cost Basis"]),
        unrealized_gain: Some(&["Total Gain/Loss Dollar", "Gain/Loss Dollar"]),
        security_type: Some(&["Security Type"]),
    }),
    type_map: no_type_map,
    skip_prefixes: FOOTER,
    sample: "Account Number,Account Name,Symbol,Description,Quantity,Last Price,Last Price Change,Current Value,Today's Gain/Loss Dollar,Today's Gain/Loss Percent,Total Gain/Loss Dollar,Total Gain/Loss Percent,Percent Of Account,Cost Basis Total,Average Cost Basis,Type",
};

pub const HISTORY: CsvLayout = CsvLayout {
    institution: Institution::Fidelity,
    name: "fidelity-history",
    header: HeaderSpec::Named {
        required: &["Run Date", "Action", "Symbol"],
        exact: false,
    },
    date_formats: &["%m/%d/%Y"],
    columns: RecordColumns::History(HistoryColumns {
        date: &["Run Date", "Settlement Date"],
        account: Some(&["Account", "Account Number"]),
        action: &["Action"],
        symbol: Some(&["Symbol"]),
        description: Some(&["Security Description", "Description"]),
        quantity: Some(&["Quantity"]),
        price: Some(&["Price ($)", "Price"]),
        commission: Some(&["Commission ($)", "Commission"]),
        fees: Some(&["Fees ($)", "Fees"]),
        amount: &["Amount ($)", "Amount"],
    }),
    type_map: no_type_map,
    skip_prefixes: FOOTER,
    sample: "Run Date,Action,Symbol,Security Description,Security Type,Quantity,Price ($),Commission ($),Fees ($),Accrued Interest ($),Amount ($),Settlement Date",
};

pub fn pdf_layout() -> PdfLayout {
    generic::marker_layout(Institution::Fidelity, &["fidelity"], "Fidelity Investments")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_format::CsvStatementParser;
    use crate::options::ParseOptions;
    use crate::registry::StatementParser;
    use crate::types::{AccountType, AssetClass, InvestmentAction};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn parser() -> CsvStatementParser {
        CsvStatementParser::new(Institution::Fidelity, vec![POSITIONS, HISTORY], ParseOptions::default())
    }

    #[test]
    fn test_positions_with_cash_sweep_and_footer() {
        let text = "Account Number,Account Name,Symbol,Description,Quantity,Last Price,Last Price Change,Current Value,Today's Gain/Loss Dollar,Today's Gain/Loss Percent,Total Gain/Loss Dollar,Total Gain/Loss Percent,Percent Of Account,Cost Basis Total,Average Cost Basis,Type\n\
Z12345678,INDIVIDUAL,SPAXX**,HELD IN MONEY MARKET,,,,$1250.00,,,,,10.00%,,,Cash\n\
Z12345678,INDIVIDUAL,AAPL,APPLE INC,10,$190.00,+$1.20,$1900.00,+$12.00,+0.64%,+$250.00,+15.15%,60.00%,$1650.00,$165.00,Cash\n\
Z12345678,INDIVIDUAL,FXAIX,FIDELITY 500 INDEX FUND,5.123,$175.50,+$0.80,$899.09,,,,,,,,Cash\n\
Z12345678,INDIVIDUAL,Pending Activity,,,,,$-25.00,,,,,,,,\n\
\n\
\"The data and information in this spreadsheet is provided to you solely for your use.\"\n\
\"Date downloaded 01/31/2024 4:00 PM ET\"\n";
        let result = parser().parse(text.as_bytes(), None).unwrap();

        assert_eq!(result.holdings.len(), 3);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);

        let cash = &result.holdings[0];
        assert_eq!(cash.symbol, "SPAXX");
        assert_eq!(cash.asset_class, AssetClass::Cash);
        assert_eq!(cash.quantity, dec("1250.00"));
        assert_eq!(cash.price, Decimal::ONE);

        let apple = &result.holdings[1];
        assert_eq!(apple.asset_class, AssetClass::Equity);
        assert_eq!(apple.cost_basis_total, Some(dec("1650.00")));
        assert_eq!(apple.cost_basis_per_unit, Some(dec("165.00")));
        assert_eq!(apple.unrealized_gain, Some(dec("250.00")));
        assert_eq!(apple.account.as_deref(), Some("Z12345678"));
        assert_eq!(apple.account_type, AccountType::Brokerage);

        assert_eq!(result.holdings[2].asset_class, AssetClass::Fund);
        assert!(!result.holdings[2].value_mismatch);
    }

    #[test]
    fn test_value_mismatch_is_flagged() {
        let text = "Symbol,Description,Quantity,Last Price,Current Value\nMSFT,MICROSOFT CORP,10,$400.00,$3000.00\n";
        let result = parser().parse(text.as_bytes(), None).unwrap();
        assert_eq!(result.holdings.len(), 1);
        assert!(result.holdings[0].value_mismatch);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].row, Some(2));
    }

    #[test]
    fn test_history_actions() {
        let text = "\n\nRun Date,Action,Symbol,Security Description,Security Type,Quantity,Price ($),Commission ($),Fees ($),Accrued Interest ($),Amount ($),Settlement Date\n\
 01/10/2024,YOU BOUGHT APPLE INC (AAPL) (Cash),AAPL,APPLE INC,Cash,10,185.00,,,,-1850.00,01/12/2024\n\
 01/15/2024,DIVIDEND RECEIVED FIDELITY 500 INDEX FUND (FXAIX) (Cash),FXAIX,FIDELITY 500 INDEX FUND,Cash,,,,,,12.34,\n\
 01/15/2024,REINVESTMENT FIDELITY 500 INDEX FUND (FXAIX) (Cash),FXAIX,FIDELITY 500 INDEX FUND,Cash,0.07,176.00,,,,-12.34,\n\
 01/20/2024,YOU BOUGHT (Cash),,,Cash,1,1.00,,,,-1.00,\n\
 01/21/2024,MYSTERY ENTRY,XYZ,,Cash,,,,,,1.00,\n\
\n\
\"Brokerage services are provided by Fidelity Brokerage Services LLC (FBS)\"\n";
        let result = parser().parse(text.as_bytes(), None).unwrap();

        assert_eq!(result.investment_transactions.len(), 3);
        assert_eq!(result.investment_transactions[0].action, InvestmentAction::Buy);
        assert_eq!(result.investment_transactions[0].amount, dec("-1850.00"));
        assert_eq!(result.investment_transactions[1].action, InvestmentAction::Dividend);
        assert_eq!(result.investment_transactions[2].action, InvestmentAction::Reinvestment);
        assert_eq!(result.investment_transactions[2].quantity, dec("0.07"));
        // Buy without a symbol, then an unknown action.
        assert_eq!(result.warnings.len(), 2);
    }
}
