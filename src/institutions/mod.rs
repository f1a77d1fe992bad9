//! Built-in institution tables.
//!
//! Each submodule declares the CSV layouts and the PDF line grammar of one
//! issuer. The order returned by [`csv_layouts`] is the detection order:
//! layouts whose required columns are a superset of another's come first.

pub mod amex;
pub mod bank_of_america;
pub mod capital_one;
pub mod chase;
pub mod discover;
pub mod fidelity;
pub mod generic;
pub mod wells_fargo;

use crate::csv_format::CsvLayout;
use crate::pdf_format::PdfLayout;

/// Registered CSV layouts, most specific first.
pub fn csv_layouts() -> Vec<CsvLayout> {
    vec![
        chase::CREDIT_CARD,
        chase::CHECKING_LEGACY,
        capital_one::CARD,
        discover::CARD,
        amex::EXTENDED,
        fidelity::POSITIONS,
        fidelity::HISTORY,
        chase::CHECKING,
        bank_of_america::CHECKING,
        wells_fargo::CHECKING,
        amex::SIMPLE,
    ]
}

/// Registered PDF layouts, in marker detection order.
pub fn pdf_layouts() -> Vec<PdfLayout> {
    vec![
        chase::pdf_layout(),
        discover::pdf_layout(),
        capital_one::pdf_layout(),
        bank_of_america::pdf_layout(),
        wells_fargo::pdf_layout(),
        amex::pdf_layout(),
        generic::marker_layout(crate::types::Institution::Citibank, &["citibank", "citi"], "Citi Double Cash Card"),
        fidelity::pdf_layout(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_format::read_rows;
    use crate::types::Institution;

    fn first_match(header: &str) -> Option<Institution> {
        let rows = read_rows(header).rows;
        let record = &rows.first()?.record;
        csv_layouts()
            .into_iter()
            .find(|layout| layout.header_matches(record))
            .map(|layout| layout.institution)
    }

    #[test]
    fn test_layout_order_prefers_specific_headers() {
        assert_eq!(
            first_match("Transaction Date,Post Date,Description,Category,Type,Amount,Memo"),
            Some(Institution::Chase)
        );
        assert_eq!(first_match("Date,Description,Amount,Type,Balance"), Some(Institution::Chase));
        assert_eq!(first_match("Date,Description,Amount,Running Bal."), Some(Institution::BankOfAmerica));
        assert_eq!(first_match("Date,Description,Amount"), Some(Institution::AmericanExpress));
        assert_eq!(first_match("Date,Description,Amount,Memo"), None);
        assert_eq!(
            first_match("Trans. Date,Post Date,Description,Amount,Category"),
            Some(Institution::Discover)
        );
    }

    #[test]
    fn test_every_layout_sample_matches_itself() {
        for layout in csv_layouts() {
            let rows = read_rows(layout.sample).rows;
            assert!(layout.header_matches(&rows[0].record), "{} sample", layout.name);
        }
    }

    #[test]
    fn test_every_pdf_layout_has_patterns() {
        for layout in pdf_layouts() {
            assert!(!layout.patterns.is_empty());
            assert!(!layout.markers.is_empty());
        }
    }
}
