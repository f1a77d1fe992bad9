//! Registered institution signatures and the parsers behind them.
//!
//! The registry is the extension point of the crate. Each entry of the
//! signature table maps a `(format, fingerprint)` pair to an institution, and
//! each `(format, institution)` pair maps to one [`StatementParser`].
//! Built-in entries, in detection order:
//!
//! | Format | Institution | Fingerprint | Sample |
//! |---|---|---|---|
//! | CSV | Chase | columns `Transaction Date, Post Date, Description, Category, Type, Amount` | `Transaction Date,Post Date,Description,Category,Type,Amount,Memo` |
//! | CSV | Chase | columns `Details, Posting Date, Description, Amount, Type` | `Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #` |
//! | CSV | Capital One | columns `Transaction Date, Posted Date, Card No., Description, Debit, Credit` | `Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit` |
//! | CSV | Discover | columns `Trans. Date, Post Date, Description, Amount, Category` | `Trans. Date,Post Date,Description,Amount,Category` |
//! | CSV | American Express | columns `Date, Description, Card Member, Account #, Amount` | `Date,Description,Card Member,Account #,Amount,Extended Details,...` |
//! | CSV | Fidelity | columns `Symbol, Description, Quantity, Last Price, Current Value` | `Account Number,Account Name,Symbol,Description,Quantity,Last Price,Current Value,...` |
//! | CSV | Fidelity | columns `Run Date, Action, Symbol` | `Run Date,Action,Symbol,Security Description,Security Type,Quantity,Price ($),...` |
//! | CSV | Chase | columns `Date, Description, Amount, Type, Balance` | `Date,Description,Amount,Type,Balance` |
//! | CSV | Bank of America | columns `Date, Description, Amount, Running Bal.` | `Date,Description,Amount,Running Bal.` |
//! | CSV | Wells Fargo | headerless, five columns, third is `*` | `"01/15/2024","-5.75","*","","STARBUCKS"` |
//! | CSV | American Express | exactly `Date, Description, Amount`, charges outnumbering credits | `Date,Description,Amount` |
//! | PDF | Chase | marker `jpmorgan chase`, `chase.com`, `chase` | `JPMorgan Chase Bank, N.A.` |
//! | PDF | Discover | marker `discover` | `Discover Card Statement` |
//! | PDF | Capital One | marker `capital one` | `Capital One Platinum Card` |
//! | PDF | Bank of America | marker `bank of america` | `Bank of America, N.A.` |
//! | PDF | Wells Fargo | marker `wells fargo` | `Wells Fargo Everyday Checking` |
//! | PDF | American Express | marker `american express`, `amex` | `American Express Blue Cash` |
//! | PDF | Citibank | marker `citibank`, `citi` | `Citi Double Cash Card` |
//! | PDF | Fidelity | marker `fidelity` | `Fidelity Investments` |
//! | OFX | (from `<FI><ORG>`) | `OFXHEADER` or `<OFX>` | `OFXHEADER:100` |
//!
//! Anything that matches no fingerprint goes to the generic parser of its
//! format.

use csv::StringRecord;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::csv_format::{Aliases, CsvLayout, CsvRow, CsvStatementParser, HeaderIndex, HeaderSpec, RowGuard};
use crate::error::Result;
use crate::institutions;
use crate::ofx_format::OfxParser;
use crate::options::ParseOptions;
use crate::pdf_format::{PdfLayout, PdfStatementParser};
use crate::types::{FileFormat, Institution, ParseResult};

/// Shared contract of every statement parser.
///
/// Implementations fail only when the input is structurally unreadable.
/// Problems with single rows are reported as warnings in the result.
pub trait StatementParser: Send + Sync {
    fn parse(&self, bytes: &[u8], filename: Option<&str>) -> Result<ParseResult>;

    fn institution(&self) -> Institution;

    fn format(&self) -> FileFormat;
}

/// Fingerprint that identifies an institution's files.
#[derive(Clone, Copy)]
pub enum Signature {
    /// Header row with all these columns, case-insensitive.
    Columns { required: Aliases, exact: bool },
    /// Header columns as for `Columns`, confirmed by a check on the rows
    /// below the header.
    Guarded {
        required: Aliases,
        exact: bool,
        accepts: RowGuard,
    },
    /// Headerless rows recognized by shape.
    Positional {
        columns: Aliases,
        row_check: fn(&StringRecord) -> bool,
    },
    /// Any of these tokens near the top of the first page.
    Markers(Aliases),
    /// A self-describing container (OFX).
    Container,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Columns { required, exact } => f
                .debug_struct("Columns")
                .field("required", required)
                .field("exact", exact)
                .finish(),
            Signature::Guarded { required, exact, .. } => f
                .debug_struct("Guarded")
                .field("required", required)
                .field("exact", exact)
                .finish(),
            Signature::Positional { columns, .. } => f.debug_struct("Positional").field("columns", columns).finish(),
            Signature::Markers(markers) => f.debug_tuple("Markers").field(markers).finish(),
            Signature::Container => f.write_str("Container"),
        }
    }
}

impl Signature {
    /// Check a CSV row against a column or positional fingerprint. Row
    /// guards are not consulted; see [`matches_at`](Self::matches_at).
    pub fn matches_row(&self, record: &StringRecord) -> bool {
        match *self {
            Signature::Columns { required, exact } | Signature::Guarded { required, exact, .. } => {
                let header = HeaderIndex::from_record(record);
                header.contains_all(required) && (!exact || header.len() == required.len())
            }
            Signature::Positional { columns, row_check } => record.len() >= columns.len() && row_check(record),
            Signature::Markers(_) | Signature::Container => false,
        }
    }

    /// Check `rows[at]` as a header, including the rows below it for a
    /// guarded fingerprint.
    pub fn matches_at(&self, rows: &[CsvRow], at: usize) -> bool {
        let Some(row) = rows.get(at) else {
            return false;
        };
        if !self.matches_row(&row.record) {
            return false;
        }
        match *self {
            Signature::Guarded { accepts, .. } => accepts(&HeaderIndex::from_record(&row.record), &rows[at + 1..]),
            _ => true,
        }
    }

    /// Check one lower-cased line of text against a marker fingerprint.
    pub fn matches_line(&self, line: &str) -> bool {
        match self {
            Signature::Markers(markers) => markers.iter().any(|marker| contains_token(line, marker)),
            _ => false,
        }
    }
}

/// True when `token` appears in `line` on word boundaries.
pub(crate) fn contains_token(line: &str, token: &str) -> bool {
    let bytes = line.as_bytes();
    line.match_indices(token).any(|(start, matched)| {
        let end = start + matched.len();
        let before = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let after = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        before && after
    })
}

/// One row of the signature table.
#[derive(Debug, Clone)]
pub struct SignatureEntry {
    pub format: FileFormat,
    pub institution: Institution,
    pub signature: Signature,
    /// Sample header or marker text.
    pub sample: &'static str,
}

/// Immutable once built; share it behind an `Arc` or a `OnceLock`.
#[derive(Clone)]
pub struct Registry {
    options: ParseOptions,
    signatures: Vec<SignatureEntry>,
    csv_layouts: Vec<CsvLayout>,
    parsers: HashMap<(FileFormat, Institution), Arc<dyn StatementParser>>,
    fallbacks: HashMap<FileFormat, Arc<dyn StatementParser>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("signatures", &self.signatures)
            .field("parsers", &self.parsers.len())
            .field("fallbacks", &self.fallbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// An empty registry: nothing is detected and every format is unsupported.
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            signatures: Vec::new(),
            csv_layouts: Vec::new(),
            parsers: HashMap::new(),
            fallbacks: HashMap::new(),
        }
    }

    /// All built-in institutions and the generic fallbacks.
    pub fn builtin(options: ParseOptions) -> Self {
        let mut registry = Self::new(options.clone());
        for layout in institutions::csv_layouts() {
            registry = registry.with_csv(layout);
        }
        for layout in institutions::pdf_layouts() {
            registry = registry.with_pdf(layout);
        }
        registry
            .with_container(Arc::new(OfxParser::new(options.clone())))
            .with_fallback(Arc::new(institutions::generic::GenericCsvParser::new(options.clone())))
            .with_fallback(Arc::new(PdfStatementParser::new(institutions::generic::pdf_layout(), options)))
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Register a CSV layout. Layouts of one institution share a parser and
    /// are tried in registration order.
    pub fn with_csv(mut self, layout: CsvLayout) -> Self {
        let signature = match layout.header {
            HeaderSpec::Named { required, exact } => Signature::Columns { required, exact },
            HeaderSpec::Guarded { required, exact, accepts } => Signature::Guarded { required, exact, accepts },
            HeaderSpec::Fixed { columns, row_check } => Signature::Positional { columns, row_check },
        };
        self.signatures.push(SignatureEntry {
            format: FileFormat::Csv,
            institution: layout.institution.clone(),
            signature,
            sample: layout.sample,
        });

        let institution = layout.institution.clone();
        self.csv_layouts.push(layout);
        let layouts: Vec<CsvLayout> = self
            .csv_layouts
            .iter()
            .filter(|l| l.institution == institution)
            .cloned()
            .collect();
        let parser = CsvStatementParser::new(institution.clone(), layouts, self.options.clone());
        self.parsers.insert((FileFormat::Csv, institution), Arc::new(parser));
        self
    }

    /// Register a PDF layout, replacing any earlier one for its institution.
    pub fn with_pdf(mut self, layout: PdfLayout) -> Self {
        self.signatures.push(SignatureEntry {
            format: FileFormat::Pdf,
            institution: layout.institution.clone(),
            signature: Signature::Markers(layout.markers),
            sample: layout.sample,
        });
        let key = (FileFormat::Pdf, layout.institution.clone());
        self.parsers
            .insert(key, Arc::new(PdfStatementParser::new(layout, self.options.clone())));
        self
    }

    /// Register a parser for a self-describing container format. It serves
    /// every institution of that format.
    pub fn with_container(mut self, parser: Arc<dyn StatementParser>) -> Self {
        self.signatures.push(SignatureEntry {
            format: parser.format(),
            institution: Institution::Generic,
            signature: Signature::Container,
            sample: "OFXHEADER:100",
        });
        self.fallbacks.insert(parser.format(), parser);
        self
    }

    /// Register any parser behind an explicit signature.
    pub fn with_parser(mut self, entry: SignatureEntry, parser: Arc<dyn StatementParser>) -> Self {
        self.parsers
            .insert((entry.format, entry.institution.clone()), parser);
        self.signatures.push(entry);
        self
    }

    /// Register the catch-all parser of a format.
    pub fn with_fallback(mut self, parser: Arc<dyn StatementParser>) -> Self {
        self.fallbacks.insert(parser.format(), parser);
        self
    }

    /// Signature table in detection order.
    pub fn signatures(&self) -> &[SignatureEntry] {
        &self.signatures
    }

    pub fn signatures_for(&self, format: FileFormat) -> impl Iterator<Item = &SignatureEntry> {
        self.signatures.iter().filter(move |entry| entry.format == format)
    }

    /// True when some parser handles `format`.
    pub fn supports(&self, format: FileFormat) -> bool {
        self.fallbacks.contains_key(&format) || self.parsers.keys().any(|(f, _)| *f == format)
    }

    /// Parser for `(format, institution)`, falling back to the format's
    /// generic parser.
    pub fn resolve(&self, format: FileFormat, institution: &Institution) -> Option<Arc<dyn StatementParser>> {
        self.parsers
            .get(&(format, institution.clone()))
            .or_else(|| self.fallbacks.get(&format))
            .cloned()
    }
}
