//! Statement Parser Library
//!
//! A library for detecting, parsing, and normalizing financial statement
//! exports from banks, card issuers and brokerages into one canonical model.
//!
//! # Supported Formats
//!
//! - **CSV**: institution exports (Chase, Discover, American Express, Capital
//!   One, Bank of America, Wells Fargo, Fidelity) plus a generic fallback
//! - **OFX/QFX**: SGML (1.x) and XML (2.x) bank, card and investment statements
//! - **PDF**: text-based statements, recovered line by line
//!
//! # Features
//!
//! - Content-based format and institution detection
//! - Signed amounts normalized so debits are always negative
//! - Row-level problems reported as warnings, never as failures
//! - Open registry: add institution layouts without touching the engine
//!
//! # Examples
//!
//! ## Parsing a file of unknown origin
//!
//! ```no_run
//! let bytes = std::fs::read("statement.csv")?;
//! let (institution, result) = statement_parser::parse_auto(&bytes, Some("statement.csv"))?;
//! println!("{}: {} transactions", institution, result.transactions.len());
//! for warning in &result.warnings {
//!     eprintln!("{}", warning);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Registering an extra layout
//!
//! ```no_run
//! use statement_parser::institutions::generic;
//! use statement_parser::{Institution, ParseOptions, ParserFactory, Registry};
//!
//! let options = ParseOptions::default();
//! let registry = Registry::builtin(options.clone())
//!     .with_pdf(generic::marker_layout(Institution::Other("Ally".into()), &["ally bank"], "Ally Bank"));
//! let factory = ParserFactory::new(registry);
//! let bytes = std::fs::read("ally.pdf")?;
//! let (_, result) = factory.parse_auto(&bytes, None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod csv_format;
pub mod detect;
pub mod error;
pub mod factory;
pub mod institutions;
pub mod normalize;
pub mod ofx_format;
pub mod options;
pub mod pdf_extract;
pub mod pdf_format;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use detect::{detect, detect_with, Detection};
pub use error::{Error, ReasonCode, Result};
pub use factory::{parse_auto, ParserFactory};
pub use options::ParseOptions;
pub use registry::{Registry, StatementParser};
pub use types::{
    AccountBalance, AccountType, AssetClass, BankTransaction, FileFormat, Institution, InvestmentAction,
    InvestmentHolding, InvestmentTransaction, ParseResult, ParseWarning, TransactionType,
};
