//! Detection plus dispatch: the single entry point most callers need.

use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::detect::{detect_with, Detection};
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::registry::Registry;
use crate::types::{FileFormat, Institution, ParseResult};

/// Routes statement bytes to the parser registered for their format and
/// institution.
#[derive(Debug, Clone)]
pub struct ParserFactory {
    registry: Arc<Registry>,
}

impl ParserFactory {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Built-in registry configured with `options`.
    pub fn with_options(options: ParseOptions) -> Self {
        Self::new(Registry::builtin(options))
    }

    /// Shared factory over the built-in registry with default options.
    pub fn global() -> &'static ParserFactory {
        static FACTORY: OnceLock<ParserFactory> = OnceLock::new();
        FACTORY.get_or_init(ParserFactory::default)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn detect(&self, bytes: &[u8], filename: Option<&str>) -> Detection {
        detect_with(&self.registry, bytes, filename)
    }

    /// Parse with an explicit format and institution, skipping detection.
    pub fn parse_as(
        &self,
        format: FileFormat,
        institution: &Institution,
        bytes: &[u8],
        filename: Option<&str>,
    ) -> Result<ParseResult> {
        let parser = self
            .registry
            .resolve(format, institution)
            .ok_or_else(|| Error::UnsupportedFormat(format!("no parser registered for {}", format)))?;
        debug!(
            format = %format,
            institution = %institution,
            parser = %parser.institution(),
            "dispatching to parser"
        );
        parser.parse(bytes, filename)
    }

    /// Detect the format and institution, then parse with the matching
    /// parser (or the generic parser of the format).
    pub fn parse_auto(&self, bytes: &[u8], filename: Option<&str>) -> Result<(Institution, ParseResult)> {
        let detection = self.detect(bytes, filename);
        if detection.format == FileFormat::Unknown {
            let reason = detection.warnings.first().cloned().unwrap_or_else(|| "unrecognized content".to_string());
            return Err(Error::UnsupportedFormat(reason));
        }

        let result = self.parse_as(detection.format, &detection.institution, bytes, filename)?;
        Ok((result.institution.clone(), result))
    }
}

impl Default for ParserFactory {
    fn default() -> Self {
        Self::with_options(ParseOptions::default())
    }
}

/// [`ParserFactory::parse_auto`] on the global factory.
pub fn parse_auto(bytes: &[u8], filename: Option<&str>) -> Result<(Institution, ParseResult)> {
    ParserFactory::global().parse_auto(bytes, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasonCode;

    #[test]
    fn test_empty_input_is_unsupported() {
        let err = parse_auto(b"", Some("empty.csv")).unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::UnsupportedFormat);
        assert!(err.to_string().contains("empty input"));
    }

    #[test]
    fn test_empty_registry_supports_nothing() {
        let factory = ParserFactory::new(Registry::new(ParseOptions::default()));
        let err = factory.parse_auto(b"Date,Description,Amount\n", None).unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::UnsupportedFormat);
    }

    #[test]
    fn test_parse_as_skips_detection() {
        let factory = ParserFactory::default();
        let text = b"Date,Description,Amount\n01/15/2024,NETFLIX.COM,15.49\n";
        let result = factory
            .parse_as(FileFormat::Csv, &Institution::Generic, text, None)
            .unwrap();
        assert_eq!(result.institution, Institution::Generic);
        assert_eq!(result.transactions.len(), 1);
    }

    #[test]
    fn test_options_reach_parsers() {
        let options = ParseOptions {
            default_currency: "EUR".to_string(),
            ..ParseOptions::default()
        };
        let factory = ParserFactory::with_options(options);
        let (_, result) = factory
            .parse_auto(b"Date,Description,Amount\n01/15/2024,CAFE,4.00\n", Some("x.csv"))
            .unwrap();
        assert_eq!(result.transactions[0].currency, "EUR");
    }
}
