//! Format and institution detection from content fingerprints.
//!
//! Content always wins over the file name: the extension is only used when
//! sniffing cannot tell what the bytes are.

use tracing::debug;

use crate::csv_format::{read_rows, HEADER_SCAN_ROWS};
use crate::factory::ParserFactory;
use crate::normalize::decode_text;
use crate::pdf_extract::PdfDocument;
use crate::registry::Registry;
use crate::types::{FileFormat, Institution};

/// Bytes searched for the PDF magic.
const PDF_MAGIC_WINDOW: usize = 1024;

/// Bytes searched for OFX markers.
const OFX_SNIFF_WINDOW: usize = 4096;

/// Lines of the first PDF page searched for institution markers.
const PDF_MARKER_LINES: usize = 40;

/// Outcome of [`detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub format: FileFormat,
    pub institution: Institution,
    pub warnings: Vec<String>,
}

impl Detection {
    fn new(format: FileFormat, institution: Institution) -> Self {
        Self {
            format,
            institution,
            warnings: Vec::new(),
        }
    }
}

/// Detect with the built-in signature tables.
pub fn detect(bytes: &[u8], filename: Option<&str>) -> Detection {
    detect_with(ParserFactory::global().registry(), bytes, filename)
}

/// Detect with the signature tables of `registry`. Never fails.
pub fn detect_with(registry: &Registry, bytes: &[u8], filename: Option<&str>) -> Detection {
    if bytes.is_empty() {
        let mut detection = Detection::new(FileFormat::Unknown, Institution::Generic);
        detection.warnings.push("empty input".to_string());
        return detection;
    }

    let hint = extension_hint(filename);
    let format = sniff_format(bytes, hint);
    if let Some(hint) = hint {
        if hint != format {
            debug!(
                file = filename.unwrap_or("-"),
                "content looks like {} but the extension says {}", format, hint
            );
        }
    }

    let institution = match format {
        FileFormat::Csv => csv_institution(registry, bytes),
        FileFormat::Pdf => pdf_institution(registry, bytes),
        FileFormat::Ofx | FileFormat::Unknown => Institution::Generic,
    };
    debug!(format = %format, institution = %institution, "detected statement");
    Detection::new(format, institution)
}

fn extension_hint(filename: Option<&str>) -> Option<FileFormat> {
    let (_, extension) = filename?.rsplit_once('.')?;
    extension.parse().ok()
}

fn is_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_MAGIC_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

fn has_ofx_marker(text: &str) -> bool {
    let upper = text.to_uppercase();
    upper.contains("OFXHEADER") || upper.contains("<OFX>")
}

fn sniff_format(bytes: &[u8], hint: Option<FileFormat>) -> FileFormat {
    if is_pdf(bytes) {
        return FileFormat::Pdf;
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(OFX_SNIFF_WINDOW)]);
    if has_ofx_marker(&head) {
        return FileFormat::Ofx;
    }

    match decode_text(bytes) {
        // Long SGML headers can push the body past the sniff window.
        Ok(text) if hint == Some(FileFormat::Ofx) && text.to_uppercase().contains("<OFX>") => FileFormat::Ofx,
        Ok(_) => FileFormat::Csv,
        Err(_) if hint == Some(FileFormat::Pdf) => FileFormat::Pdf,
        Err(_) => FileFormat::Unknown,
    }
}

fn csv_institution(registry: &Registry, bytes: &[u8]) -> Institution {
    let Ok(text) = decode_text(bytes) else {
        return Institution::Generic;
    };
    let table = read_rows(&text);
    let signatures: Vec<_> = registry.signatures_for(FileFormat::Csv).collect();

    (0..table.rows.len().min(HEADER_SCAN_ROWS))
        .find_map(|at| {
            signatures
                .iter()
                .find(|entry| entry.signature.matches_at(&table.rows, at))
                .map(|entry| entry.institution.clone())
        })
        .unwrap_or(Institution::Generic)
}

fn pdf_institution(registry: &Registry, bytes: &[u8]) -> Institution {
    let Some(page) = PdfDocument::load(bytes).ok().and_then(|doc| doc.pages().next()) else {
        return Institution::Generic;
    };
    let signatures: Vec<_> = registry.signatures_for(FileFormat::Pdf).collect();

    page.line_texts()
        .iter()
        .take(PDF_MARKER_LINES)
        .map(|line| line.to_lowercase())
        .find_map(|line| {
            signatures
                .iter()
                .find(|entry| entry.signature.matches_line(&line))
                .map(|entry| entry.institution.clone())
        })
        .unwrap_or(Institution::Generic)
}
