//! Text and line layout extraction from PDF statements.
//!
//! Pages are produced lazily, one at a time, by walking the text operators
//! of each page's content stream. Fragments are placed by their text-space
//! position, grouped into lines top to bottom and ordered left to right.
//! Wide horizontal gaps are kept as a double space so line patterns can tell
//! table columns apart.

use encoding_rs::{UTF_16BE, WINDOWS_1252};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::fmt;
use tracing::debug;

use crate::error::{Error, Result};

/// Fragments whose baselines differ by less than this share a line.
const LINE_TOLERANCE: f32 = 2.0;

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

/// A gap wider than this many glyphs separates columns.
const COLUMN_GAP_GLYPHS: f32 = 2.0;

/// A run of text drawn at one position.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub x: f32,
    pub y: f32,
    /// Estimated advance of the whole run.
    pub width: f32,
    pub font_size: f32,
    pub text: String,
}

/// Fragments sharing a baseline, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub y: f32,
    pub fragments: Vec<Fragment>,
}

impl TextLine {
    /// Line text. Column gaps become two spaces.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut previous: Option<&Fragment> = None;
        for fragment in &self.fragments {
            if let Some(prev) = previous {
                let gap = fragment.x - (prev.x + prev.width);
                let glyph = (prev.font_size * GLYPH_WIDTH).max(1.0);
                if gap > glyph * COLUMN_GAP_GLYPHS {
                    out.push_str("  ");
                } else if gap > glyph * 0.3 && !out.ends_with(' ') && !fragment.text.starts_with(' ') {
                    out.push(' ');
                }
            }
            out.push_str(&fragment.text);
            previous = Some(fragment);
        }
        out.trim().to_string()
    }
}

/// Extracted text of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    pub lines: Vec<TextLine>,
    /// Problems met while decoding this page.
    pub warnings: Vec<String>,
}

impl PageText {
    pub fn text(&self) -> String {
        self.lines.iter().map(TextLine::text).collect::<Vec<_>>().join("\n")
    }

    /// Non-empty line texts in reading order.
    pub fn line_texts(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(TextLine::text)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// A loaded PDF container.
pub struct PdfDocument {
    document: Document,
    pages: Vec<(u32, ObjectId)>,
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument").field("pages", &self.pages.len()).finish()
    }
}

impl PdfDocument {
    /// Load a PDF from memory.
    ///
    /// Fails with [`Error::CorruptContainer`] when the header or the
    /// cross-reference data is unusable or the file is encrypted.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let document = Document::load_mem(bytes)?;
        if document.is_encrypted() {
            return Err(Error::CorruptContainer("encrypted PDF".to_string()));
        }
        let pages: Vec<(u32, ObjectId)> = document.get_pages().into_iter().collect();
        debug!("Loaded PDF with {} pages", pages.len());
        Ok(Self { document, pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Lazy page iterator. Each call starts over from the first page.
    pub fn pages(&self) -> Pages<'_> {
        Pages { doc: self, next: 0 }
    }

    fn extract_page(&self, number: u32, id: ObjectId) -> PageText {
        let mut warnings = Vec::new();
        let fragments = match self.document.get_page_content(id) {
            Ok(raw) => match Content::decode(&raw) {
                Ok(content) => positioned_fragments(&content),
                Err(err) => {
                    warnings.push(format!("page {}: content stream not decodable: {}", number, err));
                    Vec::new()
                }
            },
            Err(err) => {
                warnings.push(format!("page {}: content not readable: {}", number, err));
                Vec::new()
            }
        };

        let lines = if fragments.is_empty() {
            self.fallback_lines(number, &mut warnings)
        } else {
            group_lines(fragments)
        };

        PageText {
            number,
            lines,
            warnings,
        }
    }

    /// Plain extraction for pages whose operators gave no positioned text.
    fn fallback_lines(&self, number: u32, warnings: &mut Vec<String>) -> Vec<TextLine> {
        match self.document.extract_text(&[number]) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .enumerate()
                .map(|(i, line)| TextLine {
                    y: -(i as f32),
                    fragments: vec![Fragment {
                        x: 0.0,
                        y: -(i as f32),
                        width: line.chars().count() as f32 * GLYPH_WIDTH,
                        font_size: 1.0,
                        text: line.to_string(),
                    }],
                })
                .collect(),
            Err(err) => {
                warnings.push(format!("page {}: text extraction failed: {}", number, err));
                Vec::new()
            }
        }
    }
}

/// Iterator over [`PageText`]s, extracting one page per step.
#[derive(Debug)]
pub struct Pages<'a> {
    doc: &'a PdfDocument,
    next: usize,
}

impl Iterator for Pages<'_> {
    type Item = PageText;

    fn next(&mut self) -> Option<PageText> {
        let (number, id) = *self.doc.pages.get(self.next)?;
        self.next += 1;
        Some(self.doc.extract_page(number, id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.doc.pages.len() - self.next;
        (left, Some(left))
    }
}

/// 2D affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`, PDF row-vector convention.
    fn multiply(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn origin(&self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }

    fn scale(&self) -> f32 {
        (self.0[0] * self.0[0] + self.0[1] * self.0[1]).sqrt()
    }
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut values = [0.0f32; 6];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = operand.as_float().ok()?;
    }
    Some(Matrix(values))
}

fn float(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|o| o.as_float().ok())
}

/// Decode a PDF string operand: UTF-16BE with BOM, otherwise single-byte.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (text, _) = UTF_16BE.decode_without_bom_handling(&bytes[2..]);
        text.into_owned()
    } else {
        let (text, _, _) = WINDOWS_1252.decode(bytes);
        text.into_owned()
    }
}

#[derive(Debug)]
struct TextState {
    ctm: Matrix,
    saved: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
    font_size: f32,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            font_size: 10.0,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.leading == 0.0 { self.font_size * 1.2 } else { self.leading };
        self.move_line(0.0, -leading);
    }

    /// Emit a fragment at the current position and advance past it.
    fn show(&mut self, text: String, fragments: &mut Vec<Fragment>) {
        let glyphs = text.chars().count() as f32;
        let advance = glyphs * self.font_size * GLYPH_WIDTH;
        let device = self.text_matrix.multiply(&self.ctm);
        let (x, y) = device.origin();
        let scale = device.scale().max(f32::EPSILON);

        if !text.trim().is_empty() {
            fragments.push(Fragment {
                x,
                y,
                width: advance * scale,
                font_size: self.font_size * scale,
                text,
            });
        }
        self.text_matrix = Matrix::translate(advance, 0.0).multiply(&self.text_matrix);
    }
}

/// Walk the text operators of a content stream.
fn positioned_fragments(content: &Content) -> Vec<Fragment> {
    let mut state = TextState::new();
    let mut fragments = Vec::new();

    for operation in &content.operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "q" => state.saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(matrix) = matrix_from(operands) {
                    state.ctm = matrix.multiply(&state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = Matrix::IDENTITY;
                state.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(size) = float(operands, 1) {
                    state.font_size = size.abs();
                }
            }
            "TL" => {
                if let Some(leading) = float(operands, 0) {
                    state.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (float(operands, 0), float(operands, 1)) {
                    state.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (float(operands, 0), float(operands, 1)) {
                    state.leading = -ty;
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = matrix_from(operands) {
                    state.text_matrix = matrix;
                    state.line_matrix = matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    state.show(decode_pdf_string(bytes), &mut fragments);
                }
            }
            "'" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    state.show(decode_pdf_string(bytes), &mut fragments);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    state.show(decode_pdf_string(bytes), &mut fragments);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let mut text = String::new();
                    for item in items {
                        match item {
                            Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                            // Large negative kerning is a visual word gap.
                            other => {
                                if other.as_float().map(|k| k < -200.0).unwrap_or(false) && !text.ends_with(' ') {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                    state.show(text, &mut fragments);
                }
            }
            _ => {}
        }
    }

    fragments
}

/// Group fragments into lines: top to bottom, then left to right.
fn group_lines(mut fragments: Vec<Fragment>) -> Vec<TextLine> {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<TextLine> = Vec::new();
    for fragment in fragments {
        match lines.last_mut() {
            Some(line) if (line.y - fragment.y).abs() <= LINE_TOLERANCE => line.fragments.push(fragment),
            _ => lines.push(TextLine {
                y: fragment.y,
                fragments: vec![fragment],
            }),
        }
    }
    for line in &mut lines {
        line.fragments.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    /// One page per entry; each page is a list of `(x, y, text)`.
    fn build_pdf(pages: &[Vec<(i64, i64, &str)>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]),
            ];
            for (x, y, text) in page {
                operations.push(Operation::new(
                    "Tm",
                    vec![
                        Object::Integer(1),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(1),
                        Object::Integer(*x),
                        Object::Integer(*y),
                    ],
                ));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            }
            operations.push(Operation::new("ET", vec![]));
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_lines_in_reading_order() {
        let bytes = build_pdf(&[vec![
            (300, 700, "-5.75"),
            (50, 700, "01/15"),
            (100, 700, "STARBUCKS"),
            (50, 720, "ACCOUNT ACTIVITY"),
        ]]);
        let pdf = PdfDocument::load(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 1);

        let page = pdf.pages().next().unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(page.line_texts(), vec!["ACCOUNT ACTIVITY", "01/15  STARBUCKS  -5.75"]);
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn test_pages_are_lazy_and_restartable() {
        let bytes = build_pdf(&[vec![(50, 700, "first page")], vec![(50, 700, "second page")]]);
        let pdf = PdfDocument::load(&bytes).unwrap();

        let mut pages = pdf.pages();
        assert_eq!(pages.size_hint(), (2, Some(2)));
        assert_eq!(pages.next().unwrap().text(), "first page");

        let again: Vec<String> = pdf.pages().map(|p| p.text()).collect();
        let twice: Vec<String> = pdf.pages().map(|p| p.text()).collect();
        assert_eq!(again, vec!["first page", "second page"]);
        assert_eq!(again, twice);
    }

    #[test]
    fn test_corrupt_container() {
        let err = PdfDocument::load(b"%PDF-1.5\nthis is not a pdf").unwrap_err();
        assert_eq!(err.reason_code(), crate::error::ReasonCode::CorruptContainer);
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"Caf\xE9"), "Café");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42]), "AB");
    }

    #[test]
    fn test_matrix_translate() {
        let m = Matrix::translate(10.0, 20.0).multiply(&Matrix::translate(5.0, 5.0));
        assert_eq!(m.origin(), (15.0, 25.0));
    }
}
