//! Positioned text extraction from PDF content streams.
//!
//! Each page's operators are replayed through a small text-state machine and
//! every shown string becomes one [`TextItem`] whose transform places it on
//! the page. Glyph widths come from the font's `Widths` array when present,
//! otherwise half an em per glyph.

use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::UTF_16BE;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::ReconstructError;
use crate::model::{FragmentSource, TextItem};

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Glyph width in thousandths of an em when the font has no metrics.
const APPROX_GLYPH_WIDTH: f32 = 500.0;

/// `TJ` offsets below this (thousandths of an em) read as a word gap.
const TJ_WORD_GAP: f32 = -100.0;

/// `m` applied after `n`, both in PDF row-vector convention.
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

#[allow(clippy::cast_precision_loss)]
fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    let values = operands.iter().filter_map(number).collect::<Vec<_>>();
    <[f32; 6]>::try_from(values.as_slice()).ok()
}

fn looks_decoding_broken(text: &str) -> bool {
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    if total == 0 {
        return false;
    }

    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();

    replacement * 8 > total || control * 5 > total
}

fn is_two_byte_encoding(encoding: &str) -> bool {
    let lower = encoding.to_ascii_lowercase();
    lower.contains("identity-h")
        || lower.contains("utf16")
        || lower.contains("ucs2")
        || lower.contains("unicode")
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    let without_bom = bytes
        .strip_prefix(&[0xFE, 0xFF])
        .or_else(|| bytes.strip_prefix(&[0xFF, 0xFE]));
    if without_bom.is_some() || encoding.is_some_and(is_two_byte_encoding) {
        let (utf16, had_errors) =
            UTF_16BE.decode_without_bom_handling(without_bom.unwrap_or(bytes));
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

#[derive(Debug, Clone)]
struct PageFont<'a> {
    encoding: &'a str,
    first_char: i64,
    widths: Vec<f32>,
}

impl PageFont<'_> {
    fn glyph_width(&self, code: u8) -> f32 {
        usize::try_from(i64::from(code) - self.first_char)
            .ok()
            .and_then(|index| self.widths.get(index))
            .copied()
            .filter(|width| *width > 0.0)
            .unwrap_or(APPROX_GLYPH_WIDTH)
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn read_font<'a>(document: &'a Document, font: &'a Dictionary) -> PageFont<'a> {
    let first_char = font
        .get(b"FirstChar")
        .map(|object| resolve(document, object))
        .and_then(Object::as_i64)
        .unwrap_or(0);
    let widths = font
        .get(b"Widths")
        .map(|object| resolve(document, object))
        .and_then(Object::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| number(resolve(document, item)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();

    PageFont {
        encoding: font.get_font_encoding(),
        first_char,
        widths,
    }
}

#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horiz_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font: Vec::new(),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }
}

struct PageWalker<'a> {
    fonts: BTreeMap<Vec<u8>, PageFont<'a>>,
    state: TextState,
    saved: Vec<TextState>,
    items: Vec<TextItem>,
}

impl<'a> PageWalker<'a> {
    fn new(fonts: BTreeMap<Vec<u8>, PageFont<'a>>) -> Self {
        Self {
            fonts,
            state: TextState::default(),
            saved: Vec::new(),
            items: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let first = operands.first().and_then(number);
        match operator {
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(matrix) = matrix_operand(operands) {
                    self.state.ctm = multiply(&matrix, &self.state.ctm);
                }
            }
            "BT" => {
                self.state.text_matrix = IDENTITY;
                self.state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(name) = operands.first().and_then(|operand| operand.as_name().ok()) {
                    self.state.font = name.to_vec();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(matrix) = matrix_operand(operands) {
                    self.state.text_matrix = matrix;
                    self.state.line_matrix = matrix;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (first, operands.get(1).and_then(number)) {
                    if operator == "TD" {
                        self.state.leading = -ty;
                    }
                    self.state.move_line(tx, ty);
                }
            }
            "T*" => self.state.next_line(),
            "TL" => self.state.leading = first.unwrap_or(self.state.leading),
            "Tc" => self.state.char_spacing = first.unwrap_or(self.state.char_spacing),
            "Tw" => self.state.word_spacing = first.unwrap_or(self.state.word_spacing),
            "Tz" => self.state.horiz_scale = first.map_or(self.state.horiz_scale, |v| v / 100.0),
            "Ts" => self.state.rise = first.unwrap_or(self.state.rise),
            "Tj" => self.show(&operands[..operands.len().min(1)]),
            "TJ" => {
                if let Some(Ok(pieces)) = operands.first().map(Object::as_array) {
                    self.show(pieces);
                }
            }
            "'" => {
                self.state.next_line();
                self.show(&operands[..operands.len().min(1)]);
            }
            "\"" => {
                if operands.len() >= 3 {
                    self.state.word_spacing = first.unwrap_or(self.state.word_spacing);
                    self.state.char_spacing =
                        number(&operands[1]).unwrap_or(self.state.char_spacing);
                    self.state.next_line();
                    self.show(&operands[2..3]);
                }
            }
            _ => {}
        }
    }

    /// Emits one item for a `Tj` string or a whole `TJ` array and advances
    /// the text matrix past it.
    fn show(&mut self, pieces: &[Object]) {
        let state = &self.state;
        let font = self.fonts.get(&state.font);
        let encoding = font.map(|font| font.encoding);
        let two_byte = encoding.is_some_and(is_two_byte_encoding);

        let mut text = String::new();
        let mut advance = 0.0_f32;
        for piece in pieces {
            match piece {
                Object::String(bytes, _) => {
                    let decoded = decode_pdf_bytes(encoding, bytes);
                    if two_byte {
                        for ch in decoded.chars() {
                            advance += APPROX_GLYPH_WIDTH / 1000.0 * state.font_size
                                + state.char_spacing;
                            if ch == ' ' {
                                advance += state.word_spacing;
                            }
                        }
                    } else {
                        for &code in bytes {
                            let width = font.map_or(APPROX_GLYPH_WIDTH, |f| f.glyph_width(code));
                            advance += width / 1000.0 * state.font_size + state.char_spacing;
                            if code == b' ' {
                                advance += state.word_spacing;
                            }
                        }
                    }
                    text.push_str(&decoded);
                }
                other => {
                    if let Some(offset) = number(other) {
                        advance -= offset / 1000.0 * state.font_size;
                        if offset < TJ_WORD_GAP && !text.is_empty() && !text.ends_with(' ') {
                            text.push(' ');
                        }
                    }
                }
            }
        }
        let advance = advance * state.horiz_scale;

        let rendering = multiply(&state.text_matrix, &state.ctm);
        if !text.trim().is_empty() {
            let font_matrix = [
                state.font_size * state.horiz_scale,
                0.0,
                0.0,
                state.font_size,
                0.0,
                state.rise,
            ];
            let transform = multiply(&font_matrix, &rendering);
            let scale = rendering[0].hypot(rendering[1]);
            self.items.push(TextItem {
                text,
                transform,
                width: advance * scale,
            });
        }

        self.state.text_matrix = multiply(&translation(advance, 0.0), &self.state.text_matrix);
    }
}

/// A loaded PDF that hands out positioned text per page.
pub struct PdfFragmentSource {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfFragmentSource {
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed as a PDF.
    pub fn load(path: &Path) -> Result<Self, ReconstructError> {
        Ok(Self::from_document(Document::load(path)?))
    }

    /// # Errors
    ///
    /// Returns an error when the bytes are not a readable PDF.
    pub fn load_mem(bytes: &[u8]) -> Result<Self, ReconstructError> {
        Ok(Self::from_document(Document::load_mem(bytes)?))
    }

    #[must_use]
    pub fn from_document(document: Document) -> Self {
        let pages = document.get_pages();
        Self { document, pages }
    }
}

impl FragmentSource for PdfFragmentSource {
    fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    fn page_items(&self, page_number: u32) -> Result<Vec<TextItem>, ReconstructError> {
        let page_error = |message: String| ReconstructError::PageDecode {
            page: page_number,
            message,
        };

        let page_id = *self
            .pages
            .get(&page_number)
            .ok_or_else(|| page_error("page does not exist".to_string()))?;
        let raw_content = self
            .document
            .get_page_content(page_id)
            .map_err(|error| page_error(error.to_string()))?;
        let content = Content::decode(&raw_content).map_err(|error| page_error(error.to_string()))?;

        let fonts = self
            .document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| (name, read_font(&self.document, font)))
            .collect::<BTreeMap<_, _>>();

        let mut walker = PageWalker::new(fonts);
        for operation in &content.operations {
            walker.apply(&operation.operator, &operation.operands);
        }

        debug!(
            page = page_number,
            operations = content.operations.len(),
            items = walker.items.len(),
            "extracted positioned text"
        );
        Ok(walker.items)
    }
}
