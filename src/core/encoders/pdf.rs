//! Titled table report rendered as a PDF 1.4 document.
//!
//! Layout is computed first ([`layout`]) and rendered second, so the paging
//! decisions can be inspected without parsing PDF bytes. The document uses
//! the standard Helvetica fonts with WinAnsi encoding, so no font files are
//! embedded.

use super::{columns, RecordEncoder};
use crate::core::{ExportFormat, Record};
use crate::domain::model::value_text;
use crate::utils::error::{ExportError, Result};
use chrono::NaiveDate;
use std::fmt::Write as _;

const MM: f32 = 72.0 / 25.4;

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

const MARGIN: f32 = 14.0 * MM;
const TITLE_Y: f32 = 22.0 * MM;
const DATE_Y: f32 = 30.0 * MM;
const TABLE_TOP_FIRST: f32 = 35.0 * MM;
const TABLE_TOP_NEXT: f32 = MARGIN;
const TABLE_BOTTOM: f32 = PAGE_HEIGHT - MARGIN;

const TITLE_SIZE: f32 = 18.0;
const DATE_SIZE: f32 = 11.0;
const CELL_SIZE: f32 = 8.0;
pub const ROW_HEIGHT: f32 = 16.0;
const CELL_PADDING: f32 = 4.0;

// 表頭底色 (79, 70, 229)
const HEADER_FILL: (f32, f32, f32) = (79.0 / 255.0, 70.0 / 255.0, 229.0 / 255.0);

#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    /// Distance from the top edge to the header row of this page's table.
    pub table_top: f32,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub title: String,
    pub date_line: String,
    pub headers: Vec<String>,
    pub pages: Vec<PdfPage>,
}

impl PdfLayout {
    pub fn body_rows(&self) -> usize {
        self.pages.iter().map(|page| page.rows.len()).sum()
    }
}

fn rows_that_fit(table_top: f32) -> usize {
    let available = TABLE_BOTTOM - table_top - ROW_HEIGHT;
    ((available / ROW_HEIGHT).floor() as usize).max(1)
}

/// Splits body rows across pages; the header row repeats on every page.
pub fn layout(
    title: &str,
    headers: &[String],
    rows: Vec<Vec<String>>,
    generated_on: NaiveDate,
) -> PdfLayout {
    let mut pages = Vec::new();
    let mut remaining = rows.into_iter().peekable();
    let mut table_top = TABLE_TOP_FIRST;

    loop {
        let page_rows: Vec<Vec<String>> = remaining.by_ref().take(rows_that_fit(table_top)).collect();
        pages.push(PdfPage {
            table_top,
            rows: page_rows,
        });
        if remaining.peek().is_none() {
            break;
        }
        table_top = TABLE_TOP_NEXT;
    }

    PdfLayout {
        title: title.to_string(),
        date_line: format!("Fecha: {}", generated_on.format("%d/%m/%Y")),
        headers: headers.to_vec(),
        pages,
    }
}

/// Table report with caller supplied header labels.
#[derive(Debug, Clone)]
pub struct PdfEncoder {
    title: String,
    headers: Vec<String>,
    generated_on: NaiveDate,
}

impl PdfEncoder {
    pub fn new(title: impl Into<String>, headers: Vec<String>, generated_on: NaiveDate) -> Self {
        Self {
            title: title.into(),
            headers,
            generated_on,
        }
    }

    pub fn layout(&self, records: &[Record]) -> Result<PdfLayout> {
        let keys = columns(self.format(), records)?;
        if keys.len() != self.headers.len() {
            return Err(ExportError::EncodeError {
                format: self.format().to_string(),
                message: format!(
                    "{} header labels for {} columns",
                    self.headers.len(),
                    keys.len()
                ),
            });
        }

        let rows = records
            .iter()
            .map(|record| record.values().map(value_text).collect())
            .collect();
        Ok(layout(&self.title, &self.headers, rows, self.generated_on))
    }
}

impl RecordEncoder for PdfEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let layout = self.layout(records)?;
        tracing::debug!(
            "Rendering PDF with {} rows on {} pages",
            layout.body_rows(),
            layout.pages.len()
        );
        Ok(render(&layout))
    }
}

fn top_to_pdf(y: f32) -> f32 {
    PAGE_HEIGHT - y
}

fn text_op(out: &mut String, font: &str, size: f32, x: f32, y_top: f32, text: &str) {
    let _ = writeln!(
        out,
        "BT /{} {:.1} Tf {:.2} {:.2} Td {} Tj ET",
        font,
        size,
        x,
        top_to_pdf(y_top),
        pdf_string(text)
    );
}

/// Helvetica advance widths for printable ASCII, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const ELLIPSIS: &str = "...";

/// Upper bound of the Helvetica advance width of `c`, in 1/1000 em.
fn glyph_width(c: char) -> u16 {
    match c {
        ' '..='~' => HELVETICA_WIDTHS[c as usize - 0x20],
        'Æ' | 'Œ' => 1000,
        'æ' | 'œ' => 944,
        c if c.is_alphabetic() && c.is_uppercase() => 778,
        c if c.is_alphabetic() => 611,
        _ => 1000,
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(glyph_width(c))).sum();
    units as f32 * size / 1000.0
}

fn fit_text(text: &str, max_width: f32, size: f32) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if text_width(&flat, size) <= max_width {
        return flat;
    }

    let ellipsis = text_width(ELLIPSIS, size);
    let budget = if ellipsis < max_width {
        max_width - ellipsis
    } else {
        max_width
    };

    let mut width = 0.0;
    let mut truncated = String::new();
    for c in flat.chars() {
        width += f32::from(glyph_width(c)) * size / 1000.0;
        if width > budget {
            break;
        }
        truncated.push(c);
    }
    if ellipsis < max_width {
        truncated.push_str(ELLIPSIS);
    }
    truncated
}

fn table_row(out: &mut String, cells: &[String], top: f32, col_width: f32, header: bool) {
    let y = top_to_pdf(top + ROW_HEIGHT);

    if header {
        let (r, g, b) = HEADER_FILL;
        let _ = writeln!(out, "{:.3} {:.3} {:.3} rg", r, g, b);
        let _ = writeln!(
            out,
            "{:.2} {:.2} {:.2} {:.2} re f",
            MARGIN,
            y,
            col_width * cells.len() as f32,
            ROW_HEIGHT
        );
    }

    out.push_str("0.5 G 0.3 w\n");
    for col in 0..cells.len() {
        let x = MARGIN + col_width * col as f32;
        let _ = writeln!(out, "{:.2} {:.2} {:.2} {:.2} re S", x, y, col_width, ROW_HEIGHT);
    }

    out.push_str(if header { "1 g\n" } else { "0 g\n" });
    let font = if header { "F2" } else { "F1" };
    let baseline = top + (ROW_HEIGHT + CELL_SIZE * 0.7) / 2.0;
    for (col, cell) in cells.iter().enumerate() {
        let x = MARGIN + col_width * col as f32 + CELL_PADDING;
        let text = fit_text(cell, col_width - 2.0 * CELL_PADDING, CELL_SIZE);
        text_op(out, font, CELL_SIZE, x, baseline, &text);
    }
}

fn page_content(layout: &PdfLayout, page_index: usize) -> String {
    let page = &layout.pages[page_index];
    let mut out = String::new();

    if page_index == 0 {
        out.push_str("0 g\n");
        text_op(&mut out, "F2", TITLE_SIZE, MARGIN, TITLE_Y, &layout.title);
        text_op(&mut out, "F1", DATE_SIZE, MARGIN, DATE_Y, &layout.date_line);
    }

    if layout.headers.is_empty() {
        return out;
    }
    let col_width = (PAGE_WIDTH - 2.0 * MARGIN) / layout.headers.len() as f32;

    table_row(&mut out, &layout.headers, page.table_top, col_width, true);
    for (index, row) in page.rows.iter().enumerate() {
        let top = page.table_top + ROW_HEIGHT * (index + 1) as f32;
        table_row(&mut out, row, top, col_width, false);
    }
    out
}

/// Serializes a layout into PDF bytes with a valid cross-reference table.
pub fn render(layout: &PdfLayout) -> Vec<u8> {
    // 物件編號：1 目錄、2 頁樹、3/4 字型、5 資訊，之後每頁兩個物件
    let page_count = layout.pages.len();
    let page_ids: Vec<usize> = (0..page_count).map(|i| 6 + 2 * i).collect();

    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            page_count
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        format!(
            "<< /Producer (market-export) /Title {} >>",
            pdf_string(&layout.title)
        )
        .into_bytes(),
    ];

    for (index, page_id) in page_ids.iter().enumerate() {
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                page_id + 1
            )
            .into_bytes(),
        );

        let content = page_content(layout, index);
        let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
        stream.extend_from_slice(content.as_bytes());
        stream.extend_from_slice(b"\nendstream");
        objects.push(stream);
    }

    let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(xref, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    );
    out.extend_from_slice(xref.as_bytes());
    out
}

/// PDF literal string in WinAnsi encoding. Bytes above ASCII are written as
/// octal escapes so content streams stay 7-bit.
pub fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => match win_ansi_byte(c) {
                Some(byte) => {
                    let _ = write!(out, "\\{:03o}", byte);
                }
                None if c.is_whitespace() => out.push(' '),
                None => out.push('?'),
            },
        }
    }
    out.push(')');
    out
}

fn win_ansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    if (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    match c {
        '€' => Some(0x80),
        '‚' => Some(0x82),
        '„' => Some(0x84),
        '…' => Some(0x85),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        '™' => Some(0x99),
        _ => None,
    }
}
