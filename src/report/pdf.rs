//! Minimal PDF export.
//!
//! Lays the results mapping out top to bottom on A4 pages: a centered header
//! on every page, a shaded title per task, then `key: value` lines wrapped
//! to the page width. Text uses the built-in Helvetica fonts with
//! WinAnsiEncoding; characters outside Latin-1 are written as `?`.

use super::generator::{section_title, REPORT_TITLE};
use crate::models::{TaskOutput, TaskResults};
use chrono::Utc;
use std::io::Write;

const MM: f64 = 72.0 / 25.4;
const PAGE_WIDTH: f64 = 595.28;
const PAGE_HEIGHT: f64 = 841.89;
const MARGIN: f64 = 10.0 * MM;
const BOTTOM_MARGIN: f64 = 15.0 * MM;
const CELL_PADDING: f64 = 1.0 * MM;

const HEADER_SIZE: f64 = 14.0;
const TITLE_SIZE: f64 = 12.0;
const BODY_SIZE: f64 = 11.0;

const HEADER_HEIGHT: f64 = 10.0 * MM;
const TITLE_HEIGHT: f64 = 10.0 * MM;
const LINE_HEIGHT: f64 = 8.0 * MM;

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Encode to WinAnsi bytes, replacing anything outside printable Latin-1.
fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x09 => b' ',
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn byte_width(b: u8) -> u16 {
    match b {
        0x20..=0x7E => HELVETICA_WIDTHS[(b - 0x20) as usize],
        _ => 556,
    }
}

/// Width in points of Latin-1 bytes at the given size.
fn text_width(bytes: &[u8], size: f64) -> f64 {
    bytes.iter().map(|&b| f64::from(byte_width(b))).sum::<f64>() * size / 1000.0
}

/// Break text into lines no wider than `max_width`. Words longer than a
/// line are split between characters.
fn wrap_line(text: &[u8], max_width: f64, size: f64) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for word in text.split(|&b| b == b' ').filter(|w| !w.is_empty()) {
        let candidate_width = if current.is_empty() {
            text_width(word, size)
        } else {
            text_width(&current, size) + text_width(b" ", size) + text_width(word, size)
        };

        if candidate_width <= max_width {
            if !current.is_empty() {
                current.push(b' ');
            }
            current.extend_from_slice(word);
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if text_width(word, size) <= max_width {
            current.extend_from_slice(word);
            continue;
        }

        for &b in word {
            if !current.is_empty() && text_width(&current, size) + text_width(&[b], size) > max_width
            {
                lines.push(std::mem::take(&mut current));
            }
            current.push(b);
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if matches!(b, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

/// Page-by-page content builder. `y` is measured from the top edge.
struct PdfWriter {
    pages: Vec<Vec<u8>>,
    current: Vec<u8>,
    y: f64,
}

impl PdfWriter {
    fn new() -> Self {
        let mut writer = Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: MARGIN,
        };
        writer.add_page();
        writer
    }

    fn add_page(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }
        self.y = MARGIN;
        self.header();
    }

    fn header(&mut self) {
        let text = to_latin1(REPORT_TITLE);
        let x = (PAGE_WIDTH - text_width(&text, HEADER_SIZE)) / 2.0;
        self.text_at(x, HEADER_HEIGHT, Font::Bold, HEADER_SIZE, &text);
        self.y += HEADER_HEIGHT;
    }

    fn ensure_space(&mut self, height: f64) {
        if self.y + height > PAGE_HEIGHT - BOTTOM_MARGIN {
            self.add_page();
        }
    }

    /// Text vertically centered in a cell of `height` starting at `self.y`.
    fn text_at(&mut self, x: f64, height: f64, font: Font, size: f64, text: &[u8]) {
        let baseline = PAGE_HEIGHT - (self.y + height / 2.0 + 0.3 * size);
        let _ = write!(
            self.current,
            "BT /{} {:.2} Tf {:.2} {:.2} Td (",
            font.resource(),
            size,
            x,
            baseline
        );
        self.current.extend_from_slice(&escape(text));
        self.current.extend_from_slice(b") Tj ET\n");
    }

    fn chapter_title(&mut self, title: &str) {
        self.ensure_space(TITLE_HEIGHT);
        let width = PAGE_WIDTH - 2.0 * MARGIN;
        let bottom = PAGE_HEIGHT - (self.y + TITLE_HEIGHT);
        let _ = writeln!(
            self.current,
            "0.941 0.941 0.941 rg {:.2} {:.2} {:.2} {:.2} re f 0 g",
            MARGIN, bottom, width, TITLE_HEIGHT
        );
        let text = to_latin1(title);
        self.text_at(MARGIN + CELL_PADDING, TITLE_HEIGHT, Font::Bold, TITLE_SIZE, &text);
        self.y += TITLE_HEIGHT;
    }

    /// Wrapped body text; embedded newlines start new lines.
    fn multi_line(&mut self, text: &str) {
        let max_width = PAGE_WIDTH - 2.0 * MARGIN - 2.0 * CELL_PADDING;
        for paragraph in text.split('\n') {
            let bytes = to_latin1(paragraph.trim_end_matches('\r'));
            for line in wrap_line(&bytes, max_width, BODY_SIZE) {
                self.ensure_space(LINE_HEIGHT);
                self.text_at(MARGIN + CELL_PADDING, LINE_HEIGHT, Font::Regular, BODY_SIZE, &line);
                self.y += LINE_HEIGHT;
            }
        }
    }

    fn line_break(&mut self) {
        self.y += LINE_HEIGHT;
    }

    fn finish(mut self) -> Vec<u8> {
        self.pages.push(std::mem::take(&mut self.current));
        assemble(&self.pages)
    }
}

/// Serialize page content streams into a complete document with xref table.
fn assemble(pages: &[Vec<u8>]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = Vec::new();

    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    // 1 catalog, 2 pages, 3/4 fonts, 5 info, then (page, content) pairs.
    let first_page_id = 6;
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", first_page_id + 2 * i))
        .collect();

    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        format!(
            "<< /Title ({}) /Producer (DataSage) /CreationDate (D:{}Z) >>",
            REPORT_TITLE,
            Utc::now().format("%Y%m%d%H%M%S")
        )
        .into_bytes(),
    ];

    for (i, content) in pages.iter().enumerate() {
        let content_id = first_page_id + 2 * i + 1;
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH, PAGE_HEIGHT, content_id
            )
            .into_bytes(),
        );
        let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
        stream.extend_from_slice(content);
        stream.extend_from_slice(b"\nendstream");
        objects.push(stream);
    }

    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );

    out
}

/// Render the results mapping as a PDF document.
pub fn generate_pdf_report(results: &TaskResults) -> Vec<u8> {
    let mut pdf = PdfWriter::new();

    for (key, output) in results.iter() {
        pdf.chapter_title(&section_title(key));
        match output {
            TaskOutput::Narrative(text) => pdf.multi_line(text),
            other => {
                for (k, v) in other.display_pairs() {
                    pdf.multi_line(&format!("{}: {}", k, v));
                }
            }
        }
        pdf.line_break();
    }

    pdf.finish()
}
