//! Report exports: Markdown, JSON and PDF renderings of a results mapping.

pub mod generator;
pub mod pdf;

pub use generator::{generate_json_report, generate_markdown_report, section_title, REPORT_TITLE};
pub use pdf::generate_pdf_report;
