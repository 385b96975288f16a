//! Plain-text extraction for uploaded requirement documents.

use crate::domain::error::{AppError, Result};
use calamine::{open_workbook_from_rs, DataType, Reader, Xlsx};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

pub trait TextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

pub struct TxtExtractor;
pub struct PdfExtractor;
pub struct DocxExtractor;
pub struct XlsxExtractor;

impl TextExtractor for TxtExtractor {
    /// Honors a BOM when present; otherwise UTF-8, falling back to Windows-1252.
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            return Ok(text.into_owned());
        }

        let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
        if !had_errors {
            return Ok(text.into_owned());
        }
        let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
        Ok(text.into_owned())
    }
}

impl TextExtractor for PdfExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|e| AppError::ParseError(format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) if !text.trim().is_empty() => pages.push(text.trim().to_string()),
                Ok(_) => {}
                Err(e) => debug!(page = page_number, error = %e, "Skipping unreadable PDF page"),
            }
        }
        Ok(pages.join("\n"))
    }
}

impl TextExtractor for DocxExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let docx = docx_rs::read_docx(bytes)
            .map_err(|e| AppError::ParseError(format!("Failed to parse DOCX file: {}", e)))?;

        let mut lines = Vec::new();
        for child in &docx.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(paragraph) => {
                    let text = paragraph_text(paragraph);
                    if !text.trim().is_empty() {
                        lines.push(text);
                    }
                }
                docx_rs::DocumentChild::Table(table) => table_lines(table, &mut lines),
                _ => {}
            }
        }
        Ok(lines.join("\n"))
    }
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut buffer = String::new();
    for child in &paragraph.children {
        paragraph_child_text(child, &mut buffer);
    }
    buffer
}

fn paragraph_child_text(child: &docx_rs::ParagraphChild, buffer: &mut String) {
    match child {
        docx_rs::ParagraphChild::Run(run) => run_text(run, buffer),
        docx_rs::ParagraphChild::Hyperlink(link) => {
            for link_child in &link.children {
                paragraph_child_text(link_child, buffer);
            }
        }
        docx_rs::ParagraphChild::Insert(insert) => {
            for insert_child in &insert.children {
                if let docx_rs::InsertChild::Run(run) = insert_child {
                    run_text(run, buffer);
                }
            }
        }
        _ => {}
    }
}

fn run_text(run: &docx_rs::Run, buffer: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(text) => buffer.push_str(&text.text),
            docx_rs::RunChild::Tab(_) => buffer.push('\t'),
            docx_rs::RunChild::Break(_) => buffer.push('\n'),
            _ => {}
        }
    }
}

/// One line per table row, non-empty cells joined with ` | `.
fn table_lines(table: &docx_rs::Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        let docx_rs::TableChild::TableRow(row) = row;
        let mut cells = Vec::new();
        for cell in &row.cells {
            let docx_rs::TableRowChild::TableCell(cell) = cell;
            let mut parts = Vec::new();
            for content in &cell.children {
                if let docx_rs::TableCellContent::Paragraph(paragraph) = content {
                    let text = paragraph_text(paragraph);
                    if !text.trim().is_empty() {
                        parts.push(text);
                    }
                }
            }
            if !parts.is_empty() {
                cells.push(parts.join(" "));
            }
        }
        if !cells.is_empty() {
            lines.push(cells.join(" | "));
        }
    }
}

impl TextExtractor for XlsxExtractor {
    /// First worksheet, one tab-separated line per row.
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| AppError::ParseError(format!("Failed to open Excel file: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AppError::ParseError("No worksheet found".to_string()))?
            .map_err(|e| AppError::ParseError(format!("Failed to read Excel range: {}", e)))?;

        let lines: Vec<String> = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        cell.as_string()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| cell.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .filter(|line| !line.trim().is_empty())
            .collect();
        Ok(lines.join("\n"))
    }
}

/// Extractor for a file name's extension. Unknown extensions are read as text.
pub fn extractor_for(file_name: &str) -> Box<dyn TextExtractor + Send + Sync> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => Box::new(PdfExtractor),
        "docx" => Box::new(DocxExtractor),
        "xlsx" | "xlsm" => Box::new(XlsxExtractor),
        _ => Box::new(TxtExtractor),
    }
}

/// Extracted text, or an inline `[Error reading file: ...]` marker on failure.
pub fn extract_for(file_name: &str, bytes: &[u8]) -> String {
    match extractor_for(file_name).extract_text(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(file = %file_name, error = %err, "Failed to extract uploaded file");
            format!("[Error reading file: {}]", err)
        }
    }
}
