
use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

use super::{Document, DocumentFormat};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("PDF could not be read: {0}")]
    Pdf(String),

    #[error("Spreadsheet could not be read: {0}")]
    Spreadsheet(String),
}

/// Flatten a document to plain text
#[inline]
pub fn extract(document: &Document) -> Result<String, ExtractError> {
    let text = match document.format {
        DocumentFormat::Pdf => extract_pdf(&document.bytes)?,
        DocumentFormat::Spreadsheet => extract_spreadsheet(&document.bytes)?,
        DocumentFormat::PlainText => decode_text(&document.bytes),
    };

    debug!(
        "Extracted {} characters from {}",
        text.chars().count(),
        document.name
    );

    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for page_number in pdf.get_pages().into_keys() {
        match pdf.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text.trim_end().to_string()),
            Ok(_) => {}
            Err(e) => debug!("No text on page {}: {}", page_number, e),
        }
    }

    Ok(pages.join("\n"))
}

fn extract_spreadsheet(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ExtractError::Spreadsheet(format!("{sheet_name}: {e}")))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        let text = rows_to_text(&rows);
        if !text.is_empty() {
            sheets.push(text);
        }
    }

    Ok(sheets.join("\n\n"))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Render a table as one line per row, labelling each value with its column
/// header from the first row. Each line ends in a full stop so the chunker
/// treats rows as sentences.
pub(crate) fn rows_to_text(rows: &[Vec<String>]) -> String {
    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };

    body.iter()
        .filter_map(|row| {
            let fields = row
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.is_empty())
                .map(|(column, value)| match header.get(column) {
                    Some(label) if !label.is_empty() => format!("{label}: {value}"),
                    _ => value.clone(),
                })
                .join(", ");

            if fields.is_empty() {
                None
            } else if fields.ends_with(['.', '!', '?']) {
                Some(fields)
            } else {
                Some(format!("{fields}."))
            }
        })
        .join("\n")
}

/// Decode bytes as UTF-8, dropping anything that is not valid text
fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER && c != '\u{feff}')
        .collect()
}
