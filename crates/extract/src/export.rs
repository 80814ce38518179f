use std::path::Path;

use releve_core::{ParsedStatement, TABLE_COLUMNS};
use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Worksheet holding the exported transactions.
pub const SHEET_NAME: &str = "Transactions";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Write the statement as pretty-printed UTF-8 JSON, creating parent directories.
pub fn write_json(statement: &ParsedStatement, path: &Path) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(statement)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Write the transaction table (Date, Description, Amount, Balance) as CSV.
///
/// Only rows with both a date and an amount are written.
pub fn write_table_csv(statement: &ParsedStatement, path: &Path) -> Result<usize, ExportError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(TABLE_COLUMNS)?;
    let rows = statement.table_rows();
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

/// Write the transaction table as an `.xlsx` workbook with a bold, centred
/// header row and each column sized to its longest cell plus two.
pub fn write_table_xlsx(statement: &ParsedStatement, path: &Path) -> Result<usize, ExportError> {
    ensure_parent(path)?;
    let rows = statement.table_rows();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header = Format::new().set_bold().set_align(FormatAlign::Center);
    for (col, title) in TABLE_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            sheet.write_string(r as u32 + 1, col as u16, value)?;
        }
    }

    for (col, title) in TABLE_COLUMNS.iter().enumerate() {
        let longest = rows
            .iter()
            .map(|row| row[col].chars().count())
            .chain(std::iter::once(title.chars().count()))
            .max()
            .unwrap_or(0);
        sheet.set_column_width(col as u16, (longest + 2) as f64)?;
    }

    workbook.save(path)?;
    Ok(rows.len())
}

/// File-name-safe version of `name`.
///
/// Accents are decomposed and dropped along with any other non-ASCII
/// character; what remains outside `[A-Za-z0-9_-. ]` becomes `_`.
pub fn slugify_filename(name: &str) -> String {
    name.nfkd()
        .filter(char::is_ascii)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
