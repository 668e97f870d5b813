//! Delimited worksheet reading and writing
//!
//! **Format:**
//! - UTF-8, optional byte-order mark
//! - `;` or `,` delimited; auto-detection picks `;` when the header line has
//!   more semicolons than commas
//! - Unknown columns are carried through unchanged

use crate::files::write_atomic;
use crate::models::{Worksheet, WorksheetRow};
use csv::{ReaderBuilder, WriterBuilder};
use qlib_common::config::WorksheetConfig;
use qlib_common::{Error, Result};
use std::path::Path;
use tracing::info;

const BOM: &str = "\u{feff}";

/// Pick the delimiter from the header line
pub fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Parse worksheet text.
pub fn parse_worksheet(content: &str, config: &WorksheetConfig) -> Result<Worksheet> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    if content.trim().is_empty() {
        return Err(Error::InvalidInput("Worksheet is empty".to_string()));
    }

    let delimiter = config.delimiter.as_byte().unwrap_or_else(|| detect_delimiter(content));
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let rows = reader
        .records()
        .map(|record| Ok(WorksheetRow::new(record?.iter().map(str::to_string).collect())))
        .collect::<Result<Vec<_>>>()?;

    Worksheet::new(headers, rows, &config.columns, delimiter)
}

pub fn read_worksheet<P: AsRef<Path>>(path: P, config: &WorksheetConfig) -> Result<Worksheet> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!("Worksheet {}", path.display())),
        _ => Error::Io(e),
    })?;
    let sheet = parse_worksheet(&content, config)?;

    info!(
        path = %path.display(),
        rows = sheet.rows.len(),
        delimiter = %(sheet.delimiter as char),
        "Loaded worksheet"
    );
    Ok(sheet)
}

/// Serialize with the worksheet's own header and delimiter
pub fn render_worksheet(sheet: &Worksheet, write_bom: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    if write_bom {
        out.extend_from_slice(BOM.as_bytes());
    }

    let mut writer = WriterBuilder::new()
        .delimiter(sheet.delimiter)
        .flexible(true)
        .from_writer(out);
    writer.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        writer.write_record(&row.fields)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
}

pub fn write_worksheet<P: AsRef<Path>>(path: P, sheet: &Worksheet, write_bom: bool) -> Result<()> {
    let path = path.as_ref();
    write_atomic(path, &render_worksheet(sheet, write_bom)?)?;
    info!(path = %path.display(), rows = sheet.rows.len(), "Wrote worksheet");
    Ok(())
}
