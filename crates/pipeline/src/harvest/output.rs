//! Writing harvested rows as CSV or JSON.

use std::path::Path;

use docdesk_core::params::OutputFormat;

use super::processors::{ListingRow, CSV_FIELDS};

/// UTF-8 byte order mark, so spreadsheet tools pick the right encoding.
const UTF8_BOM: &str = "\u{feff}";

/// Render rows in `format`.
pub fn render(rows: &[ListingRow], format: OutputFormat) -> Result<Vec<u8>, serde_json::Error> {
    match format {
        OutputFormat::Csv => Ok(render_csv(rows).into_bytes()),
        OutputFormat::Json => serde_json::to_vec_pretty(rows),
    }
}

/// Render rows and write them to `path`.
pub fn write_rows(path: &Path, rows: &[ListingRow], format: OutputFormat) -> std::io::Result<()> {
    let bytes = render(rows, format).map_err(std::io::Error::other)?;
    std::fs::write(path, bytes)
}

/// CSV with BOM, header line, CRLF line endings and rows numbered from 1.
pub fn render_csv(rows: &[ListingRow]) -> String {
    let mut out = String::from(UTF8_BOM);
    push_line(&mut out, CSV_FIELDS.iter().copied());
    for (idx, row) in rows.iter().enumerate() {
        let cells = row.csv_cells(idx + 1);
        push_line(&mut out, cells.iter().map(String::as_str));
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells.map(escape_cell).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Quote a cell when it holds a delimiter, quote or line break.
fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
