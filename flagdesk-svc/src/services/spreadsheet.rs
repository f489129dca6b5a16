//! Spreadsheet manifest parsing
//!
//! CSV through `csv`, the Excel family (xlsx, xlsm, xlsb, xls, ods) through
//! `calamine`. First worksheet only; the first row is the header and each
//! following row becomes one raw row keyed by those headers. Fully blank
//! rows are skipped. No network, no AI call.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use thiserror::Error;

use flagdesk_common::record::float_cell_text;
use flagdesk_common::RawExtractedRow;

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook parse error: {0}")]
    Workbook(String),

    #[error("Workbook has no worksheets")]
    NoWorksheet,
}

/// Parse CSV bytes into raw rows
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawExtractedRow>, SpreadsheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if let Some(row) = zip_row(&headers, cells) {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Parse an Excel-family workbook into raw rows
pub fn parse_workbook(bytes: Vec<u8>) -> Result<Vec<RawExtractedRow>, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| SpreadsheetError::Workbook(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)?
        .map_err(|e| SpreadsheetError::Workbook(e.to_string()))?;

    let mut grid = range.rows();
    let headers: Vec<String> = match grid.next() {
        Some(header_row) => header_row.iter().map(cell_text).collect(),
        None => return Ok(Vec::new()),
    };

    Ok(grid
        .filter_map(|cells| zip_row(&headers, cells.iter().map(cell_text).collect()))
        .collect())
}

/// Pair cells with headers; `None` for a fully blank row
fn zip_row(headers: &[String], cells: Vec<String>) -> Option<RawExtractedRow> {
    if cells.iter().all(|cell| cell.trim().is_empty()) {
        return None;
    }

    Some(
        headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.trim().is_empty())
            .map(|(col, header)| {
                (
                    header.clone(),
                    cells.get(col).cloned().unwrap_or_default(),
                )
            })
            .collect(),
    )
}

/// Cell as text; whole floats lose their fractional part
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => float_cell_text(*f),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_header_driven() {
        let csv = b"Order #,Flag,Truck,Colour\n998877660351,7,IN-4,Red\n112233445566,8,IN-5,Blue\n";
        let rows = parse_csv(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Order #"), Some("998877660351"));
        assert_eq!(rows[1].get("Colour"), Some("Blue"));
    }

    #[test]
    fn test_parse_csv_short_rows_and_blank_lines() {
        let csv = b"FullOrder,Color\n  42  \n,\n99,Green\n";
        let rows = parse_csv(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("FullOrder"), Some("42"));
        assert_eq!(rows[0].get("Color"), Some(""));
        assert_eq!(rows[1].get("Color"), Some("Green"));
    }

    #[test]
    fn test_parse_csv_header_only() {
        assert!(parse_csv(b"FullOrder,Color\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_workbook_rejects_garbage() {
        let result = parse_workbook(b"definitely not a workbook".to_vec());
        assert!(matches!(result, Err(SpreadsheetError::Workbook(_))));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(998877660351.0)), "998877660351");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Int(351)), "351");
        assert_eq!(cell_text(&Data::String(" Red ".to_string())), "Red");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
