use crate::core::{Snapshot, SnapshotEntry};
use crate::utils::error::{Result, TrackerError};
use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;

const SKU_COLUMN: u32 = 0;
const NAME_COLUMN: u32 = 1;

/// Parses the marketplace export: first sheet, header on row 1,
/// columns code / name / manufacturer (the last one is not used).
pub fn parse_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TrackerError::InvalidSnapshot {
            message: "workbook has no worksheets".to_string(),
        })??;

    let mut snapshot = Snapshot::new();
    let Some((last_row, _)) = range.end() else {
        tracing::warn!("Worksheet is empty, snapshot has no entries");
        return Ok(snapshot);
    };

    let mut skipped = 0usize;
    // 第一列是標題
    for row in 1..=last_row {
        let sku = range.get_value((row, SKU_COLUMN)).and_then(cell_text);
        let Some(sku) = sku else {
            skipped += 1;
            continue;
        };
        let name = range
            .get_value((row, NAME_COLUMN))
            .and_then(cell_text)
            .unwrap_or_default();

        snapshot.insert(SnapshotEntry { sku, name });
    }

    tracing::debug!(
        "Parsed {} unique SKU from {} data rows ({} without code)",
        snapshot.len(),
        last_row,
        skipped
    );
    Ok(snapshot)
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // 數字型 SKU 在 Excel 會變成 12345.0
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn workbook_bytes(rows: &[(&str, &str)]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Артикул").unwrap();
        sheet.write_string(0, 1, "Название").unwrap();
        sheet.write_string(0, 2, "Производитель").unwrap();
        for (i, (sku, name)) in rows.iter().enumerate() {
            let row = (i + 1) as u32;
            if !sku.is_empty() {
                sheet.write_string(row, 0, *sku).unwrap();
            }
            sheet.write_string(row, 1, *name).unwrap();
            sheet.write_string(row, 2, "Acme").unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_parses_rows_after_header() {
        let bytes = workbook_bytes(&[("100200", "Kettle"), ("100300", "Toaster")]);
        let snapshot = parse_snapshot(&bytes).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("100200").unwrap().name, "Kettle");
        assert!(!snapshot.contains("Артикул"));
    }

    #[test]
    fn test_skips_rows_without_code_and_keeps_last_duplicate() {
        let bytes = workbook_bytes(&[
            ("A-1", "old name"),
            ("", "orphan"),
            ("  A-2 ", " spaced "),
            ("A-1", "new name"),
        ]);
        let snapshot = parse_snapshot(&bytes).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("A-1").unwrap().name, "new name");
        assert_eq!(snapshot.get("A-2").unwrap().name, "spaced");
    }

    #[test]
    fn test_numeric_codes_have_no_fraction() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "sku").unwrap();
        sheet.write_number(1, 0, 555001.0).unwrap();
        sheet.write_string(1, 1, "Numeric").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let snapshot = parse_snapshot(&bytes).unwrap();
        assert_eq!(snapshot.get("555001").unwrap().name, "Numeric");
    }

    #[test]
    fn test_header_only_sheet_is_empty_snapshot() {
        let bytes = workbook_bytes(&[]);
        assert!(parse_snapshot(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = parse_snapshot(b"<html>login</html>").unwrap_err();
        assert!(matches!(err, TrackerError::SpreadsheetError(_)));
    }
}
