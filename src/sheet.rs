use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Range, Reader, open_workbook_auto};
use log::debug;

use crate::{data::CellValue, schema::Table};

/// Reads one worksheet (the first one unless `sheet` names another) into a
/// table whose header is the first row after `skip_rows`.
pub fn read_workbook_table(path: &Path, sheet: Option<&str>, skip_rows: usize) -> Result<Table> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(requested) => {
            if !names.iter().any(|name| name == requested) {
                bail!(
                    "Worksheet '{requested}' not found in {path:?} (available: {})",
                    names.join(", ")
                );
            }
            requested.to_string()
        }
        None => names
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Workbook {path:?} contains no worksheets"))?,
    };
    debug!("Reading worksheet '{sheet_name}' from {path:?}");
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading worksheet '{sheet_name}' from {path:?}"))?;
    Ok(table_from_range(&range, skip_rows))
}

/// `skip_rows` counts from the top of the sheet, not from the first used row.
pub fn table_from_range(range: &Range<Data>, skip_rows: usize) -> Table {
    let first_used_row = range
        .start()
        .map(|(row, _)| row as usize)
        .unwrap_or(0);
    let mut rows = range.rows().skip(skip_rows.saturating_sub(first_used_row));

    let headers = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|cell| {
                    cell_value(cell)
                        .map(|value| value.as_display())
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Table::from_rows(
        headers,
        rows.map(|row| row.iter().map(cell_value).collect::<Vec<_>>()),
    )
}

pub fn cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty => None,
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            CellValue::from_text(text)
        }
        Data::Float(value) => Some(CellValue::Number(*value)),
        Data::Int(value) => Some(CellValue::Integer(*value)),
        Data::Bool(value) => Some(CellValue::Boolean(*value)),
        Data::DateTime(stamp) if stamp.is_duration() => Some(CellValue::Number(stamp.as_f64())),
        Data::DateTime(stamp) => stamp.as_datetime().map(CellValue::DateTime),
        Data::Error(err) => Some(CellValue::Text(err.to_string())),
    }
}
