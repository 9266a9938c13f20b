//! Input plumbing: delimiter and encoding resolution, CSV readers, and the
//! dispatch from a file path to a [`Table`].
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.tsv` → tab,
//!   everything else → comma) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **stdin**: the `-` path convention reads delimited text from standard
//!   input.
//! - **Workbooks**: `.xlsx`, `.xlsm`, `.xlsb`, `.xls` and `.ods` inputs are
//!   handed to [`crate::sheet`].

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{data::CellValue, schema::Table, sheet};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// How to turn an input file into a [`Table`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub sheet: Option<String>,
    /// Rows to discard before the header row.
    pub skip_rows: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            sheet: None,
            skip_rows: 0,
        }
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Loads `path` as a table, picking the workbook or delimited-text reader by
/// extension.
pub fn read_table(path: &Path, options: &ReadOptions) -> Result<Table> {
    let table = if !is_dash(path) && is_workbook(path) {
        sheet::read_workbook_table(path, options.sheet.as_deref(), options.skip_rows)?
    } else {
        let delimiter = resolve_input_delimiter(path, options.delimiter);
        read_delimited_table(path, delimiter, options.encoding, options.skip_rows)?
    };
    debug!(
        "Loaded {} column(s) and {} row(s) from {:?}",
        table.columns.len(),
        table.row_count(),
        path
    );
    Ok(table.with_source(path))
}

pub fn read_delimited_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    skip_rows: usize,
) -> Result<Table> {
    let mut reader = open_csv_reader_from_path(path, delimiter)?;
    let mut records = reader.byte_records().enumerate().skip(skip_rows);

    let headers = match records.next() {
        Some((idx, record)) => {
            let record = record.with_context(|| format!("Reading header row {}", idx + 1))?;
            decode_record(&record, encoding)
                .with_context(|| format!("Decoding header row {} in {path:?}", idx + 1))?
                .into_iter()
                .map(|header| header.trim().to_string())
                .collect()
        }
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for (idx, record) in records {
        let record = record.with_context(|| format!("Reading row {}", idx + 1))?;
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {} in {path:?}", idx + 1))?;
        rows.push(
            decoded
                .iter()
                .map(|field| CellValue::from_text(field))
                .collect::<Vec<_>>(),
        );
    }

    Ok(Table::from_rows(headers, rows))
}
