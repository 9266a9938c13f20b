//! Table model and `CREATE TABLE` generation.
//!
//! A [`Table`] is an ordered list of named columns, each an ordered list of
//! optional cells. [`generate_schema`] runs the column analyzer over every
//! column in declaration order and assembles the DDL plus the per-column
//! metadata report. Nothing here touches the filesystem; see
//! [`crate::output`] for persistence.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    analyze::{AnalyzedColumn, ColumnMetadata, InferredType, analyze_column},
    data::{CellValue, clean_column_name},
    dialect::Dialect,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<CellValue>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<CellValue>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Builds a column from raw text, treating blank strings as null.
    pub fn from_text<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        Self::new(
            name,
            values
                .iter()
                .map(|value| CellValue::from_text(value.as_ref()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// File the table was read from; persistence writes beside it.
    pub source: Option<PathBuf>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            source: None,
            columns,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Pivots row-major cells into columns. Short rows are padded with nulls;
    /// cells beyond the header get synthetic `column_<n>` headers.
    pub fn from_rows<I>(headers: Vec<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<Option<CellValue>>>,
    {
        let mut columns = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::new()))
            .collect::<Vec<_>>();
        let mut row_count = 0usize;
        for row in rows {
            while columns.len() < row.len() {
                let name = format!("column_{}", columns.len() + 1);
                columns.push(Column::new(name, vec![None; row_count]));
            }
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().flatten());
            }
            row_count += 1;
        }
        Self::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.values.len())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    /// Cleaned SQL identifier.
    pub name: String,
    pub inferred: InferredType,
    pub sql_type: String,
    pub metadata: ColumnMetadata,
}

impl SchemaColumn {
    pub fn nullability(&self) -> &'static str {
        if self.metadata.is_nullable() {
            "NULL"
        } else {
            "NOT NULL"
        }
    }

    pub fn definition(&self) -> String {
        format!("  {} {} {}", self.name, self.sql_type, self.nullability())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSchema {
    pub table_name: String,
    pub dialect: Dialect,
    pub ddl: String,
    pub columns: Vec<SchemaColumn>,
}

impl GeneratedSchema {
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Serializable view mapping cleaned column names to their metadata, in
    /// column order.
    pub fn metadata_report(&self) -> MetadataReport<'_> {
        MetadataReport(&self.columns)
    }
}

pub struct MetadataReport<'a>(&'a [SchemaColumn]);

impl Serialize for MetadataReport<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for column in self.0 {
            map.serialize_entry(&column.name, &column.metadata)?;
        }
        map.end()
    }
}

pub fn generate_schema(table_name: &str, table: &Table, dialect: Dialect) -> GeneratedSchema {
    let raw_names = table
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>();
    let names = assign_column_names(&raw_names);

    let columns = table
        .columns
        .iter()
        .zip(names)
        .map(|(column, name)| {
            let AnalyzedColumn {
                inferred,
                sql_type,
                metadata,
            } = analyze_column(&column.name, &column.values, dialect);
            SchemaColumn {
                name,
                inferred,
                sql_type,
                metadata,
            }
        })
        .collect::<Vec<_>>();

    let ddl = render_create_table(table_name, &columns);
    info!(
        "Generated {dialect} schema for table '{table_name}' with {} column(s)",
        columns.len()
    );
    GeneratedSchema {
        table_name: table_name.to_string(),
        dialect,
        ddl,
        columns,
    }
}

pub fn render_create_table(table_name: &str, columns: &[SchemaColumn]) -> String {
    let definitions = columns
        .iter()
        .map(SchemaColumn::definition)
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE {table_name} (\n{definitions}\n);")
}

/// Cleans every header into an identifier. Headers that clean to nothing
/// become `column_<position>`; repeats get `_2`, `_3`, ... suffixes.
pub fn assign_column_names(headers: &[&str]) -> Vec<String> {
    let mut used = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let mut base = clean_column_name(header);
            if base.is_empty() {
                base = format!("column_{}", idx + 1);
            }
            let mut candidate = base.clone();
            let mut suffix = 2usize;
            while !used.insert(candidate.clone()) {
                candidate = format!("{base}_{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

/// Table name derived from a source file stem, e.g. `Payroll 2024.xlsx`
/// becomes `payroll_2024`.
pub fn default_table_name(path: &Path) -> String {
    let cleaned = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(clean_column_name)
        .unwrap_or_default();
    if cleaned.is_empty() {
        "imported_table".to_string()
    } else {
        cleaned
    }
}
