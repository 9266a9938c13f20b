use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    dialect::Dialect,
    output::{MetadataFormat, MetadataLayout},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Turn Word documents into spreadsheets and infer SQL schemas from tabular data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Transcribe a .docx document into a single-sheet .xlsx workbook
    Convert(ConvertArgs),
    /// Infer column types from a workbook or CSV file and emit CREATE TABLE statements
    Schema(SchemaArgs),
    /// Transcribe a .docx document, then infer schemas from the resulting workbook
    Pipeline(PipelineArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Word document to transcribe
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination workbook (.xlsx); parent directories are created as needed
    #[arg(short = 'o', long = "output", default_value = "output/WordToExcel.xlsx")]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Workbook (.xlsx, .xls, .ods) or delimited text file (.csv, .tsv, '-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub source: SourceOptions,
    #[command(flatten)]
    pub generation: GenerationOptions,
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Word document to transcribe
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Intermediate workbook path (defaults to the document path with an .xlsx extension)
    #[arg(short = 'w', long = "workbook")]
    pub workbook: Option<PathBuf>,
    /// Rows to skip before the header row of the transcribed sheet
    #[arg(long = "skip-rows", default_value_t = 0)]
    pub skip_rows: usize,
    #[command(flatten)]
    pub generation: GenerationOptions,
}

#[derive(Debug, Clone, Args)]
pub struct SourceOptions {
    /// Worksheet to read (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Rows to skip before the header row
    #[arg(long = "skip-rows", default_value_t = 0)]
    pub skip_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct GenerationOptions {
    /// Table name for the CREATE TABLE statement (defaults to the cleaned input file name)
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    /// Target dialects: mysql, postgresql, sqlite, sqlserver; anything else uses generic types
    #[arg(
        short = 'd',
        long = "dialect",
        value_parser = parse_dialect,
        value_delimiter = ',',
        action = clap::ArgAction::Append,
        default_values = ["mysql", "postgresql"]
    )]
    pub dialects: Vec<Dialect>,
    /// Directory for schema and metadata files (defaults to the input file's directory)
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Write every dialect's metadata to one column_analysis file; the last dialect written wins
    #[arg(long = "shared-metadata")]
    pub shared_metadata: bool,
    /// Metadata report format
    #[arg(long = "metadata-format", value_enum, default_value = "json")]
    pub metadata_format: MetadataFormat,
    /// Print each generated CREATE TABLE statement to stdout
    #[arg(long = "print-ddl")]
    pub print_ddl: bool,
    /// Print a per-column summary table to stdout
    #[arg(long)]
    pub summary: bool,
}

impl GenerationOptions {
    pub fn metadata_layout(&self) -> MetadataLayout {
        if self.shared_metadata {
            MetadataLayout::Shared
        } else {
            MetadataLayout::PerDialect
        }
    }
}

pub fn parse_dialect(value: &str) -> Result<Dialect, String> {
    Ok(Dialect::from_token(value))
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
