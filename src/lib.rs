pub mod analyze;
pub mod cli;
pub mod data;
pub mod dialect;
pub mod io_utils;
pub mod output;
pub mod schema;
pub mod sheet;
pub mod table;
pub mod transcribe;

use std::{
    env,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, GenerationOptions},
    dialect::Dialect,
    io_utils::ReadOptions,
    output::{MetadataLayout, OutputPlan, WrittenFiles},
    schema::{GeneratedSchema, Table},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet2sql", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Convert(args) => handle_convert(&args),
        Commands::Schema(args) => handle_schema(&args),
        Commands::Pipeline(args) => handle_pipeline(&args),
    }
}

fn handle_convert(args: &cli::ConvertArgs) -> Result<()> {
    info!(
        "Transcribing '{}' into '{}'",
        args.input.display(),
        args.output.display()
    );
    transcribe::export_document_to_workbook(&args.input, &args.output)
        .with_context(|| format!("Converting {:?} to {:?}", args.input, args.output))?;
    Ok(())
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.source.input_encoding.as_deref())?;
    let options = ReadOptions {
        delimiter: args.source.delimiter,
        encoding,
        sheet: args.source.sheet.clone(),
        skip_rows: args.source.skip_rows,
    };
    info!("Reading tabular data from '{}'", args.input.display());
    let table = io_utils::read_table(&args.input, &options)
        .with_context(|| format!("Loading table from {:?}", args.input))?;
    generate_and_persist(&table, &args.input, &args.generation)?;
    Ok(())
}

fn handle_pipeline(args: &cli::PipelineArgs) -> Result<()> {
    let workbook = args
        .workbook
        .clone()
        .unwrap_or_else(|| default_workbook_path(&args.input));
    transcribe::export_document_to_workbook(&args.input, &workbook)
        .with_context(|| format!("Converting {:?} to {:?}", args.input, workbook))?;

    let options = ReadOptions {
        sheet: Some(transcribe::WORKSHEET_NAME.to_string()),
        skip_rows: args.skip_rows,
        ..ReadOptions::default()
    };
    let table = io_utils::read_table(&workbook, &options)
        .with_context(|| format!("Loading transcribed table from {workbook:?}"))?;
    generate_and_persist(&table, &workbook, &args.generation)?;
    Ok(())
}

/// Runs schema generation for every requested dialect and writes the results.
/// Returns the generated schemas alongside the files written for each.
pub fn generate_and_persist(
    table: &Table,
    source: &Path,
    options: &GenerationOptions,
) -> Result<Vec<(GeneratedSchema, WrittenFiles)>> {
    let table_name = options
        .table
        .clone()
        .unwrap_or_else(|| schema::default_table_name(source));
    let plan = output_plan(source, options);
    let dialects = distinct_dialects(&options.dialects);

    if plan.layout == MetadataLayout::Shared && dialects.len() > 1 {
        warn!(
            "{} dialects share {:?}; it will hold the {} metadata once this run finishes",
            dialects.len(),
            plan.metadata_path(Dialect::Generic),
            dialects.last().map(Dialect::as_str).unwrap_or_default()
        );
    }

    let mut results = Vec::with_capacity(dialects.len());
    for dialect in dialects {
        let generated = schema::generate_schema(&table_name, table, dialect);
        let written = output::persist(&generated, &plan)
            .with_context(|| format!("Persisting {dialect} schema for {source:?}"))?;
        if options.print_ddl {
            println!("{}\n", generated.ddl);
        }
        if options.summary {
            crate::table::print_schema_summary(&generated);
        }
        results.push((generated, written));
    }
    Ok(results)
}

fn output_plan(source: &Path, options: &GenerationOptions) -> OutputPlan {
    let plan = match &options.output_dir {
        Some(dir) => OutputPlan::in_directory(dir.clone()),
        None => OutputPlan::beside(source),
    };
    debug!("Writing schema artifacts to {:?}", plan.directory);
    plan.with_layout(options.metadata_layout())
        .with_format(options.metadata_format)
}

fn distinct_dialects(requested: &[Dialect]) -> Vec<Dialect> {
    let mut dialects = Vec::with_capacity(requested.len());
    for dialect in requested {
        if !dialects.contains(dialect) {
            dialects.push(*dialect);
        }
    }
    if dialects.is_empty() {
        dialects.push(Dialect::Generic);
    }
    dialects
}

/// Default intermediate workbook path for a document: same directory and
/// stem, `.xlsx` extension.
pub fn default_workbook_path(document: &Path) -> PathBuf {
    document.with_extension("xlsx")
}
