//! Writes generated schemas to disk.
//!
//! Each dialect gets `schema_<dialect>.sql`. Metadata goes to
//! `column_analysis_<dialect>.json` by default; with
//! [`MetadataLayout::Shared`] every dialect writes the same
//! `column_analysis.json`, so the last run against a directory wins.
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! failure never leaves a truncated artifact behind.

use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use log::{info, warn};
use thiserror::Error;

use crate::{dialect::Dialect, schema::GeneratedSchema};

pub const SHARED_METADATA_STEM: &str = "column_analysis";

/// Requested mode for newly created artifacts; the process umask still applies.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o666;

/// Where per-dialect metadata reports land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataLayout {
    /// `column_analysis_<dialect>.<ext>`
    #[default]
    PerDialect,
    /// `column_analysis.<ext>`, overwritten by every dialect
    Shared,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum MetadataFormat {
    #[default]
    Json,
    Yaml,
}

impl MetadataFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MetadataFormat::Json => "json",
            MetadataFormat::Yaml => "yml",
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Creating output directory {path:?} for {dialect} schema")]
    CreateDir {
        path: PathBuf,
        dialect: Dialect,
        #[source]
        source: io::Error,
    },
    #[error("Writing {path:?} for {dialect} schema")]
    Write {
        path: PathBuf,
        dialect: Dialect,
        #[source]
        source: io::Error,
    },
    #[error("Serializing {dialect} column metadata as JSON")]
    Json {
        dialect: Dialect,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serializing {dialect} column metadata as YAML")]
    Yaml {
        dialect: Dialect,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub directory: PathBuf,
    pub layout: MetadataLayout,
    pub format: MetadataFormat,
}

impl OutputPlan {
    /// Plans output into the directory that holds `source`.
    pub fn beside(source: &Path) -> Self {
        let directory = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::in_directory(directory)
    }

    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            layout: MetadataLayout::PerDialect,
            format: MetadataFormat::Json,
        }
    }

    pub fn with_layout(mut self, layout: MetadataLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_format(mut self, format: MetadataFormat) -> Self {
        self.format = format;
        self
    }

    pub fn schema_path(&self, dialect: Dialect) -> PathBuf {
        self.directory.join(format!("schema_{dialect}.sql"))
    }

    pub fn metadata_path(&self, dialect: Dialect) -> PathBuf {
        let stem = match self.layout {
            MetadataLayout::PerDialect => format!("{SHARED_METADATA_STEM}_{dialect}"),
            MetadataLayout::Shared => SHARED_METADATA_STEM.to_string(),
        };
        self.directory
            .join(format!("{stem}.{}", self.format.extension()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub schema: PathBuf,
    pub metadata: PathBuf,
}

pub fn persist(schema: &GeneratedSchema, plan: &OutputPlan) -> Result<WrittenFiles, OutputError> {
    let dialect = schema.dialect;
    fs::create_dir_all(&plan.directory).map_err(|source| OutputError::CreateDir {
        path: plan.directory.clone(),
        dialect,
        source,
    })?;

    let schema_path = plan.schema_path(dialect);
    write_atomic(&schema_path, schema.ddl.as_bytes()).map_err(|source| OutputError::Write {
        path: schema_path.clone(),
        dialect,
        source,
    })?;

    let metadata_path = plan.metadata_path(dialect);
    let report = schema.metadata_report();
    let encoded = match plan.format {
        MetadataFormat::Json => serde_json::to_vec_pretty(&report)
            .map_err(|source| OutputError::Json { dialect, source })?,
        MetadataFormat::Yaml => serde_yaml::to_string(&report)
            .map_err(|source| OutputError::Yaml { dialect, source })?
            .into_bytes(),
    };
    if plan.layout == MetadataLayout::Shared && metadata_path.exists() {
        warn!(
            "Overwriting shared metadata file {:?} with {dialect} results",
            metadata_path
        );
    }
    write_atomic(&metadata_path, &encoded).map_err(|source| OutputError::Write {
        path: metadata_path.clone(),
        dialect,
        source,
    })?;

    info!(
        "Wrote {dialect} schema to {:?} and metadata to {:?}",
        schema_path, metadata_path
    );
    Ok(WrittenFiles {
        schema: schema_path,
        metadata: metadata_path,
    })
}

/// Writes `contents` to a temporary file next to `path` and renames it over
/// `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = staging_builder(path).tempfile_in(directory)?;
    staged.write_all(contents)?;
    staged.flush()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Staged files take the target's current permissions, or the mode a plain
/// `fs::write` would create, instead of the private 0600 temp-file default.
#[cfg(unix)]
fn staging_builder(target: &Path) -> tempfile::Builder<'static, 'static> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = fs::metadata(target)
        .map(|metadata| metadata.permissions())
        .unwrap_or_else(|_| fs::Permissions::from_mode(NEW_FILE_MODE));
    let mut builder = tempfile::Builder::new();
    builder.permissions(permissions);
    builder
}

#[cfg(not(unix))]
fn staging_builder(_target: &Path) -> tempfile::Builder<'static, 'static> {
    tempfile::Builder::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_beside_uses_source_directory() {
        let plan = OutputPlan::beside(Path::new("/data/in/payroll.xlsx"));
        assert_eq!(plan.directory, PathBuf::from("/data/in"));
        assert_eq!(
            plan.schema_path(Dialect::MySql),
            PathBuf::from("/data/in/schema_mysql.sql")
        );
        assert_eq!(
            plan.metadata_path(Dialect::MySql),
            PathBuf::from("/data/in/column_analysis_mysql.json")
        );

        let bare = OutputPlan::beside(Path::new("payroll.xlsx"));
        assert_eq!(bare.directory, PathBuf::from("."));
    }

    #[test]
    fn shared_layout_uses_single_metadata_file() {
        let plan = OutputPlan::in_directory("/out")
            .with_layout(MetadataLayout::Shared)
            .with_format(MetadataFormat::Yaml);
        assert_eq!(
            plan.metadata_path(Dialect::PostgreSql),
            PathBuf::from("/out/column_analysis.yml")
        );
        assert_eq!(
            plan.metadata_path(Dialect::Sqlite),
            plan.metadata_path(Dialect::PostgreSql)
        );
    }

    #[test]
    fn write_atomic_replaces_existing_contents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("schema_generic.sql");
        fs::write(&path, "old contents that are longer").expect("seed");
        write_atomic(&path, b"new").expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "new");
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_creates_files_with_plain_write_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let plain = dir.path().join("plain.sql");
        fs::write(&plain, "x").expect("plain write");
        let staged = dir.path().join("schema_mysql.sql");
        write_atomic(&staged, b"x").expect("atomic write");

        let mode = |path: &Path| fs::metadata(path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode(&staged), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("column_analysis_mysql.json");
        fs::write(&path, "{}").expect("seed");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod");
        write_atomic(&path, b"{ }").expect("atomic write");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
