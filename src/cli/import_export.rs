use std::path::PathBuf;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::error::AffinityError;
use crate::model::Rating;
use crate::store::{RatingsSource, SqliteRatingsStore};

/// How imported rows combine with the existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Drop existing rows first.
    Replace,
    /// Keep existing rows.
    Append,
}

/// Configuration for importing ratings from a CSV file.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// CSV file to read.
    pub path: PathBuf,
    /// Header of the user id column.
    pub user_column: String,
    /// Header of the item id column.
    pub item_column: String,
    /// Header of the rating column.
    pub rating_column: String,
    /// Replace or append.
    pub mode: ImportMode,
    /// Skip rows that fail validation instead of aborting.
    pub skip_invalid: bool,
}

impl ImportConfig {
    /// Defaults to the `user_id,item_id,rating` layout, replacing existing rows.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            user_column: "user_id".into(),
            item_column: "item_id".into(),
            rating_column: "rating".into(),
            mode: ImportMode::Replace,
            skip_invalid: false,
        }
    }
}

/// Counts from an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    /// Data rows read from the file.
    pub rows_read: u64,
    /// Rows written to the store.
    pub rows_imported: u64,
    /// Rows rejected by validation (only with `skip_invalid`).
    pub rows_skipped: u64,
}

/// Configuration for exporting the ratings table.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output CSV path.
    pub out: PathBuf,
}

/// Counts from an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExportSummary {
    /// Rows written.
    pub rows_exported: u64,
}

/// Error type for CLI operations.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing or writing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Core or store error.
    #[error(transparent)]
    Core(#[from] AffinityError),
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<&str> for CliError {
    fn from(value: &str) -> Self {
        CliError::Message(value.to_string())
    }
}

impl From<String> for CliError {
    fn from(value: String) -> Self {
        CliError::Message(value)
    }
}

struct Columns {
    user: usize,
    item: usize,
    rating: usize,
}

/// Reads, validates and stores the ratings of a CSV file.
///
/// Every row goes through [`Rating::new`]. Without `skip_invalid` the first bad row
/// aborts the import with its line number and nothing is written.
pub fn run_import(
    cfg: &ImportConfig,
    store: &SqliteRatingsStore,
) -> Result<ImportSummary, CliError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(&cfg.path)?;
    let headers = reader.headers()?.clone();
    let columns = Columns {
        user: find_column(&headers, &cfg.user_column)?,
        item: find_column(&headers, &cfg.item_column)?,
        rating: find_column(&headers, &cfg.rating_column)?,
    };

    let mut summary = ImportSummary::default();
    let mut ratings = Vec::new();
    for result in reader.records() {
        let record = result?;
        summary.rows_read += 1;
        match parse_record(&record, &columns, cfg) {
            Ok(rating) => ratings.push(rating),
            Err(err) if cfg.skip_invalid => {
                summary.rows_skipped += 1;
                warn!(line = line_of(&record), %err, "import.row.skipped");
            }
            Err(err) => return Err(err),
        }
    }

    if ratings.is_empty() {
        return Err(CliError::Message(format!(
            "no valid ratings found in {}",
            cfg.path.display()
        )));
    }

    let written = match cfg.mode {
        ImportMode::Replace => store.replace_ratings(&ratings)?,
        ImportMode::Append => store.append_ratings(&ratings)?,
    };
    summary.rows_imported = written as u64;
    info!(
        path = %cfg.path.display(),
        rows_read = summary.rows_read,
        rows_imported = summary.rows_imported,
        rows_skipped = summary.rows_skipped,
        "import.completed"
    );
    Ok(summary)
}

/// Writes the ratings table to CSV as `user_id,item_id,rating`.
pub fn run_export(
    cfg: &ExportConfig,
    store: &SqliteRatingsStore,
) -> Result<ExportSummary, CliError> {
    let ratings = store.fetch_ratings()?;
    let mut writer = WriterBuilder::new().from_path(&cfg.out)?;
    writer.write_record(["user_id", "item_id", "rating"])?;
    for rating in &ratings {
        writer.write_record(&[
            rating.user_id().to_string(),
            rating.item_id().to_string(),
            rating.value().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(ExportSummary {
        rows_exported: ratings.len() as u64,
    })
}

fn parse_record(
    record: &StringRecord,
    columns: &Columns,
    cfg: &ImportConfig,
) -> Result<Rating, CliError> {
    let line = line_of(record);
    let user: u64 = parse_field(record, columns.user, &cfg.user_column, line)?;
    let item: u64 = parse_field(record, columns.item, &cfg.item_column, line)?;
    let value: f64 = parse_field(record, columns.rating, &cfg.rating_column, line)?;
    Rating::new(user, item, value)
        .map_err(|err| CliError::Message(format!("line {line}: {err}")))
}

fn parse_field<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<T, CliError> {
    let raw = record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CliError::Message(format!("line {line}: missing value for column '{name}'")))?;
    raw.parse().map_err(|_| {
        CliError::Message(format!(
            "line {line}: invalid value '{raw}' for column '{name}'"
        ))
    })
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, CliError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| CliError::Message(format!("column '{}' not found", name)))
}
