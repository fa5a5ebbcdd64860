#![forbid(unsafe_code)]

//! Command-line support: rating import/export and the CLI error type.

/// CSV ingestion into, and export from, the SQLite ratings store.
pub mod import_export;

pub use import_export::{
    run_export, run_import, CliError, ExportConfig, ExportSummary, ImportConfig, ImportMode,
    ImportSummary,
};
