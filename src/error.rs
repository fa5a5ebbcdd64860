//! Error type shared by the recommendation core and the ratings store.

use std::io;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, AffinityError>;

/// Failures raised by the core, the store and the strategy table.
#[derive(Debug, Error)]
pub enum AffinityError {
    /// The ratings source returned zero rows.
    #[error("no ratings available")]
    NoData,
    /// Matrix construction or similarity computation failed.
    #[error("training failed: {0}")]
    TrainingFailure(String),
    /// A rating tuple violated its bounds.
    #[error("invalid rating: {0}")]
    InvalidRating(String),
    /// A caller supplied an out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The SQLite ratings store failed.
    #[error("ratings store error: {0}")]
    Store(#[from] rusqlite::Error),
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AffinityError {
    pub(crate) fn training(message: impl Into<String>) -> Self {
        AffinityError::TrainingFailure(message.into())
    }
}
