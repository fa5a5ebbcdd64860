#![forbid(unsafe_code)]

//! Ratings store accessors.
//!
//! The recommendation core only depends on [`RatingsSource`]. [`SqliteRatingsStore`]
//! backs the CLI and dashboard; [`InMemoryRatings`] serves embedders and tests.

mod sqlite;

use parking_lot::RwLock;

use crate::error::Result;
use crate::model::Rating;

/// SQLite-backed ratings table.
pub use sqlite::SqliteRatingsStore;

/// Supplies the raw rating tuples a training run consumes.
pub trait RatingsSource: Send + Sync {
    /// Returns every stored rating, in storage order.
    ///
    /// An empty vector is a valid answer; access failures are reported as errors.
    fn fetch_ratings(&self) -> Result<Vec<Rating>>;
}

impl<S: RatingsSource + ?Sized> RatingsSource for std::sync::Arc<S> {
    fn fetch_ratings(&self) -> Result<Vec<Rating>> {
        (**self).fetch_ratings()
    }
}

/// Ratings held in memory; the contents can be swapped between training runs.
#[derive(Debug, Default)]
pub struct InMemoryRatings {
    ratings: RwLock<Vec<Rating>>,
}

impl InMemoryRatings {
    /// Wraps an initial set of ratings.
    pub fn new(ratings: Vec<Rating>) -> Self {
        Self {
            ratings: RwLock::new(ratings),
        }
    }

    /// Replaces the held ratings, returning the previous set.
    pub fn replace(&self, ratings: Vec<Rating>) -> Vec<Rating> {
        std::mem::replace(&mut *self.ratings.write(), ratings)
    }

    /// Number of held ratings.
    pub fn len(&self) -> usize {
        self.ratings.read().len()
    }

    /// Whether no ratings are held.
    pub fn is_empty(&self) -> bool {
        self.ratings.read().is_empty()
    }
}

impl RatingsSource for InMemoryRatings {
    fn fetch_ratings(&self) -> Result<Vec<Rating>> {
        Ok(self.ratings.read().clone())
    }
}
