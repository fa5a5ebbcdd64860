//! Item-item collaborative filtering over a table of user ratings.
//!
//! [`engine::Recommender`] trains a cosine similarity matrix from any
//! [`store::RatingsSource`] and answers top-N queries against the last successful run.
//! [`strategy::StrategyEngine`] turns scored recommendations into business actions. The
//! SQLite store, CSV tooling, configuration and dashboard serve the `affinity` binary.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod data_generator;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod strategy;
pub mod telemetry;

pub use engine::{Recommender, TrainingReport};
pub use error::{AffinityError, Result};
pub use model::{ItemId, ItemPerformance, Rating, Recommendation, UserId};
pub use store::{InMemoryRatings, RatingsSource, SqliteRatingsStore};
pub use strategy::{BusinessAction, Priority, StrategyEngine};
