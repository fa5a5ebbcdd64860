#![forbid(unsafe_code)]

//! Item-item collaborative filtering.
//!
//! Ratings flow through three stages: [`UserItemMatrix::build`] pivots the raw tuples
//! into a dense matrix, [`SimilarityMatrix::compute`] derives pairwise cosine similarity
//! between item vectors, and [`Recommender`] owns the trained matrix and answers top-N
//! queries against it.

mod matrix;
mod recommender;
mod similarity;

/// Dense user-by-item rating matrix.
pub use matrix::UserItemMatrix;

/// Training and query entry points.
pub use recommender::{rank_similar, Recommender, TrainedModel, TrainingReport, DEFAULT_TOP_N};

/// Pairwise item similarity.
pub use similarity::{cosine_similarity, SimilarityMatrix};
