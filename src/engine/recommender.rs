use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::engine::matrix::UserItemMatrix;
use crate::engine::similarity::SimilarityMatrix;
use crate::error::{AffinityError, Result};
use crate::model::{ItemId, Recommendation};
use crate::store::RatingsSource;

/// Number of recommendations returned when callers do not ask for a specific count.
pub const DEFAULT_TOP_N: usize = 3;

const SCORE_SCALE: f64 = 10_000.0;

/// Outcome of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    /// Rating tuples consumed.
    pub ratings: usize,
    /// Distinct users (matrix rows).
    pub users: usize,
    /// Distinct items (matrix columns).
    pub items: usize,
    /// Wall-clock duration of the run.
    pub duration_ms: f64,
    /// Completion time as a Unix timestamp.
    pub trained_at_unix: i64,
}

/// A similarity matrix together with the report of the run that produced it.
#[derive(Debug)]
pub struct TrainedModel {
    similarity: SimilarityMatrix,
    report: TrainingReport,
}

impl TrainedModel {
    /// The trained similarity matrix.
    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    /// Statistics of the training run.
    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    /// Top-N items most similar to `item_id`; see [`rank_similar`].
    pub fn recommend(&self, item_id: ItemId, top_n: usize) -> Vec<Recommendation> {
        rank_similar(&self.similarity, item_id, top_n)
    }
}

/// Ranks every other item by similarity to `item_id`.
///
/// Results are ordered by score descending, then item id ascending, and hold at most
/// `top_n` entries. The queried item is excluded by identity, so another item tied at
/// `1.0` is still returned. Unknown items yield an empty list. Scores are rounded to
/// four decimals after ranking.
pub fn rank_similar(
    similarity: &SimilarityMatrix,
    item_id: ItemId,
    top_n: usize,
) -> Vec<Recommendation> {
    if top_n == 0 {
        return Vec::new();
    }
    let Some(pos) = similarity.position(item_id) else {
        return Vec::new();
    };
    let Some(row) = similarity.row(pos) else {
        return Vec::new();
    };

    let mut ranked: Vec<(ItemId, f64)> = similarity
        .items()
        .iter()
        .zip(row)
        .enumerate()
        .filter(|(idx, _)| *idx != pos)
        .map(|(_, (item, score))| (*item, *score))
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    ranked
        .into_iter()
        .map(|(item_id, score)| Recommendation {
            item_id,
            score: round_score(score),
        })
        .collect()
}

fn round_score(score: f64) -> f64 {
    (score * SCORE_SCALE).round() / SCORE_SCALE
}

/// Owns the current similarity matrix and serves recommendations from it.
///
/// The matrix is held behind an `Arc` and replaced in a single write only after a
/// training run fully succeeds. Queries clone the `Arc` and never observe a partially
/// built matrix. Training runs on one instance are serialized.
pub struct Recommender<S> {
    source: S,
    model: RwLock<Option<Arc<TrainedModel>>>,
    training: Mutex<()>,
}

impl<S: RatingsSource> Recommender<S> {
    /// Creates an untrained recommender pulling ratings from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            model: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    /// The ratings source used by training.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Trains and reports success as a boolean.
    ///
    /// Every failure is logged and leaves the previously held matrix in place.
    pub fn train(&self) -> bool {
        match self.try_train() {
            Ok(_) => true,
            Err(AffinityError::NoData) => {
                warn!("recommender.train.no_data");
                false
            }
            Err(err) => {
                error!(%err, "recommender.train.failed");
                false
            }
        }
    }

    /// Trains and returns the detailed outcome.
    ///
    /// Fetches ratings, builds the user-item matrix, computes item similarity and, on
    /// success only, swaps the new matrix in.
    pub fn try_train(&self) -> Result<TrainingReport> {
        let _guard = self.training.lock();
        let start = Instant::now();
        debug!("recommender.train.begin");

        let ratings = self.source.fetch_ratings()?;
        if ratings.is_empty() {
            return Err(AffinityError::NoData);
        }
        let matrix = UserItemMatrix::build(&ratings)?;
        let similarity = SimilarityMatrix::compute(&matrix)?;

        let report = TrainingReport {
            ratings: ratings.len(),
            users: matrix.user_count(),
            items: matrix.item_count(),
            duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            trained_at_unix: OffsetDateTime::now_utc().unix_timestamp(),
        };
        let model = Arc::new(TrainedModel {
            similarity,
            report: report.clone(),
        });
        *self.model.write() = Some(model);

        info!(
            ratings = report.ratings,
            users = report.users,
            items = report.items,
            duration_ms = report.duration_ms,
            "recommender.train.completed"
        );
        Ok(report)
    }
}

impl<S> Recommender<S> {
    /// Top-N items similar to `item_id`.
    ///
    /// Returns an empty list before the first successful training run and for items
    /// absent from the trained matrix.
    pub fn recommend(&self, item_id: ItemId, top_n: usize) -> Vec<Recommendation> {
        let Some(model) = self.snapshot() else {
            debug!(item_id, "recommender.recommend.untrained");
            return Vec::new();
        };
        if !model.similarity.contains(item_id) {
            debug!(item_id, "recommender.recommend.unknown_item");
            return Vec::new();
        }
        model.recommend(item_id, top_n)
    }

    /// The currently held model, if any.
    pub fn snapshot(&self) -> Option<Arc<TrainedModel>> {
        self.model.read().clone()
    }

    /// Whether a trained matrix is held.
    pub fn is_trained(&self) -> bool {
        self.model.read().is_some()
    }

    /// Items known to the trained matrix, ascending; empty when untrained.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.snapshot()
            .map(|model| model.similarity.items().to_vec())
            .unwrap_or_default()
    }

    /// Report of the training run that produced the held matrix.
    pub fn last_report(&self) -> Option<TrainingReport> {
        self.snapshot().map(|model| model.report.clone())
    }
}
