use std::collections::HashMap;

use crate::engine::matrix::UserItemMatrix;
use crate::error::{AffinityError, Result};
use crate::model::ItemId;

/// Cosine similarity between two equally sized vectors.
///
/// Returns `0.0` when either vector has zero magnitude, so callers never observe NaN.
/// Vectors of different length are compared over their common prefix.
///
/// ```
/// use affinity::engine::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-12);
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]), 0.0);
/// assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    cosine_with_norms(a, b, norm(a), norm(b))
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn cosine_with_norms(a: &[f64], b: &[f64], norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

/// Square, symmetric item-by-item cosine similarity.
///
/// Scores lie in `[0, 1]` and the diagonal is exactly `1.0`. The matrix is immutable
/// once computed; retraining produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    items: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// Computes pairwise similarity over the item vectors of `matrix`.
    ///
    /// Any non-finite rating or score aborts with [`AffinityError::TrainingFailure`].
    pub fn compute(matrix: &UserItemMatrix) -> Result<Self> {
        let n = matrix.item_count();
        if n == 0 || matrix.user_count() == 0 {
            return Err(AffinityError::training(
                "user-item matrix has no users or no items",
            ));
        }

        let vectors: Vec<(ItemId, &[f64])> = matrix.item_vectors().collect();
        if vectors.len() != n {
            return Err(AffinityError::training(format!(
                "expected {n} item vectors, found {}",
                vectors.len()
            )));
        }

        let mut norms = Vec::with_capacity(n);
        for (item, vector) in &vectors {
            let magnitude = norm(vector);
            if !magnitude.is_finite() {
                return Err(AffinityError::training(format!(
                    "item {item} has a non-finite rating vector"
                )));
            }
            norms.push(magnitude);
        }

        let mut scores = vec![0.0; n * n];
        for i in 0..n {
            scores[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let raw = cosine_with_norms(vectors[i].1, vectors[j].1, norms[i], norms[j]);
                if !raw.is_finite() {
                    return Err(AffinityError::training(format!(
                        "similarity between items {} and {} is not finite",
                        vectors[i].0, vectors[j].0
                    )));
                }
                let score = raw.clamp(0.0, 1.0);
                scores[i * n + j] = score;
                scores[j * n + i] = score;
            }
        }

        let items: Vec<ItemId> = vectors.iter().map(|(item, _)| *item).collect();
        let index = items
            .iter()
            .enumerate()
            .map(|(pos, item)| (*item, pos))
            .collect();

        Ok(Self {
            items,
            index,
            scores,
        })
    }

    /// Items indexing both axes, ascending.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the matrix has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `item` is part of the index.
    pub fn contains(&self, item: ItemId) -> bool {
        self.index.contains_key(&item)
    }

    /// Axis position of `item`.
    pub fn position(&self, item: ItemId) -> Option<usize> {
        self.index.get(&item).copied()
    }

    /// Similarity between two known items.
    pub fn score(&self, a: ItemId, b: ItemId) -> Option<f64> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        self.scores.get(i * self.items.len() + j).copied()
    }

    /// Scores of the item at `pos` against every item, in axis order.
    pub fn row(&self, pos: usize) -> Option<&[f64]> {
        let n = self.items.len();
        if pos >= n {
            return None;
        }
        self.scores.get(pos * n..(pos + 1) * n)
    }
}
