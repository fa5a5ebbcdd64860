use std::collections::BTreeSet;

use crate::error::{AffinityError, Result};
use crate::model::{ItemId, Rating, UserId};

/// Ratings pivoted into users (rows) by items (columns), zero-filled.
///
/// Values are stored item-major so each item's vector across all users is a
/// contiguous slice, which is the view the similarity engine consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct UserItemMatrix {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    values: Vec<f64>,
}

impl UserItemMatrix {
    /// Pivots raw ratings into a dense matrix.
    ///
    /// Users and items are ordered ascending. When the same `(user, item)` pair occurs
    /// more than once, the last occurrence wins. An empty input yields
    /// [`AffinityError::NoData`].
    pub fn build(ratings: &[Rating]) -> Result<Self> {
        if ratings.is_empty() {
            return Err(AffinityError::NoData);
        }

        let users: Vec<UserId> = ratings
            .iter()
            .map(Rating::user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let items: Vec<ItemId> = ratings
            .iter()
            .map(Rating::item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut values = vec![0.0; users.len() * items.len()];
        for rating in ratings {
            let (Ok(row), Ok(col)) = (
                users.binary_search(&rating.user_id()),
                items.binary_search(&rating.item_id()),
            ) else {
                return Err(AffinityError::training(format!(
                    "rating for user {} item {} missing from pivot index",
                    rating.user_id(),
                    rating.item_id()
                )));
            };
            values[col * users.len() + row] = rating.value();
        }

        Ok(Self {
            users,
            items,
            values,
        })
    }

    /// Builds a matrix from explicit axes and per-user rows.
    ///
    /// `rows[u][i]` is the rating of `users[u]` for `items[i]`. Axes must be strictly
    /// ascending and the shape must match, otherwise a training failure is returned.
    pub fn from_rows(users: Vec<UserId>, items: Vec<ItemId>, rows: &[Vec<f64>]) -> Result<Self> {
        if users.is_empty() || items.is_empty() {
            return Err(AffinityError::training(
                "matrix needs at least one user and one item",
            ));
        }
        if !is_strictly_ascending(&users) || !is_strictly_ascending(&items) {
            return Err(AffinityError::training(
                "matrix axes must be strictly ascending",
            ));
        }
        if rows.len() != users.len() {
            return Err(AffinityError::training(format!(
                "expected {} user rows, got {}",
                users.len(),
                rows.len()
            )));
        }

        let mut values = vec![0.0; users.len() * items.len()];
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != items.len() {
                return Err(AffinityError::training(format!(
                    "user {} has {} columns, expected {}",
                    users[row_idx],
                    row.len(),
                    items.len()
                )));
            }
            for (col_idx, value) in row.iter().enumerate() {
                values[col_idx * users.len() + row_idx] = *value;
            }
        }

        Ok(Self {
            users,
            items,
            values,
        })
    }

    /// Row labels, ascending.
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Column labels, ascending.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Number of users (rows).
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of items (columns).
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Rating at `(user, item)`, `0.0` when unobserved, `None` when either is unknown.
    pub fn get(&self, user: UserId, item: ItemId) -> Option<f64> {
        let row = self.users.binary_search(&user).ok()?;
        let col = self.items.binary_search(&item).ok()?;
        self.values.get(col * self.users.len() + row).copied()
    }

    /// Ratings of the item at column `col` across all users.
    pub fn item_vector(&self, col: usize) -> Option<&[f64]> {
        let width = self.users.len();
        let start = col.checked_mul(width)?;
        let end = start.checked_add(width)?;
        self.values.get(start..end)
    }

    /// Iterates `(item_id, vector)` pairs in column order.
    pub fn item_vectors(&self) -> impl Iterator<Item = (ItemId, &[f64])> + '_ {
        self.items
            .iter()
            .copied()
            .zip(self.values.chunks_exact(self.users.len().max(1)))
    }
}

fn is_strictly_ascending(ids: &[u64]) -> bool {
    ids.windows(2).all(|pair| pair[0] < pair[1])
}
