//! Value types exchanged between the store, the engine and presentation callers.

use serde::{Deserialize, Serialize};

use crate::error::{AffinityError, Result};

/// Identifier of a rating user.
pub type UserId = u64;
/// Identifier of a rated item.
pub type ItemId = u64;

/// Lowest accepted rating value.
pub const MIN_RATING: f64 = 0.0;
/// Highest accepted rating value.
pub const MAX_RATING: f64 = 5.0;

/// One observed `(user, item, rating)` tuple.
///
/// Instances can only be obtained through [`Rating::new`] (or deserialization, which
/// routes through it), so every rating in the system is within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRating")]
pub struct Rating {
    user_id: UserId,
    item_id: ItemId,
    rating: f64,
}

impl Rating {
    /// Validates and builds a rating.
    ///
    /// Both identifiers must be positive and the value must be a finite number in
    /// `[MIN_RATING, MAX_RATING]`.
    pub fn new(user_id: UserId, item_id: ItemId, rating: f64) -> Result<Self> {
        if user_id == 0 {
            return Err(AffinityError::InvalidRating(
                "user_id must be positive".into(),
            ));
        }
        if item_id == 0 {
            return Err(AffinityError::InvalidRating(
                "item_id must be positive".into(),
            ));
        }
        if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(AffinityError::InvalidRating(format!(
                "rating {rating} for user {user_id} item {item_id} is outside [{MIN_RATING}, {MAX_RATING}]"
            )));
        }
        Ok(Self {
            user_id,
            item_id,
            rating,
        })
    }

    /// Builds a rating from signed store columns.
    pub fn from_signed(user_id: i64, item_id: i64, rating: f64) -> Result<Self> {
        let user = UserId::try_from(user_id).map_err(|_| {
            AffinityError::InvalidRating(format!("user_id {user_id} must be positive"))
        })?;
        let item = ItemId::try_from(item_id).map_err(|_| {
            AffinityError::InvalidRating(format!("item_id {item_id} must be positive"))
        })?;
        Self::new(user, item, rating)
    }

    /// The rating user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The rated item.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The rating value.
    pub fn value(&self) -> f64 {
        self.rating
    }
}

#[derive(Deserialize)]
struct RawRating {
    user_id: UserId,
    item_id: ItemId,
    rating: f64,
}

impl TryFrom<RawRating> for Rating {
    type Error = AffinityError;

    fn try_from(raw: RawRating) -> Result<Self> {
        Rating::new(raw.user_id, raw.item_id, raw.rating)
    }
}

/// A recommended item and its similarity to the queried item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recommendation {
    /// The recommended item.
    pub item_id: ItemId,
    /// Cosine similarity in `[0, 1]`, rounded to four decimals.
    pub score: f64,
}

/// Per-item activity summary used by the descriptive views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPerformance {
    /// The summarized item.
    pub item_id: ItemId,
    /// Number of ratings recorded for the item.
    pub total_interactions: u64,
    /// Mean rating value.
    pub avg_score: f64,
}
