//! Demo and synthetic rating datasets.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{AffinityError, Result};
use crate::model::{ItemId, Rating, UserId, MAX_RATING};

/// First item id handed out by the generator, so ids read like catalogue numbers.
pub const FIRST_ITEM_ID: ItemId = 101;

/// Shape of a synthetic dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticOptions {
    /// Number of users.
    pub users: usize,
    /// Number of items.
    pub items: usize,
    /// Probability that a given user rated a given item.
    pub density: f64,
    /// Number of taste clusters users and items are assigned to.
    pub clusters: usize,
    /// RNG seed; equal seeds produce equal datasets.
    pub seed: u64,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            users: 50,
            items: 20,
            density: 0.3,
            clusters: 4,
            seed: 42,
        }
    }
}

/// Deterministic generator of clustered ratings.
///
/// Users rate items of their own cluster high and everything else low, so trained
/// similarities group items by cluster.
pub struct DataGenerator {
    rng: ChaCha8Rng,
    options: SyntheticOptions,
}

impl DataGenerator {
    /// Validates the options and seeds the generator.
    pub fn new(options: SyntheticOptions) -> Result<Self> {
        if options.users == 0 || options.items == 0 {
            return Err(AffinityError::InvalidArgument(
                "synthetic dataset needs at least one user and one item".into(),
            ));
        }
        if !(options.density > 0.0 && options.density <= 1.0) {
            return Err(AffinityError::InvalidArgument(format!(
                "density {} must be within (0, 1]",
                options.density
            )));
        }
        if options.clusters == 0 {
            return Err(AffinityError::InvalidArgument(
                "clusters must be at least 1".into(),
            ));
        }
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(options.seed),
            options,
        })
    }

    /// Generates ratings in user-major order.
    pub fn generate_ratings(&mut self) -> Result<Vec<Rating>> {
        let SyntheticOptions {
            users,
            items,
            density,
            clusters,
            ..
        } = self.options;
        let mut ratings = Vec::with_capacity(capacity_hint(users, items, density));

        for user_idx in 0..users {
            let user_id = (user_idx + 1) as UserId;
            let taste = user_idx % clusters;
            for item_idx in 0..items {
                if !self.rng.gen_bool(density) {
                    continue;
                }
                let item_id = FIRST_ITEM_ID + item_idx as ItemId;
                let half_steps: u32 = if item_idx % clusters == taste {
                    self.rng.gen_range(8..=10)
                } else {
                    self.rng.gen_range(1..=5)
                };
                let value = (f64::from(half_steps) * 0.5).min(MAX_RATING);
                ratings.push(Rating::new(user_id, item_id, value)?);
            }
        }
        Ok(ratings)
    }
}

/// Upper bound on the up-front allocation of [`DataGenerator::generate_ratings`].
const MAX_CAPACITY_HINT: usize = 1 << 20;

fn capacity_hint(users: usize, items: usize, density: f64) -> usize {
    let expected = users.saturating_mul(items) as f64 * density;
    (expected as usize).saturating_add(1).min(MAX_CAPACITY_HINT)
}

/// A small fixed dataset: five users over five items with two clear taste groups.
pub fn demo_ratings() -> Vec<Rating> {
    const DEMO: &[(UserId, ItemId, f64)] = &[
        (1, 101, 5.0),
        (1, 102, 4.5),
        (1, 104, 1.0),
        (2, 101, 4.5),
        (2, 102, 5.0),
        (2, 103, 4.0),
        (3, 102, 3.0),
        (3, 103, 4.5),
        (3, 105, 2.0),
        (4, 104, 5.0),
        (4, 105, 4.5),
        (5, 101, 1.0),
        (5, 104, 4.0),
        (5, 105, 5.0),
    ];
    DEMO.iter()
        .filter_map(|(user, item, value)| Rating::new(*user, *item, *value).ok())
        .collect()
}
