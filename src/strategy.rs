//! Prescriptive strategy table: maps a similarity score to a canned business action.

use serde::Serialize;

use crate::error::{AffinityError, Result};
use crate::model::{ItemId, Recommendation};

/// Scores at or above this value always land in the top tier.
pub const TOP_TIER_SCORE: f64 = 0.8;
/// Default lower bound of the middle tier.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Urgency attached to a prescribed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Act now.
    Critical,
    /// Schedule soon.
    High,
    /// Monitor.
    Medium,
}

impl Priority {
    /// Upper-case label shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A business action prescribed for one recommended item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessAction {
    /// Item the action targets.
    pub item_id: ItemId,
    /// Strategy category label.
    pub category: &'static str,
    /// Human-readable plan.
    pub action_plan: String,
    /// Urgency of the plan.
    pub priority: Priority,
}

/// Stateless score-to-action rules with a configurable middle-tier threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyEngine {
    threshold: f64,
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl StrategyEngine {
    /// Builds the table; `threshold` must lie in `[0, 1]`.
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AffinityError::InvalidArgument(format!(
                "strategy threshold {threshold} must be within [0, 1]"
            )));
        }
        Ok(Self { threshold })
    }

    /// Lower bound of the middle tier.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Picks the action for `item_id` given its similarity `score`.
    pub fn prescribe(&self, item_id: ItemId, score: f64) -> BusinessAction {
        if score >= TOP_TIER_SCORE {
            BusinessAction {
                item_id,
                category: "High-Value Cross-Sell",
                action_plan: format!(
                    "Targeted email campaign: Promote Item {item_id} to premium users."
                ),
                priority: Priority::Critical,
            }
        } else if score >= self.threshold {
            BusinessAction {
                item_id,
                category: "Bundle Optimization",
                action_plan: format!(
                    "Include Item {item_id} in 'Frequently Bought Together' widget."
                ),
                priority: Priority::High,
            }
        } else {
            BusinessAction {
                item_id,
                category: "Inventory Awareness",
                action_plan: format!("Monitor Item {item_id} stock for seasonal discount."),
                priority: Priority::Medium,
            }
        }
    }

    /// Prescribes an action for each recommendation, preserving order.
    pub fn prescribe_all(&self, recommendations: &[Recommendation]) -> Vec<BusinessAction> {
        recommendations
            .iter()
            .map(|rec| self.prescribe(rec.item_id, rec.score))
            .collect()
    }
}
