//! Feed consumption model
//!
//! Cumulative feed intake of a cycle is a function of its surviving population
//! and its age. Organizations can configure their own daily schedule; the
//! built-in one follows a common broiler feeding curve.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default weight of one feed bag
pub const FEED_BAG_KG: Decimal = dec!(50);

/// Grams of feed per bird for days 1..=42
const DEFAULT_DAILY_GRAMS: [u32; 42] = [
    12, 16, 20, 24, 28, 32, 36, // week 1
    41, 46, 51, 56, 61, 66, 71, // week 2
    77, 83, 89, 95, 101, 107, 113, // week 3
    119, 125, 131, 137, 143, 149, 154, // week 4
    159, 164, 168, 172, 176, 180, 184, // week 5
    187, 190, 193, 196, 198, 200, 202, // week 6
];

fn default_bag_weight() -> Decimal {
    FEED_BAG_KG
}

/// Per-bird daily consumption schedule, in grams, indexed by day of age, and
/// the bag weight that converts it to bags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSchedule {
    pub daily_grams: Vec<Decimal>,
    #[serde(default = "default_bag_weight")]
    pub bag_weight_kg: Decimal,
}

impl Default for FeedSchedule {
    fn default() -> Self {
        Self {
            daily_grams: DEFAULT_DAILY_GRAMS.iter().map(|g| Decimal::from(*g)).collect(),
            bag_weight_kg: FEED_BAG_KG,
        }
    }
}

impl FeedSchedule {
    /// Parse an organization-configured schedule. An empty or invalid schedule
    /// falls back to the default.
    pub fn from_config(value: Option<&serde_json::Value>) -> Self {
        value
            .and_then(|v| serde_json::from_value::<Vec<Decimal>>(v.clone()).ok())
            .filter(|days| !days.is_empty() && days.iter().all(|g| *g >= Decimal::ZERO))
            .map(|daily_grams| Self {
                daily_grams,
                bag_weight_kg: FEED_BAG_KG,
            })
            .unwrap_or_default()
    }

    /// Use the pricing policy's bag weight. Non-positive weights keep the
    /// current one.
    pub fn with_bag_weight(mut self, bag_weight_kg: Decimal) -> Self {
        if bag_weight_kg > Decimal::ZERO {
            self.bag_weight_kg = bag_weight_kg;
        }
        self
    }

    /// Grams eaten by one bird on a given day of age. Days past the end of the
    /// schedule repeat the last entry.
    pub fn grams_on_day(&self, day: i32) -> Decimal {
        if day < 1 {
            return Decimal::ZERO;
        }
        let idx = (day - 1) as usize;
        self.daily_grams
            .get(idx)
            .or_else(|| self.daily_grams.last())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Grams eaten by one bird from day 1 through `age`
    pub fn cumulative_grams(&self, age: i32) -> Decimal {
        (1..=age).map(|day| self.grams_on_day(day)).sum()
    }

    /// Cumulative feed bags for `population` birds at `age` days, rounded to
    /// two decimals
    pub fn target_intake(&self, population: i32, age: i32) -> Decimal {
        if population <= 0 || age <= 0 {
            return Decimal::ZERO;
        }
        let kg = self.cumulative_grams(age) * Decimal::from(population) / dec!(1000);
        (kg / self.bag_weight_kg).round_dp(2)
    }
}

/// Result of comparing the stored intake against the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedUpdate {
    pub previous: Decimal,
    pub target: Decimal,
}

impl FeedUpdate {
    pub fn delta(&self) -> Decimal {
        self.target - self.previous
    }
}

/// Decide whether the stored intake needs rewriting. Returns `None` when the
/// value is unchanged and the update is not forced.
pub fn plan_feed_update(stored: Decimal, target: Decimal, force: bool) -> Option<FeedUpdate> {
    if !force && stored == target {
        return None;
    }
    Some(FeedUpdate {
        previous: stored,
        target,
    })
}

/// Population that the feed model is evaluated against
pub fn feeding_population(doc: i32, mortality: i32) -> i32 {
    (doc - mortality).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_cumulative() {
        let schedule = FeedSchedule::default();
        assert_eq!(schedule.cumulative_grams(7), Decimal::from(168));
        assert_eq!(schedule.cumulative_grams(14), Decimal::from(560));
        assert_eq!(schedule.cumulative_grams(0), Decimal::ZERO);
    }

    #[test]
    fn test_schedule_extends_last_day() {
        let schedule = FeedSchedule::default();
        assert_eq!(schedule.grams_on_day(50), Decimal::from(202));
    }

    #[test]
    fn test_target_intake_bags() {
        let schedule = FeedSchedule::default();
        // 1000 birds * 560 g = 560 kg = 11.2 bags
        assert_eq!(schedule.target_intake(1000, 14), dec!(11.2));
        assert_eq!(schedule.target_intake(0, 14), Decimal::ZERO);
    }

    #[test]
    fn test_target_intake_follows_bag_weight() {
        let schedule = FeedSchedule::default().with_bag_weight(dec!(25));
        // 560 kg in 25 kg bags
        assert_eq!(schedule.target_intake(1000, 14), dec!(22.4));
        let unchanged = FeedSchedule::default().with_bag_weight(Decimal::ZERO);
        assert_eq!(unchanged.bag_weight_kg, FEED_BAG_KG);
    }

    #[test]
    fn test_custom_schedule_from_config() {
        let value = serde_json::json!([100, 100, 100]);
        let schedule = FeedSchedule::from_config(Some(&value));
        assert_eq!(schedule.cumulative_grams(5), Decimal::from(500));

        let bad = serde_json::json!({"oops": true});
        assert_eq!(FeedSchedule::from_config(Some(&bad)), FeedSchedule::default());
        assert_eq!(FeedSchedule::from_config(None), FeedSchedule::default());
    }

    #[test]
    fn test_plan_feed_update_idempotent_without_force() {
        let stored = dec!(11.2);
        assert_eq!(plan_feed_update(stored, stored, false), None);
        let forced = plan_feed_update(stored, stored, true).unwrap();
        assert_eq!(forced.delta(), Decimal::ZERO);
        let changed = plan_feed_update(stored, dec!(12), false).unwrap();
        assert_eq!(changed.delta(), dec!(0.8));
    }
}
