//! Feed model tests
//!
//! Tests for the modelled intake and its recalculation rules.

use proptest::prelude::*;
use rust_decimal_macros::dec;
use shared::*;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_default_schedule_bounds() {
        let schedule = FeedSchedule::default();
        assert_eq!(schedule.grams_on_day(0), dec!(0));
        assert_eq!(schedule.grams_on_day(1), dec!(12));
        // Past the end of the curve the last day repeats
        assert_eq!(schedule.grams_on_day(50), dec!(202));
    }

    #[test]
    fn test_first_week_intake() {
        let schedule = FeedSchedule::default();
        assert_eq!(schedule.cumulative_grams(7), dec!(168));
        assert_eq!(schedule.target_intake(1000, 7), dec!(3.36));
    }

    #[test]
    fn test_empty_house_eats_nothing() {
        let schedule = FeedSchedule::default();
        assert_eq!(schedule.target_intake(0, 30), dec!(0));
        assert_eq!(schedule.target_intake(1000, 0), dec!(0));
        assert_eq!(feeding_population(100, 120), 0);
    }

    #[test]
    fn test_custom_schedule_from_config() {
        let value = serde_json::json!([10, 20]);
        let schedule = FeedSchedule::from_config(Some(&value));
        assert_eq!(schedule.cumulative_grams(3), dec!(50));
        assert_eq!(schedule.target_intake(1000, 3), dec!(1));
    }

    #[test]
    fn test_invalid_schedule_falls_back() {
        let negative = serde_json::json!([10, -5]);
        assert_eq!(FeedSchedule::from_config(Some(&negative)), FeedSchedule::default());

        let empty = serde_json::json!([]);
        assert_eq!(FeedSchedule::from_config(Some(&empty)), FeedSchedule::default());
        assert_eq!(FeedSchedule::from_config(None), FeedSchedule::default());
    }

    #[test]
    fn test_intake_and_metrics_share_bag_weight() {
        let policy = PricingPolicy {
            bag_weight_kg: dec!(25),
            ..PricingPolicy::default()
        };
        let schedule = FeedSchedule::default().with_bag_weight(policy.bag_weight_kg);
        // 1000 birds eat 168 kg in the first week
        let bags = schedule.target_intake(1000, 7);
        assert_eq!(bags, dec!(6.72));
        assert_eq!(feed_kg(bags, policy.bag_weight_kg), dec!(168));
    }

    #[test]
    fn test_unchanged_intake_is_skipped() {
        assert_eq!(plan_feed_update(dec!(12.5), dec!(12.5), false), None);
    }

    #[test]
    fn test_forced_update_writes_even_without_change() {
        let update = plan_feed_update(dec!(12.5), dec!(12.5), true).unwrap();
        assert_eq!(update.delta(), dec!(0));
    }

    #[test]
    fn test_update_delta() {
        let update = plan_feed_update(dec!(10), dec!(12.25), false).unwrap();
        assert_eq!(update.previous, dec!(10));
        assert_eq!(update.delta(), dec!(2.25));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_recalculation_is_idempotent(population in 0i32..50_000, age in 0i32..60) {
            let schedule = FeedSchedule::default();
            let target = schedule.target_intake(population, age);
            prop_assert_eq!(plan_feed_update(target, target, false), None);
            prop_assert_eq!(schedule.target_intake(population, age), target);
        }

        #[test]
        fn prop_intake_grows_with_age(population in 1i32..50_000, age in 1i32..60) {
            let schedule = FeedSchedule::default();
            prop_assert!(schedule.target_intake(population, age + 1) >= schedule.target_intake(population, age));
        }

        #[test]
        fn prop_mortality_never_raises_intake(doc in 1i32..50_000, dead in 0i32..1_000, age in 1i32..60) {
            let schedule = FeedSchedule::default();
            let full = schedule.target_intake(feeding_population(doc, 0), age);
            let reduced = schedule.target_intake(feeding_population(doc, dead), age);
            prop_assert!(reduced <= full);
        }
    }
}
