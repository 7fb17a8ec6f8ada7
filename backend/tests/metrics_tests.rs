//! Cycle metrics tests
//!
//! Tests for FCR, EPI and the settlement formula of archived cycles.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::*;
use uuid::Uuid;

fn history(doc: i32, mortality: i32, final_intake: Decimal, age: i32) -> CycleHistory {
    CycleHistory {
        id: Uuid::new_v4(),
        farmer_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        cycle_name: "House C".to_string(),
        doc,
        mortality,
        birds_sold: doc - mortality,
        age,
        final_intake,
        start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        created_at: Utc::now(),
    }
}

fn sold(total_weight: Decimal, price_per_kg: Decimal) -> SaleFigures {
    SaleFigures {
        total_weight,
        price_per_kg,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_reference_cycle() {
        let cycle = history(1000, 20, dec!(40), 32);
        let metrics = CycleMetrics::compute(
            &cycle,
            &[sold(dec!(1960), dec!(141))],
            &PricingPolicy::default(),
        );

        assert_eq!(metrics.survivors, 980);
        assert_eq!(metrics.survival_rate, dec!(98));
        assert_eq!(metrics.feed_kg, dec!(2000));
        assert_eq!(metrics.fcr, dec!(2000) / dec!(1960));
        assert_eq!(metrics.avg_weight_kg, dec!(2));
        assert_eq!(metrics.epi.round_dp(2), dec!(600.25));
    }

    #[test]
    fn test_reference_settlement() {
        let cycle = history(1000, 20, dec!(40), 32);
        let metrics = CycleMetrics::compute(
            &cycle,
            &[sold(dec!(1960), dec!(141))],
            &PricingPolicy::default(),
        );

        assert_eq!(metrics.effective_rate, dec!(141));
        assert_eq!(metrics.formula_revenue, dec!(276360));
        // 40 bags at 3220 plus 1000 chicks at 41
        assert_eq!(metrics.production_cost, dec!(169800));
        assert_eq!(metrics.profit, dec!(106560));
    }

    #[test]
    fn test_weights_sum_across_sales() {
        let cycle = history(1000, 20, dec!(40), 32);
        let metrics = CycleMetrics::compute(
            &cycle,
            &[sold(dec!(1000), dec!(151)), sold(dec!(960), dec!(133))],
            &PricingPolicy::default(),
        );
        assert_eq!(metrics.total_weight_kg, dec!(1960));
        assert_eq!(metrics.effective_rate, dec!(141));
    }

    #[test]
    fn test_no_sales_gives_zero_ratios() {
        let cycle = history(1000, 20, dec!(40), 32);
        let metrics = CycleMetrics::compute(&cycle, &[], &PricingPolicy::default());
        assert_eq!(metrics.fcr, dec!(0));
        assert_eq!(metrics.epi, dec!(0));
        assert_eq!(metrics.effective_rate, dec!(141));
    }

    #[test]
    fn test_surplus_price_is_halved() {
        assert_eq!(effective_rate(&[dec!(161)], dec!(141)), dec!(151));
    }

    #[test]
    fn test_rate_never_below_base() {
        assert_eq!(effective_rate(&[dec!(120)], dec!(141)), dec!(141));
    }

    #[test]
    fn test_custom_pricing_policy() {
        let policy = PricingPolicy {
            base_price: dec!(150),
            feed_price_per_bag: dec!(3000),
            doc_price: dec!(40),
            bag_weight_kg: dec!(50),
        };
        assert_eq!(production_cost(dec!(10), 100, &policy), dec!(34000));
    }

    #[test]
    fn test_active_cycle_has_no_metrics() {
        let created = Utc::now();
        let active = CycleRef::Active(Cycle {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "House D".to_string(),
            doc: 100,
            mortality: 0,
            birds_sold: 50,
            age: 20,
            intake: dec!(10),
            created_at: created,
            updated_at: created,
        });
        assert!(active
            .metrics(&[sold(dec!(100), dec!(150))], &PricingPolicy::default())
            .is_none());

        let archived = CycleRef::Archived(history(1000, 20, dec!(40), 32));
        assert!(archived.is_ended());
        assert!(archived.metrics(&[], &PricingPolicy::default()).is_some());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (100i64..200).prop_map(Decimal::from)
    }

    proptest! {
        #[test]
        fn prop_effective_rate_at_least_base(prices in prop::collection::vec(price_strategy(), 0..10)) {
            prop_assert!(effective_rate(&prices, dec!(141)) >= dec!(141));
        }

        #[test]
        fn prop_profit_is_revenue_minus_cost(
            mortality in 0i32..500,
            bags in 1i64..200,
            weight in 1i64..5_000,
            price in price_strategy(),
        ) {
            let cycle = history(1000, mortality, Decimal::from(bags), 32);
            let metrics = CycleMetrics::compute(
                &cycle,
                &[sold(Decimal::from(weight), price)],
                &PricingPolicy::default(),
            );
            prop_assert_eq!(metrics.profit, metrics.formula_revenue - metrics.production_cost);
            prop_assert_eq!(metrics.survivors, 1000 - mortality);
        }
    }
}
