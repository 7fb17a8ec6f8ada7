//! Cycle lifecycle tests
//!
//! Tests for the active/archived transitions including:
//! - Stock round trip across close and reopen
//! - Population ceiling on mortality and DOC corrections
//! - Age and start date bookkeeping

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::*;
use uuid::Uuid;

fn started() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
}

fn cycle(doc: i32, mortality: i32, birds_sold: i32, intake: Decimal) -> Cycle {
    Cycle {
        id: Uuid::new_v4(),
        farmer_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        name: "House A".to_string(),
        doc,
        mortality,
        birds_sold,
        age: 32,
        intake,
        created_at: started(),
        updated_at: started(),
    }
}

/// Turn a close plan into the row the database would return
fn archive(plan: &ClosePlan) -> CycleHistory {
    let h = &plan.history;
    CycleHistory {
        id: Uuid::new_v4(),
        farmer_id: h.farmer_id,
        organization_id: h.organization_id,
        cycle_name: h.cycle_name.clone(),
        doc: h.doc,
        mortality: h.mortality,
        birds_sold: h.birds_sold,
        age: h.age,
        final_intake: h.final_intake,
        start_date: h.start_date,
        end_date: h.end_date,
        created_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_close_moves_intake_from_reserve() {
        let active = cycle(1000, 20, 980, dec!(38.5));
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let plan = plan_close(&active, FinalIntake::Reported(dec!(40)), end).unwrap();

        // The reported figure replaces the running intake
        assert_eq!(plan.history.final_intake, dec!(40));
        assert_eq!(plan.stock.main_stock_delta, dec!(-40));
        assert_eq!(plan.stock.consumed_delta, dec!(40));
        assert_eq!(plan.stock.log_type, StockLogType::CycleClose);
        assert!(plan.writes_stock_log());
    }

    #[test]
    fn test_close_then_reopen_restores_stock() {
        let opening = FarmerStock {
            main_stock: dec!(100),
            total_consumed: dec!(0),
        };
        let active = cycle(1000, 20, 500, dec!(30));
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let close = plan_close(&active, FinalIntake::Reported(dec!(35)), end).unwrap();
        let after_close = opening.apply(&close.stock);
        assert_eq!(after_close.main_stock, dec!(65));
        assert_eq!(after_close.total_consumed, dec!(35));

        let reopen = plan_reopen(&archive(&close));
        let after_reopen = after_close.apply(&reopen.stock);
        assert_eq!(after_reopen, opening);
        assert_eq!(reopen.stock.log_type, StockLogType::Correction);
    }

    #[test]
    fn test_reopen_restores_counters_and_start() {
        let active = cycle(1000, 20, 500, dec!(30));
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let close = plan_close(&active, FinalIntake::Reported(dec!(35)), end).unwrap();
        let reopen = plan_reopen(&archive(&close));

        assert_eq!(reopen.cycle.name, "House A");
        assert_eq!(reopen.cycle.doc, 1000);
        assert_eq!(reopen.cycle.mortality, 20);
        assert_eq!(reopen.cycle.birds_sold, 500);
        assert_eq!(reopen.cycle.intake, dec!(35));
        assert_eq!(
            reopen.cycle.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_end_date_never_precedes_start() {
        let active = cycle(100, 0, 0, dec!(0));
        let early = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
        let plan = plan_close(&active, FinalIntake::Reported(dec!(0)), early).unwrap();

        assert_eq!(plan.history.end_date, active.start_date());
        assert!(!plan.writes_stock_log());
    }

    #[test]
    fn test_close_rejects_negative_intake() {
        let active = cycle(100, 0, 0, dec!(0));
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let result = plan_close(&active, FinalIntake::Reported(dec!(-1)), end);
        assert!(matches!(result, Err(LedgerError::Negative { .. })));
    }

    #[test]
    fn test_mortality_within_ceiling() {
        let active = cycle(100, 10, 85, dec!(0));
        let update = plan_mortality(&active, 5).unwrap();
        assert_eq!(update.mortality, 15);
        assert_eq!(update.birds_sold, 85);
    }

    #[test]
    fn test_mortality_beyond_ceiling_rejected() {
        let active = cycle(100, 10, 85, dec!(0));
        let result = plan_mortality(&active, 6);
        assert_eq!(
            result,
            Err(LedgerError::PopulationCeiling {
                mortality: 16,
                birds_sold: 85,
                doc: 100,
            })
        );
    }

    #[test]
    fn test_mortality_amount_must_be_positive() {
        let active = cycle(100, 0, 0, dec!(0));
        assert!(matches!(
            plan_mortality(&active, 0),
            Err(LedgerError::NotPositive { field: "amount", .. })
        ));
    }

    #[test]
    fn test_doc_correction_must_cover_dead_and_sold() {
        let active = cycle(1000, 30, 600, dec!(0));
        assert_eq!(plan_doc_correction(&active, 630), Ok(630));
        assert!(matches!(
            plan_doc_correction(&active, 629),
            Err(LedgerError::PopulationCeiling { .. })
        ));
        assert!(plan_doc_correction(&active, 0).is_err());
    }

    #[test]
    fn test_backdated_start_matches_age() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let start = backdated_start(now, 5);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(age_on(start.date_naive(), now.date_naive()), 5);
    }

    #[test]
    fn test_age_before_start_is_zero() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(age_on(start, before), 0);
        assert_eq!(age_on(start, start), 1);
    }

    #[test]
    fn test_cycle_status_display() {
        assert_eq!(CycleStatus::Active.to_string(), "active");
        assert_eq!(CycleStatus::Archived.to_string(), "archived");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn bags_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..100_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn prop_close_reopen_is_stock_neutral(
            main in bags_strategy(),
            consumed in bags_strategy(),
            intake in bags_strategy(),
        ) {
            let opening = FarmerStock { main_stock: main, total_consumed: consumed };
            let active = cycle(1000, 0, 0, dec!(0));
            let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

            let close = plan_close(&active, FinalIntake::Reported(intake), end).unwrap();
            let reopen = plan_reopen(&archive(&close));

            prop_assert_eq!(opening.apply(&close.stock).apply(&reopen.stock), opening);
        }

        #[test]
        fn prop_mortality_never_breaks_ceiling(
            doc in 1i32..5_000,
            entries in prop::collection::vec(1i32..200, 0..30),
        ) {
            let mut active = cycle(doc, 0, 0, dec!(0));
            for amount in entries {
                if let Ok(update) = plan_mortality(&active, amount) {
                    active.mortality = update.mortality;
                }
                prop_assert!(active.mortality + active.birds_sold <= active.doc);
            }
        }
    }
}
