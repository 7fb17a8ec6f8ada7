//! Cycle ledger rules
//!
//! Every mutation of a cycle is first planned here against a snapshot of the
//! current rows. A plan is either rejected with a [`LedgerError`] that names the
//! exact threshold, or returned as plain data that the backend writes inside a
//! single transaction. Nothing in this module touches storage.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Cycle, CycleHistory, CycleSnapshot, StockMovement};
use crate::types::{total_bags, FeedEntry};
use crate::validation::{BAG_DECIMALS, MAX_DOC, MAX_PRICE_PER_KG, MAX_SALE_WEIGHT_KG};

/// Rejections raised by the ledger rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: String },

    #[error("{field} cannot be negative (got {value})")]
    Negative { field: &'static str, value: String },

    #[error("{field} exceeds the maximum of {max} (got {value})")]
    TooLarge {
        field: &'static str,
        value: String,
        max: String,
    },

    #[error("{field} allows at most {places} decimal places (got {value})")]
    TooPrecise {
        field: &'static str,
        value: String,
        places: u32,
    },

    #[error("{field} is out of range")]
    CountOverflow { field: &'static str },

    #[error("Sale date {sale_date} is before the cycle start date {start_date}")]
    SaleBeforeStart {
        sale_date: NaiveDate,
        start_date: NaiveDate,
    },

    #[error("Cannot sell {requested} birds: only {available} birds are available")]
    InsufficientBirds { requested: i32, available: i32 },

    #[error("Mortality cannot be negative (would become {proposed})")]
    NegativeMortality { proposed: i32 },

    #[error(
        "Mortality cannot be set to {proposed}: earlier sale reports already recorded {floor}"
    )]
    BelowMortalityFloor { proposed: i32, floor: i32 },

    #[error(
        "Mortality ({mortality}) plus birds sold ({birds_sold}) would exceed DOC ({doc})"
    )]
    PopulationCeiling {
        mortality: i32,
        birds_sold: i32,
        doc: i32,
    },

    #[error("Total mortality {supplied} does not match mortality after this sale ({expected})")]
    MortalityMismatch { supplied: i32, expected: i32 },
}

fn positive_i32(field: &'static str, value: i32) -> Result<(), LedgerError> {
    if value <= 0 {
        return Err(LedgerError::NotPositive {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn positive_decimal(field: &'static str, value: Decimal) -> Result<(), LedgerError> {
    if value <= Decimal::ZERO {
        return Err(LedgerError::NotPositive {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn non_negative_decimal(field: &'static str, value: Decimal) -> Result<(), LedgerError> {
    if value < Decimal::ZERO {
        return Err(LedgerError::Negative {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// `|value| <= MAX_DOC`; every bird count fits inside a single placement
fn bounded_count(field: &'static str, value: i32) -> Result<(), LedgerError> {
    if value.unsigned_abs() > MAX_DOC.unsigned_abs() {
        return Err(LedgerError::TooLarge {
            field,
            value: value.to_string(),
            max: MAX_DOC.to_string(),
        });
    }
    Ok(())
}

fn bounded_decimal(field: &'static str, value: Decimal, max: Decimal) -> Result<(), LedgerError> {
    if value > max {
        return Err(LedgerError::TooLarge {
            field,
            value: value.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

/// Rejects values the storage columns would silently round
fn decimal_places(field: &'static str, value: Decimal, places: u32) -> Result<(), LedgerError> {
    if value.normalize().scale() > places {
        return Err(LedgerError::TooPrecise {
            field,
            value: value.to_string(),
            places,
        });
    }
    Ok(())
}

/// Feed bag quantity as stored: non-negative with at most two decimals
pub fn check_bags(field: &'static str, bags: Decimal) -> Result<(), LedgerError> {
    non_negative_decimal(field, bags)?;
    decimal_places(field, bags, BAG_DECIMALS)
}

fn sale_figures(total_weight: Decimal, price_per_kg: Decimal) -> Result<(), LedgerError> {
    positive_decimal("total_weight", total_weight)?;
    bounded_decimal("total_weight", total_weight, MAX_SALE_WEIGHT_KG)?;
    decimal_places("total_weight", total_weight, 3)?;
    positive_decimal("price_per_kg", price_per_kg)?;
    bounded_decimal("price_per_kg", price_per_kg, MAX_PRICE_PER_KG)?;
    decimal_places("price_per_kg", price_per_kg, 2)
}

fn add_counts(field: &'static str, current: i32, change: i32) -> Result<i32, LedgerError> {
    current
        .checked_add(change)
        .ok_or(LedgerError::CountOverflow { field })
}

fn sub_counts(field: &'static str, current: i32, change: i32) -> Result<i32, LedgerError> {
    current
        .checked_sub(change)
        .ok_or(LedgerError::CountOverflow { field })
}

/// `0 <= mortality`, `0 <= birds_sold` and `mortality + birds_sold <= doc`
pub fn check_population(doc: i32, mortality: i32, birds_sold: i32) -> Result<(), LedgerError> {
    if mortality < 0 {
        return Err(LedgerError::NegativeMortality {
            proposed: mortality,
        });
    }
    if birds_sold < 0 {
        return Err(LedgerError::Negative {
            field: "birds_sold",
            value: birds_sold.to_string(),
        });
    }
    if i64::from(mortality) + i64::from(birds_sold) > i64::from(doc) {
        return Err(LedgerError::PopulationCeiling {
            mortality,
            birds_sold,
            doc,
        });
    }
    Ok(())
}

/// Lower bound on mortality, the highest figure any earlier sale report has
/// committed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MortalityFloor(pub i32);

impl MortalityFloor {
    pub fn from_reports<I: IntoIterator<Item = i32>>(totals: I) -> Self {
        MortalityFloor(totals.into_iter().max().unwrap_or(0).max(0))
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn check(&self, proposed: i32) -> Result<(), LedgerError> {
        if proposed < 0 {
            return Err(LedgerError::NegativeMortality { proposed });
        }
        if proposed < self.0 {
            return Err(LedgerError::BelowMortalityFloor {
                proposed,
                floor: self.0,
            });
        }
        Ok(())
    }
}

/// Which figure became the archived intake when a cycle closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "bags", rename_all = "snake_case")]
pub enum FinalIntake {
    /// Entered by the officer when ending the cycle by hand
    Reported(Decimal),
    /// Feed consumed on the sale that emptied the house
    LastSale(Decimal),
    /// The running model figure after a report adjustment
    Recalculated(Decimal),
}

impl FinalIntake {
    pub fn bags(&self) -> Decimal {
        match self {
            FinalIntake::Reported(b) | FinalIntake::LastSale(b) | FinalIntake::Recalculated(b) => {
                *b
            }
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            FinalIntake::Reported(_) => "reported",
            FinalIntake::LastSale(_) => "last_sale",
            FinalIntake::Recalculated(_) => "recalculated",
        }
    }
}

/// New counter values for an active cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterUpdate {
    pub mortality: i32,
    pub birds_sold: i32,
}

// ============================================================================
// Mortality and DOC
// ============================================================================

/// Plan a mortality entry. The population ceiling applies here as it does to
/// sales and report adjustments.
pub fn plan_mortality(cycle: &Cycle, amount: i32) -> Result<CounterUpdate, LedgerError> {
    positive_i32("amount", amount)?;
    bounded_count("amount", amount)?;
    let mortality = add_counts("mortality", cycle.mortality, amount)?;
    check_population(cycle.doc, mortality, cycle.birds_sold)?;
    Ok(CounterUpdate {
        mortality,
        birds_sold: cycle.birds_sold,
    })
}

/// Plan a DOC correction; the new count must still cover dead and sold birds
pub fn plan_doc_correction(cycle: &Cycle, new_doc: i32) -> Result<i32, LedgerError> {
    positive_i32("doc", new_doc)?;
    bounded_count("doc", new_doc)?;
    check_population(new_doc, cycle.mortality, cycle.birds_sold)?;
    Ok(new_doc)
}

// ============================================================================
// Sales
// ============================================================================

/// Figures of a new sale event that the rules depend on
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRequest {
    pub birds_sold: i32,
    pub mortality_change: i32,
    pub total_mortality: Option<i32>,
    pub total_weight: Decimal,
    pub price_per_kg: Decimal,
    pub feed_consumed: Vec<FeedEntry>,
    pub sale_date: NaiveDate,
}

/// Accepted sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalePlan {
    /// Birds in the house before the sale
    pub house_birds: i32,
    pub counters: CounterUpdate,
    /// Present when the sale empties the house
    pub close_with: Option<FinalIntake>,
}

impl SalePlan {
    pub fn total_mortality(&self) -> i32 {
        self.counters.mortality
    }

    pub fn closes_cycle(&self) -> bool {
        self.close_with.is_some()
    }
}

/// Validate a new sale against the cycle and the mortality floor of its
/// earlier reports
pub fn plan_sale(
    cycle: &Cycle,
    request: &SaleRequest,
    floor: MortalityFloor,
) -> Result<SalePlan, LedgerError> {
    positive_i32("birds_sold", request.birds_sold)?;
    bounded_count("birds_sold", request.birds_sold)?;
    bounded_count("mortality_change", request.mortality_change)?;
    sale_figures(request.total_weight, request.price_per_kg)?;
    for entry in &request.feed_consumed {
        check_bags("feed_consumed.bags", entry.bags)?;
    }

    let start_date = cycle.start_date();
    if request.sale_date < start_date {
        return Err(LedgerError::SaleBeforeStart {
            sale_date: request.sale_date,
            start_date,
        });
    }

    let new_mortality = add_counts("mortality", cycle.mortality, request.mortality_change)?;
    floor.check(new_mortality)?;
    if let Some(supplied) = request.total_mortality {
        if supplied != new_mortality {
            return Err(LedgerError::MortalityMismatch {
                supplied,
                expected: new_mortality,
            });
        }
    }

    // A negative mortality change frees capacity, a positive one consumes it
    let available =
        i64::from(cycle.doc) - i64::from(new_mortality) - i64::from(cycle.birds_sold);
    if i64::from(request.birds_sold) > available {
        return Err(LedgerError::InsufficientBirds {
            requested: request.birds_sold,
            available: i32::try_from(available.max(0)).unwrap_or(i32::MAX),
        });
    }

    let birds_sold = add_counts("birds_sold", cycle.birds_sold, request.birds_sold)?;
    check_population(cycle.doc, new_mortality, birds_sold)?;

    let close_with = if birds_sold >= cycle.doc - new_mortality {
        Some(FinalIntake::LastSale(total_bags(&request.feed_consumed)))
    } else {
        None
    };

    Ok(SalePlan {
        house_birds: cycle.remaining_birds(),
        counters: CounterUpdate {
            mortality: new_mortality,
            birds_sold,
        },
        close_with,
    })
}

/// Quantity figures of a report that drive inventory reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub birds_sold: i32,
    pub total_mortality: i32,
}

/// Accepted report adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentPlan {
    pub mortality_difference: i32,
    pub birds_sold_difference: i32,
    /// New counters for the active cycle the sale belongs to, if any changed
    pub counters: Option<CounterUpdate>,
    /// The adjusted counters leave no birds in the house
    pub closes_cycle: bool,
}

impl AdjustmentPlan {
    pub fn changes_inventory(&self) -> bool {
        self.mortality_difference != 0 || self.birds_sold_difference != 0
    }
}

/// Validate a new report version against the previous one and, while the sale
/// is still tied to an active cycle, reconcile the cycle counters
pub fn plan_adjustment(
    active_cycle: Option<&Cycle>,
    previous: ReportCounts,
    proposed: ReportCounts,
    total_weight: Decimal,
    price_per_kg: Decimal,
    floor: MortalityFloor,
) -> Result<AdjustmentPlan, LedgerError> {
    positive_i32("birds_sold", proposed.birds_sold)?;
    bounded_count("birds_sold", proposed.birds_sold)?;
    bounded_count("total_mortality", proposed.total_mortality)?;
    sale_figures(total_weight, price_per_kg)?;
    floor.check(proposed.total_mortality)?;

    let mortality_difference = sub_counts(
        "mortality",
        proposed.total_mortality,
        previous.total_mortality,
    )?;
    let birds_sold_difference = sub_counts("birds_sold", proposed.birds_sold, previous.birds_sold)?;

    let mut plan = AdjustmentPlan {
        mortality_difference,
        birds_sold_difference,
        counters: None,
        closes_cycle: false,
    };

    if let Some(cycle) = active_cycle {
        if plan.changes_inventory() {
            let mortality = add_counts("mortality", cycle.mortality, mortality_difference)?;
            let birds_sold = add_counts("birds_sold", cycle.birds_sold, birds_sold_difference)?;
            check_population(cycle.doc, mortality, birds_sold)?;
            plan.counters = Some(CounterUpdate {
                mortality,
                birds_sold,
            });
            plan.closes_cycle = birds_sold >= cycle.doc - mortality;
        }
    }

    Ok(plan)
}

// ============================================================================
// Close and reopen
// ============================================================================

/// Archived row to insert when a cycle closes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistory {
    pub farmer_id: uuid::Uuid,
    pub organization_id: uuid::Uuid,
    pub cycle_name: String,
    pub doc: i32,
    pub mortality: i32,
    pub birds_sold: i32,
    pub age: i32,
    pub final_intake: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePlan {
    pub history: NewHistory,
    pub final_intake: FinalIntake,
    pub stock: StockMovement,
}

impl ClosePlan {
    /// Stock logs are only written when feed actually left the reserve
    pub fn writes_stock_log(&self) -> bool {
        self.final_intake.bags() > Decimal::ZERO
    }
}

/// Plan the active → archived transition. The final intake replaces the
/// running intake figure; it is not added to it.
pub fn plan_close(
    cycle: &Cycle,
    final_intake: FinalIntake,
    end_date: NaiveDate,
) -> Result<ClosePlan, LedgerError> {
    check_bags("intake", final_intake.bags())?;
    let bags = final_intake.bags();
    Ok(ClosePlan {
        history: NewHistory {
            farmer_id: cycle.farmer_id,
            organization_id: cycle.organization_id,
            cycle_name: cycle.name.clone(),
            doc: cycle.doc,
            mortality: cycle.mortality,
            birds_sold: cycle.birds_sold,
            age: cycle.age,
            final_intake: bags,
            start_date: cycle.start_date(),
            end_date: end_date.max(cycle.start_date()),
        },
        final_intake,
        stock: StockMovement::cycle_close(bags),
    })
}

/// Active row to insert when a history is reopened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCycle {
    pub farmer_id: uuid::Uuid,
    pub organization_id: uuid::Uuid,
    pub name: String,
    pub doc: i32,
    pub mortality: i32,
    pub birds_sold: i32,
    pub age: i32,
    pub intake: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReopenPlan {
    pub cycle: NewCycle,
    pub stock: StockMovement,
}

/// Plan the archived → active transition, the exact inverse of closing
pub fn plan_reopen(history: &CycleHistory) -> ReopenPlan {
    let created_at = history
        .start_date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(history.created_at);
    ReopenPlan {
        cycle: NewCycle {
            farmer_id: history.farmer_id,
            organization_id: history.organization_id,
            name: history.cycle_name.clone(),
            doc: history.doc,
            mortality: history.mortality,
            birds_sold: history.birds_sold,
            age: history.age,
            intake: history.final_intake,
            created_at,
        },
        stock: StockMovement::reopen_correction(history.final_intake),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn cycle(doc: i32, mortality: i32, birds_sold: i32) -> Cycle {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        Cycle {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "House 1".to_string(),
            doc,
            mortality,
            birds_sold,
            age: 30,
            intake: dec!(35.5),
            created_at: created,
            updated_at: created,
        }
    }

    fn sale(birds_sold: i32, mortality_change: i32) -> SaleRequest {
        SaleRequest {
            birds_sold,
            mortality_change,
            total_mortality: None,
            total_weight: dec!(200),
            price_per_kg: dec!(150),
            feed_consumed: vec![FeedEntry::new("B1", dec!(12))],
            sale_date: NaiveDate::from_ymd_opt(2024, 5, 30).unwrap(),
        }
    }

    #[test]
    fn test_negative_change_frees_capacity() {
        let c = cycle(100, 10, 80);
        // 10 remaining, resurrecting 2 birds makes 12 available
        let plan = plan_sale(&c, &sale(12, -2), MortalityFloor(0)).unwrap();
        assert_eq!(plan.counters.mortality, 8);
        assert_eq!(plan.counters.birds_sold, 92);
        assert!(plan.closes_cycle());
    }

    #[test]
    fn test_positive_change_consumes_capacity() {
        let c = cycle(100, 10, 80);
        let err = plan_sale(&c, &sale(10, 1), MortalityFloor(0)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBirds {
                requested: 10,
                available: 9
            }
        );
    }

    #[test]
    fn test_sale_before_start_rejected() {
        let c = cycle(100, 0, 0);
        let mut req = sale(10, 0);
        req.sale_date = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        assert!(matches!(
            plan_sale(&c, &req, MortalityFloor(0)),
            Err(LedgerError::SaleBeforeStart { .. })
        ));
    }

    #[test]
    fn test_sale_respects_floor() {
        let c = cycle(100, 10, 0);
        let err = plan_sale(&c, &sale(5, -3), MortalityFloor(9)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::BelowMortalityFloor {
                proposed: 7,
                floor: 9
            }
        );
    }

    #[test]
    fn test_supplied_total_mortality_must_match() {
        let c = cycle(100, 10, 0);
        let mut req = sale(5, 2);
        req.total_mortality = Some(11);
        assert_eq!(
            plan_sale(&c, &req, MortalityFloor(0)).unwrap_err(),
            LedgerError::MortalityMismatch {
                supplied: 11,
                expected: 12
            }
        );
        req.total_mortality = Some(12);
        assert!(plan_sale(&c, &req, MortalityFloor(0)).is_ok());
    }

    #[test]
    fn test_partial_sale_keeps_cycle_open() {
        let c = cycle(100, 0, 0);
        let plan = plan_sale(&c, &sale(40, 0), MortalityFloor(0)).unwrap();
        assert_eq!(plan.house_birds, 100);
        assert!(!plan.closes_cycle());
    }

    #[test]
    fn test_mortality_ceiling_enforced() {
        let c = cycle(100, 50, 45);
        assert!(plan_mortality(&c, 5).is_ok());
        assert_eq!(
            plan_mortality(&c, 6).unwrap_err(),
            LedgerError::PopulationCeiling {
                mortality: 56,
                birds_sold: 45,
                doc: 100
            }
        );
        assert!(plan_mortality(&c, 0).is_err());
    }

    #[test]
    fn test_doc_correction_must_cover_counters() {
        let c = cycle(100, 10, 60);
        assert_eq!(plan_doc_correction(&c, 70), Ok(70));
        assert!(plan_doc_correction(&c, 69).is_err());
        assert!(plan_doc_correction(&c, 0).is_err());
    }

    #[test]
    fn test_adjustment_loophole_rejected() {
        let c = cycle(100, 10, 80);
        let previous = ReportCounts {
            birds_sold: 40,
            total_mortality: 10,
        };
        let proposed = ReportCounts {
            birds_sold: 52,
            total_mortality: 10,
        };
        let err = plan_adjustment(
            Some(&c),
            previous,
            proposed,
            dec!(100),
            dec!(140),
            MortalityFloor(10),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::PopulationCeiling { .. }));
    }

    #[test]
    fn test_adjustment_on_archived_sale_only_reports_deltas() {
        let previous = ReportCounts {
            birds_sold: 40,
            total_mortality: 10,
        };
        let proposed = ReportCounts {
            birds_sold: 38,
            total_mortality: 12,
        };
        let plan = plan_adjustment(
            None,
            previous,
            proposed,
            dec!(100),
            dec!(140),
            MortalityFloor(10),
        )
        .unwrap();
        assert_eq!(plan.birds_sold_difference, -2);
        assert_eq!(plan.mortality_difference, 2);
        assert_eq!(plan.counters, None);
        assert!(!plan.closes_cycle);
    }

    #[test]
    fn test_close_uses_final_intake_as_override() {
        let c = cycle(100, 5, 95);
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let plan = plan_close(&c, FinalIntake::Reported(dec!(20)), end).unwrap();
        assert_eq!(plan.history.final_intake, dec!(20));
        assert_eq!(plan.stock.main_stock_delta, dec!(-20));
        assert!(plan.writes_stock_log());

        let zero = plan_close(&c, FinalIntake::Reported(Decimal::ZERO), end).unwrap();
        assert!(!zero.writes_stock_log());
        assert!(plan_close(&c, FinalIntake::Reported(dec!(-1)), end).is_err());
    }

    #[test]
    fn test_mortality_at_i32_max_is_rejected() {
        let c = cycle(100, 10, 0);
        assert!(matches!(
            plan_mortality(&c, i32::MAX),
            Err(LedgerError::TooLarge { field: "amount", .. })
        ));
        // Stored counters near the limit still cannot wrap
        let near_limit = cycle(100, i32::MAX - 1, 0);
        assert_eq!(
            plan_mortality(&near_limit, 5).unwrap_err(),
            LedgerError::CountOverflow { field: "mortality" }
        );
        assert!(check_population(100, i32::MAX, i32::MAX).is_err());
    }

    #[test]
    fn test_sale_with_huge_mortality_change_is_rejected() {
        let c = cycle(100, 10, 0);
        for change in [i32::MAX, i32::MIN] {
            assert!(matches!(
                plan_sale(&c, &sale(5, change), MortalityFloor(0)),
                Err(LedgerError::TooLarge { field: "mortality_change", .. })
            ));
        }
        assert!(matches!(
            plan_sale(&c, &sale(i32::MAX, 0), MortalityFloor(0)),
            Err(LedgerError::TooLarge { field: "birds_sold", .. })
        ));
    }

    #[test]
    fn test_adjustment_at_i32_max_cannot_close_cycle() {
        let c = cycle(100, 10, 0);
        let previous = ReportCounts {
            birds_sold: 1,
            total_mortality: 10,
        };
        let proposed = ReportCounts {
            birds_sold: i32::MAX,
            total_mortality: 10,
        };
        let err = plan_adjustment(
            Some(&c),
            previous,
            proposed,
            dec!(100),
            dec!(140),
            MortalityFloor(10),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::TooLarge { field: "birds_sold", .. }));

        // Counts inside the bound still hit the population ceiling
        let proposed = ReportCounts {
            birds_sold: MAX_DOC,
            total_mortality: 10,
        };
        let err = plan_adjustment(
            Some(&c),
            previous,
            proposed,
            dec!(100),
            dec!(140),
            MortalityFloor(10),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::PopulationCeiling { .. }));
    }

    #[test]
    fn test_sale_figures_are_bounded() {
        let c = cycle(100, 0, 0);
        let mut req = sale(10, 0);
        req.total_weight = Decimal::MAX;
        assert!(matches!(
            plan_sale(&c, &req, MortalityFloor(0)),
            Err(LedgerError::TooLarge { field: "total_weight", .. })
        ));

        let mut req = sale(10, 0);
        req.price_per_kg = MAX_PRICE_PER_KG + dec!(1);
        assert!(matches!(
            plan_sale(&c, &req, MortalityFloor(0)),
            Err(LedgerError::TooLarge { field: "price_per_kg", .. })
        ));

        let mut req = sale(10, 0);
        req.total_weight = dec!(20.0005);
        assert!(matches!(
            plan_sale(&c, &req, MortalityFloor(0)),
            Err(LedgerError::TooPrecise { field: "total_weight", places: 3, .. })
        ));
    }

    #[test]
    fn test_bag_quantities_keep_two_decimals() {
        let c = cycle(100, 5, 95);
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            plan_close(&c, FinalIntake::Reported(dec!(40.125)), end).unwrap_err(),
            LedgerError::TooPrecise {
                field: "intake",
                value: "40.125".to_string(),
                places: 2
            }
        );

        let mut req = sale(5, 0);
        req.feed_consumed = vec![FeedEntry::new("B1", dec!(3.333))];
        assert!(matches!(
            plan_sale(&cycle(100, 0, 0), &req, MortalityFloor(0)),
            Err(LedgerError::TooPrecise { field: "feed_consumed.bags", .. })
        ));
    }

    #[test]
    fn test_close_then_reopen_returns_exact_stock() {
        let c = cycle(100, 5, 95);
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let close = plan_close(&c, FinalIntake::Reported(dec!(40.13)), end).unwrap();
        let history = CycleHistory {
            id: Uuid::new_v4(),
            farmer_id: close.history.farmer_id,
            organization_id: close.history.organization_id,
            cycle_name: close.history.cycle_name.clone(),
            doc: close.history.doc,
            mortality: close.history.mortality,
            birds_sold: close.history.birds_sold,
            age: close.history.age,
            // Stored in a two-decimal column
            final_intake: close.history.final_intake.round_dp(2),
            start_date: close.history.start_date,
            end_date: close.history.end_date,
            created_at: Utc::now(),
        };
        let reopen = plan_reopen(&history);

        let main_stock = dec!(100.00);
        let after_close = (main_stock + close.stock.main_stock_delta).round_dp(2);
        let after_reopen = (after_close + reopen.stock.main_stock_delta).round_dp(2);
        assert_eq!(after_reopen, main_stock);
    }

    #[test]
    fn test_reopen_mirrors_history() {
        let history = CycleHistory {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            cycle_name: "House 2".to_string(),
            doc: 500,
            mortality: 12,
            birds_sold: 488,
            age: 33,
            final_intake: dec!(61.25),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 4).unwrap(),
            created_at: Utc::now(),
        };
        let plan = plan_reopen(&history);
        assert_eq!(plan.cycle.doc, 500);
        assert_eq!(plan.cycle.intake, dec!(61.25));
        assert_eq!(plan.cycle.created_at.date_naive(), history.start_date);
        assert_eq!(plan.stock.main_stock_delta, dec!(61.25));
        assert_eq!(plan.stock.consumed_delta, dec!(-61.25));
    }
}
