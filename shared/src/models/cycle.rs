//! Production cycle models: the active batch and its archived form

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::{CycleMetrics, PricingPolicy, SaleFigures};

/// A batch of birds still in production
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cycle {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Day-old chicks placed at the start of the cycle
    pub doc: i32,
    pub mortality: i32,
    pub birds_sold: i32,
    /// Age in days
    pub age: i32,
    /// Cumulative feed bags consumed, maintained by feed recalculation
    pub intake: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cycle {
    pub fn start_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// The archived record of a finished cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleHistory {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub organization_id: Uuid,
    pub cycle_name: String,
    pub doc: i32,
    pub mortality: i32,
    pub birds_sold: i32,
    pub age: i32,
    pub final_intake: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Active,
    Archived,
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleStatus::Active => write!(f, "active"),
            CycleStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Read access shared by active and archived cycles
pub trait CycleSnapshot {
    fn doc(&self) -> i32;
    fn mortality(&self) -> i32;
    fn birds_sold(&self) -> i32;
    fn age(&self) -> i32;
    fn intake(&self) -> Decimal;

    /// Birds still in the house
    fn remaining_birds(&self) -> i32 {
        self.doc() - self.mortality() - self.birds_sold()
    }

    /// Birds that survived, whether still in the house or already sold
    fn survivors(&self) -> i32 {
        self.doc() - self.mortality()
    }
}

impl CycleSnapshot for Cycle {
    fn doc(&self) -> i32 {
        self.doc
    }
    fn mortality(&self) -> i32 {
        self.mortality
    }
    fn birds_sold(&self) -> i32 {
        self.birds_sold
    }
    fn age(&self) -> i32 {
        self.age
    }
    fn intake(&self) -> Decimal {
        self.intake
    }
}

impl CycleSnapshot for CycleHistory {
    fn doc(&self) -> i32 {
        self.doc
    }
    fn mortality(&self) -> i32 {
        self.mortality
    }
    fn birds_sold(&self) -> i32 {
        self.birds_sold
    }
    fn age(&self) -> i32 {
        self.age
    }
    fn intake(&self) -> Decimal {
        self.final_intake
    }
}

/// A cycle in either of its two persisted shapes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CycleRef {
    Active(Cycle),
    #[serde(rename = "history")]
    Archived(CycleHistory),
}

impl CycleRef {
    pub fn id(&self) -> Uuid {
        match self {
            CycleRef::Active(c) => c.id,
            CycleRef::Archived(h) => h.id,
        }
    }

    pub fn farmer_id(&self) -> Uuid {
        match self {
            CycleRef::Active(c) => c.farmer_id,
            CycleRef::Archived(h) => h.farmer_id,
        }
    }

    pub fn organization_id(&self) -> Uuid {
        match self {
            CycleRef::Active(c) => c.organization_id,
            CycleRef::Archived(h) => h.organization_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CycleRef::Active(c) => &c.name,
            CycleRef::Archived(h) => &h.cycle_name,
        }
    }

    pub fn status(&self) -> CycleStatus {
        match self {
            CycleRef::Active(_) => CycleStatus::Active,
            CycleRef::Archived(_) => CycleStatus::Archived,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, CycleRef::Archived(_))
    }

    pub fn start_date(&self) -> NaiveDate {
        match self {
            CycleRef::Active(c) => c.start_date(),
            CycleRef::Archived(h) => h.start_date,
        }
    }

    /// Production metrics. Only archived cycles have meaningful figures.
    pub fn metrics(&self, sales: &[SaleFigures], policy: &PricingPolicy) -> Option<CycleMetrics> {
        match self {
            CycleRef::Active(_) => None,
            CycleRef::Archived(h) => Some(CycleMetrics::compute(h, sales, policy)),
        }
    }
}

impl CycleSnapshot for CycleRef {
    fn doc(&self) -> i32 {
        match self {
            CycleRef::Active(c) => c.doc(),
            CycleRef::Archived(h) => h.doc(),
        }
    }
    fn mortality(&self) -> i32 {
        match self {
            CycleRef::Active(c) => c.mortality(),
            CycleRef::Archived(h) => h.mortality(),
        }
    }
    fn birds_sold(&self) -> i32 {
        match self {
            CycleRef::Active(c) => c.birds_sold(),
            CycleRef::Archived(h) => h.birds_sold(),
        }
    }
    fn age(&self) -> i32 {
        match self {
            CycleRef::Active(c) => c.age(),
            CycleRef::Archived(h) => h.age(),
        }
    }
    fn intake(&self) -> Decimal {
        match self {
            CycleRef::Active(c) => c.intake(),
            CycleRef::Archived(h) => h.intake(),
        }
    }
}

/// Backdated creation timestamp so that day one of the cycle is `age` days ago
/// counting today
pub fn backdated_start(now: DateTime<Utc>, age: i32) -> DateTime<Utc> {
    if age > 1 {
        now - chrono::Duration::days(i64::from(age - 1))
    } else {
        now
    }
}

/// Age in days on `date` for a cycle that started on `start`. The start day is
/// day one.
pub fn age_on(start: NaiveDate, date: NaiveDate) -> i32 {
    let days = (date - start).num_days();
    if days < 0 {
        0
    } else {
        (days + 1) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cycle() -> Cycle {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        Cycle {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Batch A".to_string(),
            doc: 1000,
            mortality: 20,
            birds_sold: 300,
            age: 25,
            intake: Decimal::from(30),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_remaining_and_survivors() {
        let c = cycle();
        assert_eq!(c.remaining_birds(), 680);
        assert_eq!(c.survivors(), 980);
    }

    #[test]
    fn test_backdated_start_keeps_age_consistent() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        let start = backdated_start(now, 10);
        assert_eq!(age_on(start.date_naive(), now.date_naive()), 10);
        assert_eq!(backdated_start(now, 1), now);
        assert_eq!(backdated_start(now, 0), now);
    }

    #[test]
    fn test_age_on_before_start_is_zero() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(age_on(start, before), 0);
        assert_eq!(age_on(start, start), 1);
    }

    #[test]
    fn test_cycle_ref_serializes_tagged() {
        let json = serde_json::to_value(CycleRef::Active(cycle())).unwrap();
        assert_eq!(json["type"], "active");
        assert_eq!(json["data"]["doc"], 1000);
    }

    #[test]
    fn test_active_cycle_has_no_metrics() {
        let r = CycleRef::Active(cycle());
        assert!(!r.is_ended());
        assert!(r.metrics(&[], &PricingPolicy::default()).is_none());
    }
}
