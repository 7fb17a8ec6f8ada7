//! Farmer and shared feed-stock models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A farmer with a feed reserve shared by all of their cycles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Farmer {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Officer responsible for this farmer
    pub officer_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    /// Feed bags in reserve
    pub main_stock: Decimal,
    /// Feed bags consumed by closed cycles
    pub total_consumed: Decimal,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Farmer {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn stock(&self) -> FarmerStock {
        FarmerStock {
            main_stock: self.main_stock,
            total_consumed: self.total_consumed,
        }
    }
}

/// Stock log category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockLogType {
    CycleClose,
    Correction,
    Restock,
}

impl StockLogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockLogType::CycleClose => "CYCLE_CLOSE",
            StockLogType::Correction => "CORRECTION",
            StockLogType::Restock => "RESTOCK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CYCLE_CLOSE" => Some(StockLogType::CycleClose),
            "CORRECTION" => Some(StockLogType::Correction),
            "RESTOCK" => Some(StockLogType::Restock),
            _ => None,
        }
    }
}

/// Append-only record of a change to a farmer's main stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLog {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub amount: Decimal,
    pub log_type: StockLogType,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// The two stock counters of a farmer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerStock {
    pub main_stock: Decimal,
    pub total_consumed: Decimal,
}

/// A change to a farmer's stock counters. Built only by the ledger planners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub main_stock_delta: Decimal,
    pub consumed_delta: Decimal,
    pub log_type: StockLogType,
}

impl StockMovement {
    /// Closing a cycle moves `intake` bags from reserve to consumed
    pub fn cycle_close(intake: Decimal) -> Self {
        Self {
            main_stock_delta: -intake,
            consumed_delta: intake,
            log_type: StockLogType::CycleClose,
        }
    }

    /// Reopening a cycle gives its final intake back to the reserve
    pub fn reopen_correction(final_intake: Decimal) -> Self {
        Self {
            main_stock_delta: final_intake,
            consumed_delta: -final_intake,
            log_type: StockLogType::Correction,
        }
    }

    pub fn restock(bags: Decimal) -> Self {
        Self {
            main_stock_delta: bags,
            consumed_delta: Decimal::ZERO,
            log_type: StockLogType::Restock,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.main_stock_delta.is_zero() && self.consumed_delta.is_zero()
    }
}

impl FarmerStock {
    pub fn apply(self, movement: &StockMovement) -> Self {
        Self {
            main_stock: self.main_stock + movement.main_stock_delta,
            total_consumed: self.total_consumed + movement.consumed_delta,
        }
    }
}
