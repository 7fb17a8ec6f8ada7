//! Sale ledger models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LogOwner;
use crate::metrics::SaleFigures;
use crate::types::FeedEntry;

/// One physical sale of birds from a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleEvent {
    pub id: Uuid,
    pub owner: LogOwner,
    pub farmer_id: Uuid,
    pub location: Option<String>,
    /// Birds in the house before this sale
    pub house_birds: i32,
    pub birds_sold: i32,
    /// Mortality to date at the time of the sale, not a delta
    pub total_mortality: i32,
    pub total_weight: Decimal,
    pub avg_weight: Decimal,
    pub price_per_kg: Decimal,
    pub total_amount: Decimal,
    pub cash_received: Decimal,
    pub deposit_received: Decimal,
    pub medicine_cost: Decimal,
    pub feed_consumed: Vec<FeedEntry>,
    pub feed_stock: Vec<FeedEntry>,
    pub sale_date: NaiveDate,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl SaleEvent {
    pub fn figures(&self) -> SaleFigures {
        SaleFigures {
            total_weight: self.total_weight,
            price_per_kg: self.price_per_kg,
        }
    }
}

/// A version of a sale event's figures. The highest version is current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReport {
    pub id: Uuid,
    pub sale_event_id: Uuid,
    pub version: i32,
    pub birds_sold: i32,
    pub total_mortality: i32,
    pub total_weight: Decimal,
    pub avg_weight: Decimal,
    pub price_per_kg: Decimal,
    pub total_amount: Decimal,
    pub cash_received: Decimal,
    pub deposit_received: Decimal,
    pub medicine_cost: Decimal,
    pub feed_consumed: Vec<FeedEntry>,
    pub feed_stock: Vec<FeedEntry>,
    pub adjustment_note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Quantity and money figures carried by both events and reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleAmounts {
    pub birds_sold: i32,
    pub total_mortality: i32,
    pub total_weight: Decimal,
    pub avg_weight: Decimal,
    pub price_per_kg: Decimal,
    pub total_amount: Decimal,
    pub cash_received: Decimal,
    pub deposit_received: Decimal,
    pub medicine_cost: Decimal,
    pub feed_consumed: Vec<FeedEntry>,
    pub feed_stock: Vec<FeedEntry>,
}

impl SaleAmounts {
    /// Derive average weight and amount from the entered figures. The amount
    /// is rounded to cents.
    #[allow(clippy::too_many_arguments)]
    pub fn derive(
        birds_sold: i32,
        total_mortality: i32,
        total_weight: Decimal,
        price_per_kg: Decimal,
        cash_received: Decimal,
        deposit_received: Decimal,
        medicine_cost: Decimal,
        feed_consumed: Vec<FeedEntry>,
        feed_stock: Vec<FeedEntry>,
    ) -> Self {
        Self {
            birds_sold,
            total_mortality,
            total_weight,
            avg_weight: average_weight(total_weight, birds_sold),
            price_per_kg,
            total_amount: (total_weight * price_per_kg).round_dp(2),
            cash_received,
            deposit_received,
            medicine_cost,
            feed_consumed,
            feed_stock,
        }
    }

    /// Amount still owed after cash and deposit
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.cash_received - self.deposit_received
    }
}

/// Average live weight per bird, rounded to 3 decimals
pub fn average_weight(total_weight: Decimal, birds: i32) -> Decimal {
    if birds <= 0 {
        Decimal::ZERO
    } else {
        (total_weight / Decimal::from(birds)).round_dp(3)
    }
}
