//! Database models for the Broiler Cycle Ledger
//!
//! Re-exports models from the shared crate and adds the row types the
//! services read from Postgres

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

pub use shared::models::*;
use shared::FeedEntry;

use crate::error::AppError;

pub const CYCLE_COLUMNS: &str = "id, farmer_id, organization_id, name, doc, mortality, birds_sold, \
     age, intake, created_at, updated_at";

pub const HISTORY_COLUMNS: &str = "id, farmer_id, organization_id, cycle_name, doc, mortality, \
     birds_sold, age, final_intake, start_date, end_date, created_at";

pub const CYCLE_LOG_COLUMNS: &str = "id, cycle_id, history_id, log_type, value_change, \
     previous_value, new_value, note, actor_id, created_at";

pub const SALE_EVENT_COLUMNS: &str = "id, cycle_id, history_id, farmer_id, location, house_birds, \
     birds_sold, total_mortality, total_weight, avg_weight, price_per_kg, total_amount, \
     cash_received, deposit_received, medicine_cost, feed_consumed, feed_stock, sale_date, \
     created_by, created_at";

pub const SALE_REPORT_COLUMNS: &str = "id, sale_event_id, version, birds_sold, total_mortality, \
     total_weight, avg_weight, price_per_kg, total_amount, cash_received, deposit_received, \
     medicine_cost, feed_consumed, feed_stock, adjustment_note, created_by, created_at";

pub const FARMER_COLUMNS: &str = "id, organization_id, officer_id, name, phone, main_stock, \
     total_consumed, archived_at, created_at, updated_at";

pub const STOCK_LOG_COLUMNS: &str =
    "id, farmer_id, amount, log_type, reference_id, note, actor_id, created_at";

/// Database row for an active cycle
#[derive(Debug, FromRow)]
pub struct CycleRow {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub doc: i32,
    pub mortality: i32,
    pub birds_sold: i32,
    pub age: i32,
    pub intake: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CycleRow> for Cycle {
    fn from(row: CycleRow) -> Self {
        Cycle {
            id: row.id,
            farmer_id: row.farmer_id,
            organization_id: row.organization_id,
            name: row.name,
            doc: row.doc,
            mortality: row.mortality,
            birds_sold: row.birds_sold,
            age: row.age,
            intake: row.intake,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for an archived cycle
#[derive(Debug, FromRow)]
pub struct HistoryRow {
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

impl From<HistoryRow> for CycleHistory {
    fn from(row: HistoryRow) -> Self {
        CycleHistory {
            id: row.id,
            farmer_id: row.farmer_id,
            organization_id: row.organization_id,
            cycle_name: row.cycle_name,
            doc: row.doc,
            mortality: row.mortality,
            birds_sold: row.birds_sold,
            age: row.age,
            final_intake: row.final_intake,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
        }
    }
}

fn owner_of(table: &str, id: Uuid, cycle_id: Option<Uuid>, history_id: Option<Uuid>) -> Result<LogOwner, AppError> {
    LogOwner::from_columns(cycle_id, history_id)
        .ok_or_else(|| AppError::Internal(format!("{} {} has no single owner", table, id)))
}

/// Database row for an audit entry
#[derive(Debug, FromRow)]
pub struct CycleLogRow {
    pub id: Uuid,
    pub cycle_id: Option<Uuid>,
    pub history_id: Option<Uuid>,
    pub log_type: String,
    pub value_change: Decimal,
    pub previous_value: Option<Decimal>,
    pub new_value: Option<Decimal>,
    pub note: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CycleLogRow> for CycleLog {
    type Error = AppError;

    fn try_from(row: CycleLogRow) -> Result<Self, Self::Error> {
        let owner = owner_of("cycle log", row.id, row.cycle_id, row.history_id)?;
        let log_type = CycleLogType::parse(&row.log_type)
            .ok_or_else(|| AppError::Internal(format!("unknown log type {}", row.log_type)))?;
        Ok(CycleLog {
            id: row.id,
            owner,
            log_type,
            value_change: row.value_change,
            previous_value: row.previous_value,
            new_value: row.new_value,
            note: row.note,
            actor_id: row.actor_id,
            created_at: row.created_at,
        })
    }
}

/// Database row for a sale event
#[derive(Debug, FromRow)]
pub struct SaleEventRow {
    pub id: Uuid,
    pub cycle_id: Option<Uuid>,
    pub history_id: Option<Uuid>,
    pub farmer_id: Uuid,
    pub location: Option<String>,
    pub house_birds: i32,
    pub birds_sold: i32,
    pub total_mortality: i32,
    pub total_weight: Decimal,
    pub avg_weight: Decimal,
    pub price_per_kg: Decimal,
    pub total_amount: Decimal,
    pub cash_received: Decimal,
    pub deposit_received: Decimal,
    pub medicine_cost: Decimal,
    pub feed_consumed: Json<Vec<FeedEntry>>,
    pub feed_stock: Json<Vec<FeedEntry>>,
    pub sale_date: NaiveDate,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SaleEventRow> for SaleEvent {
    type Error = AppError;

    fn try_from(row: SaleEventRow) -> Result<Self, Self::Error> {
        let owner = owner_of("sale event", row.id, row.cycle_id, row.history_id)?;
        Ok(SaleEvent {
            id: row.id,
            owner,
            farmer_id: row.farmer_id,
            location: row.location,
            house_birds: row.house_birds,
            birds_sold: row.birds_sold,
            total_mortality: row.total_mortality,
            total_weight: row.total_weight,
            avg_weight: row.avg_weight,
            price_per_kg: row.price_per_kg,
            total_amount: row.total_amount,
            cash_received: row.cash_received,
            deposit_received: row.deposit_received,
            medicine_cost: row.medicine_cost,
            feed_consumed: row.feed_consumed.0,
            feed_stock: row.feed_stock.0,
            sale_date: row.sale_date,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

/// Database row for a sale report version
#[derive(Debug, FromRow)]
pub struct SaleReportRow {
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
    pub feed_consumed: Json<Vec<FeedEntry>>,
    pub feed_stock: Json<Vec<FeedEntry>>,
    pub adjustment_note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<SaleReportRow> for SaleReport {
    fn from(row: SaleReportRow) -> Self {
        SaleReport {
            id: row.id,
            sale_event_id: row.sale_event_id,
            version: row.version,
            birds_sold: row.birds_sold,
            total_mortality: row.total_mortality,
            total_weight: row.total_weight,
            avg_weight: row.avg_weight,
            price_per_kg: row.price_per_kg,
            total_amount: row.total_amount,
            cash_received: row.cash_received,
            deposit_received: row.deposit_received,
            medicine_cost: row.medicine_cost,
            feed_consumed: row.feed_consumed.0,
            feed_stock: row.feed_stock.0,
            adjustment_note: row.adjustment_note,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

/// Database row for a farmer
#[derive(Debug, FromRow)]
pub struct FarmerRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub officer_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub main_stock: Decimal,
    pub total_consumed: Decimal,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FarmerRow> for Farmer {
    fn from(row: FarmerRow) -> Self {
        Farmer {
            id: row.id,
            organization_id: row.organization_id,
            officer_id: row.officer_id,
            name: row.name,
            phone: row.phone,
            main_stock: row.main_stock,
            total_consumed: row.total_consumed,
            archived_at: row.archived_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for a stock log entry
#[derive(Debug, FromRow)]
pub struct StockLogRow {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub amount: Decimal,
    pub log_type: String,
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StockLogRow> for StockLog {
    type Error = AppError;

    fn try_from(row: StockLogRow) -> Result<Self, Self::Error> {
        let log_type = StockLogType::parse(&row.log_type)
            .ok_or_else(|| AppError::Internal(format!("unknown stock log type {}", row.log_type)))?;
        Ok(StockLog {
            id: row.id,
            farmer_id: row.farmer_id,
            amount: row.amount,
            log_type,
            reference_id: row.reference_id,
            note: row.note,
            actor_id: row.actor_id,
            created_at: row.created_at,
        })
    }
}
