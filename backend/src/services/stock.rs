//! Farmer feed-stock ledger
//!
//! The only writer of `farmers.main_stock` and `farmers.total_consumed`. The
//! farmer row is locked, the movement applied to the locked values and the
//! stock log written on the caller's transaction.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Farmer, FarmerRow, FarmerStock, StockMovement};
use crate::services::farmer::select_farmer_sql;

/// Lock a farmer row for the rest of the transaction
pub async fn lock_farmer(conn: &mut PgConnection, farmer_id: Uuid) -> AppResult<Farmer> {
    let sql = select_farmer_sql(true);
    let row = sqlx::query_as::<_, FarmerRow>(&sql)
        .bind(farmer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Farmer".to_string()))?;
    Ok(row.into())
}

/// What a stock movement is attached to in the stock log
#[derive(Debug, Clone, Default)]
pub struct StockEntry {
    pub reference_id: Option<Uuid>,
    pub note: Option<String>,
    pub actor_id: Option<Uuid>,
}

/// Apply a movement to the farmer's counters and record it. Returns the new
/// balance.
pub async fn apply(
    conn: &mut PgConnection,
    farmer_id: Uuid,
    movement: &StockMovement,
    entry: StockEntry,
) -> AppResult<FarmerStock> {
    let farmer = lock_farmer(conn, farmer_id).await?;
    let stock = farmer.stock().apply(movement);

    if movement.is_noop() {
        return Ok(stock);
    }

    sqlx::query(
        r#"
        UPDATE farmers
        SET main_stock = $2, total_consumed = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(farmer_id)
    .bind(stock.main_stock)
    .bind(stock.total_consumed)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO stock_logs (farmer_id, amount, log_type, reference_id, note, actor_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(farmer_id)
    .bind(movement.main_stock_delta)
    .bind(movement.log_type.as_str())
    .bind(entry.reference_id)
    .bind(&entry.note)
    .bind(entry.actor_id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        farmer_id = %farmer_id,
        log_type = movement.log_type.as_str(),
        delta = %movement.main_stock_delta,
        main_stock = %stock.main_stock,
        "farmer stock updated"
    );

    Ok(stock)
}
