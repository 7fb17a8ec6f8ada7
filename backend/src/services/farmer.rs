//! Farmer service: registration, archival and the feed reserve

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    Farmer, FarmerRow, FarmerStock, StockLog, StockLogRow, StockMovement, FARMER_COLUMNS,
    STOCK_LOG_COLUMNS,
};
use crate::services::stock::{self, StockEntry};

/// Farmer service
#[derive(Clone)]
pub struct FarmerService {
    db: PgPool,
}

/// Input for registering a farmer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFarmerInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    pub phone: Option<String>,
    /// Officer in charge; defaults to the caller
    pub officer_id: Option<Uuid>,
    /// Opening feed reserve in bags
    pub opening_stock: Option<Decimal>,
}

/// Input for adding bags to the reserve
#[derive(Debug, Deserialize, Validate)]
pub struct RestockInput {
    pub bags: Decimal,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

/// Load a farmer without locking it
pub async fn fetch(conn: &mut PgConnection, farmer_id: Uuid) -> AppResult<Farmer> {
    let sql = select_farmer_sql(false);
    let row = sqlx::query_as::<_, FarmerRow>(&sql)
        .bind(farmer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Farmer".to_string()))?;
    Ok(row.into())
}

/// Reject actors that do not manage the farmer
pub fn ensure_manages(actor: &AuthUser, farmer: &Farmer) -> AppResult<()> {
    if actor.manages(farmer.organization_id, farmer.officer_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not manage this farmer".to_string(),
        ))
    }
}

/// Reject writes against archived farmers
pub fn ensure_active(farmer: &Farmer) -> AppResult<()> {
    if farmer.is_archived() {
        Err(AppError::BadRequest(format!(
            "Farmer {} is archived",
            farmer.name
        )))
    } else {
        Ok(())
    }
}

/// Single-farmer query; `lock` takes the row lock that archival also takes
pub(crate) fn select_farmer_sql(lock: bool) -> String {
    let mut sql = format!("SELECT {} FROM farmers WHERE id = $1", FARMER_COLUMNS);
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    sql
}

/// Lock a farmer the actor manages and that is not archived. Writes that
/// attach new rows to the farmer go through here so archival cannot slip in
/// between the check and the insert.
pub async fn lock_active_managed(
    conn: &mut PgConnection,
    actor: &AuthUser,
    farmer_id: Uuid,
) -> AppResult<Farmer> {
    let farmer = stock::lock_farmer(conn, farmer_id).await?;
    ensure_manages(actor, &farmer)?;
    ensure_active(&farmer)?;
    Ok(farmer)
}

/// Load a farmer the actor manages
pub async fn fetch_managed(
    conn: &mut PgConnection,
    actor: &AuthUser,
    farmer_id: Uuid,
) -> AppResult<Farmer> {
    let farmer = fetch(conn, farmer_id).await?;
    ensure_manages(actor, &farmer)?;
    Ok(farmer)
}

impl FarmerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a farmer. Names are unique per organization, ignoring case.
    pub async fn create(&self, actor: &AuthUser, input: CreateFarmerInput) -> AppResult<Farmer> {
        input.validate()?;
        shared::validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;
        if let Some(phone) = &input.phone {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let officer_id = input.officer_id.unwrap_or(actor.user_id);
        if officer_id != actor.user_id && !actor.role.oversees_organization() {
            return Err(AppError::Forbidden(
                "Only managers can assign farmers to another officer".to_string(),
            ));
        }

        let opening_stock = input.opening_stock.unwrap_or(Decimal::ZERO);
        if opening_stock < Decimal::ZERO {
            return Err(AppError::validation(
                "opening_stock",
                "Opening stock cannot be negative",
            ));
        }

        let name = input.name.trim().to_string();
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM farmers WHERE organization_id = $1 AND LOWER(name) = LOWER($2))",
        )
        .bind(actor.organization_id)
        .bind(&name)
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Err(duplicate_name(&name));
        }

        let mut tx = self.db.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO farmers (organization_id, officer_id, name, phone)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            FARMER_COLUMNS
        );
        let row = sqlx::query_as::<_, FarmerRow>(&sql)
            .bind(actor.organization_id)
            .bind(officer_id)
            .bind(&name)
            .bind(input.phone.as_deref().map(str::trim))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return duplicate_name(&name);
                    }
                }
                AppError::from(e)
            })?;
        let mut farmer = Farmer::from(row);

        if opening_stock > Decimal::ZERO {
            let stock = stock::apply(
                &mut *tx,
                farmer.id,
                &StockMovement::restock(opening_stock),
                StockEntry {
                    reference_id: None,
                    note: Some("Opening stock".to_string()),
                    actor_id: Some(actor.user_id),
                },
            )
            .await?;
            farmer.main_stock = stock.main_stock;
        }

        tx.commit().await?;

        tracing::info!(farmer_id = %farmer.id, officer_id = %officer_id, "farmer created");
        Ok(farmer)
    }

    /// Get a farmer with its stock counters
    pub async fn get(&self, actor: &AuthUser, farmer_id: Uuid) -> AppResult<Farmer> {
        let mut conn = self.db.acquire().await?;
        fetch_managed(&mut *conn, actor, farmer_id).await
    }

    /// Add bags to the farmer's reserve
    pub async fn restock(
        &self,
        actor: &AuthUser,
        farmer_id: Uuid,
        input: RestockInput,
    ) -> AppResult<FarmerStock> {
        input.validate()?;
        shared::validate_bags(input.bags).map_err(|m| AppError::validation("bags", m))?;

        let mut tx = self.db.begin().await?;
        let farmer = fetch_managed(&mut *tx, actor, farmer_id).await?;
        ensure_active(&farmer)?;

        let stock = stock::apply(
            &mut *tx,
            farmer.id,
            &StockMovement::restock(input.bags),
            StockEntry {
                reference_id: None,
                note: input.note,
                actor_id: Some(actor.user_id),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(stock)
    }

    /// Archive a farmer. Farmers with active cycles cannot be archived.
    pub async fn archive(&self, actor: &AuthUser, farmer_id: Uuid) -> AppResult<Farmer> {
        let mut tx = self.db.begin().await?;
        let farmer = stock::lock_farmer(&mut *tx, farmer_id).await?;
        ensure_manages(actor, &farmer)?;

        if farmer.is_archived() {
            return Ok(farmer);
        }

        let active_cycles = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cycles WHERE farmer_id = $1",
        )
        .bind(farmer_id)
        .fetch_one(&mut *tx)
        .await?;

        if active_cycles > 0 {
            return Err(AppError::BadRequest(format!(
                "Farmer has {} active cycle(s); end them before archiving",
                active_cycles
            )));
        }

        let sql = format!(
            "UPDATE farmers SET archived_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING {}",
            FARMER_COLUMNS
        );
        let row = sqlx::query_as::<_, FarmerRow>(&sql)
            .bind(farmer_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(farmer_id = %farmer_id, "farmer archived");
        Ok(row.into())
    }

    /// Stock ledger of a farmer, newest first
    pub async fn stock_logs(&self, actor: &AuthUser, farmer_id: Uuid) -> AppResult<Vec<StockLog>> {
        let mut conn = self.db.acquire().await?;
        fetch_managed(&mut *conn, actor, farmer_id).await?;

        let sql = format!(
            "SELECT {} FROM stock_logs WHERE farmer_id = $1 ORDER BY created_at DESC",
            STOCK_LOG_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockLogRow>(&sql)
            .bind(farmer_id)
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(StockLog::try_from).collect()
    }
}

fn duplicate_name(name: &str) -> AppError {
    AppError::Conflict {
        resource: "name".to_string(),
        message: format!("A farmer named {} already exists", name),
    }
}
