//! Cycle lifecycle service
//!
//! Drives a cycle through `active → archived → (reopened | deleted)`. Each
//! operation locks the rows it touches, asks `shared::ledger` for a plan and
//! writes the plan inside one transaction.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    backdated_start, Cycle, CycleHistory, CycleLog, CycleLogType, CycleRef, CycleRow, HistoryRow,
    LogOwner, NewCycleLog, CYCLE_COLUMNS, HISTORY_COLUMNS,
};
use crate::services::farmer::{fetch_managed, lock_active_managed};
use crate::services::feed::update_cycle_feed;
use crate::services::notification::{ManagerNotice, NotificationKind, NotificationService};
use crate::services::cycle_log;
use crate::services::stock::{self, StockEntry};
use shared::{
    plan_close, plan_doc_correction, plan_mortality, plan_reopen, CycleMetrics, FinalIntake,
    PricingPolicy, SaleFigures,
};

/// Cycle service
#[derive(Clone)]
pub struct CycleService {
    db: PgPool,
    pricing: PricingPolicy,
}

/// Input for starting a cycle
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCycleInput {
    pub farmer_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    pub doc: i32,
    /// Age of the birds today; the start date is backdated accordingly
    #[serde(default)]
    pub age: i32,
}

/// Input for recording dead birds
#[derive(Debug, Deserialize, Validate)]
pub struct AddMortalityInput {
    #[validate(range(min = 1, max = 1000000, message = "Amount must be 1 to 1000000"))]
    pub amount: i32,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Input for ending a cycle by hand
#[derive(Debug, Deserialize, Validate)]
pub struct EndCycleInput {
    /// Feed bags actually consumed over the whole cycle
    pub intake: Decimal,
    pub end_date: Option<NaiveDate>,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

/// Input for correcting the placed chick count
#[derive(Debug, Deserialize, Validate)]
pub struct CorrectDocInput {
    #[validate(range(min = 1, max = 1000000, message = "DOC must be 1 to 1000000"))]
    pub doc: i32,
    #[validate(length(min = 1, max = 500, message = "Reason must be 1 to 500 characters"))]
    pub reason: String,
}

/// Input for a free-text note
#[derive(Debug, Deserialize, Validate)]
pub struct AddNoteInput {
    #[validate(length(min = 1, max = 2000, message = "Note must be 1 to 2000 characters"))]
    pub note: String,
}

/// A cycle with its audit trail and the farmer's archived cycles
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleDetails {
    Active {
        data: Cycle,
        logs: Vec<CycleLog>,
        history: Vec<CycleHistory>,
    },
    History {
        data: CycleHistory,
        logs: Vec<CycleLog>,
        history: Vec<CycleHistory>,
        metrics: CycleMetrics,
    },
}

/// Lock an active cycle for the rest of the transaction
pub async fn lock_cycle(conn: &mut PgConnection, cycle_id: Uuid) -> AppResult<Cycle> {
    let sql = format!("SELECT {} FROM cycles WHERE id = $1 FOR UPDATE", CYCLE_COLUMNS);
    let row = sqlx::query_as::<_, CycleRow>(&sql)
        .bind(cycle_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Cycle".to_string()))?;
    Ok(row.into())
}

async fn lock_history(conn: &mut PgConnection, history_id: Uuid) -> AppResult<CycleHistory> {
    let sql = format!(
        "SELECT {} FROM cycle_histories WHERE id = $1 FOR UPDATE",
        HISTORY_COLUMNS
    );
    let row = sqlx::query_as::<_, HistoryRow>(&sql)
        .bind(history_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Cycle history".to_string()))?;
    Ok(row.into())
}

/// Load whichever record an id or owner refers to, without locking
pub async fn fetch_ref(conn: &mut PgConnection, owner: LogOwner) -> AppResult<Option<CycleRef>> {
    match owner {
        LogOwner::Cycle(id) => {
            let sql = format!("SELECT {} FROM cycles WHERE id = $1", CYCLE_COLUMNS);
            let row = sqlx::query_as::<_, CycleRow>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            Ok(row.map(|r| CycleRef::Active(r.into())))
        }
        LogOwner::History(id) => {
            let sql = format!("SELECT {} FROM cycle_histories WHERE id = $1", HISTORY_COLUMNS);
            let row = sqlx::query_as::<_, HistoryRow>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            Ok(row.map(|r| CycleRef::Archived(r.into())))
        }
    }
}

/// Resolve an id that may name either an active cycle or an archived one
pub async fn resolve(conn: &mut PgConnection, id: Uuid) -> AppResult<CycleRef> {
    if let Some(found) = fetch_ref(conn, LogOwner::Cycle(id)).await? {
        return Ok(found);
    }
    fetch_ref(conn, LogOwner::History(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Cycle".to_string()))
}

/// Current weight and price of every sale of an owner
pub async fn sale_figures(conn: &mut PgConnection, owner: LogOwner) -> AppResult<Vec<SaleFigures>> {
    let column = match owner {
        LogOwner::Cycle(_) => "cycle_id",
        LogOwner::History(_) => "history_id",
    };
    let sql = format!(
        "SELECT total_weight, price_per_kg FROM sale_events WHERE {} = $1 ORDER BY sale_date, created_at",
        column
    );
    let rows = sqlx::query_as::<_, (Decimal, Decimal)>(&sql)
        .bind(owner.id())
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(total_weight, price_per_kg)| SaleFigures {
            total_weight,
            price_per_kg,
        })
        .collect())
}

/// Archive a locked cycle. Logs and sale events follow the cycle to its
/// history, the final intake leaves the farmer's reserve and the active row is
/// removed.
pub async fn close_cycle(
    conn: &mut PgConnection,
    cycle: &Cycle,
    final_intake: FinalIntake,
    end_date: NaiveDate,
    actor_id: Option<Uuid>,
    note: Option<String>,
) -> AppResult<CycleHistory> {
    let plan = plan_close(cycle, final_intake, end_date)?;

    let sql = format!(
        r#"
        INSERT INTO cycle_histories (
            farmer_id, organization_id, cycle_name, doc, mortality, birds_sold,
            age, final_intake, start_date, end_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        HISTORY_COLUMNS
    );
    let history: CycleHistory = sqlx::query_as::<_, HistoryRow>(&sql)
        .bind(plan.history.farmer_id)
        .bind(plan.history.organization_id)
        .bind(&plan.history.cycle_name)
        .bind(plan.history.doc)
        .bind(plan.history.mortality)
        .bind(plan.history.birds_sold)
        .bind(plan.history.age)
        .bind(plan.history.final_intake)
        .bind(plan.history.start_date)
        .bind(plan.history.end_date)
        .fetch_one(&mut *conn)
        .await?
        .into();

    let owner = LogOwner::History(history.id);
    cycle_log::reparent(conn, LogOwner::Cycle(cycle.id), owner).await?;

    if plan.writes_stock_log() {
        stock::apply(
            conn,
            cycle.farmer_id,
            &plan.stock,
            StockEntry {
                reference_id: Some(history.id),
                note: Some(format!("Cycle {} closed", cycle.name)),
                actor_id,
            },
        )
        .await?;
    }

    let mut entry = NewCycleLog::new(CycleLogType::System, plan.final_intake.bags());
    entry.note = Some(note.unwrap_or_else(|| {
        format!(
            "Cycle ended ({}): final intake {} bags",
            plan.final_intake.source(),
            plan.final_intake.bags()
        )
    }));
    cycle_log::append(conn, owner, &entry, actor_id).await?;

    sqlx::query("DELETE FROM cycles WHERE id = $1")
        .bind(cycle.id)
        .execute(&mut *conn)
        .await?;

    tracing::info!(
        cycle_id = %cycle.id,
        history_id = %history.id,
        source = plan.final_intake.source(),
        final_intake = %plan.final_intake.bags(),
        "cycle archived"
    );

    Ok(history)
}

impl CycleService {
    pub fn new(db: PgPool, pricing: PricingPolicy) -> Self {
        Self { db, pricing }
    }

    /// Start a cycle for a farmer
    pub async fn create(&self, actor: &AuthUser, input: CreateCycleInput) -> AppResult<Cycle> {
        input.validate()?;
        shared::validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;
        shared::validate_doc(input.doc).map_err(|m| AppError::validation("doc", m))?;
        shared::validate_age(input.age).map_err(|m| AppError::validation("age", m))?;

        let mut tx = self.db.begin().await?;
        let farmer = lock_active_managed(&mut *tx, actor, input.farmer_id).await?;

        let created_at = backdated_start(Utc::now(), input.age);
        let sql = format!(
            r#"
            INSERT INTO cycles (farmer_id, organization_id, name, doc, age, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {}
            "#,
            CYCLE_COLUMNS
        );
        let mut cycle: Cycle = sqlx::query_as::<_, CycleRow>(&sql)
            .bind(farmer.id)
            .bind(farmer.organization_id)
            .bind(input.name.trim())
            .bind(input.doc)
            .bind(input.age)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await?
            .into();

        let entry = NewCycleLog::new(CycleLogType::Note, Decimal::from(cycle.doc)).with_note(format!(
            "Cycle started with {} birds at day {}",
            cycle.doc, cycle.age
        ));
        cycle_log::append(&mut *tx, LogOwner::Cycle(cycle.id), &entry, Some(actor.user_id)).await?;

        update_cycle_feed(
            &mut *tx,
            &mut cycle,
            self.pricing.bag_weight_kg,
            Some(actor.user_id),
            true,
            None,
            None,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(cycle_id = %cycle.id, farmer_id = %farmer.id, doc = cycle.doc, "cycle created");
        Ok(cycle)
    }

    /// Record dead birds. The population ceiling applies.
    pub async fn add_mortality(
        &self,
        actor: &AuthUser,
        cycle_id: Uuid,
        input: AddMortalityInput,
    ) -> AppResult<Cycle> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let mut cycle = lock_cycle(&mut *tx, cycle_id).await?;
        fetch_managed(&mut *tx, actor, cycle.farmer_id).await?;

        let counters = plan_mortality(&cycle, input.amount)?;

        sqlx::query("UPDATE cycles SET mortality = $2, updated_at = NOW() WHERE id = $1")
            .bind(cycle.id)
            .bind(counters.mortality)
            .execute(&mut *tx)
            .await?;

        let mut entry = NewCycleLog::change(
            CycleLogType::Mortality,
            Decimal::from(cycle.mortality),
            Decimal::from(counters.mortality),
        );
        entry.note = input.reason.filter(|r| !r.trim().is_empty());
        cycle_log::append(&mut *tx, LogOwner::Cycle(cycle.id), &entry, Some(actor.user_id)).await?;

        cycle.mortality = counters.mortality;
        update_cycle_feed(
            &mut *tx,
            &mut cycle,
            self.pricing.bag_weight_kg,
            Some(actor.user_id),
            false,
            None,
            None,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(cycle_id = %cycle.id, amount = input.amount, mortality = cycle.mortality, "mortality recorded");
        Ok(cycle)
    }

    /// End a cycle by hand with the officer's reported intake
    pub async fn end(
        &self,
        actor: &AuthUser,
        cycle_id: Uuid,
        input: EndCycleInput,
        notifications: NotificationService,
    ) -> AppResult<CycleHistory> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let cycle = lock_cycle(&mut *tx, cycle_id).await?;
        let farmer = fetch_managed(&mut *tx, actor, cycle.farmer_id).await?;

        let end_date = input.end_date.unwrap_or_else(|| Utc::now().date_naive());
        let history = close_cycle(
            &mut *tx,
            &cycle,
            FinalIntake::Reported(input.intake),
            end_date,
            Some(actor.user_id),
            input.note,
        )
        .await?;

        tx.commit().await?;

        notifications.spawn(ManagerNotice {
            organization_id: history.organization_id,
            kind: NotificationKind::CycleEnded,
            title: "Cycle ended".to_string(),
            message: format!(
                "{} ended cycle {} for {}: {} sold, {} dead, {} bags consumed",
                actor.user_name,
                history.cycle_name,
                farmer.name,
                history.birds_sold,
                history.mortality,
                history.final_intake
            ),
            link: Some(format!("/cycles/{}", history.id)),
        });

        Ok(history)
    }

    /// Reopen an archived cycle as a new active cycle. Exactly reverses `end`.
    pub async fn reopen(&self, actor: &AuthUser, history_id: Uuid) -> AppResult<Cycle> {
        let mut tx = self.db.begin().await?;
        let history = lock_history(&mut *tx, history_id).await?;
        let farmer = lock_active_managed(&mut *tx, actor, history.farmer_id).await?;

        let plan = plan_reopen(&history);

        let sql = format!(
            r#"
            INSERT INTO cycles (
                farmer_id, organization_id, name, doc, mortality, birds_sold,
                age, intake, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING {}
            "#,
            CYCLE_COLUMNS
        );
        let cycle: Cycle = sqlx::query_as::<_, CycleRow>(&sql)
            .bind(plan.cycle.farmer_id)
            .bind(plan.cycle.organization_id)
            .bind(&plan.cycle.name)
            .bind(plan.cycle.doc)
            .bind(plan.cycle.mortality)
            .bind(plan.cycle.birds_sold)
            .bind(plan.cycle.age)
            .bind(plan.cycle.intake)
            .bind(plan.cycle.created_at)
            .fetch_one(&mut *tx)
            .await?
            .into();

        let owner = LogOwner::Cycle(cycle.id);
        cycle_log::reparent(&mut *tx, LogOwner::History(history.id), owner).await?;

        stock::apply(
            &mut *tx,
            history.farmer_id,
            &plan.stock,
            StockEntry {
                reference_id: Some(cycle.id),
                note: Some(format!("Cycle {} reopened", history.cycle_name)),
                actor_id: Some(actor.user_id),
            },
        )
        .await?;

        sqlx::query("DELETE FROM cycle_histories WHERE id = $1")
            .bind(history.id)
            .execute(&mut *tx)
            .await?;

        let entry = NewCycleLog::new(CycleLogType::System, history.final_intake)
            .with_note(format!("Cycle reopened; {} bags returned to stock", history.final_intake));
        cycle_log::append(&mut *tx, owner, &entry, Some(actor.user_id)).await?;

        tx.commit().await?;

        tracing::info!(history_id = %history_id, cycle_id = %cycle.id, "cycle reopened");
        Ok(cycle)
    }

    /// Correct the placed chick count
    pub async fn correct_doc(
        &self,
        actor: &AuthUser,
        cycle_id: Uuid,
        input: CorrectDocInput,
    ) -> AppResult<Cycle> {
        input.validate()?;
        shared::validate_reason(&input.reason).map_err(|m| AppError::validation("reason", m))?;

        let mut tx = self.db.begin().await?;
        let mut cycle = lock_cycle(&mut *tx, cycle_id).await?;
        fetch_managed(&mut *tx, actor, cycle.farmer_id).await?;

        let new_doc = plan_doc_correction(&cycle, input.doc)?;

        sqlx::query("UPDATE cycles SET doc = $2, updated_at = NOW() WHERE id = $1")
            .bind(cycle.id)
            .bind(new_doc)
            .execute(&mut *tx)
            .await?;

        let entry = NewCycleLog::change(
            CycleLogType::System,
            Decimal::from(cycle.doc),
            Decimal::from(new_doc),
        )
        .with_note(format!("DOC corrected: {}", input.reason.trim()));
        cycle_log::append(&mut *tx, LogOwner::Cycle(cycle.id), &entry, Some(actor.user_id)).await?;

        cycle.doc = new_doc;
        update_cycle_feed(
            &mut *tx,
            &mut cycle,
            self.pricing.bag_weight_kg,
            Some(actor.user_id),
            true,
            None,
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(cycle)
    }

    /// Attach a note to an active or archived cycle
    pub async fn add_note(&self, actor: &AuthUser, id: Uuid, input: AddNoteInput) -> AppResult<()> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let target = resolve(&mut *tx, id).await?;
        fetch_managed(&mut *tx, actor, target.farmer_id()).await?;

        let owner = match &target {
            CycleRef::Active(c) => LogOwner::Cycle(c.id),
            CycleRef::Archived(h) => LogOwner::History(h.id),
        };
        let entry = NewCycleLog::new(CycleLogType::Note, Decimal::ZERO).with_note(input.note.trim());
        cycle_log::append(&mut *tx, owner, &entry, Some(actor.user_id)).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Permanently delete an archived cycle with its logs and sales
    pub async fn delete_history(&self, actor: &AuthUser, history_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let history = lock_history(&mut *tx, history_id).await?;
        fetch_managed(&mut *tx, actor, history.farmer_id).await?;

        sqlx::query("DELETE FROM cycle_histories WHERE id = $1")
            .bind(history.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(history_id = %history_id, user_id = %actor.user_id, "cycle history deleted");
        Ok(())
    }

    /// Details of an active or archived cycle
    pub async fn get_cycle_details(&self, actor: &AuthUser, id: Uuid) -> AppResult<CycleDetails> {
        let mut conn = self.db.acquire().await?;
        let target = resolve(&mut *conn, id).await?;
        fetch_managed(&mut *conn, actor, target.farmer_id()).await?;

        let sql = format!(
            "SELECT {} FROM cycle_histories WHERE farmer_id = $1 ORDER BY end_date DESC, created_at DESC",
            HISTORY_COLUMNS
        );
        let history: Vec<CycleHistory> = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(target.farmer_id())
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(CycleHistory::from)
            .collect();

        match target {
            CycleRef::Active(data) => {
                let logs = cycle_log::list(&mut *conn, LogOwner::Cycle(data.id)).await?;
                Ok(CycleDetails::Active { data, logs, history })
            }
            CycleRef::Archived(data) => {
                let owner = LogOwner::History(data.id);
                let logs = cycle_log::list(&mut *conn, owner).await?;
                let sales = sale_figures(&mut *conn, owner).await?;
                let metrics = CycleMetrics::compute(&data, &sales, &self.pricing);
                Ok(CycleDetails::History {
                    data,
                    logs,
                    history,
                    metrics,
                })
            }
        }
    }

    /// Active cycles of every farmer the actor manages
    pub async fn list_active(&self, actor: &AuthUser) -> AppResult<Vec<Cycle>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM cycles
            WHERE farmer_id IN (
                SELECT id FROM farmers
                WHERE organization_id = $1 AND ($2 OR officer_id = $3)
            )
            ORDER BY created_at DESC
            "#,
            CYCLE_COLUMNS
        );
        let rows = sqlx::query_as::<_, CycleRow>(&sql)
            .bind(actor.organization_id)
            .bind(actor.role.oversees_organization())
            .bind(actor.user_id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(Cycle::from).collect())
    }
}
