//! Sales reconciliation service
//!
//! A sale event is created together with report version 1. Later corrections
//! append report versions; the event's summary fields always mirror the
//! newest version and the cycle counters are moved by the difference between
//! consecutive versions. A sale that leaves no birds in the house closes the
//! cycle.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    CycleLogType, CycleRef, LogOwner, NewCycleLog, SaleAmounts, SaleEvent, SaleEventRow,
    SaleReport, SaleReportRow, SALE_EVENT_COLUMNS, SALE_REPORT_COLUMNS,
};
use crate::services::cycle::{close_cycle, fetch_ref, lock_cycle, resolve};
use crate::services::cycle_log;
use crate::services::farmer::{fetch_managed, lock_active_managed};
use crate::services::feed::update_cycle_feed;
use crate::services::notification::{ManagerNotice, NotificationKind, NotificationService};
use shared::{
    merge_feed_entries, plan_adjustment, plan_sale, CycleSnapshot, FeedEntry, FinalIntake,
    MortalityFloor, PricingPolicy, ReportCounts, SaleFigures, SaleRequest,
};

/// Sale service
#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
    pricing: PricingPolicy,
}

/// Input for recording a sale
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleEventInput {
    pub cycle_id: Uuid,
    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,
    #[validate(range(min = 1, max = 1000000, message = "Birds sold must be 1 to 1000000"))]
    pub birds_sold: i32,
    /// Deaths discovered at catching time; may be negative to correct an
    /// earlier over-count
    #[serde(default)]
    pub mortality_change: i32,
    /// Mortality to date as seen by the caller; must match the ledger when sent
    #[validate(range(min = 0, max = 1000000, message = "Total mortality must be 0 to 1000000"))]
    pub total_mortality: Option<i32>,
    pub total_weight: Decimal,
    pub price_per_kg: Decimal,
    #[serde(default)]
    pub cash_received: Decimal,
    #[serde(default)]
    pub deposit_received: Decimal,
    #[serde(default)]
    pub medicine_cost: Decimal,
    #[serde(default)]
    pub feed_consumed: Vec<FeedEntry>,
    #[serde(default)]
    pub feed_stock: Vec<FeedEntry>,
    pub sale_date: Option<NaiveDate>,
}

/// Input for a new report version of an existing sale
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateReportInput {
    #[validate(range(min = 1, max = 1000000, message = "Birds sold must be 1 to 1000000"))]
    pub birds_sold: i32,
    #[validate(range(min = 0, max = 1000000, message = "Total mortality must be 0 to 1000000"))]
    pub total_mortality: i32,
    pub total_weight: Decimal,
    pub price_per_kg: Decimal,
    #[serde(default)]
    pub cash_received: Decimal,
    #[serde(default)]
    pub deposit_received: Decimal,
    #[serde(default)]
    pub medicine_cost: Decimal,
    /// Keeps the previous version's figures when absent
    pub feed_consumed: Option<Vec<FeedEntry>>,
    pub feed_stock: Option<Vec<FeedEntry>>,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub adjustment_note: Option<String>,
}

/// Result of recording a sale
#[derive(Debug, Serialize)]
pub struct SaleEventOutcome {
    pub sale_event: SaleEvent,
    pub cycle_ended: bool,
    pub history_id: Option<Uuid>,
}

/// Result of a report adjustment
#[derive(Debug, Serialize)]
pub struct ReportOutcome {
    pub report: SaleReport,
    pub birds_sold_difference: i32,
    pub mortality_difference: i32,
    pub cycle_ended: bool,
}

/// Which sales to list
#[derive(Debug, Clone, Copy)]
pub enum SaleFilter {
    Cycle(Uuid),
    History(Uuid),
    Farmer(Uuid),
}

/// Cycle figures shown next to each sale
#[derive(Debug, Clone, Serialize)]
pub struct SaleContext {
    pub cycle_id: Uuid,
    pub is_ended: bool,
    pub doc: i32,
    pub mortality: i32,
    pub age: i32,
    pub fcr: Option<Decimal>,
    pub epi: Option<Decimal>,
    /// Revenue of the owner's sales up to and including this one
    pub cumulative_revenue: Decimal,
    pub cumulative_weight: Decimal,
}

/// A sale with its report chain
#[derive(Debug, Serialize)]
pub struct SaleEventView {
    #[serde(flatten)]
    pub event: SaleEvent,
    /// Newest version first
    pub reports: Vec<SaleReport>,
    pub cycle_context: Option<SaleContext>,
}

fn check_money(field: &'static str, value: Decimal) -> AppResult<()> {
    if value < Decimal::ZERO {
        return Err(AppError::validation(field, format!("{} cannot be negative", field)));
    }
    Ok(())
}

fn normalized_feed(field: &'static str, entries: &[FeedEntry]) -> AppResult<Vec<FeedEntry>> {
    shared::validate_feed_entries(entries).map_err(|m| AppError::validation(field, m))?;
    Ok(merge_feed_entries(entries))
}

async fn insert_report(
    conn: &mut PgConnection,
    sale_event_id: Uuid,
    version: i32,
    amounts: &SaleAmounts,
    adjustment_note: Option<&str>,
    created_by: Uuid,
) -> AppResult<SaleReport> {
    let sql = format!(
        r#"
        INSERT INTO sale_reports (
            sale_event_id, version, birds_sold, total_mortality, total_weight, avg_weight,
            price_per_kg, total_amount, cash_received, deposit_received, medicine_cost,
            feed_consumed, feed_stock, adjustment_note, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING {}
        "#,
        SALE_REPORT_COLUMNS
    );
    let row = sqlx::query_as::<_, SaleReportRow>(&sql)
        .bind(sale_event_id)
        .bind(version)
        .bind(amounts.birds_sold)
        .bind(amounts.total_mortality)
        .bind(amounts.total_weight)
        .bind(amounts.avg_weight)
        .bind(amounts.price_per_kg)
        .bind(amounts.total_amount)
        .bind(amounts.cash_received)
        .bind(amounts.deposit_received)
        .bind(amounts.medicine_cost)
        .bind(sqlx::types::Json(&amounts.feed_consumed))
        .bind(sqlx::types::Json(&amounts.feed_stock))
        .bind(adjustment_note)
        .bind(created_by)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.into())
}

async fn fetch_event(conn: &mut PgConnection, sale_event_id: Uuid, lock: bool) -> AppResult<SaleEvent> {
    let sql = format!(
        "SELECT {} FROM sale_events WHERE id = $1{}",
        SALE_EVENT_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, SaleEventRow>(&sql)
        .bind(sale_event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale event".to_string()))?;
    SaleEvent::try_from(row)
}

async fn report_chain(conn: &mut PgConnection, sale_event_id: Uuid) -> AppResult<Vec<SaleReport>> {
    let sql = format!(
        "SELECT {} FROM sale_reports WHERE sale_event_id = $1 ORDER BY version DESC",
        SALE_REPORT_COLUMNS
    );
    let rows = sqlx::query_as::<_, SaleReportRow>(&sql)
        .bind(sale_event_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(SaleReport::from).collect())
}

/// Highest mortality committed by any report of any sale of the cycle
async fn cycle_mortality_floor(conn: &mut PgConnection, cycle_id: Uuid) -> AppResult<MortalityFloor> {
    let max = sqlx::query_scalar::<_, Option<i32>>(
        r#"
        SELECT MAX(r.total_mortality)
        FROM sale_reports r
        JOIN sale_events e ON e.id = r.sale_event_id
        WHERE e.cycle_id = $1
        "#,
    )
    .bind(cycle_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(MortalityFloor::from_reports(max))
}

impl SaleService {
    pub fn new(db: PgPool, pricing: PricingPolicy) -> Self {
        Self { db, pricing }
    }

    /// Record a sale against an active cycle
    pub async fn create_sale_event(
        &self,
        actor: &AuthUser,
        input: CreateSaleEventInput,
        notifications: NotificationService,
    ) -> AppResult<SaleEventOutcome> {
        input.validate()?;
        check_money("cash_received", input.cash_received)?;
        check_money("deposit_received", input.deposit_received)?;
        check_money("medicine_cost", input.medicine_cost)?;
        let feed_consumed = normalized_feed("feed_consumed", &input.feed_consumed)?;
        let feed_stock = normalized_feed("feed_stock", &input.feed_stock)?;

        let mut tx = self.db.begin().await?;
        let mut cycle = lock_cycle(&mut *tx, input.cycle_id).await?;
        let farmer = lock_active_managed(&mut *tx, actor, cycle.farmer_id).await?;

        let sale_date = input.sale_date.unwrap_or_else(|| Utc::now().date_naive());
        let floor = cycle_mortality_floor(&mut *tx, cycle.id).await?;
        let request = SaleRequest {
            birds_sold: input.birds_sold,
            mortality_change: input.mortality_change,
            total_mortality: input.total_mortality,
            total_weight: input.total_weight,
            price_per_kg: input.price_per_kg,
            feed_consumed: feed_consumed.clone(),
            sale_date,
        };
        let plan = plan_sale(&cycle, &request, floor)?;

        let amounts = SaleAmounts::derive(
            input.birds_sold,
            plan.total_mortality(),
            input.total_weight,
            input.price_per_kg,
            input.cash_received,
            input.deposit_received,
            input.medicine_cost,
            feed_consumed,
            feed_stock,
        );

        let sql = format!(
            r#"
            INSERT INTO sale_events (
                cycle_id, farmer_id, location, house_birds, birds_sold, total_mortality,
                total_weight, avg_weight, price_per_kg, total_amount, cash_received,
                deposit_received, medicine_cost, feed_consumed, feed_stock, sale_date, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            SALE_EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, SaleEventRow>(&sql)
            .bind(cycle.id)
            .bind(cycle.farmer_id)
            .bind(input.location.as_deref().map(str::trim).filter(|l| !l.is_empty()))
            .bind(plan.house_birds)
            .bind(amounts.birds_sold)
            .bind(amounts.total_mortality)
            .bind(amounts.total_weight)
            .bind(amounts.avg_weight)
            .bind(amounts.price_per_kg)
            .bind(amounts.total_amount)
            .bind(amounts.cash_received)
            .bind(amounts.deposit_received)
            .bind(amounts.medicine_cost)
            .bind(sqlx::types::Json(&amounts.feed_consumed))
            .bind(sqlx::types::Json(&amounts.feed_stock))
            .bind(sale_date)
            .bind(actor.user_id)
            .fetch_one(&mut *tx)
            .await?;
        let mut sale_event = SaleEvent::try_from(row)?;

        insert_report(&mut *tx, sale_event.id, 1, &amounts, None, actor.user_id).await?;

        sqlx::query(
            "UPDATE cycles SET mortality = $2, birds_sold = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(cycle.id)
        .bind(plan.counters.mortality)
        .bind(plan.counters.birds_sold)
        .execute(&mut *tx)
        .await?;

        let owner = LogOwner::Cycle(cycle.id);
        let previous_sold = cycle.birds_sold;
        let previous_mortality = cycle.mortality;
        cycle.mortality = plan.counters.mortality;
        cycle.birds_sold = plan.counters.birds_sold;

        let sales_entry = NewCycleLog {
            log_type: CycleLogType::Sales,
            value_change: Decimal::from(input.birds_sold),
            previous_value: Some(Decimal::from(previous_sold)),
            new_value: Some(Decimal::from(cycle.birds_sold)),
            note: Some(format!(
                "Sold {} birds, {} kg at {} per kg",
                input.birds_sold, amounts.total_weight, amounts.price_per_kg
            )),
        };
        cycle_log::append(&mut *tx, owner, &sales_entry, Some(actor.user_id)).await?;

        if input.mortality_change != 0 {
            let entry = NewCycleLog::change(
                CycleLogType::Mortality,
                Decimal::from(previous_mortality),
                Decimal::from(cycle.mortality),
            )
            .with_note("Recorded at sale");
            cycle_log::append(&mut *tx, owner, &entry, Some(actor.user_id)).await?;
        }

        update_cycle_feed(
            &mut *tx,
            &mut cycle,
            self.pricing.bag_weight_kg,
            Some(actor.user_id),
            true,
            Some("Intake recalculated after sale"),
            Some(sale_date),
        )
        .await?;

        let mut history_id = None;
        if let Some(final_intake) = plan.close_with {
            let history = close_cycle(
                &mut *tx,
                &cycle,
                final_intake,
                sale_date,
                Some(actor.user_id),
                Some(format!(
                    "Cycle closed automatically: last birds sold, final intake {} bags",
                    final_intake.bags()
                )),
            )
            .await?;
            sale_event.owner = LogOwner::History(history.id);
            history_id = Some(history.id);
        }

        tx.commit().await?;

        tracing::info!(
            sale_event_id = %sale_event.id,
            cycle_id = %cycle.id,
            birds_sold = sale_event.birds_sold,
            cycle_ended = history_id.is_some(),
            "sale recorded"
        );

        notifications.spawn(ManagerNotice {
            organization_id: cycle.organization_id,
            kind: NotificationKind::SaleRecorded,
            title: "New sale".to_string(),
            message: format!(
                "{} sold {} birds ({} kg) from {} / {}",
                actor.user_name, sale_event.birds_sold, sale_event.total_weight, farmer.name, cycle.name
            ),
            link: Some(format!("/sales/{}", sale_event.id)),
        });

        Ok(SaleEventOutcome {
            sale_event,
            cycle_ended: history_id.is_some(),
            history_id,
        })
    }

    /// Append a report version to a sale and reconcile the cycle with it
    pub async fn generate_report(
        &self,
        actor: &AuthUser,
        sale_event_id: Uuid,
        input: GenerateReportInput,
        notifications: NotificationService,
    ) -> AppResult<ReportOutcome> {
        input.validate()?;
        check_money("cash_received", input.cash_received)?;
        check_money("deposit_received", input.deposit_received)?;
        check_money("medicine_cost", input.medicine_cost)?;

        let mut tx = self.db.begin().await?;

        // Lock order is cycle before sale event, the same as closing a cycle
        let seen = fetch_event(&mut *tx, sale_event_id, false).await?;
        let mut active_cycle = match seen.owner {
            LogOwner::Cycle(id) => Some(lock_cycle(&mut *tx, id).await?),
            LogOwner::History(_) => None,
        };
        let event = fetch_event(&mut *tx, sale_event_id, true).await?;
        if event.owner != seen.owner {
            return Err(AppError::Conflict {
                resource: "sale_event".to_string(),
                message: "The cycle of this sale changed while the report was prepared; retry"
                    .to_string(),
            });
        }

        let farmer = fetch_managed(&mut *tx, actor, event.farmer_id).await?;

        let chain = report_chain(&mut *tx, event.id).await?;
        let (previous_counts, previous_version, previous_feed) = match chain.first() {
            Some(latest) => (
                ReportCounts {
                    birds_sold: latest.birds_sold,
                    total_mortality: latest.total_mortality,
                },
                latest.version,
                (latest.feed_consumed.clone(), latest.feed_stock.clone()),
            ),
            None => (
                ReportCounts {
                    birds_sold: event.birds_sold,
                    total_mortality: event.total_mortality,
                },
                0,
                (event.feed_consumed.clone(), event.feed_stock.clone()),
            ),
        };
        let floor = MortalityFloor::from_reports(chain.iter().map(|r| r.total_mortality));

        let proposed = ReportCounts {
            birds_sold: input.birds_sold,
            total_mortality: input.total_mortality,
        };
        let plan = plan_adjustment(
            active_cycle.as_ref(),
            previous_counts,
            proposed,
            input.total_weight,
            input.price_per_kg,
            floor,
        )?;

        let feed_consumed = match &input.feed_consumed {
            Some(entries) => normalized_feed("feed_consumed", entries)?,
            None => previous_feed.0,
        };
        let feed_stock = match &input.feed_stock {
            Some(entries) => normalized_feed("feed_stock", entries)?,
            None => previous_feed.1,
        };
        let amounts = SaleAmounts::derive(
            input.birds_sold,
            input.total_mortality,
            input.total_weight,
            input.price_per_kg,
            input.cash_received,
            input.deposit_received,
            input.medicine_cost,
            feed_consumed,
            feed_stock,
        );

        let note = input
            .adjustment_note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let version = previous_version + 1;
        let report = insert_report(&mut *tx, event.id, version, &amounts, note, actor.user_id).await?;

        sqlx::query(
            r#"
            UPDATE sale_events
            SET birds_sold = $2, total_mortality = $3, total_weight = $4, avg_weight = $5,
                price_per_kg = $6, total_amount = $7, cash_received = $8, deposit_received = $9,
                medicine_cost = $10, feed_consumed = $11, feed_stock = $12
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(amounts.birds_sold)
        .bind(amounts.total_mortality)
        .bind(amounts.total_weight)
        .bind(amounts.avg_weight)
        .bind(amounts.price_per_kg)
        .bind(amounts.total_amount)
        .bind(amounts.cash_received)
        .bind(amounts.deposit_received)
        .bind(amounts.medicine_cost)
        .bind(sqlx::types::Json(&amounts.feed_consumed))
        .bind(sqlx::types::Json(&amounts.feed_stock))
        .execute(&mut *tx)
        .await?;

        let owner = event.owner;
        if plan.mortality_difference != 0 {
            let entry = NewCycleLog::change(
                CycleLogType::Mortality,
                Decimal::from(previous_counts.total_mortality),
                Decimal::from(proposed.total_mortality),
            )
            .with_note(format!("Sale report v{} adjusted mortality", version));
            cycle_log::append(&mut *tx, owner, &entry, Some(actor.user_id)).await?;
        }
        if plan.birds_sold_difference != 0 {
            let entry = NewCycleLog::change(
                CycleLogType::Sales,
                Decimal::from(previous_counts.birds_sold),
                Decimal::from(proposed.birds_sold),
            )
            .with_note(format!("Sale report v{} adjusted birds sold", version));
            cycle_log::append(&mut *tx, owner, &entry, Some(actor.user_id)).await?;
        }
        let system_entry = report_generated_log(version, note);
        cycle_log::append(&mut *tx, owner, &system_entry, Some(actor.user_id)).await?;

        let mut cycle_ended = false;
        if let (Some(cycle), Some(counters)) = (active_cycle.as_mut(), plan.counters) {
            sqlx::query(
                "UPDATE cycles SET mortality = $2, birds_sold = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(cycle.id)
            .bind(counters.mortality)
            .bind(counters.birds_sold)
            .execute(&mut *tx)
            .await?;
            cycle.mortality = counters.mortality;
            cycle.birds_sold = counters.birds_sold;

            update_cycle_feed(
                &mut *tx,
                cycle,
                self.pricing.bag_weight_kg,
                Some(actor.user_id),
                true,
                Some("Intake recalculated after sale adjustment"),
                None,
            )
            .await?;

            if plan.closes_cycle {
                close_cycle(
                    &mut *tx,
                    cycle,
                    FinalIntake::Recalculated(cycle.intake),
                    event.sale_date,
                    Some(actor.user_id),
                    None,
                )
                .await?;
                cycle_ended = true;
            }
        }

        tx.commit().await?;

        tracing::info!(
            sale_event_id = %event.id,
            version,
            birds_sold_difference = plan.birds_sold_difference,
            mortality_difference = plan.mortality_difference,
            cycle_ended,
            "sale report generated"
        );

        notifications.spawn(ManagerNotice {
            organization_id: farmer.organization_id,
            kind: NotificationKind::SaleAdjusted,
            title: "Sale adjusted".to_string(),
            message: format!(
                "{} revised the sale of {} to report v{}: {} birds, {} kg",
                actor.user_name, farmer.name, version, report.birds_sold, report.total_weight
            ),
            link: Some(format!("/sales/{}", event.id)),
        });

        Ok(ReportOutcome {
            report,
            birds_sold_difference: plan.birds_sold_difference,
            mortality_difference: plan.mortality_difference,
            cycle_ended,
        })
    }

    /// Sales of a cycle, an archived cycle or a farmer, oldest first
    pub async fn list_sale_events(
        &self,
        actor: &AuthUser,
        filter: SaleFilter,
    ) -> AppResult<Vec<SaleEventView>> {
        let mut conn = self.db.acquire().await?;

        let (farmer_id, column, id) = match filter {
            SaleFilter::Cycle(id) => {
                let target = fetch_ref(&mut *conn, LogOwner::Cycle(id))
                    .await?
                    .ok_or_else(|| AppError::NotFound("Cycle".to_string()))?;
                (target.farmer_id(), "cycle_id", id)
            }
            SaleFilter::History(id) => {
                let target = fetch_ref(&mut *conn, LogOwner::History(id))
                    .await?
                    .ok_or_else(|| AppError::NotFound("Cycle history".to_string()))?;
                (target.farmer_id(), "history_id", id)
            }
            SaleFilter::Farmer(id) => (id, "farmer_id", id),
        };
        fetch_managed(&mut *conn, actor, farmer_id).await?;

        let sql = format!(
            "SELECT {} FROM sale_events WHERE {} = $1 ORDER BY sale_date, created_at",
            SALE_EVENT_COLUMNS, column
        );
        let events = sqlx::query_as::<_, SaleEventRow>(&sql)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(SaleEvent::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let sql = format!(
            "SELECT {} FROM sale_reports WHERE sale_event_id = ANY($1) ORDER BY version DESC",
            SALE_REPORT_COLUMNS
        );
        let mut reports: HashMap<Uuid, Vec<SaleReport>> = HashMap::new();
        for row in sqlx::query_as::<_, SaleReportRow>(&sql)
            .bind(&event_ids)
            .fetch_all(&mut *conn)
            .await?
        {
            let report = SaleReport::from(row);
            reports.entry(report.sale_event_id).or_default().push(report);
        }

        let mut owners: HashMap<LogOwner, Option<CycleRef>> = HashMap::new();
        for event in &events {
            if !owners.contains_key(&event.owner) {
                let found = fetch_ref(&mut *conn, event.owner).await?;
                owners.insert(event.owner, found);
            }
        }

        Ok(build_views(events, reports, &owners, &self.pricing))
    }

    /// Report chain of a sale, newest first
    pub async fn get_sale_reports(
        &self,
        actor: &AuthUser,
        sale_event_id: Uuid,
    ) -> AppResult<Vec<SaleReport>> {
        let mut conn = self.db.acquire().await?;
        let event = fetch_event(&mut *conn, sale_event_id, false).await?;
        fetch_managed(&mut *conn, actor, event.farmer_id).await?;
        report_chain(&mut *conn, event.id).await
    }

    /// Resolve an id given as either an active or archived cycle into a filter
    pub async fn filter_for(&self, id: Uuid) -> AppResult<SaleFilter> {
        let mut conn = self.db.acquire().await?;
        Ok(match resolve(&mut *conn, id).await? {
            CycleRef::Active(c) => SaleFilter::Cycle(c.id),
            CycleRef::Archived(h) => SaleFilter::History(h.id),
        })
    }
}

/// Attach reports and running cycle context to events already in sale order
fn build_views(
    events: Vec<SaleEvent>,
    mut reports: HashMap<Uuid, Vec<SaleReport>>,
    owners: &HashMap<LogOwner, Option<CycleRef>>,
    pricing: &PricingPolicy,
) -> Vec<SaleEventView> {
    let mut running: HashMap<LogOwner, (Decimal, Decimal)> = HashMap::new();
    let mut owner_sales: HashMap<LogOwner, Vec<SaleFigures>> = HashMap::new();
    for event in &events {
        owner_sales.entry(event.owner).or_default().push(event.figures());
    }

    events
        .into_iter()
        .map(|event| {
            let totals = running.entry(event.owner).or_insert((Decimal::ZERO, Decimal::ZERO));
            totals.0 += event.total_amount;
            totals.1 += event.total_weight;
            let (cumulative_revenue, cumulative_weight) = *totals;

            let cycle_context = owners.get(&event.owner).and_then(|o| o.as_ref()).map(|cycle| {
                let sales = owner_sales.get(&event.owner).map(Vec::as_slice).unwrap_or(&[]);
                let metrics = cycle.metrics(sales, pricing);
                SaleContext {
                    cycle_id: cycle.id(),
                    is_ended: cycle.is_ended(),
                    doc: cycle.doc(),
                    mortality: cycle.mortality(),
                    age: cycle.age(),
                    fcr: metrics.as_ref().map(|m| m.fcr),
                    epi: metrics.as_ref().map(|m| m.epi),
                    cumulative_revenue,
                    cumulative_weight,
                }
            });

            SaleEventView {
                reports: reports.remove(&event.id).unwrap_or_default(),
                event,
                cycle_context,
            }
        })
        .collect()
}

/// SYSTEM log marking a new report version; the version lives in the note
fn report_generated_log(version: i32, note: Option<&str>) -> NewCycleLog {
    let text = match note {
        Some(n) => format!("Sale report v{} generated: {}", version, n),
        None => format!("Sale report v{} generated", version),
    };
    NewCycleLog::new(CycleLogType::System, Decimal::ZERO).with_note(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cycle, CycleHistory};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn event(owner: LogOwner, weight: Decimal, price: Decimal, day: u32) -> SaleEvent {
        SaleEvent {
            id: Uuid::new_v4(),
            owner,
            farmer_id: Uuid::new_v4(),
            location: None,
            house_birds: 100,
            birds_sold: 50,
            total_mortality: 0,
            total_weight: weight,
            avg_weight: dec!(2),
            price_per_kg: price,
            total_amount: weight * price,
            cash_received: Decimal::ZERO,
            deposit_received: Decimal::ZERO,
            medicine_cost: Decimal::ZERO,
            feed_consumed: vec![],
            feed_stock: vec![],
            sale_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_log_carries_no_value_change() {
        let entry = report_generated_log(3, Some("weighbridge recount"));
        assert_eq!(entry.value_change, Decimal::ZERO);
        assert_eq!(
            entry.note.as_deref(),
            Some("Sale report v3 generated: weighbridge recount")
        );
        let plain = report_generated_log(2, None);
        assert_eq!(plain.note.as_deref(), Some("Sale report v2 generated"));
    }

    #[test]
    fn test_sale_counts_are_bounded() {
        let input: CreateSaleEventInput = serde_json::from_value(serde_json::json!({
            "cycle_id": Uuid::new_v4(),
            "birds_sold": i32::MAX,
            "total_weight": "100",
            "price_per_kg": "150",
        }))
        .unwrap();
        assert!(input.validate().is_err());

        let report: GenerateReportInput = serde_json::from_value(serde_json::json!({
            "birds_sold": 40,
            "total_mortality": i32::MAX,
            "total_weight": "100",
            "price_per_kg": "150",
        }))
        .unwrap();
        assert!(report.validate().is_err());

        let report: GenerateReportInput = serde_json::from_value(serde_json::json!({
            "birds_sold": 40,
            "total_mortality": 3,
            "total_weight": "100",
            "price_per_kg": "150",
        }))
        .unwrap();
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_context_accumulates_per_owner() {
        let cycle_id = Uuid::new_v4();
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let cycle = Cycle {
            id: cycle_id,
            farmer_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "A".to_string(),
            doc: 100,
            mortality: 0,
            birds_sold: 50,
            age: 30,
            intake: dec!(10),
            created_at: created,
            updated_at: created,
        };
        let owner = LogOwner::Cycle(cycle_id);
        let events = vec![
            event(owner, dec!(100), dec!(150), 1),
            event(owner, dec!(50), dec!(140), 2),
        ];
        let mut owners = HashMap::new();
        owners.insert(owner, Some(CycleRef::Active(cycle)));

        let views = build_views(events, HashMap::new(), &owners, &PricingPolicy::default());
        let last = views[1].cycle_context.as_ref().unwrap();
        assert_eq!(last.cumulative_weight, dec!(150));
        assert_eq!(last.cumulative_revenue, dec!(22000));
        assert_eq!(last.fcr, None);
    }

    #[test]
    fn test_archived_owner_reports_fcr() {
        let history = CycleHistory {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            cycle_name: "B".to_string(),
            doc: 1000,
            mortality: 20,
            birds_sold: 980,
            age: 32,
            final_intake: dec!(40),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            created_at: Utc::now(),
        };
        let owner = LogOwner::History(history.id);
        let mut owners = HashMap::new();
        owners.insert(owner, Some(CycleRef::Archived(history)));

        let views = build_views(
            vec![event(owner, dec!(1960), dec!(141), 2)],
            HashMap::new(),
            &owners,
            &PricingPolicy::default(),
        );
        let context = views[0].cycle_context.as_ref().unwrap();
        assert!(context.is_ended);
        assert_eq!(context.fcr, Some(dec!(2000) / dec!(1960)));
    }
}
