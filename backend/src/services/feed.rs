//! Feed intake recalculation
//!
//! The stored `intake` of an active cycle follows the organization's feed
//! schedule. Any change to population or age runs through
//! [`update_cycle_feed`] on the same transaction as the change itself.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{age_on, Cycle, CycleLogType, CycleRow, LogOwner, NewCycleLog, CYCLE_COLUMNS};
use crate::services::cycle_log;
use shared::{feeding_population, plan_feed_update, FeedSchedule, FeedUpdate, PricingPolicy};

/// Feed schedule configured for an organization, or the default curve, in
/// bags of `bag_weight_kg`
pub async fn load_schedule(
    conn: &mut PgConnection,
    organization_id: Uuid,
    bag_weight_kg: Decimal,
) -> AppResult<FeedSchedule> {
    let value = sqlx::query_scalar::<_, Option<serde_json::Value>>(
        "SELECT feed_schedule FROM organizations WHERE id = $1",
    )
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .flatten();

    Ok(FeedSchedule::from_config(value.as_ref()).with_bag_weight(bag_weight_kg))
}

/// Note of a FEED log. The entry itself is stamped when written so that it
/// follows the change that caused it; `effective_date` is kept in the note.
fn feed_log_note(
    note: Option<&str>,
    population: i32,
    age: i32,
    effective_date: Option<NaiveDate>,
) -> String {
    let note = note
        .map(str::to_string)
        .unwrap_or_else(|| format!("Intake recalculated for {} birds at day {}", population, age));
    match effective_date {
        Some(date) => format!("{} (effective {})", note, date.format("%Y-%m-%d")),
        None => note,
    }
}

/// Recalculate the cycle's intake from its population and age. The new value
/// is written together with a FEED log when it differs from the stored one or
/// when `force` is set. `cycle.intake` is updated in place.
pub async fn update_cycle_feed(
    conn: &mut PgConnection,
    cycle: &mut Cycle,
    bag_weight_kg: Decimal,
    actor_id: Option<Uuid>,
    force: bool,
    note: Option<&str>,
    effective_date: Option<NaiveDate>,
) -> AppResult<Option<FeedUpdate>> {
    let schedule = load_schedule(conn, cycle.organization_id, bag_weight_kg).await?;
    let population = feeding_population(cycle.doc, cycle.mortality);
    let target = schedule.target_intake(population, cycle.age);

    let update = match plan_feed_update(cycle.intake, target, force) {
        Some(update) => update,
        None => return Ok(None),
    };

    sqlx::query("UPDATE cycles SET intake = $2, updated_at = NOW() WHERE id = $1")
        .bind(cycle.id)
        .bind(update.target)
        .execute(&mut *conn)
        .await?;

    let mut entry = NewCycleLog::change(CycleLogType::Feed, update.previous, update.target);
    entry.note = Some(feed_log_note(note, population, cycle.age, effective_date));
    cycle_log::append(conn, LogOwner::Cycle(cycle.id), &entry, actor_id).await?;

    tracing::debug!(
        cycle_id = %cycle.id,
        previous = %update.previous,
        target = %update.target,
        forced = force,
        "feed intake recalculated"
    );

    cycle.intake = update.target;
    Ok(Some(update))
}

/// Outcome of a feed sync
#[derive(Debug, Clone, Serialize)]
pub struct FeedSyncSummary {
    pub cycles_checked: usize,
    pub ages_updated: usize,
    pub intakes_updated: usize,
}

/// Feed service
#[derive(Clone)]
pub struct FeedService {
    db: PgPool,
    pricing: PricingPolicy,
}

impl FeedService {
    pub fn new(db: PgPool, pricing: PricingPolicy) -> Self {
        Self { db, pricing }
    }

    /// Bring the age and intake of every cycle the actor manages up to today
    pub async fn sync_feed(&self, actor: &AuthUser) -> AppResult<FeedSyncSummary> {
        let today = Utc::now().date_naive();
        let mut tx = self.db.begin().await?;

        let sql = format!(
            r#"
            SELECT {}
            FROM cycles
            WHERE farmer_id IN (
                SELECT id FROM farmers
                WHERE organization_id = $1 AND ($2 OR officer_id = $3)
            )
            ORDER BY created_at
            FOR UPDATE
            "#,
            CYCLE_COLUMNS
        );
        let rows = sqlx::query_as::<_, CycleRow>(&sql)
            .bind(actor.organization_id)
            .bind(actor.role.oversees_organization())
            .bind(actor.user_id)
            .fetch_all(&mut *tx)
            .await?;

        let mut summary = FeedSyncSummary {
            cycles_checked: rows.len(),
            ages_updated: 0,
            intakes_updated: 0,
        };

        for row in rows {
            let mut cycle = Cycle::from(row);
            let age = age_on(cycle.start_date(), today);
            if age != cycle.age {
                sqlx::query("UPDATE cycles SET age = $2, updated_at = NOW() WHERE id = $1")
                    .bind(cycle.id)
                    .bind(age)
                    .execute(&mut *tx)
                    .await?;
                cycle.age = age;
                summary.ages_updated += 1;
            }

            if update_cycle_feed(
                &mut *tx,
                &mut cycle,
                self.pricing.bag_weight_kg,
                Some(actor.user_id),
                false,
                None,
                None,
            )
            .await?
            .is_some()
            {
                summary.intakes_updated += 1;
            }
        }

        tx.commit().await?;

        tracing::info!(
            user_id = %actor.user_id,
            checked = summary.cycles_checked,
            intakes_updated = summary.intakes_updated,
            "feed sync completed"
        );
        Ok(summary)
    }
}
