//! Audit trail writes shared by the ledger services
//!
//! These helpers run on the caller's transaction so that a log entry is
//! committed together with the change it describes.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CycleLog, CycleLogRow, LogOwner, NewCycleLog, CYCLE_LOG_COLUMNS};

/// Append an entry to the owner's audit trail, stamped with the statement
/// clock so entries of one transaction keep their write order
pub async fn append(
    conn: &mut PgConnection,
    owner: LogOwner,
    entry: &NewCycleLog,
    actor_id: Option<Uuid>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cycle_logs (
            cycle_id, history_id, log_type, value_change,
            previous_value, new_value, note, actor_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(owner.cycle_id())
    .bind(owner.history_id())
    .bind(entry.log_type.as_str())
    .bind(entry.value_change)
    .bind(entry.previous_value)
    .bind(entry.new_value)
    .bind(&entry.note)
    .bind(actor_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Move every log entry and sale event from one owner to another. Both foreign
/// keys are rewritten in one statement so the single-owner check holds.
pub async fn reparent(conn: &mut PgConnection, from: LogOwner, to: LogOwner) -> AppResult<()> {
    let (where_column, from_id) = match from {
        LogOwner::Cycle(id) => ("cycle_id", id),
        LogOwner::History(id) => ("history_id", id),
    };

    for table in ["cycle_logs", "sale_events"] {
        let sql = format!(
            "UPDATE {} SET cycle_id = $1, history_id = $2 WHERE {} = $3",
            table, where_column
        );
        let moved = sqlx::query(&sql)
            .bind(to.cycle_id())
            .bind(to.history_id())
            .bind(from_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        tracing::debug!(table, moved, from = %from_id, to = %to.id(), "re-parented rows");
    }

    Ok(())
}

/// Audit trail of an owner, newest first
pub async fn list(conn: &mut PgConnection, owner: LogOwner) -> AppResult<Vec<CycleLog>> {
    let column = match owner {
        LogOwner::Cycle(_) => "cycle_id",
        LogOwner::History(_) => "history_id",
    };
    let sql = format!(
        "SELECT {} FROM cycle_logs WHERE {} = $1 ORDER BY created_at DESC",
        CYCLE_LOG_COLUMNS, column
    );

    let rows = sqlx::query_as::<_, CycleLogRow>(&sql)
        .bind(owner.id())
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(CycleLog::try_from).collect()
}
