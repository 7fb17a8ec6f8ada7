//! Cycle audit trail models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The record an audit entry or sale event hangs off. Exactly one of the two
/// foreign keys is ever set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LogOwner {
    Cycle(Uuid),
    History(Uuid),
}

impl LogOwner {
    /// Rebuild from the persisted foreign key pair
    pub fn from_columns(cycle_id: Option<Uuid>, history_id: Option<Uuid>) -> Option<Self> {
        match (cycle_id, history_id) {
            (Some(id), None) => Some(LogOwner::Cycle(id)),
            (None, Some(id)) => Some(LogOwner::History(id)),
            _ => None,
        }
    }

    pub fn cycle_id(&self) -> Option<Uuid> {
        match self {
            LogOwner::Cycle(id) => Some(*id),
            LogOwner::History(_) => None,
        }
    }

    pub fn history_id(&self) -> Option<Uuid> {
        match self {
            LogOwner::Cycle(_) => None,
            LogOwner::History(id) => Some(*id),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LogOwner::Cycle(id) | LogOwner::History(id) => *id,
        }
    }
}

/// Audit entry category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleLogType {
    Mortality,
    Feed,
    Sales,
    System,
    Note,
}

impl CycleLogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleLogType::Mortality => "MORTALITY",
            CycleLogType::Feed => "FEED",
            CycleLogType::Sales => "SALES",
            CycleLogType::System => "SYSTEM",
            CycleLogType::Note => "NOTE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MORTALITY" => Some(CycleLogType::Mortality),
            "FEED" => Some(CycleLogType::Feed),
            "SALES" => Some(CycleLogType::Sales),
            "SYSTEM" => Some(CycleLogType::System),
            "NOTE" => Some(CycleLogType::Note),
            _ => None,
        }
    }
}

/// Append-only audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleLog {
    pub id: Uuid,
    pub owner: LogOwner,
    pub log_type: CycleLogType,
    /// Signed delta
    pub value_change: Decimal,
    pub previous_value: Option<Decimal>,
    pub new_value: Option<Decimal>,
    pub note: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A log entry that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewCycleLog {
    pub log_type: CycleLogType,
    pub value_change: Decimal,
    pub previous_value: Option<Decimal>,
    pub new_value: Option<Decimal>,
    pub note: Option<String>,
}

impl NewCycleLog {
    pub fn new(log_type: CycleLogType, value_change: Decimal) -> Self {
        Self {
            log_type,
            value_change,
            previous_value: None,
            new_value: None,
            note: None,
        }
    }

    /// Entry describing a change from `previous` to `new`
    pub fn change(log_type: CycleLogType, previous: Decimal, new: Decimal) -> Self {
        Self {
            log_type,
            value_change: new - previous,
            previous_value: Some(previous),
            new_value: Some(new),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
