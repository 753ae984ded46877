//! Table Session Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// One occupation of a table, from seating to payment
///
/// Created when a table is occupied, closed exactly once when the table
/// is freed. Immutable after close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSession {
    pub id: String,
    pub table_id: String,
    pub waiter_id: Option<String>,
    pub client_count: i32,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Create session payload (table occupation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSessionCreate {
    pub table_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiter_id: Option<String>,
    pub client_count: i32,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
}
