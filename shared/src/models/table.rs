//! Table Model

use serde::{Deserialize, Serialize};

/// Table status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Free,
    Occupied,
    Waiting,
    Paying,
}

impl Default for TableStatus {
    fn default() -> Self {
        Self::Free
    }
}

/// Dining table entity
///
/// Invariant: `status == Occupied` iff `current_session_id` references a
/// session whose status is active. `current_session_id` is a lookup key,
/// never ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub zone_id: String,
    pub number: i32,
    #[serde(default = "default_capacity")]
    pub capacity: i32,
    #[serde(default)]
    pub status: TableStatus,
    pub current_session_id: Option<String>,
    /// Client-menu URL, stamped after creation from the assigned id
    pub qr_code: Option<String>,
}

fn default_capacity() -> i32 {
    4
}

/// Create table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCreate {
    pub zone_id: String,
    pub number: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
}

/// Update table payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TableStatus>,
}
