//! Cash Shift Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shift status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl Default for ShiftStatus {
    fn default() -> Self {
        Self::Open
    }
}

/// Cash register shift
///
/// At most one shift is open system-wide at any time. The closing fields
/// stay `None` while the shift is open; `difference` is real − expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashShift {
    pub id: String,
    pub status: ShiftStatus,
    /// Starting cash in the drawer
    pub base_amount: f64,
    pub opened_by: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub final_cash_expected: Option<f64>,
    pub final_cash_real: Option<f64>,
    pub difference: Option<f64>,
    pub notes: Option<String>,
}

/// Open shift payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashShiftCreate {
    pub base_amount: f64,
    pub opened_by: String,
    pub status: ShiftStatus,
    pub opened_at: DateTime<Utc>,
}

/// Close shift payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashShiftClose {
    pub status: ShiftStatus,
    pub closed_at: DateTime<Utc>,
    pub closed_by: String,
    pub final_cash_expected: f64,
    pub final_cash_real: f64,
    pub difference: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
