//! Cash Transaction Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a manual cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

/// Manual cash movement within a shift. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashTransaction {
    pub id: String,
    pub shift_id: String,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Create transaction payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashTransactionCreate {
    pub shift_id: String,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
