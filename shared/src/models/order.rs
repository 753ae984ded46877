//! Order Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Paid,
    Cancelled,
}

/// Kitchen status of a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderItemStatus {
    Pending,
    Ready,
}

/// Order entity
///
/// Owns its items; `session_id` is a lookup key into the sessions
/// collection. `kitchen_started_at`/`kitchen_finished_at` are order-level
/// fallbacks used when no item carries its own kitchen timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub session_id: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub kitchen_started_at: Option<DateTime<Utc>>,
    pub kitchen_finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Whether the order still needs kitchen attention
    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::InProgress)
    }
}

/// Line item of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Denormalized product name, kept for reporting after catalog edits
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub status: OrderItemStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    /// quantity × unit_price
    pub fn subtotal(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}
