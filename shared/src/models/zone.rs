//! Zone Model

use serde::{Deserialize, Serialize};

use super::Table;

/// Zone entity (dining room, terrace, private room, ...)
///
/// `zone_type`, `floor` and `capacity` are soft-schema attributes the
/// service may or may not store; `tables` is populated client-side from
/// the tables collection and never sent on writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    pub zone_type: Option<String>,
    pub floor: Option<i32>,
    pub capacity: Option<i32>,
    #[serde(default)]
    pub tables: Vec<Table>,
}

/// Create zone payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneCreate {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Update zone payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}
