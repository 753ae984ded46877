//! Station Model

use serde::{Deserialize, Serialize};

/// Preparation station (kitchen, bar, grill, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
}
