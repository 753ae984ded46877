//! Client configuration
//!
//! # Environment variables
//!
//! All settings can be overridden through the environment:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | COMANDA_KITCHEN_WARNING_SECS | 600 | Ticket age before warning tier |
//! | COMANDA_KITCHEN_CRITICAL_SECS | 1200 | Ticket age before critical tier |
//! | COMANDA_KITCHEN_REFRESH_SECS | 30 | Priority recompute cadence |
//! | COMANDA_MENU_BASE_URL | /client/menu | Base URL stamped into table QR codes |

use serde::Deserialize;

/// Kitchen priority thresholds and tick cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KitchenConfig {
    /// Elapsed seconds since order creation before the warning tier
    pub warning_after_secs: u64,
    /// Elapsed seconds since order creation before the critical tier
    pub critical_after_secs: u64,
    /// Wall-clock recompute interval; urgency moves with time even when
    /// no data changes
    pub refresh_interval_secs: u64,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            warning_after_secs: 600,
            critical_after_secs: 1200,
            refresh_interval_secs: 30,
        }
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub kitchen: KitchenConfig,
    pub menu_base_url: String,
}

impl SyncConfig {
    /// Load configuration from environment variables, using defaults for
    /// anything unset or unparseable
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = KitchenConfig::default();
        Self {
            kitchen: KitchenConfig {
                warning_after_secs: env_u64("COMANDA_KITCHEN_WARNING_SECS", defaults.warning_after_secs),
                critical_after_secs: env_u64(
                    "COMANDA_KITCHEN_CRITICAL_SECS",
                    defaults.critical_after_secs,
                ),
                refresh_interval_secs: env_u64(
                    "COMANDA_KITCHEN_REFRESH_SECS",
                    defaults.refresh_interval_secs,
                ),
            },
            menu_base_url: std::env::var("COMANDA_MENU_BASE_URL")
                .unwrap_or_else(|_| "/client/menu".into()),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            kitchen: KitchenConfig::default(),
            menu_base_url: "/client/menu".into(),
        }
    }
}
