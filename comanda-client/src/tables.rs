//! Session/Table Lifecycle Controller
//!
//! State machine per table: free → occupied → free, with `occupied`
//! spawning exactly one active session. Commands issue the remote write
//! first, then apply the same change optimistically to the stores; the
//! change-feed echo of each write is an idempotent replay.
//!
//! Multi-write flows are not transactional: a failure partway returns a
//! stage-tagged [`FlowError::Interrupted`] and leaves earlier writes
//! committed. Optimistic state is never rolled back here.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use shared::models::{
    SessionStatus, Table, TableCreate, TableSession, TableSessionCreate, TableStatus, TableUpdate,
    Zone, ZoneCreate, ZoneUpdate,
};
use shared::{Collection, RemoteError};

use crate::error::{FlowError, FlowResult, FlowStage};
use crate::hub::StoreHub;
use crate::remote::DataService;
use crate::store::Mutation;

/// Floor-plan and occupancy controller
pub struct FloorControl {
    service: Arc<dyn DataService>,
    hub: Arc<StoreHub>,
    menu_base_url: String,
}

impl FloorControl {
    pub fn new(service: Arc<dyn DataService>, hub: Arc<StoreHub>, menu_base_url: String) -> Self {
        Self {
            service,
            hub,
            menu_base_url,
        }
    }

    // ==================== Occupancy ====================

    /// Seat a party at a free table
    ///
    /// Creates the session first, then attaches it to the table. If the
    /// table write fails the session is already active remotely; the
    /// error names the stage so the caller can surface the orphaned
    /// session instead of retrying blindly.
    pub async fn occupy(
        &self,
        table_id: &str,
        client_count: i32,
        waiter_id: Option<&str>,
    ) -> FlowResult<TableSession> {
        let table = self.table(table_id)?;
        if table.status != TableStatus::Free {
            return Err(FlowError::Validation(format!(
                "table {} is not free (status: {:?})",
                table.number, table.status
            )));
        }
        if client_count <= 0 {
            return Err(FlowError::Validation(
                "client count must be positive".into(),
            ));
        }

        let create = TableSessionCreate {
            table_id: table_id.to_string(),
            waiter_id: waiter_id.map(str::to_owned),
            client_count,
            status: SessionStatus::Active,
            start_time: Utc::now(),
        };
        let inserted = self
            .service
            .insert(Collection::TableSessions, to_value(&create)?)
            .await?;
        let session: TableSession = serde_json::from_value(inserted)?;
        self.hub
            .sessions
            .apply_optimistic(Mutation::Insert(session.clone()));

        let patch = json!({
            "status": TableStatus::Occupied,
            "current_session_id": session.id,
        });
        self.service
            .update(Collection::Tables, table_id, patch.clone())
            .await
            .map_err(|source| interrupted(FlowStage::AttachSessionToTable, source))?;
        self.hub.tables.apply_optimistic(Mutation::Update {
            id: table_id.to_string(),
            patch,
        });

        tracing::info!(table = table.number, session = %session.id, "table occupied");
        Ok(session)
    }

    /// Free a table, settling its session
    ///
    /// Order matters: the session's orders are marked paid before the
    /// session closes, so financial aggregation joining on session
    /// status never sees a closed session with unpaid orders. The table
    /// is freed last.
    pub async fn free(&self, table_id: &str, session_id: Option<&str>) -> FlowResult<()> {
        let table = self.table(table_id)?;
        let session_id = session_id
            .map(str::to_owned)
            .or_else(|| table.current_session_id.clone());

        if let Some(session_id) = &session_id {
            self.settle_session(session_id).await?;
        } else {
            tracing::warn!(table = table.number, "freeing table without a session");
        }

        let patch = json!({
            "status": TableStatus::Free,
            "current_session_id": null,
        });
        self.service
            .update(Collection::Tables, table_id, patch.clone())
            .await
            .map_err(|source| interrupted(FlowStage::FreeTable, source))?;
        self.hub.tables.apply_optimistic(Mutation::Update {
            id: table_id.to_string(),
            patch,
        });

        tracing::info!(table = table.number, "table freed");
        Ok(())
    }

    /// Mark the session's orders paid, then close it
    async fn settle_session(&self, session_id: &str) -> FlowResult<()> {
        let now = Utc::now();

        let unpaid: Vec<_> = self
            .hub
            .orders
            .snapshot()
            .into_iter()
            .filter(|o| o.session_id == session_id)
            .filter(|o| o.is_active())
            .collect();

        let paid_count = unpaid.len();
        for order in unpaid {
            let patch = json!({
                "status": "paid",
                "updated_at": now,
            });
            self.service
                .update(Collection::Orders, &order.id, patch.clone())
                .await
                .map_err(|source| interrupted(FlowStage::MarkOrdersPaid, source))?;
            self.hub.orders.apply_optimistic(Mutation::Update {
                id: order.id.clone(),
                patch,
            });
        }
        if paid_count > 0 {
            tracing::info!(session = %session_id, count = paid_count, "orders marked paid on table closure");
        }

        let patch = json!({
            "status": SessionStatus::Closed,
            "end_time": now,
        });
        self.service
            .update(Collection::TableSessions, session_id, patch.clone())
            .await
            .map_err(|source| interrupted(FlowStage::CloseSession, source))?;
        self.hub.sessions.apply_optimistic(Mutation::Update {
            id: session_id.to_string(),
            patch,
        });
        Ok(())
    }

    /// Direct status overwrite, bypassing the state machine
    ///
    /// Escape hatch for manual correction (waiting/paying and repair
    /// work). Does not touch the session; the caller is responsible for
    /// not breaking the occupied⇔active-session invariant.
    pub async fn change_status(&self, table_id: &str, status: TableStatus) -> FlowResult<()> {
        let patch = json!({ "status": status });
        self.service
            .update(Collection::Tables, table_id, patch.clone())
            .await?;
        self.hub.tables.apply_optimistic(Mutation::Update {
            id: table_id.to_string(),
            patch,
        });
        Ok(())
    }

    // ==================== Table CRUD ====================

    /// Create a table and stamp its client-menu QR URL
    pub async fn create_table(&self, create: TableCreate) -> FlowResult<Table> {
        let inserted = self
            .service
            .insert(Collection::Tables, to_value(&create)?)
            .await?;
        let mut table: Table = serde_json::from_value(inserted)?;

        // the URL needs the service-assigned id, so it is a second write
        let qr_code = format!("{}/{}", self.menu_base_url, table.id);
        let patch = json!({ "qr_code": qr_code });
        self.service
            .update(Collection::Tables, &table.id, patch)
            .await?;
        table.qr_code = Some(qr_code);

        self.hub
            .tables
            .apply_optimistic(Mutation::Insert(table.clone()));
        Ok(table)
    }

    pub async fn update_table(&self, table_id: &str, update: TableUpdate) -> FlowResult<Table> {
        let updated = self
            .service
            .update(Collection::Tables, table_id, to_value(&update)?)
            .await?;
        let table: Table = serde_json::from_value(updated)?;
        self.hub.tables.apply_optimistic(Mutation::Update {
            id: table_id.to_string(),
            patch: to_value(&update)?,
        });
        Ok(table)
    }

    pub async fn delete_table(&self, table_id: &str) -> FlowResult<()> {
        self.service.delete(Collection::Tables, table_id).await?;
        self.hub.tables.apply_optimistic(Mutation::Delete {
            id: table_id.to_string(),
        });
        Ok(())
    }

    // ==================== Zone CRUD ====================

    /// Create a zone
    ///
    /// The write payload carries only the fields the service owns; the
    /// client-side `tables` relation and soft-schema attributes never
    /// go over the wire.
    pub async fn create_zone(&self, create: ZoneCreate) -> FlowResult<Zone> {
        let inserted = self
            .service
            .insert(Collection::Zones, to_value(&create)?)
            .await?;
        let zone: Zone = serde_json::from_value(inserted)?;
        self.hub
            .zones
            .apply_optimistic(Mutation::Insert(zone.clone()));
        Ok(zone)
    }

    pub async fn update_zone(&self, zone_id: &str, update: ZoneUpdate) -> FlowResult<Zone> {
        let updated = self
            .service
            .update(Collection::Zones, zone_id, to_value(&update)?)
            .await?;
        let zone: Zone = serde_json::from_value(updated)?;
        self.hub.zones.apply_optimistic(Mutation::Update {
            id: zone_id.to_string(),
            patch: to_value(&update)?,
        });
        Ok(zone)
    }

    pub async fn delete_zone(&self, zone_id: &str) -> FlowResult<()> {
        self.service.delete(Collection::Zones, zone_id).await?;
        self.hub.zones.apply_optimistic(Mutation::Delete {
            id: zone_id.to_string(),
        });
        Ok(())
    }

    fn table(&self, table_id: &str) -> FlowResult<Table> {
        self.hub
            .tables
            .get(table_id)
            .ok_or_else(|| FlowError::Validation(format!("unknown table: {table_id}")))
    }
}

fn interrupted(stage: FlowStage, source: RemoteError) -> FlowError {
    tracing::error!(%stage, error = %source, "lifecycle flow interrupted");
    FlowError::Interrupted { stage, source }
}

fn to_value<T: Serialize>(value: &T) -> FlowResult<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

/// Floor occupancy summary derived from the zones and tables snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneStats {
    pub total_zones: usize,
    pub active_zones: usize,
    pub total_tables: usize,
    pub free_tables: usize,
    pub occupied_tables: usize,
}

/// Fold the current floor state into counters
pub fn zone_stats(zones: &[Zone], tables: &[Table]) -> ZoneStats {
    ZoneStats {
        total_zones: zones.len(),
        active_zones: zones.iter().filter(|z| z.active).count(),
        total_tables: tables.len(),
        free_tables: tables
            .iter()
            .filter(|t| t.status == TableStatus::Free)
            .count(),
        occupied_tables: tables
            .iter()
            .filter(|t| t.status == TableStatus::Occupied)
            .count(),
    }
}

/// Populate each zone's client-side `tables` relation from the tables
/// snapshot
pub fn zones_with_tables(zones: &[Zone], tables: &[Table]) -> Vec<Zone> {
    zones
        .iter()
        .map(|zone| {
            let mut zone = zone.clone();
            zone.tables = tables
                .iter()
                .filter(|t| t.zone_id == zone.id)
                .cloned()
                .collect();
            zone
        })
        .collect()
}
