//! Store Hub
//!
//! Factory building one [`EntityStore`] per synced collection, plus the
//! dispatch point routing change-feed events to the owning store. Typed
//! decoding happens at this boundary; untyped records never reach the
//! controllers.

use std::sync::Arc;

use shared::models::{
    CashShift, CashTransaction, Category, Order, Product, Station, Table, TableSession, Zone,
};
use shared::{ChangeEvent, Collection};

use crate::store::EntityStore;

/// One store per collection
pub struct StoreHub {
    pub tables: Arc<EntityStore<Table>>,
    pub zones: Arc<EntityStore<Zone>>,
    pub sessions: Arc<EntityStore<TableSession>>,
    pub orders: Arc<EntityStore<Order>>,
    pub products: Arc<EntityStore<Product>>,
    pub categories: Arc<EntityStore<Category>>,
    pub stations: Arc<EntityStore<Station>>,
    pub shifts: Arc<EntityStore<CashShift>>,
    pub transactions: Arc<EntityStore<CashTransaction>>,
}

impl StoreHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: Arc::new(EntityStore::new()),
            zones: Arc::new(EntityStore::new()),
            sessions: Arc::new(EntityStore::new()),
            orders: Arc::new(EntityStore::new()),
            products: Arc::new(EntityStore::new()),
            categories: Arc::new(EntityStore::new()),
            stations: Arc::new(EntityStore::new()),
            shifts: Arc::new(EntityStore::new()),
            transactions: Arc::new(EntityStore::new()),
        })
    }

    /// Route one change event to its collection's store
    ///
    /// Merge anomalies are handled inside the store; nothing here can
    /// stop the subscription that delivered the event.
    pub fn dispatch(&self, event: &ChangeEvent) {
        match event.collection {
            Collection::Tables => self.tables.apply_remote(event),
            Collection::Zones => self.zones.apply_remote(event),
            Collection::TableSessions => self.sessions.apply_remote(event),
            Collection::Orders => self.orders.apply_remote(event),
            Collection::Products => self.products.apply_remote(event),
            Collection::Categories => self.categories.apply_remote(event),
            Collection::Stations => self.stations.apply_remote(event),
            Collection::CashShifts => self.shifts.apply_remote(event),
            Collection::CashTransactions => self.transactions.apply_remote(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_routes_to_owning_store() {
        let hub = StoreHub::new();
        hub.dispatch(&ChangeEvent::insert(
            Collection::Stations,
            json!({"id": "st1", "name": "Grill", "active": true}),
        ));

        assert_eq!(hub.stations.len(), 1);
        assert!(hub.products.is_empty());
    }

    #[test]
    fn test_dispatch_survives_garbage_payload() {
        let hub = StoreHub::new();
        hub.dispatch(&ChangeEvent::insert(Collection::Orders, json!("not an object")));
        hub.dispatch(&ChangeEvent::insert(
            Collection::Orders,
            json!({"id": "o1"}), // missing required fields
        ));
        assert!(hub.orders.is_empty());
    }
}
