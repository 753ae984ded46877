//! ChangeFeed Adapter
//!
//! Bootstraps every store from a point-in-time query, then pumps
//! change-feed events into the hub in delivery order, one task per
//! collection. Events for a collection are applied in the order the
//! remote collaborator emits them; no ordering is assumed across
//! collections.

use std::sync::Arc;

use shared::{Collection, RemoteResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::StoreHub;
use crate::remote::{DataService, Filter};
use crate::store::{Entity, EntityStore};

/// Change-feed adapter wiring a [`DataService`] to a [`StoreHub`]
pub struct ChangeFeed {
    service: Arc<dyn DataService>,
    hub: Arc<StoreHub>,
    shutdown: CancellationToken,
}

impl ChangeFeed {
    pub fn new(
        service: Arc<dyn DataService>,
        hub: Arc<StoreHub>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            hub,
            shutdown,
        }
    }

    /// Initial full resynchronization of every collection
    ///
    /// Individual records that fail to decode are logged and skipped;
    /// the rest of the collection still loads (missed rows self-heal
    /// through later update events).
    pub async fn bootstrap(&self) -> RemoteResult<()> {
        self.load(&self.hub.zones, Some("name")).await?;
        self.load(&self.hub.tables, Some("number")).await?;
        self.load(&self.hub.sessions, None).await?;
        self.load(&self.hub.stations, Some("name")).await?;
        self.load(&self.hub.categories, Some("name")).await?;
        self.load(&self.hub.products, Some("name")).await?;
        self.load(&self.hub.orders, Some("created_at")).await?;
        self.load(&self.hub.shifts, None).await?;
        self.load(&self.hub.transactions, Some("created_at")).await?;
        tracing::info!("change feed bootstrap complete");
        Ok(())
    }

    async fn load<T: Entity>(
        &self,
        store: &EntityStore<T>,
        order_by: Option<&str>,
    ) -> RemoteResult<()> {
        let rows = self
            .service
            .query(T::COLLECTION, &Filter::new(), order_by)
            .await?;

        let total = rows.len();
        let items: Vec<T> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(collection = %T::COLLECTION, error = %e, "undecodable record in bulk fetch, skipping");
                    None
                }
            })
            .collect();

        tracing::debug!(collection = %T::COLLECTION, loaded = items.len(), total, "collection loaded");
        store.replace_all(items);
        Ok(())
    }

    /// Decode and route one raw wire event
    ///
    /// Unrecognized collections and malformed envelopes are logged and
    /// discarded; no event may stop the subscription that delivered it.
    pub fn dispatch_raw(&self, raw: serde_json::Value) {
        match shared::ChangeEvent::decode(raw) {
            Ok(event) => self.hub.dispatch(&event),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable change event, discarding");
            }
        }
    }

    /// Spawn one pump task per collection
    ///
    /// Each pump forwards events in delivery order until shutdown or
    /// channel close. A lagged receiver is logged loudly: skipped
    /// events mean the local snapshot may be stale until the affected
    /// rows self-heal.
    pub fn spawn_pumps(&self) -> Vec<JoinHandle<()>> {
        Collection::ALL
            .iter()
            .map(|&collection| {
                let mut rx = self.service.subscribe(collection);
                let hub = Arc::clone(&self.hub);
                let shutdown = self.shutdown.clone();
                tokio::spawn(async move {
                    tracing::debug!(%collection, "change pump started");
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                tracing::debug!(%collection, "change pump received shutdown signal");
                                break;
                            }
                            result = rx.recv() => match result {
                                Ok(event) => hub.dispatch(&event),
                                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                                    tracing::error!(%collection, skipped, "change pump lagged, local snapshot may be stale");
                                }
                                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                    tracing::info!(%collection, "change channel closed, pump stopping");
                                    break;
                                }
                            }
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryDataService;
    use serde_json::json;

    #[tokio::test]
    async fn test_bootstrap_loads_and_skips_undecodable() {
        let service = Arc::new(MemoryDataService::new());
        service.seed(
            Collection::Stations,
            json!({"id": "st1", "name": "Grill", "active": true}),
        );
        service.seed(Collection::Stations, json!({"name": 42})); // undecodable

        let hub = StoreHub::new();
        let feed = ChangeFeed::new(service, Arc::clone(&hub), CancellationToken::new());
        feed.bootstrap().await.unwrap();

        assert_eq!(hub.stations.len(), 1);
        assert_eq!(hub.stations.get("st1").unwrap().name, "Grill");
    }

    #[tokio::test]
    async fn test_unknown_collection_is_ignored_and_feed_survives() {
        let service = Arc::new(MemoryDataService::new());
        let hub = StoreHub::new();
        let feed = ChangeFeed::new(service, Arc::clone(&hub), CancellationToken::new());

        feed.dispatch_raw(json!({
            "collection": "profiles",
            "op": "insert",
            "new": {"id": "u1"}
        }));

        // later events still apply
        feed.dispatch_raw(json!({
            "collection": "stations",
            "op": "insert",
            "new": {"id": "st1", "name": "Grill", "active": true}
        }));
        assert_eq!(hub.stations.len(), 1);
    }

    #[tokio::test]
    async fn test_pump_forwards_events_in_order() {
        let service = Arc::new(MemoryDataService::new());
        let hub = StoreHub::new();
        let shutdown = CancellationToken::new();
        let feed = ChangeFeed::new(
            Arc::clone(&service) as Arc<dyn DataService>,
            Arc::clone(&hub),
            shutdown.clone(),
        );
        feed.bootstrap().await.unwrap();
        let pumps = feed.spawn_pumps();

        service
            .insert(
                Collection::Stations,
                json!({"id": "st1", "name": "Grill", "active": true}),
            )
            .await
            .unwrap();
        service
            .update(Collection::Stations, "st1", json!({"name": "Parrilla"}))
            .await
            .unwrap();

        // let the pump task drain the channel
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(hub.stations.get("st1").unwrap().name, "Parrilla");

        shutdown.cancel();
        for pump in pumps {
            pump.await.unwrap();
        }
    }
}
