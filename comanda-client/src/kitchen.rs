//! Priority Scheduler
//!
//! Derives a strict total order over active kitchen tickets from the
//! orders snapshot plus wall-clock elapsed time. The ranking is a pure
//! projection (it never mutates the stores) and is recomputed on every
//! store change and on a fixed tick, because urgency moves with time
//! even when no data changes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde_json::json;
use shared::models::{Category, Order, OrderItem, OrderItemStatus, OrderStatus, Product};
use shared::Collection;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::KitchenConfig;
use crate::error::{FlowError, FlowResult};
use crate::hub::StoreHub;
use crate::remote::DataService;
use crate::store::Mutation;

/// Urgency tier of a ticket, from elapsed time since creation
///
/// Declaration order gives `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

/// Urgency of one order at `now`
pub fn urgency(order: &Order, config: &KitchenConfig, now: DateTime<Utc>) -> Urgency {
    let elapsed = now.signed_duration_since(order.created_at);
    if elapsed >= Duration::seconds(config.critical_after_secs as i64) {
        Urgency::Critical
    } else if elapsed >= Duration::seconds(config.warning_after_secs as i64) {
        Urgency::Warning
    } else {
        Urgency::Normal
    }
}

/// Kitchen display scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationScope {
    All,
    Station(String),
}

/// product_id → station_id mapping derived from the catalog
///
/// Built per recompute from the products and categories snapshots;
/// products whose category has no station are absent.
pub struct StationIndex {
    by_product: HashMap<String, String>,
}

impl StationIndex {
    pub fn build(products: &[Product], categories: &[Category]) -> Self {
        let station_of_category: HashMap<&str, &str> = categories
            .iter()
            .filter_map(|c| c.station_id.as_deref().map(|s| (c.id.as_str(), s)))
            .collect();

        let by_product = products
            .iter()
            .filter_map(|p| {
                let category = p.category_id.as_deref()?;
                let station = station_of_category.get(category)?;
                Some((p.id.clone(), (*station).to_string()))
            })
            .collect();

        Self { by_product }
    }

    /// Whether an item belongs to the scoped station
    pub fn item_in_scope(&self, item: &OrderItem, scope: &StationScope) -> bool {
        match scope {
            StationScope::All => true,
            StationScope::Station(station) => {
                self.by_product.get(&item.product_id) == Some(station)
            }
        }
    }
}

/// Rank active orders for the kitchen display
///
/// Sort key, in order of precedence: urgency tier (higher first),
/// in-progress before pending, then FIFO by creation time. With a
/// station scope, only orders with at least one item for that station
/// appear.
pub fn rank_orders(
    orders: &[Order],
    index: &StationIndex,
    scope: &StationScope,
    config: &KitchenConfig,
    now: DateTime<Utc>,
) -> Vec<Order> {
    let mut ranked: Vec<Order> = orders
        .iter()
        .filter(|o| o.is_active())
        .filter(|o| o.items.iter().any(|item| index.item_in_scope(item, scope)))
        .cloned()
        .collect();

    ranked.sort_by(|a, b| {
        urgency(b, config, now)
            .cmp(&urgency(a, config, now))
            .then_with(|| progress_rank(a.status).cmp(&progress_rank(b.status)))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    ranked
}

fn progress_rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::InProgress => 0,
        _ => 1,
    }
}

/// Fraction of ready items, in percent
pub fn order_progress(order: &Order) -> f32 {
    if order.items.is_empty() {
        return 0.0;
    }
    let ready = order
        .items
        .iter()
        .filter(|i| i.status == OrderItemStatus::Ready)
        .count();
    (ready as f32 / order.items.len() as f32) * 100.0
}

/// Kitchen ticket scheduler
///
/// Owns the last computed ranking and the tick timer, nothing else.
/// Recomputes on every orders/catalog store notification and on a fixed
/// cadence (default 30 s).
pub struct KitchenScheduler {
    hub: Arc<StoreHub>,
    config: KitchenConfig,
    scope: RwLock<StationScope>,
    ranking: RwLock<Vec<Order>>,
    dirty: Arc<Notify>,
    shutdown: CancellationToken,
}

impl KitchenScheduler {
    pub fn new(hub: Arc<StoreHub>, config: KitchenConfig, shutdown: CancellationToken) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            hub,
            config,
            scope: RwLock::new(StationScope::All),
            ranking: RwLock::new(Vec::new()),
            dirty: Arc::new(Notify::new()),
            shutdown,
        });
        scheduler.attach();
        scheduler
    }

    /// Wire store notifications to the recompute signal
    fn attach(self: &Arc<Self>) {
        let dirty = Arc::clone(&self.dirty);
        self.hub.orders.subscribe(move |_: &[Order]| dirty.notify_one());
        let dirty = Arc::clone(&self.dirty);
        self.hub
            .products
            .subscribe(move |_: &[Product]| dirty.notify_one());
        let dirty = Arc::clone(&self.dirty);
        self.hub
            .categories
            .subscribe(move |_: &[Category]| dirty.notify_one());
    }

    /// Last computed ranking
    pub fn ranking(&self) -> Vec<Order> {
        self.ranking.read().clone()
    }

    /// Change the station scope and trigger a recompute
    pub fn set_scope(&self, scope: StationScope) {
        *self.scope.write() = scope;
        self.dirty.notify_one();
    }

    /// Recompute the ranking from current snapshots
    pub fn recompute(&self) {
        let now = Utc::now();
        let orders = self.hub.orders.snapshot();
        let index = StationIndex::build(
            &self.hub.products.snapshot(),
            &self.hub.categories.snapshot(),
        );
        let scope = self.scope.read().clone();
        let ranked = rank_orders(&orders, &index, &scope, &self.config, now);
        *self.ranking.write() = ranked;
    }

    /// Main loop: tick + change signal + shutdown
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            interval_secs = self.config.refresh_interval_secs,
            "kitchen scheduler started"
        );
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.refresh_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.recompute();
                }
                _ = self.dirty.notified() => {
                    self.recompute();
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("kitchen scheduler received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Kitchen board commands (item status mutations)
pub struct KitchenBoard {
    service: Arc<dyn DataService>,
    hub: Arc<StoreHub>,
}

impl KitchenBoard {
    pub fn new(service: Arc<dyn DataService>, hub: Arc<StoreHub>) -> Self {
        Self { service, hub }
    }

    /// Toggle one item's kitchen status
    ///
    /// Stamps `started_at` on the first transition toward ready and
    /// `finished_at` on ready; reverting to pending clears
    /// `finished_at`.
    pub async fn set_item_status(
        &self,
        order_id: &str,
        item_id: &str,
        status: OrderItemStatus,
    ) -> FlowResult<()> {
        let order = self
            .hub
            .orders
            .get(order_id)
            .ok_or_else(|| FlowError::Validation(format!("unknown order: {order_id}")))?;

        let now = Utc::now();
        let mut items = order.items.clone();
        let item = items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| FlowError::Validation(format!("unknown item: {item_id}")))?;

        item.status = status;
        match status {
            OrderItemStatus::Ready => {
                item.started_at = item.started_at.or(Some(now));
                item.finished_at = Some(now);
            }
            OrderItemStatus::Pending => {
                item.finished_at = None;
            }
        }

        self.push_items(order_id, items).await
    }

    /// Mark every unfinished item within the station scope as ready
    pub async fn mark_station_ready(&self, order_id: &str, scope: &StationScope) -> FlowResult<usize> {
        let order = self
            .hub
            .orders
            .get(order_id)
            .ok_or_else(|| FlowError::Validation(format!("unknown order: {order_id}")))?;

        let index = StationIndex::build(
            &self.hub.products.snapshot(),
            &self.hub.categories.snapshot(),
        );

        let now = Utc::now();
        let mut items = order.items.clone();
        let mut changed = 0usize;
        for item in items.iter_mut() {
            if item.status != OrderItemStatus::Ready && index.item_in_scope(item, scope) {
                item.status = OrderItemStatus::Ready;
                item.started_at = item.started_at.or(Some(now));
                item.finished_at = Some(now);
                changed += 1;
            }
        }

        if changed == 0 {
            return Ok(0);
        }
        self.push_items(order_id, items).await?;
        Ok(changed)
    }

    async fn push_items(&self, order_id: &str, items: Vec<OrderItem>) -> FlowResult<()> {
        let patch = json!({ "items": items });
        self.service
            .update(Collection::Orders, order_id, patch.clone())
            .await?;
        self.hub.orders.apply_optimistic(Mutation::Update {
            id: order_id.to_string(),
            patch,
        });
        Ok(())
    }
}
