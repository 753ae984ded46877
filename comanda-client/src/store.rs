//! Entity Store
//!
//! Authoritative client-side cache of one entity collection. Remote
//! change-feed events and local optimistic writes funnel through the
//! same merge routine, so a later echo of an already-applied change is
//! an idempotent no-op. Every successful mutation bumps the version and
//! publishes the new snapshot to subscribers synchronously, in mutation
//! order.
//!
//! Stores are explicit instances built per collection (see
//! [`crate::hub::StoreHub`]), never ambient globals, so test suites can
//! instantiate isolated stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::models::{
    CashShift, CashTransaction, Category, Order, Product, Station, Table, TableSession, Zone,
};
use shared::{ChangeEvent, ChangeOp, Collection};

/// An entity the store can cache
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Collection this entity type is synced from
    const COLLECTION: Collection;

    /// Stable opaque identifier
    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

impl_entity!(Table, Collection::Tables);
impl_entity!(Zone, Collection::Zones);
impl_entity!(TableSession, Collection::TableSessions);
impl_entity!(Order, Collection::Orders);
impl_entity!(Product, Collection::Products);
impl_entity!(Category, Collection::Categories);
impl_entity!(Station, Collection::Stations);
impl_entity!(CashShift, Collection::CashShifts);
impl_entity!(CashTransaction, Collection::CashTransactions);

/// A local, not-yet-confirmed change
#[derive(Debug, Clone)]
pub enum Mutation<T> {
    Insert(T),
    Update { id: String, patch: Value },
    Delete { id: String },
}

/// Subscription handle returned by [`EntityStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

type Callback<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

struct Inner<T> {
    items: Vec<T>,
    version: u64,
}

/// Authoritative cache of one entity collection
///
/// Owns the in-memory snapshot exclusively; readers get cloned
/// sequences, never live handles.
pub struct EntityStore<T: Entity> {
    inner: RwLock<Inner<T>>,
    subscribers: RwLock<Vec<(u64, Callback<T>)>>,
    next_token: AtomicU64,
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: Vec::new(),
                version: 0,
            }),
            subscribers: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Current snapshot, in collection order
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.read().items.clone()
    }

    /// Monotone counter bumped by every successful mutation; serves as
    /// snapshot identity for memoized aggregation
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Find one entity by id
    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.read().items.iter().find(|e| e.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Full resynchronization from a bulk fetch
    ///
    /// Replaces the whole snapshot atomically; observers see a single
    /// transition.
    pub fn replace_all(&self, items: Vec<T>) {
        let snapshot = {
            let mut inner = self.inner.write();
            inner.items = items;
            inner.version += 1;
            inner.items.clone()
        };
        self.notify(&snapshot);
    }

    /// Merge one change-feed event
    ///
    /// Anomalies (wrong collection, undecodable payload, missing id) are
    /// logged and discarded; they never stop the subscription.
    pub fn apply_remote(&self, event: &ChangeEvent) {
        if event.collection != T::COLLECTION {
            tracing::warn!(
                expected = %T::COLLECTION,
                got = %event.collection,
                "change event routed to wrong store, ignoring"
            );
            return;
        }

        let mutation = match event.op {
            ChangeOp::Insert => match &event.new {
                Some(new) => match serde_json::from_value::<T>(new.clone()) {
                    Ok(entity) => Mutation::Insert(entity),
                    Err(e) => {
                        tracing::warn!(collection = %T::COLLECTION, error = %e, "undecodable insert payload, discarding");
                        return;
                    }
                },
                None => {
                    tracing::warn!(collection = %T::COLLECTION, "insert event without payload, discarding");
                    return;
                }
            },
            ChangeOp::Update => {
                let Some(patch) = event.new.clone() else {
                    tracing::warn!(collection = %T::COLLECTION, "update event without payload, discarding");
                    return;
                };
                let Some(id) = event.entity_id().map(str::to_owned) else {
                    tracing::warn!(collection = %T::COLLECTION, "update event without id, discarding");
                    return;
                };
                Mutation::Update { id, patch }
            }
            ChangeOp::Delete => {
                let Some(id) = event.entity_id().map(str::to_owned) else {
                    tracing::warn!(collection = %T::COLLECTION, "delete event without id, discarding");
                    return;
                };
                Mutation::Delete { id }
            }
        };

        self.apply(mutation);
    }

    /// Apply a local optimistic change, immediately
    ///
    /// Uses the same merge rule as remote events, so the eventual
    /// change-feed echo of this write is idempotent. Not rolled back on
    /// remote failure; callers own any revert policy.
    pub fn apply_optimistic(&self, mutation: Mutation<T>) {
        self.apply(mutation);
    }

    /// Register a snapshot observer
    ///
    /// The callback is invoked immediately with the current snapshot,
    /// then once per mutation, synchronously and in mutation order.
    pub fn subscribe(&self, callback: impl Fn(&[T]) + Send + Sync + 'static) -> SubscriptionToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<T> = Arc::new(callback);
        callback(&self.inner.read().items);
        self.subscribers.write().push((token, callback));
        SubscriptionToken(token)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscribers.write().retain(|(id, _)| *id != token.0);
    }

    /// Shared merge routine for remote and optimistic mutations
    fn apply(&self, mutation: Mutation<T>) {
        let snapshot = {
            let mut inner = self.inner.write();
            let changed = match mutation {
                Mutation::Insert(entity) => {
                    if inner.items.iter().any(|e| e.id() == entity.id()) {
                        // optimistic insert racing its own echo
                        tracing::debug!(collection = %T::COLLECTION, id = entity.id(), "duplicate insert, no-op");
                        false
                    } else {
                        inner.items.push(entity);
                        true
                    }
                }
                Mutation::Update { id, patch } => {
                    if let Some(pos) = inner.items.iter().position(|e| e.id() == id.as_str()) {
                        match merge_patch(&mut inner.items[pos], &patch) {
                            Ok(()) => true,
                            Err(e) => {
                                tracing::warn!(collection = %T::COLLECTION, id = %id, error = %e, "merge failed, discarding update");
                                false
                            }
                        }
                    } else {
                        // self-heal a missed insert when the payload is a
                        // complete row
                        match serde_json::from_value::<T>(patch) {
                            Ok(entity) => {
                                tracing::debug!(collection = %T::COLLECTION, id = %id, "update for unknown entity, treating as insert");
                                inner.items.push(entity);
                                true
                            }
                            Err(e) => {
                                tracing::warn!(collection = %T::COLLECTION, id = %id, error = %e, "update for unknown entity with partial payload, discarding");
                                false
                            }
                        }
                    }
                }
                Mutation::Delete { id } => {
                    let before = inner.items.len();
                    inner.items.retain(|e| e.id() != id.as_str());
                    if inner.items.len() == before {
                        tracing::debug!(collection = %T::COLLECTION, id = %id, "delete for unknown entity, no-op");
                        false
                    } else {
                        true
                    }
                }
            };

            if !changed {
                return;
            }
            inner.version += 1;
            inner.items.clone()
        };

        self.notify(&snapshot);
    }

    fn notify(&self, snapshot: &[T]) {
        let callbacks: Vec<Callback<T>> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Field-level shallow merge of a JSON patch into an entity
///
/// Patch keys overwrite, absent keys stay untouched; the result must
/// still decode as the entity type.
fn merge_patch<T: Entity>(entity: &mut T, patch: &Value) -> Result<(), serde_json::Error> {
    let mut base = serde_json::to_value(&*entity)?;
    if let (Value::Object(base), Value::Object(fields)) = (&mut base, patch) {
        for (key, value) in fields {
            base.insert(key.clone(), value.clone());
        }
    }
    *entity = serde_json::from_value(base)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use shared::models::{Product, Table, TableStatus};

    fn product(id: &str, name: &str, price: f64) -> Product {
        Product {
            id: id.into(),
            category_id: None,
            name: name.into(),
            price,
            image_url: None,
            active: true,
        }
    }

    fn product_value(id: &str, name: &str, price: f64) -> Value {
        serde_json::to_value(product(id, name, price)).unwrap()
    }

    #[test]
    fn test_insert_and_snapshot() {
        let store = EntityStore::<Product>::new();
        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.5)));

        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].name, "Espresso");
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let store = EntityStore::<Product>::new();
        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.5)));

        // echo of the same logical insert
        let event = ChangeEvent::insert(Collection::Products, product_value("p1", "Espresso", 1.5));
        store.apply_remote(&event);

        assert_eq!(store.len(), 1);
        assert_eq!(store.version(), 1); // no mutation happened
    }

    #[test]
    fn test_update_is_field_level_merge() {
        let store = EntityStore::<Product>::new();
        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.5)));

        store.apply_remote(&ChangeEvent::update(
            Collection::Products,
            json!({"id": "p1", "price": 1.8}),
        ));
        store.apply_remote(&ChangeEvent::update(
            Collection::Products,
            json!({"id": "p1", "name": "Doppio"}),
        ));

        let snap = store.snapshot();
        assert_eq!(snap[0].price, 1.8);
        assert_eq!(snap[0].name, "Doppio");
    }

    #[test]
    fn test_update_idempotence() {
        let store = EntityStore::<Product>::new();
        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.5)));

        let event = ChangeEvent::update(Collection::Products, json!({"id": "p1", "price": 2.0}));
        store.apply_remote(&event);
        let first = store.snapshot();
        store.apply_remote(&event);
        let second = store.snapshot();

        assert_eq!(first[0].price, second[0].price);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_update_for_unknown_entity_self_heals() {
        let store = EntityStore::<Product>::new();

        // full row arrives as an update for an entity we never saw
        store.apply_remote(&ChangeEvent::update(
            Collection::Products,
            product_value("p9", "Cortado", 1.7),
        ));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("p9").unwrap().name, "Cortado");
    }

    #[test]
    fn test_partial_update_for_unknown_entity_is_discarded() {
        let store = EntityStore::<Product>::new();

        store.apply_remote(&ChangeEvent::update(
            Collection::Products,
            json!({"id": "p9", "price": 9.0}),
        ));

        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let store = EntityStore::<Product>::new();
        store.apply_remote(&ChangeEvent::delete(
            Collection::Products,
            json!({"id": "ghost"}),
        ));
        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_wrong_collection_is_ignored() {
        let store = EntityStore::<Product>::new();
        store.apply_remote(&ChangeEvent::insert(
            Collection::Tables,
            json!({"id": "t1", "zone_id": "z", "number": 1, "capacity": 4,
                   "status": "free", "current_session_id": null, "qr_code": null}),
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_single_transition() {
        let store = EntityStore::<Product>::new();
        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.5)));

        let notifications = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&notifications);
        store.subscribe(move |snap: &[Product]| {
            seen.lock().push(snap.len());
        });

        store.replace_all(vec![
            product("a", "A", 1.0),
            product("b", "B", 2.0),
            product("c", "C", 3.0),
        ]);

        // one call on subscribe, exactly one for the whole replace
        assert_eq!(*notifications.lock(), vec![1, 3]);
    }

    #[test]
    fn test_subscribe_delivers_in_mutation_order() {
        let store = EntityStore::<Product>::new();
        let prices = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&prices);
        store.subscribe(move |snap: &[Product]| {
            seen.lock().push(snap.first().map(|p| p.price));
        });

        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.0)));
        store.apply_optimistic(Mutation::Update {
            id: "p1".into(),
            patch: json!({"price": 2.0}),
        });
        store.apply_optimistic(Mutation::Update {
            id: "p1".into(),
            patch: json!({"price": 3.0}),
        });

        assert_eq!(*prices.lock(), vec![None, Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let store = EntityStore::<Product>::new();
        let count = Arc::new(Mutex::new(0usize));
        let seen = Arc::clone(&count);
        let token = store.subscribe(move |_: &[Product]| {
            *seen.lock() += 1;
        });

        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.0)));
        store.unsubscribe(token);
        store.apply_optimistic(Mutation::Insert(product("p2", "Latte", 2.0)));

        assert_eq!(*count.lock(), 2); // initial + first insert only
    }

    #[test]
    fn test_version_strictly_increases() {
        let store = EntityStore::<Product>::new();
        let v0 = store.version();
        store.apply_optimistic(Mutation::Insert(product("p1", "Espresso", 1.0)));
        let v1 = store.version();
        store.apply_optimistic(Mutation::Delete { id: "p1".into() });
        let v2 = store.version();
        assert!(v0 < v1 && v1 < v2);
    }

    #[test]
    fn test_null_patch_clears_optional_field() {
        let store = EntityStore::<Table>::new();
        let table = Table {
            id: "t1".into(),
            zone_id: "z1".into(),
            number: 1,
            capacity: 4,
            status: TableStatus::Occupied,
            current_session_id: Some("s1".into()),
            qr_code: None,
        };
        store.apply_optimistic(Mutation::Insert(table));

        store.apply_optimistic(Mutation::Update {
            id: "t1".into(),
            patch: json!({"status": "free", "current_session_id": null}),
        });

        let snap = store.snapshot();
        assert_eq!(snap[0].status, TableStatus::Free);
        assert_eq!(snap[0].current_session_id, None);
    }
}
