//! In-memory data service
//!
//! Reference implementation of [`DataService`] backed by per-collection
//! record vectors and broadcast change channels. Used by the test suite
//! and examples; change events are emitted in commit order, mirroring
//! the per-collection ordering guarantee of a real service.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared::{ChangeEvent, Collection, RemoteError, RemoteResult};
use tokio::sync::broadcast;

use super::{DataService, Filter};

/// Change channel capacity per collection
const CHANNEL_CAPACITY: usize = 256;

/// One-shot failure injection point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailPoint {
    pub collection: Collection,
    /// Operation name: "query" | "insert" | "update" | "delete"
    pub op: &'static str,
}

/// In-memory [`DataService`] implementation
pub struct MemoryDataService {
    records: RwLock<HashMap<Collection, Vec<Value>>>,
    channels: HashMap<Collection, broadcast::Sender<ChangeEvent>>,
    fail_next: Mutex<Option<FailPoint>>,
}

impl MemoryDataService {
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        let mut records = HashMap::new();
        for collection in Collection::ALL {
            let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(collection, tx);
            records.insert(collection, Vec::new());
        }
        Self {
            records: RwLock::new(records),
            channels,
            fail_next: Mutex::new(None),
        }
    }

    /// Make the next matching call fail with `Unavailable`
    pub fn fail_next(&self, collection: Collection, op: &'static str) {
        *self.fail_next.lock() = Some(FailPoint { collection, op });
    }

    /// Seed a record without emitting a change event (pre-subscription
    /// server state)
    pub fn seed(&self, collection: Collection, record: Value) {
        self.records
            .write()
            .entry(collection)
            .or_default()
            .push(record);
    }

    fn check_fail(&self, collection: Collection, op: &'static str) -> RemoteResult<()> {
        let mut slot = self.fail_next.lock();
        if *slot == Some(FailPoint { collection, op }) {
            *slot = None;
            return Err(RemoteError::Unavailable(format!(
                "injected failure: {op} on {collection}"
            )));
        }
        Ok(())
    }

    fn emit(&self, event: ChangeEvent) {
        if let Some(tx) = self.channels.get(&event.collection) {
            // send only fails with no subscribers, which is fine
            let _ = tx.send(event);
        }
    }
}

impl Default for MemoryDataService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        order_by: Option<&str>,
    ) -> RemoteResult<Vec<Value>> {
        self.check_fail(collection, "query")?;
        let records = self.records.read();
        let mut rows: Vec<Value> = records
            .get(&collection)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(key) = order_by {
            rows.sort_by(|a, b| {
                let a = a.get(key).unwrap_or(&Value::Null);
                let b = b.get(key).unwrap_or(&Value::Null);
                compare_values(a, b)
            });
        }
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, record: Value) -> RemoteResult<Value> {
        self.check_fail(collection, "insert")?;
        let mut record = record;
        let obj = record
            .as_object_mut()
            .ok_or_else(|| RemoteError::InvalidResponse("record must be an object".into()))?;
        if !obj.contains_key("id") {
            obj.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        }

        self.records
            .write()
            .entry(collection)
            .or_default()
            .push(record.clone());
        self.emit(ChangeEvent::insert(collection, record.clone()));
        Ok(record)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> RemoteResult<Value> {
        self.check_fail(collection, "update")?;
        let mut records = self.records.write();
        let rows = records.entry(collection).or_default();
        let row = rows
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let (Some(base), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                base.insert(key.clone(), value.clone());
            }
        }
        let updated = row.clone();
        drop(records);

        // A real service replicates the full new row on update
        self.emit(ChangeEvent::update(collection, updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        self.check_fail(collection, "delete")?;
        let mut records = self.records.write();
        let rows = records.entry(collection).or_default();
        let pos = rows
            .iter()
            .position(|r| r.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let old = rows.remove(pos);
        drop(records);

        self.emit(ChangeEvent::delete(collection, old));
        Ok(())
    }

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent> {
        self.channels
            .get(&collection)
            .expect("channel exists for every collection")
            .subscribe()
    }

    async fn upload_asset(&self, _bytes: Vec<u8>, extension: &str) -> RemoteResult<String> {
        Ok(format!(
            "memory://assets/{}.{extension}",
            uuid::Uuid::new_v4()
        ))
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_id_and_emits() {
        let service = MemoryDataService::new();
        let mut rx = service.subscribe(Collection::Products);

        let inserted = service
            .insert(Collection::Products, json!({"name": "Espresso", "price": 1.5}))
            .await
            .unwrap();
        assert!(inserted.get("id").and_then(Value::as_str).is_some());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, shared::ChangeOp::Insert);
        assert_eq!(event.entity_id(), inserted.get("id").and_then(Value::as_str));
    }

    #[tokio::test]
    async fn test_update_merges_and_replicates_full_row() {
        let service = MemoryDataService::new();
        let row = service
            .insert(Collection::Products, json!({"name": "Espresso", "price": 1.5}))
            .await
            .unwrap();
        let id = row.get("id").and_then(Value::as_str).unwrap();

        let updated = service
            .update(Collection::Products, id, json!({"price": 1.8}))
            .await
            .unwrap();
        assert_eq!(updated.get("name"), Some(&json!("Espresso")));
        assert_eq!(updated.get("price"), Some(&json!(1.8)));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let service = MemoryDataService::new();
        service.fail_next(Collection::Orders, "insert");

        let err = service
            .insert(Collection::Orders, json!({"id": "o1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));

        assert!(service.insert(Collection::Orders, json!({"id": "o1"})).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let service = MemoryDataService::new();
        let err = service
            .update(Collection::Tables, "nope", json!({"status": "free"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }
}
