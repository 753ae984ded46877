//! Change-feed payload types
//!
//! Events emitted by the remote data service for every committed change,
//! delivered at-least-once and order-preserving per collection. Payloads
//! stay `serde_json::Value` here; typed decoding happens at the store
//! boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Synced entity collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tables,
    Zones,
    TableSessions,
    Orders,
    Products,
    Categories,
    Stations,
    CashShifts,
    CashTransactions,
}

impl Collection {
    /// All collections, in bootstrap order
    pub const ALL: [Collection; 9] = [
        Collection::Zones,
        Collection::Tables,
        Collection::TableSessions,
        Collection::Stations,
        Collection::Categories,
        Collection::Products,
        Collection::Orders,
        Collection::CashShifts,
        Collection::CashTransactions,
    ];

    /// Wire name of the collection
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tables => "tables",
            Collection::Zones => "zones",
            Collection::TableSessions => "table_sessions",
            Collection::Orders => "orders",
            Collection::Products => "products",
            Collection::Categories => "categories",
            Collection::Stations => "stations",
            Collection::CashShifts => "cash_shifts",
            Collection::CashTransactions => "cash_transactions",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One committed change on a collection
///
/// `new` carries the row after the change (insert/update), `old` the row
/// before it (update/delete). Either may be partial depending on what
/// the service replicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub op: ChangeOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(collection: Collection, new: Value) -> Self {
        Self {
            collection,
            op: ChangeOp::Insert,
            new: Some(new),
            old: None,
        }
    }

    pub fn update(collection: Collection, new: Value) -> Self {
        Self {
            collection,
            op: ChangeOp::Update,
            new: Some(new),
            old: None,
        }
    }

    pub fn delete(collection: Collection, old: Value) -> Self {
        Self {
            collection,
            op: ChangeOp::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Decode a raw wire event
    ///
    /// Fails on unrecognized collections or malformed envelopes; callers
    /// log and skip such events rather than aborting the subscription.
    pub fn decode(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }

    /// Extract the entity id the event refers to
    ///
    /// Inserts/updates carry it in `new`, deletes in `old` (some services
    /// replicate only the key columns of the old row).
    pub fn entity_id(&self) -> Option<&str> {
        let record = match self.op {
            ChangeOp::Delete => self.old.as_ref().or(self.new.as_ref()),
            _ => self.new.as_ref(),
        };
        record.and_then(|v| v.get("id")).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_roundtrip() {
        let event = ChangeEvent::insert(
            Collection::Products,
            json!({"id": "p1", "name": "Espresso", "price": 1.5}),
        );

        let raw = serde_json::to_value(&event).unwrap();
        let decoded = ChangeEvent::decode(raw).unwrap();
        assert_eq!(decoded.collection, Collection::Products);
        assert_eq!(decoded.op, ChangeOp::Insert);
        assert_eq!(decoded.entity_id(), Some("p1"));
    }

    #[test]
    fn test_unknown_collection_rejected() {
        let raw = json!({
            "collection": "profiles",
            "op": "insert",
            "new": {"id": "x"}
        });
        assert!(ChangeEvent::decode(raw).is_err());
    }

    #[test]
    fn test_delete_id_from_old() {
        let event = ChangeEvent::delete(Collection::Tables, json!({"id": "t9"}));
        assert_eq!(event.entity_id(), Some("t9"));
    }
}
