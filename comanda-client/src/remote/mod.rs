//! Remote data-service collaborator seam
//!
//! The sync core is agnostic to transport and serialization; it consumes
//! the remote service only through the [`DataService`] primitives with
//! the delivery semantics stated on each method. Records cross this seam
//! as `serde_json::Value`; typed decoding happens at the store boundary.

mod memory;

pub use memory::{FailPoint, MemoryDataService};

use async_trait::async_trait;
use serde_json::Value;
use shared::{ChangeEvent, Collection, RemoteResult};
use tokio::sync::broadcast;

/// Comparison operator of a query clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gte,
}

/// Conjunctive query filter
///
/// Only the operators the sync core actually issues. Timestamps compare
/// lexicographically, which is order-preserving for RFC 3339 UTC strings.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, FilterOp, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), FilterOp::Eq, value.into()));
        self
    }

    pub fn neq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), FilterOp::Neq, value.into()));
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), FilterOp::Gte, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether a record satisfies every clause
    pub fn matches(&self, record: &Value) -> bool {
        self.clauses.iter().all(|(field, op, expected)| {
            let actual = record.get(field).unwrap_or(&Value::Null);
            match op {
                FilterOp::Eq => actual == expected,
                FilterOp::Neq => actual != expected,
                FilterOp::Gte => compare_gte(actual, expected),
            }
        })
    }
}

fn compare_gte(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => {
            a.as_f64().unwrap_or(f64::NAN) >= b.as_f64().unwrap_or(f64::NAN)
        }
        (Value::String(a), Value::String(b)) => a.as_str() >= b.as_str(),
        _ => false,
    }
}

/// The remote data service
///
/// - `query` is a point-in-time read.
/// - `insert`/`update`/`delete` may fail with a [`shared::RemoteError`],
///   propagated to the caller of the triggering operation.
/// - `subscribe` delivers every committed change of a collection,
///   at-least-once and order-preserving per collection, with no ordering
///   guarantee across collections.
/// - `upload_asset` stores opaque bytes and returns an opaque URL.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        order_by: Option<&str>,
    ) -> RemoteResult<Vec<Value>>;

    async fn insert(&self, collection: Collection, record: Value) -> RemoteResult<Value>;

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> RemoteResult<Value>;

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()>;

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent>;

    async fn upload_asset(&self, bytes: Vec<u8>, extension: &str) -> RemoteResult<String>;
}
