//! Durable tier: the document store that acts as system of record.
//!
//! # Responsibilities
//! - `DocumentStore`: get/set/update/delete by id, filtered queries with
//!   ordering and pagination, batch access, atomic numeric increments
//! - `DocumentQuery`: at most three equality filters, optional order, limit,
//!   offset and a `start_after` cursor (a document id)
//! - `MemoryDocumentStore`: in-process backend for single-node runs and tests
//!
//! # Design Decisions
//! - Documents are JSON objects; entities map to them through serde
//! - No TTL: nothing in this tier expires on its own

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::cache::error::{StoreError, StoreResult};

/// Maximum number of equality filters in one query.
pub const MAX_QUERY_FILTERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A filtered, ordered, paginated collection query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    filters: Vec<(String, Value)>,
    order_by: Option<(String, SortDirection)>,
    limit: Option<usize>,
    offset: usize,
    start_after: Option<String>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Resume after the document with this id, in query order.
    pub fn start_after(mut self, document_id: impl Into<String>) -> Self {
        self.start_after = Some(document_id.into());
        self
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<(&str, SortDirection)> {
        self.order_by.as_ref().map(|(field, dir)| (field.as_str(), *dir))
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset_value(&self) -> usize {
        self.offset
    }

    pub fn cursor(&self) -> Option<&str> {
        self.start_after.as_deref()
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.filters.len() > MAX_QUERY_FILTERS {
            return Err(StoreError::InvalidQuery(format!(
                "{} filters given, at most {MAX_QUERY_FILTERS} supported",
                self.filters.len()
            )));
        }
        Ok(())
    }

    /// Filters as one JSON object, for containment matching.
    pub fn filter_object(&self) -> Value {
        let map: Map<String, Value> = self.filters.iter().cloned().collect();
        Value::Object(map)
    }
}

/// A document and its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Value,
}

/// Document store contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Create or replace.
    async fn set(&self, collection: &str, id: &str, document: &Value) -> StoreResult<()>;

    /// Shallow-merge `fields` into an existing document. Returns false if missing.
    async fn update(&self, collection: &str, id: &str, fields: &Value) -> StoreResult<bool>;

    /// Returns whether the document existed.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    async fn query(&self, collection: &str, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>>;

    /// Results line up with `ids`.
    async fn batch_get(&self, collection: &str, ids: &[String]) -> StoreResult<Vec<Option<Value>>>;

    async fn batch_set(&self, collection: &str, documents: &[StoredDocument]) -> StoreResult<()>;

    /// Atomically add `by` to a numeric field, creating document and field as
    /// needed. Returns the new value.
    async fn increment(&self, collection: &str, id: &str, field: &str, by: f64) -> StoreResult<f64>;
}

/// Order two JSON values: numbers numerically, strings lexically, then by type.
pub(crate) fn compare_json(a: &Value, b: &Value) -> CmpOrdering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// `DocumentStore` kept in process memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, BTreeMap<String, Value>>,
    offline: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a connection error until set back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of read operations served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Connection("memory document store offline".into()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> StoreResult<()> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn matches_filters(body: &Value, filters: &[(String, Value)]) -> bool {
    filters.iter().all(|(field, expected)| body.get(field) == Some(expected))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.read()?;
        Ok(self.collections.get(collection).and_then(|docs| docs.get(id).cloned()))
    }

    async fn set(&self, collection: &str, id: &str, document: &Value) -> StoreResult<()> {
        self.check_online()?;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: &Value) -> StoreResult<bool> {
        self.check_online()?;
        let Some(fields) = fields.as_object() else {
            return Err(StoreError::InvalidQuery("update fields must be a JSON object".into()));
        };
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.get_mut(id).and_then(Value::as_object_mut) {
            Some(existing) => {
                for (key, value) in fields {
                    existing.insert(key.clone(), value.clone());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.check_online()?;
        Ok(self
            .collections
            .get_mut(collection)
            .map(|mut docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn query(&self, collection: &str, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>> {
        query.validate()?;
        self.read()?;

        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        // 1. Filter
        let mut rows: Vec<StoredDocument> = docs
            .iter()
            .filter(|(_, body)| matches_filters(body, query.filters()))
            .map(|(id, body)| StoredDocument {
                id: id.clone(),
                body: body.clone(),
            })
            .collect();
        drop(docs);

        // 2. Order, ties broken by id
        if let Some((field, direction)) = query.ordering() {
            rows.sort_by(|a, b| {
                let ord = compare_json(
                    a.body.get(field).unwrap_or(&Value::Null),
                    b.body.get(field).unwrap_or(&Value::Null),
                )
                .then_with(|| a.id.cmp(&b.id));
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        // 3. Cursor, offset, limit
        let start = match query.cursor() {
            Some(cursor) => match rows.iter().position(|row| row.id == cursor) {
                Some(pos) => pos + 1,
                None => return Ok(Vec::new()),
            },
            None => 0,
        };
        let limit = query.limit_value().unwrap_or(usize::MAX);

        Ok(rows.into_iter().skip(start.saturating_add(query.offset_value())).take(limit).collect())
    }

    async fn batch_get(&self, collection: &str, ids: &[String]) -> StoreResult<Vec<Option<Value>>> {
        self.read()?;
        let docs = self.collections.get(collection);
        Ok(ids
            .iter()
            .map(|id| docs.as_ref().and_then(|docs| docs.get(id).cloned()))
            .collect())
    }

    async fn batch_set(&self, collection: &str, documents: &[StoredDocument]) -> StoreResult<()> {
        self.check_online()?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        for doc in documents {
            docs.insert(doc.id.clone(), doc.body.clone());
        }
        Ok(())
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, by: f64) -> StoreResult<f64> {
        self.check_online()?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let doc = docs
            .entry(id.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(object) = doc.as_object_mut() else {
            return Err(StoreError::Backend(format!("document '{id}' is not an object")));
        };

        let current = match object.get(field) {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(_) => return Err(StoreError::Backend(format!("field '{field}' is not numeric"))),
        };
        let next = current + by;
        object.insert(field.to_string(), Value::from(next));
        Ok(next)
    }
}
