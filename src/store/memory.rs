//! In-memory [`ContentStore`] used by tests and local preview. Batches are
//! validated up front and applied under a single write lock, so readers see
//! either none or all of a batch's mutations.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::{BatchOp, ContentStore, Filter, OrderBy, Result, StoreError};

type Collection = BTreeMap<String, Value>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    blobs: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document outside of a batch, for test setup.
    pub fn put(&self, collection: &str, id: &str, doc: Value) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn blob(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(path).map(|(bytes, _)| bytes.clone())
    }
}

fn field_matches(doc: &Value, filter: &Filter) -> bool {
    doc.get(&filter.field).is_some_and(|value| *value == filter.value)
}

/// Missing fields and nulls order after present values, matching how the
/// series member load expects unordered posts to sort last.
fn compare_field(a: &Value, b: &Value, field: &str) -> Ordering {
    let left = a.get(field).filter(|value| !value.is_null());
    let right = b.get(field).filter(|value| !value.is_null());
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => compare_values(left, right),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        let collections = self.collections.read();
        let mut results: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filters.iter().all(|filter| field_matches(doc, filter)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        if let Some(order) = order_by {
            results.sort_by(|a, b| {
                let ordering = compare_field(a, b, &order.field);
                match order.direction {
                    super::Direction::Ascending => ordering,
                    super::Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        debug!(collection, count = results.len(), "query");
        Ok(results)
    }

    async fn batch_write(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut collections = self.collections.write();

        // Validate the whole batch before touching anything.
        for op in &ops {
            if let BatchOp::Update { collection, id, .. } = op {
                let exists = collections
                    .get(collection.as_str())
                    .is_some_and(|docs| docs.contains_key(id.as_str()));
                if !exists {
                    return Err(StoreError::InvalidBatch(format!(
                        "update of missing document {collection}/{id}"
                    )));
                }
            }
        }

        let count = ops.len();
        for op in ops {
            match op {
                BatchOp::Upsert { collection, id, doc } => {
                    collections.entry(collection).or_default().insert(id, doc);
                }
                BatchOp::Update {
                    collection,
                    id,
                    fields,
                } => {
                    if let Some(doc) = collections
                        .get_mut(&collection)
                        .and_then(|docs| docs.get_mut(&id))
                    {
                        if let Value::Object(map) = doc {
                            for (key, value) in fields {
                                map.insert(key, value);
                            }
                        }
                    }
                }
                BatchOp::Delete { collection, id } => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        debug!(count, "batch committed");
        Ok(())
    }

    async fn upload_blob(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        self.blobs
            .write()
            .insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
        debug!(path, size = bytes.len(), "blob stored");
        Ok(format!("memory://{path}"))
    }
}
