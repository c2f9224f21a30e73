//! The content-store contract the core depends on: document CRUD, equality
//! queries with ordering, whole-batch-atomic multi-document writes, and
//! content-addressed blob upload. The real backing service lives outside this
//! crate; [`MemoryStore`] backs tests and local preview.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Equality filter on a single document field.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Debug)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// One mutation of an atomic batch. `Upsert` replaces the whole document,
/// `Update` merges fields into an existing document (a `null` value is stored
/// as an explicit null, which is how back-references are cleared).
#[derive(Clone, Debug)]
pub enum BatchOp {
    Upsert {
        collection: String,
        id: String,
        doc: Value,
    },
    Update {
        collection: String,
        id: String,
        fields: Map<String, Value>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl BatchOp {
    pub fn upsert(collection: impl Into<String>, id: impl Into<String>, doc: Value) -> Self {
        BatchOp::Upsert {
            collection: collection.into(),
            id: id.into(),
            doc,
        }
    }

    pub fn update(
        collection: impl Into<String>,
        id: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        BatchOp::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        }
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        BatchOp::Delete {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// The persistence capability consumed by the core. `batch_write` must be
/// atomic across the whole batch: either every operation becomes visible to
/// subsequent readers or none does.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>>;

    async fn batch_write(&self, ops: Vec<BatchOp>) -> Result<()>;

    /// Content-addressed by the caller-chosen path; returns a fetchable URL.
    async fn upload_blob(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}
