//! Document store boundary.
//!
//! The registry only needs collection-level CRUD and index creation, so the
//! driver is hidden behind [`DocumentStore`]. [`MemoryStore`] is a complete
//! in-process implementation.

pub mod gateway;
pub mod memory;

use crate::config::ConnectionSettings;
use crate::core::{IdValue, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub use gateway::{Collection, EntityCollection, StoreGateway};
pub use memory::{MemoryConnector, MemoryStore};

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexDirection {
    Ascending,
    Descending,
    Text,
}

/// Index request for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: String,
    pub direction: IndexDirection,
    pub unique: bool,
    /// 0 means no expiry
    pub ttl_expire_after_seconds: u64,
}

impl IndexSpec {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: IndexDirection::Ascending,
            unique: false,
            ttl_expire_after_seconds: 0,
        }
    }

    pub fn descending(field: &str) -> Self {
        Self {
            direction: IndexDirection::Descending,
            ..Self::ascending(field)
        }
    }

    pub fn text(field: &str) -> Self {
        Self {
            direction: IndexDirection::Text,
            ..Self::ascending(field)
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn expire_after_seconds(mut self, seconds: u64) -> Self {
        self.ttl_expire_after_seconds = seconds;
        self
    }

    /// Store-style index name, e.g. `name_1`, `age_-1`, `bio_text`.
    pub fn index_name(&self) -> String {
        match self.direction {
            IndexDirection::Ascending => format!("{}_1", self.field),
            IndexDirection::Descending => format!("{}_-1", self.field),
            IndexDirection::Text => format!("{}_text", self.field),
        }
    }
}

/// Existing index as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub keys: Vec<(String, IndexDirection)>,
    pub unique: bool,
    pub ttl_expire_after_seconds: u64,
}

impl IndexInfo {
    pub fn from_spec(spec: &IndexSpec) -> Self {
        Self {
            name: spec.index_name(),
            keys: vec![(spec.field.clone(), spec.direction)],
            unique: spec.unique,
            ttl_expire_after_seconds: spec.ttl_expire_after_seconds,
        }
    }

    pub fn covers(&self, field: &str) -> bool {
        self.keys.iter().any(|(key, _)| key == field)
    }
}

/// Opaque client session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl StoreSession {
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

/// Collection-level primitives of a document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn database(&self) -> &str;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexInfo>>;

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()>;

    async fn create_text_index(&self, collection: &str, field: &str) -> Result<()> {
        self.create_index(collection, &IndexSpec::text(field)).await
    }

    async fn find_by_id(&self, collection: &str, id: &IdValue) -> Result<Option<Document>>;

    async fn upsert(&self, collection: &str, id: &IdValue, document: Document) -> Result<()>;

    async fn delete(&self, collection: &str, id: &IdValue) -> Result<bool>;

    async fn count(&self, collection: &str) -> Result<usize>;

    async fn start_session(&self) -> Result<StoreSession>;
}

/// Opens a [`DocumentStore`] from resolved connection settings.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DocumentStore>>;
}
