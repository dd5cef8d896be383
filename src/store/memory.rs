use super::{
    Document, DocumentStore, IndexDirection, IndexInfo, IndexSpec, StoreConnector, StoreSession,
};
use crate::config::ConnectionSettings;
use crate::core::{IdValue, OrmError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

/// Name of the index every collection starts with.
pub const ID_INDEX_NAME: &str = "_id_";

struct MemoryCollection {
    documents: HashMap<IdValue, Document>,
    indexes: Vec<IndexInfo>,
}

impl MemoryCollection {
    fn new() -> Self {
        Self {
            documents: HashMap::new(),
            indexes: vec![IndexInfo {
                name: ID_INDEX_NAME.to_string(),
                keys: vec![("_id".to_string(), IndexDirection::Ascending)],
                unique: true,
                ttl_expire_after_seconds: 0,
            }],
        }
    }

    /// Another document already holding `value` in `field`.
    fn holder_of(&self, field: &str, value: &serde_json::Value, except: Option<&IdValue>) -> Option<&IdValue> {
        self.documents
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .find(|(_, document)| document.get(field) == Some(value))
            .map(|(id, _)| id)
    }
}

/// In-process document store
///
/// Collections are created on first use. Unique indexes are enforced on
/// write; TTL values are recorded but documents are never expired.
pub struct MemoryStore {
    database: String,
    collections: RwLock<HashMap<String, MemoryCollection>>,
    create_index_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            collections: RwLock::new(HashMap::new()),
            create_index_calls: AtomicUsize::new(0),
        }
    }

    /// Number of index creation requests received so far.
    pub fn create_index_calls(&self) -> usize {
        self.create_index_calls.load(Ordering::SeqCst)
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.collections.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexInfo>> {
        let collections = self.collections.read().await;
        Ok(match collections.get(collection) {
            Some(existing) => existing.indexes.clone(),
            None => Vec::new(),
        })
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        self.create_index_calls.fetch_add(1, Ordering::SeqCst);

        let conflict = |reason: String| OrmError::IndexConflict {
            collection: collection.to_string(),
            field: index.field.clone(),
            reason,
        };

        let mut collections = self.collections.write().await;
        let target = collections
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);
        let info = IndexInfo::from_spec(index);

        if let Some(existing) = target.indexes.iter().find(|it| it.name == info.name) {
            return if *existing == info {
                Ok(())
            } else {
                Err(conflict(format!(
                    "index '{}' already exists with different options",
                    info.name
                )))
            };
        }

        if index.direction == IndexDirection::Text {
            let other_text = target
                .indexes
                .iter()
                .find(|it| it.keys.iter().any(|(_, direction)| *direction == IndexDirection::Text));
            if let Some(other) = other_text {
                return Err(conflict(format!(
                    "collection already has text index '{}'",
                    other.name
                )));
            }
        }

        if index.unique {
            let mut seen = Vec::new();
            for document in target.documents.values() {
                if let Some(value) = document.get(&index.field) {
                    if seen.contains(&value) {
                        return Err(conflict(format!("duplicate value {} prevents unique index", value)));
                    }
                    seen.push(value);
                }
            }
        }

        debug!(collection, index = %info.name, "created index");
        target.indexes.push(info);
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: &IdValue) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|existing| existing.documents.get(id))
            .cloned())
    }

    async fn upsert(&self, collection: &str, id: &IdValue, document: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);

        for index in target.indexes.iter().filter(|it| it.unique) {
            for (field, _) in &index.keys {
                let Some(value) = document.get(field) else {
                    continue;
                };
                if let Some(holder) = target.holder_of(field, value, Some(id)) {
                    return Err(OrmError::Store(format!(
                        "duplicate key {} for unique index '{}' (held by {})",
                        value, index.name, holder
                    )));
                }
            }
        }

        target.documents.insert(id.clone(), document);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &IdValue) -> Result<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|existing| existing.documents.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|existing| existing.documents.len())
            .unwrap_or(0))
    }

    async fn start_session(&self) -> Result<StoreSession> {
        Ok(StoreSession::start())
    }
}

/// Connector that always hands out the same [`MemoryStore`].
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    last_settings: Mutex<Option<ConnectionSettings>>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            last_settings: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Settings of the most recent `connect` call.
    pub fn last_settings(&self) -> Result<Option<ConnectionSettings>> {
        Ok(self.last_settings.lock()?.clone())
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DocumentStore>> {
        if settings.database != self.store.database {
            return Err(OrmError::Config(format!(
                "Memory store holds database '{}', not '{}'",
                self.store.database, settings.database
            )));
        }
        *self.last_settings.lock()? = Some(settings.clone());
        let store: Arc<dyn DocumentStore> = self.store.clone();
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_crud() {
        let store = MemoryStore::new("game");
        let id = IdValue::I64(7);
        store.upsert("player", &id, doc(json!({"id": 7, "name": "ann"}))).await.unwrap();

        let found = store.find_by_id("player", &id).await.unwrap().unwrap();
        assert_eq!(found["name"], json!("ann"));
        assert_eq!(store.count("player").await.unwrap(), 1);

        assert!(store.delete("player", &id).await.unwrap());
        assert!(!store.delete("player", &id).await.unwrap());
        assert!(store.find_by_id("player", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_index_is_idempotent_for_same_options() {
        let store = MemoryStore::new("game");
        let spec = IndexSpec::ascending("name").unique(true);
        store.create_index("player", &spec).await.unwrap();
        store.create_index("player", &spec).await.unwrap();

        let indexes = store.list_indexes("player").await.unwrap();
        assert_eq!(indexes.len(), 2);
        assert!(indexes.iter().any(|it| it.covers("name")));
        assert_eq!(store.create_index_calls(), 2);
    }

    #[tokio::test]
    async fn test_conflicting_index_options() {
        let store = MemoryStore::new("game");
        store.create_index("player", &IndexSpec::ascending("name")).await.unwrap();
        let err = store
            .create_index("player", &IndexSpec::ascending("name").unique(true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexConflict);
    }

    #[tokio::test]
    async fn test_single_text_index() {
        let store = MemoryStore::new("game");
        store.create_text_index("post", "title").await.unwrap();
        let err = store.create_text_index("post", "body").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexConflict);
    }

    #[tokio::test]
    async fn test_unique_index_enforced_on_write() {
        let store = MemoryStore::new("game");
        store
            .create_index("player", &IndexSpec::ascending("name").unique(true))
            .await
            .unwrap();
        store
            .upsert("player", &IdValue::I64(1), doc(json!({"name": "ann"})))
            .await
            .unwrap();
        // Rewriting the same document is fine.
        store
            .upsert("player", &IdValue::I64(1), doc(json!({"name": "ann"})))
            .await
            .unwrap();
        let err = store
            .upsert("player", &IdValue::I64(2), doc(json!({"name": "ann"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[tokio::test]
    async fn test_connector_checks_database() {
        let connector = MemoryConnector::new(Arc::new(MemoryStore::new("game")));
        let settings = ConnectionSettings::from_host(&crate::config::HostConfig::new("other")).unwrap();
        assert!(connector.connect(&settings).await.is_err());

        let settings = ConnectionSettings::from_host(&crate::config::HostConfig::new("game")).unwrap();
        assert!(connector.connect(&settings).await.is_ok());
        assert_eq!(connector.last_settings().unwrap().unwrap().database, "game");
    }
}
