use super::{Document, DocumentStore, IndexInfo, IndexSpec, StoreSession};
use crate::core::{EntityId, IdValue, OrmError, Result};
use crate::entity::Entity;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, RwLock};

/// Maps entity types and raw names to store collections.
///
/// Created before the store is connected; every call made before
/// [`StoreGateway::attach`] fails with [`OrmError::StoreNotConnected`].
pub struct StoreGateway {
    store: OnceLock<Arc<dyn DocumentStore>>,
    /// Derived collection names, filled lazily from any thread.
    collection_names: RwLock<HashMap<TypeId, Arc<str>>>,
}

impl StoreGateway {
    pub fn new() -> Self {
        Self {
            store: OnceLock::new(),
            collection_names: RwLock::new(HashMap::new()),
        }
    }

    pub fn attach(&self, store: Arc<dyn DocumentStore>) -> Result<()> {
        self.store
            .set(store)
            .map_err(|_| OrmError::Config("Document store is already attached".to_string()))
    }

    pub fn is_connected(&self) -> bool {
        self.store.get().is_some()
    }

    pub fn store(&self) -> Result<&Arc<dyn DocumentStore>> {
        self.store.get().ok_or(OrmError::StoreNotConnected)
    }

    /// Collection name of `E`, derived once and memoized.
    pub fn collection_name<E: 'static>(&self) -> Result<Arc<str>> {
        let key = TypeId::of::<E>();
        if let Some(name) = self.collection_names.read()?.get(&key) {
            return Ok(name.clone());
        }

        let name: Arc<str> = collection_name_for(type_name::<E>()).into();
        let mut names = self.collection_names.write()?;
        Ok(names.entry(key).or_insert(name).clone())
    }

    pub fn collection<E: Entity>(&self) -> Result<EntityCollection<E>> {
        let name = self.collection_name::<E>()?;
        Ok(EntityCollection {
            inner: Collection {
                name,
                store: self.store()?.clone(),
            },
            _entity: PhantomData,
        })
    }

    pub fn collection_named(&self, name: &str) -> Result<Collection> {
        Ok(Collection {
            name: name.into(),
            store: self.store()?.clone(),
        })
    }

    pub async fn start_session(&self) -> Result<StoreSession> {
        self.store()?.start_session().await
    }
}

impl Default for StoreGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// `game::entity::PlayerEntity` becomes `player`, `Account` becomes `account`.
pub fn collection_name_for(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    let simple = without_generics.rsplit("::").next().unwrap_or(without_generics);

    let mut chars = simple.chars();
    let uncapitalized = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    match uncapitalized.strip_suffix("Entity") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => uncapitalized,
    }
}

/// Handle on one named collection.
#[derive(Clone)]
pub struct Collection {
    name: Arc<str>,
    store: Arc<dyn DocumentStore>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        self.store.list_indexes(&self.name).await
    }

    pub async fn create_index(&self, index: &IndexSpec) -> Result<()> {
        self.store.create_index(&self.name, index).await
    }

    pub async fn create_text_index(&self, field: &str) -> Result<()> {
        self.store.create_text_index(&self.name, field).await
    }

    pub async fn find_by_id(&self, id: &IdValue) -> Result<Option<Document>> {
        self.store.find_by_id(&self.name, id).await
    }

    pub async fn upsert(&self, id: &IdValue, document: Document) -> Result<()> {
        self.store.upsert(&self.name, id, document).await
    }

    pub async fn delete(&self, id: &IdValue) -> Result<bool> {
        self.store.delete(&self.name, id).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count(&self.name).await
    }
}

/// Typed view of the collection holding `E`.
pub struct EntityCollection<E> {
    inner: Collection,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityCollection<E> {
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn raw(&self) -> &Collection {
        &self.inner
    }

    pub async fn find(&self, id: &IdValue) -> Result<Option<E>> {
        match self.inner.find_by_id(id).await? {
            Some(document) => Ok(Some(serde_json::from_value(serde_json::Value::Object(document))?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, entity: &E) -> Result<()> {
        let id = entity.id().to_id_value();
        self.inner.upsert(&id, to_document(entity)?).await
    }

    pub async fn remove(&self, id: &IdValue) -> Result<bool> {
        self.inner.delete(id).await
    }
}

pub(crate) fn to_document<E: Entity>(entity: &E) -> Result<Document> {
    match serde_json::to_value(entity)? {
        serde_json::Value::Object(document) => Ok(document),
        other => Err(OrmError::Serialization(format!(
            "entity serialized to {} instead of a document",
            other
        ))),
    }
}
