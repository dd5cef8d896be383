//! Per-entity caches.

use crate::config::PersisterKind;
use crate::core::{EntityId, IdValue, Result};
use crate::entity::{Entity, EntityDef};
use crate::store::{Collection, StoreGateway};
use async_trait::async_trait;
use lru::LruCache;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
struct CachedEntity<E> {
    entity: E,
    /// Time of the last put; also tells a snapshot apart from a newer write.
    loaded_at: Instant,
}

/// Cache handle of one entity type.
///
/// Holds up to `cache_size` entities keyed by identity (LRU eviction,
/// optional expiry) and reads through / writes back via the store gateway.
/// Reads share the lock; inserts, updates and evictions take it exclusively.
///
/// A dirty entity stays dirty until a save of that exact version succeeds.
/// Locks are taken in the order cache, dirty, evicted.
pub struct EntityCaches<E: Entity> {
    def: Arc<EntityDef>,
    gateway: Arc<StoreGateway>,
    cache: RwLock<LruCache<IdValue, CachedEntity<E>>>,
    /// Ids updated in cache but not yet written to the store.
    dirty: Mutex<HashSet<IdValue>>,
    /// Dirty entries pushed out of the cache whose write-back has not succeeded.
    evicted: Mutex<HashMap<IdValue, CachedEntity<E>>>,
}

impl<E: Entity> EntityCaches<E> {
    pub fn new(def: Arc<EntityDef>, gateway: Arc<StoreGateway>) -> Self {
        let cache = match NonZeroUsize::new(def.cache_size()) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            def,
            gateway,
            cache: RwLock::new(cache),
            dirty: Mutex::new(HashSet::new()),
            evicted: Mutex::new(HashMap::new()),
        }
    }

    pub fn entity_def(&self) -> &Arc<EntityDef> {
        &self.def
    }

    /// Cached entity, or the stored one if absent or expired.
    pub async fn load(&self, id: &E::Id) -> Result<Option<E>> {
        let key = id.to_id_value();
        if let Some(entity) = self.cached(&key)? {
            return Ok(Some(entity));
        }

        // An unsaved evicted copy is newer than the store's.
        let unsaved = self.evicted.lock()?.get(&key).map(|cached| cached.entity.clone());
        if let Some(entity) = unsaved {
            self.put(key, entity.clone(), true).await?;
            return Ok(Some(entity));
        }

        let loaded = self.gateway.collection::<E>()?.find(&key).await?;
        if let Some(entity) = &loaded {
            self.put(key, entity.clone(), false).await?;
        }
        Ok(loaded)
    }

    /// Cached copy only; never touches the store.
    pub fn get_cached(&self, id: &E::Id) -> Result<Option<E>> {
        let key = id.to_id_value();
        if let Some(entity) = self.cached(&key)? {
            return Ok(Some(entity));
        }
        Ok(self.evicted.lock()?.get(&key).map(|cached| cached.entity.clone()))
    }

    /// Writes a new entity to the store and caches it.
    pub async fn insert(&self, entity: E) -> Result<()> {
        let key = entity.id().to_id_value();
        self.gateway.collection::<E>()?.save(&entity).await?;
        self.put(key, entity, false).await
    }

    /// Replaces the cached entity; the store sees the change now or at the
    /// next flush depending on the persister strategy.
    pub async fn update(&self, entity: E) -> Result<()> {
        let key = entity.id().to_id_value();
        match self.def.persister().kind {
            PersisterKind::WriteThrough => {
                self.gateway.collection::<E>()?.save(&entity).await?;
                self.put(key, entity, false).await
            }
            PersisterKind::Deferred => self.put(key, entity, true).await,
        }
    }

    /// Drops the cached copy without writing it back.
    pub fn invalidate(&self, id: &E::Id) -> Result<bool> {
        let key = id.to_id_value();
        let mut cache = self.cache.write()?;
        let mut dirty = self.dirty.lock()?;
        let mut evicted = self.evicted.lock()?;
        dirty.remove(&key);
        let unsaved = evicted.remove(&key).is_some();
        Ok(cache.pop(&key).is_some() || unsaved)
    }

    /// Removes the entity from cache and store.
    pub async fn delete(&self, id: &E::Id) -> Result<bool> {
        self.invalidate(id)?;
        self.gateway.collection::<E>()?.remove(&id.to_id_value()).await
    }

    /// Writes one dirty entity back. Returns `false` if it was clean.
    ///
    /// On a failed save the entity stays dirty.
    pub async fn persist(&self, id: &E::Id) -> Result<bool> {
        let key = id.to_id_value();
        let pending = {
            let cache = self.cache.read()?;
            let dirty = self.dirty.lock()?;
            match cache.peek(&key) {
                Some(cached) if dirty.contains(&key) => Some(cached.clone()),
                _ => None,
            }
        };
        let pending = match pending {
            Some(pending) => Some(pending),
            None => self.evicted.lock()?.get(&key).cloned(),
        };
        let Some(pending) = pending else {
            return Ok(false);
        };

        self.gateway.collection::<E>()?.save(&pending.entity).await?;
        self.mark_saved(&key, pending.loaded_at)?;
        Ok(true)
    }

    /// Writes every dirty entity back, stopping at the first failed save.
    ///
    /// Entities already saved are clean; the failed one and the rest stay
    /// dirty for the next flush.
    pub async fn persist_all(&self) -> Result<usize> {
        let pending = self.pending()?;
        let collection = self.gateway.collection::<E>()?;
        let mut flushed = 0;
        for (key, cached) in &pending {
            if let Err(err) = collection.save(&cached.entity).await {
                warn!(entity = %self.def.name(), id = %key, error = %err, "write-back failed, entity stays dirty");
                return Err(err);
            }
            self.mark_saved(key, cached.loaded_at)?;
            flushed += 1;
        }
        if flushed > 0 {
            debug!(entity = %self.def.name(), count = flushed, "flushed dirty entities");
        }
        Ok(flushed)
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.cache.read()?.len())
    }

    /// Entities whose latest version has not reached the store.
    pub fn dirty_count(&self) -> Result<usize> {
        let dirty = self.dirty.lock()?.len();
        let evicted = self.evicted.lock()?.len();
        Ok(dirty + evicted)
    }

    fn cached(&self, key: &IdValue) -> Result<Option<E>> {
        let cache = self.cache.read()?;
        let Some(cached) = cache.peek(key) else {
            return Ok(None);
        };
        // Dirty entries outlive their expiry until written back.
        match self.def.expiry() {
            Some(expiry) if cached.loaded_at.elapsed() >= expiry && !self.dirty.lock()?.contains(key) => {
                Ok(None)
            }
            _ => Ok(Some(cached.entity.clone())),
        }
    }

    /// Snapshot of every dirty entity, cached or evicted.
    fn pending(&self) -> Result<Vec<(IdValue, CachedEntity<E>)>> {
        let mut pending = {
            let cache = self.cache.read()?;
            let dirty = self.dirty.lock()?;
            dirty
                .iter()
                .filter_map(|key| cache.peek(key).map(|cached| (key.clone(), cached.clone())))
                .collect::<Vec<_>>()
        };
        let evicted = self.evicted.lock()?;
        pending.extend(evicted.iter().map(|(key, cached)| (key.clone(), cached.clone())));
        Ok(pending)
    }

    /// Clears the dirty state of `key` if the saved version is still the latest.
    fn mark_saved(&self, key: &IdValue, loaded_at: Instant) -> Result<()> {
        let cache = self.cache.read()?;
        let mut dirty = self.dirty.lock()?;
        let mut evicted = self.evicted.lock()?;
        if cache.peek(key).is_some_and(|cached| cached.loaded_at == loaded_at) {
            dirty.remove(key);
        }
        if evicted.get(key).is_some_and(|cached| cached.loaded_at == loaded_at) {
            evicted.remove(key);
        }
        Ok(())
    }

    /// Caches `entity`, writing back a dirty entry if one gets evicted.
    ///
    /// A failed write-back keeps the evicted entry dirty (readable through
    /// `load` and retried by the next flush) and returns the error.
    async fn put(&self, key: IdValue, entity: E, mark_dirty: bool) -> Result<()> {
        let write_back = {
            let mut cache = self.cache.write()?;
            let cached = CachedEntity {
                entity,
                loaded_at: Instant::now(),
            };
            let pushed_out = match cache.push(key.clone(), cached) {
                Some((evicted_key, evicted)) if evicted_key != key => Some((evicted_key, evicted)),
                _ => None,
            };

            let mut dirty = self.dirty.lock()?;
            let mut evicted = self.evicted.lock()?;
            evicted.remove(&key);
            if mark_dirty {
                dirty.insert(key.clone());
            } else {
                dirty.remove(&key);
            }
            match pushed_out {
                Some((evicted_key, old)) if dirty.remove(&evicted_key) => {
                    evicted.insert(evicted_key.clone(), old.clone());
                    Some((evicted_key, old))
                }
                _ => None,
            }
        };

        if let Some((evicted_key, old)) = write_back {
            debug!(entity = %self.def.name(), id = %evicted_key, "writing back evicted entity");
            self.gateway.collection::<E>()?.save(&old.entity).await?;
            self.mark_saved(&evicted_key, old.loaded_at)?;
        }
        Ok(())
    }
}

impl<E: Entity> fmt::Debug for EntityCaches<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCaches")
            .field("entity", &self.def.name())
            .field("cache_size", &self.def.cache_size())
            .finish()
    }
}

/// Object-safe view of an [`EntityCaches`] of any entity type.
#[async_trait]
pub trait AnyEntityCaches: Send + Sync {
    fn entity_def(&self) -> &EntityDef;

    fn size(&self) -> Result<usize>;

    /// Collection the entity is stored in.
    fn collection(&self) -> Result<Collection>;

    async fn persist_all(&self) -> Result<usize>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl<E: Entity> AnyEntityCaches for EntityCaches<E> {
    fn entity_def(&self) -> &EntityDef {
        &self.def
    }

    fn size(&self) -> Result<usize> {
        EntityCaches::size(self)
    }

    fn collection(&self) -> Result<Collection> {
        Ok(self.gateway.collection::<E>()?.raw().clone())
    }

    async fn persist_all(&self) -> Result<usize> {
        EntityCaches::persist_all(self).await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Recovers the typed handle from a type-erased one.
pub fn downcast<E: Entity>(caches: Arc<dyn AnyEntityCaches>) -> Option<Arc<EntityCaches<E>>> {
    caches.into_any().downcast::<EntityCaches<E>>().ok()
}
