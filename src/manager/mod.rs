//! Registry lifecycle.
//!
//! [`OrmManager::bootstrap`] scans, validates and defines every entity,
//! creates their caches in an inert state, connects the store and reconciles
//! indexes. Consumers are then bound one by one with [`OrmBootstrap::bind`];
//! [`OrmBootstrap::finish`] drops every cache nobody bound and freezes the
//! registry into an [`OrmManager`].

pub mod binder;
pub mod index;

use crate::cache::{AnyEntityCaches, EntityCaches, downcast};
use crate::config::{ConnectionSettings, OrmConfig};
use crate::core::{OrmError, Result};
use crate::entity::{Entity, EntityDef, EntityDefBuilder, EntityScanner};
use crate::store::{Collection, EntityCollection, StoreConnector, StoreGateway, StoreSession};
use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

pub use binder::{CacheBinder, CacheConsumer};
pub use index::reconcile_indexes;

/// Registry between bootstrap and binding: every cache exists but none is
/// usable until a consumer binds it.
pub struct OrmBootstrap {
    config: OrmConfig,
    gateway: Arc<StoreGateway>,
    caches: HashMap<TypeId, Arc<dyn AnyEntityCaches>>,
    usable: HashMap<TypeId, bool>,
}

impl OrmBootstrap {
    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<StoreGateway> {
        &self.gateway
    }

    /// Definitions of every scanned entity, bound or not.
    pub fn entity_defs(&self) -> impl Iterator<Item = &EntityDef> + '_ {
        self.caches.values().map(|caches| caches.entity_def())
    }

    pub fn bind<C: CacheConsumer + ?Sized>(&mut self, consumer: &mut C) -> Result<()> {
        let mut binder = CacheBinder::new(&self.config.entity_package, &self.caches, &mut self.usable);
        consumer.bind_caches(&mut binder)
    }

    /// Cache of `E`, available only once a consumer has bound it.
    pub fn entity_caches<E: Entity>(&self) -> Result<Arc<EntityCaches<E>>> {
        let key = TypeId::of::<E>();
        match self.usable.get(&key) {
            None => Err(OrmError::NotRegistered(type_name::<E>().to_string())),
            Some(false) => Err(OrmError::NotActivated(type_name::<E>().to_string())),
            Some(true) => typed_caches::<E>(&self.caches),
        }
    }

    /// Drops unbound caches and freezes the registry.
    pub fn finish(self) -> OrmManager {
        let mut caches = self.caches;
        let mut inert = HashSet::new();
        for (key, usable) in self.usable {
            if usable {
                continue;
            }
            if let Some(dropped) = caches.remove(&key) {
                warn!(entity = %dropped.entity_def().name(), "no consumer bound, dropping entity cache");
            }
            inert.insert(key);
        }

        info!(active = caches.len(), dropped = inert.len(), "entity registry ready");
        OrmManager {
            config: self.config,
            gateway: self.gateway,
            caches,
            inert,
        }
    }
}

/// Frozen registry of entity caches.
///
/// Immutable after [`OrmBootstrap::finish`], so lookups from any number of
/// tasks need no locking.
pub struct OrmManager {
    config: OrmConfig,
    gateway: Arc<StoreGateway>,
    caches: HashMap<TypeId, Arc<dyn AnyEntityCaches>>,
    /// Scanned entities whose caches were dropped for lack of a consumer.
    inert: HashSet<TypeId>,
}

impl OrmManager {
    /// Scan, define, connect and reconcile indexes.
    pub async fn bootstrap(
        config: OrmConfig,
        scanner: &EntityScanner,
        connector: &dyn StoreConnector,
    ) -> Result<OrmBootstrap> {
        config.validate()?;

        let registrations = scanner.scan(&config.entity_package)?;
        info!(package = %config.entity_package, count = registrations.len(), "scanned entities");

        let gateway = Arc::new(StoreGateway::new());
        let builder = EntityDefBuilder::new(&config);
        let mut caches = HashMap::new();
        let mut usable = HashMap::new();
        for registration in registrations {
            registration.analyze()?;
            let def = Arc::new(registration.define(&builder)?);
            let type_id = registration.type_id();
            caches.insert(type_id, registration.new_caches(def, gateway.clone()));
            usable.insert(type_id, false);
        }

        let settings = ConnectionSettings::from_host(&config.host)?;
        let store = connector.connect(&settings).await?;
        gateway.attach(store)?;
        info!(url = %settings.to_url(), pool = settings.max_pool_size, "connected to document store");

        for caches in caches.values() {
            let collection = caches.collection()?;
            let created = reconcile_indexes(&collection, caches.entity_def()).await?;
            if !created.is_empty() {
                info!(collection = %collection.name(), count = created.len(), "indexes reconciled");
            }
        }

        Ok(OrmBootstrap {
            config,
            gateway,
            caches,
            usable,
        })
    }

    /// Full initialization: bootstrap, bind every consumer, finish.
    pub async fn init(
        config: OrmConfig,
        scanner: &EntityScanner,
        connector: &dyn StoreConnector,
        consumers: &mut [&mut dyn CacheConsumer],
    ) -> Result<OrmManager> {
        let mut bootstrap = Self::bootstrap(config, scanner, connector).await?;
        for consumer in consumers.iter_mut() {
            bootstrap.bind(&mut **consumer)?;
        }
        Ok(bootstrap.finish())
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn entity_caches<E: Entity>(&self) -> Result<Arc<EntityCaches<E>>> {
        let key = TypeId::of::<E>();
        if self.caches.contains_key(&key) {
            typed_caches::<E>(&self.caches)
        } else if self.inert.contains(&key) {
            Err(OrmError::NotActivated(type_name::<E>().to_string()))
        } else {
            Err(OrmError::NotRegistered(type_name::<E>().to_string()))
        }
    }

    /// Every usable cache.
    pub fn all_entity_caches(&self) -> impl Iterator<Item = &Arc<dyn AnyEntityCaches>> + '_ {
        self.caches.values()
    }

    pub fn entity_defs(&self) -> impl Iterator<Item = &EntityDef> + '_ {
        self.caches.values().map(|caches| caches.entity_def())
    }

    pub fn collection<E: Entity>(&self) -> Result<EntityCollection<E>> {
        self.gateway.collection::<E>()
    }

    pub fn collection_named(&self, name: &str) -> Result<Collection> {
        self.gateway.collection_named(name)
    }

    pub async fn session(&self) -> Result<StoreSession> {
        self.gateway.start_session().await
    }

    /// Flushes the dirty entities of every cache.
    pub async fn persist_all(&self) -> Result<usize> {
        let flushed = futures::future::try_join_all(self.caches.values().map(|caches| caches.persist_all())).await?;
        Ok(flushed.into_iter().sum())
    }
}

fn typed_caches<E: Entity>(caches: &HashMap<TypeId, Arc<dyn AnyEntityCaches>>) -> Result<Arc<EntityCaches<E>>> {
    caches
        .get(&TypeId::of::<E>())
        .cloned()
        .and_then(downcast::<E>)
        .ok_or_else(|| OrmError::NotRegistered(type_name::<E>().to_string()))
}
