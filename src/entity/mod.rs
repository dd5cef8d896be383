//! Entity declarations: the [`Record`] and [`Entity`] traits, registration,
//! validation and definition building.

pub mod definition;
pub mod scanner;
pub mod validator;

use crate::cache::{AnyEntityCaches, EntityCaches};
use crate::config::DEFAULT_STRATEGY;
use crate::core::{EntityId, RecordSchema, Result};
use crate::store::StoreGateway;
use serde::{Serialize, de::DeserializeOwned};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

pub use definition::{EntityDef, EntityDefBuilder, IdFieldDef, IndexDef, IndexTextDef};
pub use scanner::EntityScanner;
pub use validator::TypeValidator;

/// A plain data record that can be stored as a document.
///
/// The `Default` bound is the no-argument constructor; `Serialize` and
/// `DeserializeOwned` are the accessor/mutator pair of every field. Usually
/// derived with `#[derive(Record)]`.
pub trait Record: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    fn record_schema() -> RecordSchema;
}

/// A record stored in its own collection and cached by identity.
pub trait Entity: Record + Clone {
    type Id: EntityId;

    /// Name of the cache strategy in [`OrmConfig::caches`](crate::config::OrmConfig).
    const CACHE_STRATEGY: &'static str = DEFAULT_STRATEGY;

    /// Name of the persister strategy in [`OrmConfig::persisters`](crate::config::OrmConfig).
    const PERSISTER: &'static str = DEFAULT_STRATEGY;

    /// Must return the value of the identity field.
    fn id(&self) -> Self::Id;

    /// Optimistic-concurrency version. Override together with [`Entity::set_version`].
    fn version(&self) -> Option<i64> {
        None
    }

    /// Returns `false` when the entity has no version field.
    fn set_version(&mut self, _version: i64) -> bool {
        false
    }
}

/// Type-erased entry of the entity list, produced by [`register_entity!`](crate::register_entity).
pub struct EntityRegistration {
    namespace: &'static str,
    type_name: &'static str,
    type_id: fn() -> TypeId,
    analyze: fn() -> Result<()>,
    define: fn(&EntityDefBuilder<'_>) -> Result<EntityDef>,
    new_caches: fn(Arc<EntityDef>, Arc<StoreGateway>) -> Arc<dyn AnyEntityCaches>,
}

impl EntityRegistration {
    pub const fn new<E: Entity>(namespace: &'static str, type_name: &'static str) -> Self {
        Self {
            namespace,
            type_name,
            type_id: TypeId::of::<E>,
            analyze: validator::analyze::<E>,
            define: definition::define::<E>,
            new_caches: new_entity_caches::<E>,
        }
    }

    /// Module path the entity was registered from.
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Whether the entity lives in `namespace` or one of its submodules.
    pub fn is_within(&self, namespace: &str) -> bool {
        match self.namespace.strip_prefix(namespace) {
            Some(rest) => rest.is_empty() || rest.starts_with("::"),
            None => false,
        }
    }

    /// Structural and identity checks.
    pub fn analyze(&self) -> Result<()> {
        (self.analyze)()
    }

    pub fn define(&self, builder: &EntityDefBuilder<'_>) -> Result<EntityDef> {
        (self.define)(builder)
    }

    pub(crate) fn new_caches(
        &self,
        def: Arc<EntityDef>,
        gateway: Arc<StoreGateway>,
    ) -> Arc<dyn AnyEntityCaches> {
        (self.new_caches)(def, gateway)
    }
}

impl fmt::Debug for EntityRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistration")
            .field("namespace", &self.namespace)
            .field("type_name", &self.type_name)
            .finish()
    }
}

inventory::collect!(EntityRegistration);

fn new_entity_caches<E: Entity>(
    def: Arc<EntityDef>,
    gateway: Arc<StoreGateway>,
) -> Arc<dyn AnyEntityCaches> {
    Arc::new(EntityCaches::<E>::new(def, gateway))
}

/// Adds an entity type to the list scanned by [`EntityScanner`].
///
/// ```ignore
/// docorm::register_entity!(PlayerEntity);
/// ```
#[macro_export]
macro_rules! register_entity {
    ($entity:ty) => {
        $crate::inventory::submit! {
            $crate::entity::EntityRegistration::new::<$entity>(module_path!(), stringify!($entity))
        }
    };
}
