use crate::cache::{AnyEntityCaches, EntityCaches, downcast};
use crate::core::{OrmError, Result};
use crate::entity::Entity;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An application object that needs entity caches.
///
/// # Examples
///
/// ```ignore
/// struct PlayerService {
///     players: Option<Arc<EntityCaches<PlayerEntity>>>,
/// }
///
/// impl CacheConsumer for PlayerService {
///     fn bind_caches(&mut self, binder: &mut CacheBinder<'_>) -> Result<()> {
///         self.players = Some(binder.bind::<PlayerEntity>()?);
///         Ok(())
///     }
/// }
/// ```
pub trait CacheConsumer {
    fn bind_caches(&mut self, binder: &mut CacheBinder<'_>) -> Result<()>;
}

/// Hands out entity caches during bootstrap and activates every cache it hands out.
pub struct CacheBinder<'a> {
    namespace: &'a str,
    caches: &'a HashMap<TypeId, Arc<dyn AnyEntityCaches>>,
    usable: &'a mut HashMap<TypeId, bool>,
}

impl<'a> CacheBinder<'a> {
    pub(crate) fn new(
        namespace: &'a str,
        caches: &'a HashMap<TypeId, Arc<dyn AnyEntityCaches>>,
        usable: &'a mut HashMap<TypeId, bool>,
    ) -> Self {
        Self {
            namespace,
            caches,
            usable,
        }
    }

    pub fn bind<E: Entity>(&mut self) -> Result<Arc<EntityCaches<E>>> {
        let key = TypeId::of::<E>();
        let caches = self
            .caches
            .get(&key)
            .cloned()
            .ok_or_else(|| OrmError::UnknownBindingTarget {
                entity: type_name::<E>().to_string(),
                namespace: self.namespace.to_string(),
            })?;
        let typed = downcast::<E>(caches).ok_or_else(|| {
            OrmError::Discovery(format!("cache registered for '{}' has another type", type_name::<E>()))
        })?;

        self.usable.insert(key, true);
        debug!(entity = %typed.entity_def().name(), "bound entity cache");
        Ok(typed)
    }
}
