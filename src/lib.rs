// ============================================================================
// docorm: entity registry over a document store
// ============================================================================
//
// Entities are plain records registered with `register_entity!`. At startup
// the registry validates each one, builds its definition from the configured
// cache and persister strategies, reconciles its indexes and hands out typed
// caches to the application objects that bind them.

extern crate self as docorm;

pub mod cache;
pub mod config;
pub mod core;
pub mod entity;
pub mod manager;
pub mod prelude;
pub mod store;

pub use inventory;

pub use docorm_derive::Record;

pub use cache::{AnyEntityCaches, EntityCaches};
pub use config::{CacheStrategy, HostConfig, OrmConfig, PersisterKind, PersisterStrategy};
pub use crate::core::{ErrorKind, IdValue, OrmError, Result};
pub use entity::{Entity, EntityDef, EntityRegistration, EntityScanner, Record};
pub use manager::{CacheBinder, CacheConsumer, OrmBootstrap, OrmManager};
pub use store::{DocumentStore, MemoryConnector, MemoryStore, StoreConnector, StoreGateway};
