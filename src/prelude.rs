//! Everything an application needs to declare entities and bind their caches.
//!
//! ```ignore
//! use docorm::prelude::*;
//! ```

pub use crate::cache::EntityCaches;
pub use crate::config::{CacheStrategy, HostConfig, OrmConfig, PersisterKind, PersisterStrategy};
pub use crate::core::{OrmError, Result};
pub use crate::entity::{Entity, EntityScanner, Record};
pub use crate::manager::{CacheBinder, CacheConsumer, OrmBootstrap, OrmManager};
pub use crate::register_entity;
pub use crate::store::{MemoryConnector, MemoryStore, StoreConnector};
pub use docorm_derive::Record;
