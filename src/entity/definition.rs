use super::Entity;
use super::validator::identity_field;
use crate::config::{OrmConfig, PersisterStrategy};
use crate::core::{BaseKind, IndexViolation, OrmError, RecordSchema, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFieldDef {
    pub name: String,
    pub kind: BaseKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub field: String,
    pub ascending: bool,
    pub unique: bool,
    /// 0 means documents never expire
    pub ttl_expire_after_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTextDef {
    pub field: String,
}

/// Resolved, immutable metadata of one entity type.
#[derive(Debug, Clone)]
pub struct EntityDef {
    type_id: TypeId,
    name: String,
    id_field: IdFieldDef,
    cache_size: usize,
    expire_millis: u64,
    persister: PersisterStrategy,
    index_defs: HashMap<String, IndexDef>,
    index_text_defs: HashMap<String, IndexTextDef>,
}

impl EntityDef {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_field(&self) -> &IdFieldDef {
        &self.id_field
    }

    /// 0 means unbounded
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn expire_millis(&self) -> u64 {
        self.expire_millis
    }

    /// `None` when cached entries never expire.
    pub fn expiry(&self) -> Option<Duration> {
        (self.expire_millis > 0).then(|| Duration::from_millis(self.expire_millis))
    }

    pub fn persister(&self) -> &PersisterStrategy {
        &self.persister
    }

    pub fn index_defs(&self) -> &HashMap<String, IndexDef> {
        &self.index_defs
    }

    pub fn index_text_defs(&self) -> &HashMap<String, IndexTextDef> {
        &self.index_text_defs
    }
}

/// Turns a validated entity schema into an [`EntityDef`] against the
/// strategy tables of the configuration.
pub struct EntityDefBuilder<'a> {
    config: &'a OrmConfig,
}

impl<'a> EntityDefBuilder<'a> {
    pub fn new(config: &'a OrmConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        type_id: TypeId,
        schema: &RecordSchema,
        cache_strategy: &str,
        persister_strategy: &str,
    ) -> Result<EntityDef> {
        let (id_field, id_kind) = identity_field(schema)?;

        let cache = self.config.cache_strategy(cache_strategy).ok_or_else(|| {
            OrmError::UnknownCacheStrategy {
                entity: schema.name.clone(),
                strategy: cache_strategy.to_string(),
            }
        })?;

        let persister = self
            .config
            .persister_strategy(persister_strategy)
            .ok_or_else(|| OrmError::UnknownPersisterStrategy {
                entity: schema.name.clone(),
                strategy: persister_strategy.to_string(),
            })?;

        let mut index_defs = HashMap::new();
        for field in schema.persistent_fields() {
            let Some(index) = field.index else {
                continue;
            };
            if index.ttl_expire_after_seconds > 0 && !field.shape.is_date_like() {
                return Err(OrmError::IndexDefinition {
                    entity: schema.name.clone(),
                    field: field.name.clone(),
                    violation: IndexViolation::TtlOnNonDate,
                });
            }
            index_defs.insert(
                field.name.clone(),
                IndexDef {
                    field: field.name.clone(),
                    ascending: index.ascending,
                    unique: index.unique,
                    ttl_expire_after_seconds: index.ttl_expire_after_seconds,
                },
            );
        }

        let text_fields = schema
            .persistent_fields()
            .filter(|field| field.index_text)
            .map(|field| field.name.clone())
            .collect::<Vec<_>>();
        if text_fields.len() > 1 {
            return Err(OrmError::IndexDefinition {
                entity: schema.name.clone(),
                field: text_fields[1].clone(),
                violation: IndexViolation::MultipleTextIndexes(text_fields),
            });
        }
        let index_text_defs = text_fields
            .into_iter()
            .map(|field| (field.clone(), IndexTextDef { field }))
            .collect();

        Ok(EntityDef {
            type_id,
            name: schema.name.clone(),
            id_field: IdFieldDef {
                name: id_field.name.clone(),
                kind: id_kind,
            },
            cache_size: cache.size,
            expire_millis: cache.expire_millis,
            persister: persister.clone(),
            index_defs,
            index_text_defs,
        })
    }
}

pub(crate) fn define<E: Entity>(builder: &EntityDefBuilder<'_>) -> Result<EntityDef> {
    builder.build(
        TypeId::of::<E>(),
        &E::record_schema(),
        E::CACHE_STRATEGY,
        E::PERSISTER,
    )
}
