use super::EntityRegistration;
use crate::core::{OrmError, Result};
use std::collections::HashSet;

/// Finds the registered entity types under a namespace.
///
/// By default the list filled by [`register_entity!`](crate::register_entity)
/// is scanned; an explicit list can be supplied instead.
pub struct EntityScanner {
    registrations: Option<Vec<&'static EntityRegistration>>,
}

impl EntityScanner {
    pub fn new() -> Self {
        Self { registrations: None }
    }

    pub fn with_registrations(registrations: Vec<&'static EntityRegistration>) -> Self {
        Self {
            registrations: Some(registrations),
        }
    }

    /// Every registration in `namespace` or below, each type exactly once.
    pub fn scan(&self, namespace: &str) -> Result<Vec<&'static EntityRegistration>> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return Err(OrmError::Config("Entity namespace cannot be empty".to_string()));
        }

        let candidates: Box<dyn Iterator<Item = &'static EntityRegistration>> = match &self.registrations {
            Some(list) => Box::new(list.iter().copied()),
            None => Box::new(inventory::iter::<EntityRegistration>.into_iter()),
        };

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for registration in candidates.filter(|it| it.is_within(namespace)) {
            if !seen.insert(registration.type_id()) {
                return Err(OrmError::DuplicateEntity(registration.type_name().to_string()));
            }
            found.push(registration);
        }
        Ok(found)
    }
}

impl Default for EntityScanner {
    fn default() -> Self {
        Self::new()
    }
}
