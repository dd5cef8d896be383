use super::Entity;
use crate::core::{
    BaseKind, EntityId, FieldSchema, IdValue, IdentityViolation, OrmError, RecordSchema, Result,
    Shape, StructuralViolation, Visibility, random_i64,
};
use tracing::debug;

/// Depth-first structural check of a record and every record it reaches.
///
/// Rules, per persistent field:
/// - base types and dates end the walk, `Option` is transparent
/// - arrays, `Vec` and `HashSet` recurse into their element
/// - `HashMap` needs a text key and recurses into its value
/// - anything else is a nested record, checked from the top
///
/// Records must be non-generic, default-constructible and have every field
/// readable and writable. Specialized containers, arrays inside containers
/// and records that reach themselves are rejected.
pub struct TypeValidator {
    /// Type paths and names of the records currently being walked, outermost first.
    path: Vec<(String, String)>,
}

impl TypeValidator {
    pub fn validate(schema: &RecordSchema) -> Result<()> {
        let mut validator = Self { path: Vec::new() };
        validator.check_record(schema)
    }

    fn check_record(&mut self, schema: &RecordSchema) -> Result<()> {
        if self.path.iter().any(|(type_path, _)| *type_path == schema.type_path) {
            let root = self
                .path
                .first()
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| schema.name.clone());
            return Err(OrmError::structural(
                root,
                None,
                StructuralViolation::RecursiveRecord(schema.name.clone()),
            ));
        }

        if !schema.type_params.is_empty() {
            return Err(OrmError::structural(
                &schema.name,
                None,
                StructuralViolation::GenericParameters(schema.type_params.clone()),
            ));
        }

        if !schema.constructible {
            return Err(OrmError::structural(
                &schema.name,
                None,
                StructuralViolation::MissingDefaultConstructor,
            ));
        }

        self.path.push((schema.type_path.clone(), schema.name.clone()));
        for field in schema.persistent_fields() {
            if !(field.readable && field.writable) {
                return Err(OrmError::structural(
                    &schema.name,
                    Some(&field.name),
                    StructuralViolation::MissingAccessor {
                        readable: field.readable,
                        writable: field.writable,
                    },
                ));
            }
            self.check_field(schema, field, &field.shape)?;
        }
        self.path.pop();
        Ok(())
    }

    fn check_field(&mut self, record: &RecordSchema, field: &FieldSchema, shape: &Shape) -> Result<()> {
        match shape {
            Shape::Base(_) | Shape::Date => Ok(()),
            Shape::Optional(inner) => self.check_field(record, field, inner),
            Shape::Array(element) | Shape::List(element) | Shape::Set(element) => {
                self.check_element(record, field, element)
            }
            Shape::Map(key, value) => {
                check_map_key(record, field, key)?;
                self.check_element(record, field, value)
            }
            Shape::Specialized { name, kind, .. } => Err(specialized(record, field, name, kind)),
            Shape::Record(nested) => self.check_record(&nested()),
        }
    }

    /// Element of an array or container; containers nest one level at a time.
    fn check_element(&mut self, record: &RecordSchema, field: &FieldSchema, shape: &Shape) -> Result<()> {
        match shape {
            Shape::Base(_) | Shape::Date => Ok(()),
            Shape::Optional(inner) => self.check_element(record, field, inner),
            Shape::List(element) | Shape::Set(element) => self.check_element(record, field, element),
            Shape::Map(key, value) => {
                check_map_key(record, field, key)?;
                self.check_element(record, field, value)
            }
            Shape::Array(_) => Err(OrmError::structural(
                &record.name,
                Some(&field.name),
                StructuralViolation::ArrayInContainer,
            )),
            Shape::Specialized { name, kind, .. } => Err(specialized(record, field, name, kind)),
            Shape::Record(nested) => self.check_record(&nested()),
        }
    }
}

fn check_map_key(record: &RecordSchema, field: &FieldSchema, key: &Shape) -> Result<()> {
    if matches!(key, Shape::Base(BaseKind::Text)) {
        Ok(())
    } else {
        Err(OrmError::structural(
            &record.name,
            Some(&field.name),
            StructuralViolation::NonTextMapKey,
        ))
    }
}

fn specialized(
    record: &RecordSchema,
    field: &FieldSchema,
    name: &str,
    kind: &crate::core::ContainerKind,
) -> OrmError {
    OrmError::structural(
        &record.name,
        Some(&field.name),
        StructuralViolation::ContainerSpecialization {
            container: name.to_string(),
            expected: kind.to_string(),
        },
    )
}

/// The single identity field of an entity schema, with its kind.
pub fn identity_field(schema: &RecordSchema) -> Result<(&FieldSchema, BaseKind)> {
    let identities = schema.fields.iter().filter(|field| field.identity).collect::<Vec<_>>();
    let field = match identities.as_slice() {
        [] => return Err(OrmError::identity(&schema.name, IdentityViolation::Missing)),
        [field] => *field,
        many => {
            return Err(OrmError::identity(
                &schema.name,
                IdentityViolation::Multiple(many.len()),
            ));
        }
    };

    if field.visibility != Visibility::Private {
        return Err(OrmError::identity(
            &schema.name,
            IdentityViolation::PublicField(field.name.clone()),
        ));
    }

    match &field.shape {
        Shape::Base(kind) if kind.is_identity_kind() => Ok((field, *kind)),
        other => Err(OrmError::identity(
            &schema.name,
            IdentityViolation::UnsupportedKind {
                field: field.name.clone(),
                shape: other.to_string(),
            },
        )),
    }
}

/// Writes a random value straight into the identity field of a fresh
/// instance and checks that [`Entity::id`] reads it back.
pub fn probe_identity<E: Entity>(schema: &RecordSchema) -> Result<()> {
    let (field, kind) = identity_field(schema)?;
    if kind != E::Id::KIND {
        return Err(OrmError::identity(
            &schema.name,
            IdentityViolation::KindMismatch {
                declared: kind.to_string(),
                accessor: E::Id::KIND.to_string(),
            },
        ));
    }

    let probe_failed = |reason: String| OrmError::identity(&schema.name, IdentityViolation::ProbeFailed(reason));

    let written = IdValue::random(kind)
        .ok_or_else(|| probe_failed(format!("cannot generate a {} identity", kind)))?;

    let mut document = serde_json::to_value(E::default()).map_err(|err| probe_failed(err.to_string()))?;
    let object = document
        .as_object_mut()
        .ok_or_else(|| probe_failed("entity does not serialize to a document".to_string()))?;
    object.insert(field.name.clone(), written.to_json());

    let instance: E = serde_json::from_value(document).map_err(|err| probe_failed(err.to_string()))?;
    let returned = instance.id().to_id_value();
    if returned != written {
        return Err(OrmError::identity(
            &schema.name,
            IdentityViolation::AccessorMismatch {
                written: written.to_string(),
                returned: returned.to_string(),
            },
        ));
    }
    Ok(())
}

/// Version accessors come in pairs and must round-trip.
pub fn probe_version<E: Entity>(schema: &RecordSchema) -> Result<()> {
    let mut instance = E::default();
    let written = random_i64();
    let has_write = instance.set_version(written);
    let read = instance.version();

    match (has_write, read) {
        (false, None) => Ok(()),
        (true, Some(value)) if value == written => Ok(()),
        (true, Some(_)) => Err(OrmError::identity(
            &schema.name,
            IdentityViolation::VersionRoundTrip { written, read },
        )),
        (has_write, read) => Err(OrmError::identity(
            &schema.name,
            IdentityViolation::OneSidedVersion {
                has_read: read.is_some(),
                has_write,
            },
        )),
    }
}

/// Full startup check of an entity type.
pub fn analyze<E: Entity>() -> Result<()> {
    let schema = E::record_schema();
    TypeValidator::validate(&schema)?;
    probe_identity::<E>(&schema)?;
    probe_version::<E>(&schema)?;
    debug!(entity = %schema.name, "entity passed validation");
    Ok(())
}
