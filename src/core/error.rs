use thiserror::Error;

/// Stable classification of [`OrmError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Discovery,
    StructuralValidation,
    IdentityContract,
    IndexDefinition,
    StrategyResolution,
    IndexConflict,
    ActivationLookup,
    Configuration,
    Store,
    Serialization,
    Lock,
}

/// A rule of the structural record check that a schema broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    #[error("generic type parameters are not allowed: {0:?}")]
    GenericParameters(Vec<String>),

    #[error("record must have a default constructor")]
    MissingDefaultConstructor,

    #[error("field must be both readable and writable (readable: {readable}, writable: {writable})")]
    MissingAccessor { readable: bool, writable: bool },

    #[error("container '{container}' must be declared as the base {expected}")]
    ContainerSpecialization { container: String, expected: String },

    #[error("map keys must be text")]
    NonTextMapKey,

    #[error("arrays cannot be nested inside containers")]
    ArrayInContainer,

    #[error("record refers back to itself through '{0}'")]
    RecursiveRecord(String),
}

/// A rule of the identity/version accessor contract that an entity broke.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdentityViolation {
    #[error("no identity field declared")]
    Missing,

    #[error("exactly one identity field is allowed, found {0}")]
    Multiple(usize),

    #[error("identity field '{0}' must be private")]
    PublicField(String),

    #[error("identity field '{field}' has unsupported type {shape}; use i32, i64, f32, f64 or String")]
    UnsupportedKind { field: String, shape: String },

    #[error("identity field is declared as {declared} but id() returns {accessor}")]
    KindMismatch { declared: String, accessor: String },

    #[error("id() returned {returned} after the identity field was set to {written}")]
    AccessorMismatch { written: String, returned: String },

    #[error("version accessors must come in pairs (read: {has_read}, write: {has_write})")]
    OneSidedVersion { has_read: bool, has_write: bool },

    #[error("version() returned {read:?} after set_version({written})")]
    VersionRoundTrip { written: i64, read: Option<i64> },

    #[error("identity probe failed: {0}")]
    ProbeFailed(String),
}

/// A declared index that cannot be built for its field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexViolation {
    #[error("TTL indexes require a date or list-of-date field")]
    TtlOnNonDate,

    #[error("at most one text index is allowed, found {0:?}")]
    MultipleTextIndexes(Vec<String>),
}

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Entity '{0}' was registered more than once")]
    DuplicateEntity(String),

    #[error("Entity cache for '{entity}' requested by a consumer, but '{entity}' was not found under entity package '{namespace}'")]
    UnknownBindingTarget { entity: String, namespace: String },

    #[error("Record '{record}'{}: {violation}", field_suffix(.field))]
    Structural {
        record: String,
        field: Option<String>,
        violation: StructuralViolation,
    },

    #[error("Entity '{entity}': {violation}")]
    Identity {
        entity: String,
        violation: IdentityViolation,
    },

    #[error("Entity '{entity}' field '{field}': {violation}")]
    IndexDefinition {
        entity: String,
        field: String,
        violation: IndexViolation,
    },

    #[error("Entity '{entity}' uses cache strategy '{strategy}' which is not configured")]
    UnknownCacheStrategy { entity: String, strategy: String },

    #[error("Entity '{entity}' uses persister strategy '{strategy}' which is not configured")]
    UnknownPersisterStrategy { entity: String, strategy: String },

    #[error("Index conflict on '{collection}.{field}': {reason}")]
    IndexConflict {
        collection: String,
        field: String,
        reason: String,
    },

    #[error("No such entity registered: '{0}'")]
    NotRegistered(String),

    #[error("Entity '{0}' has no consumer bound; cache unusable")]
    NotActivated(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document store is not connected")]
    StoreNotConnected,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(field) => format!(" field '{}'", field),
        None => String::new(),
    }
}

impl OrmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Discovery(_) | Self::DuplicateEntity(_) | Self::UnknownBindingTarget { .. } => {
                ErrorKind::Discovery
            }
            Self::Structural { .. } => ErrorKind::StructuralValidation,
            Self::Identity { .. } => ErrorKind::IdentityContract,
            Self::IndexDefinition { .. } => ErrorKind::IndexDefinition,
            Self::UnknownCacheStrategy { .. } | Self::UnknownPersisterStrategy { .. } => {
                ErrorKind::StrategyResolution
            }
            Self::IndexConflict { .. } => ErrorKind::IndexConflict,
            Self::NotRegistered(_) | Self::NotActivated(_) => ErrorKind::ActivationLookup,
            Self::Config(_) | Self::IoError(_) => ErrorKind::Configuration,
            Self::StoreNotConnected | Self::Store(_) => ErrorKind::Store,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::LockError(_) => ErrorKind::Lock,
        }
    }

    pub(crate) fn structural(
        record: impl Into<String>,
        field: Option<&str>,
        violation: StructuralViolation,
    ) -> Self {
        Self::Structural {
            record: record.into(),
            field: field.map(str::to_string),
            violation,
        }
    }

    pub(crate) fn identity(entity: impl Into<String>, violation: IdentityViolation) -> Self {
        Self::Identity {
            entity: entity.into(),
            violation,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;

impl<T> From<std::sync::PoisonError<T>> for OrmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for OrmError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
