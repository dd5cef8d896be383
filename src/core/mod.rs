pub mod error;
pub mod types;
pub mod value;

pub use error::{ErrorKind, IdentityViolation, IndexViolation, OrmError, Result, StructuralViolation};
pub use types::{
    BaseKind, ContainerKind, FieldSchema, IndexAttr, RecordRef, RecordSchema, Shape, Visibility,
};
pub use value::{EntityId, IdValue, random_i64};
