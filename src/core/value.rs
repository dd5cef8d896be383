use super::types::BaseKind;
use serde_json::Value as JsonValue;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Identity value of an entity.
///
/// Floats compare and hash by bit pattern so they can key a cache.
#[derive(Debug, Clone)]
pub enum IdValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
}

impl IdValue {
    pub fn kind(&self) -> BaseKind {
        match self {
            Self::I32(_) => BaseKind::I32,
            Self::I64(_) => BaseKind::I64,
            Self::F32(_) => BaseKind::F32,
            Self::F64(_) => BaseKind::F64,
            Self::Text(_) => BaseKind::Text,
        }
    }

    /// A random value of the given kind, or `None` if the kind cannot be an identity.
    pub fn random(kind: BaseKind) -> Option<Self> {
        let bits = Uuid::new_v4().as_u128();
        let value = match kind {
            BaseKind::I32 => Self::I32(bits as i32),
            BaseKind::I64 => Self::I64(mix_halves(bits)),
            // 24/53 random mantissa bits give values in [0, 1) that survive a JSON round trip.
            BaseKind::F32 => Self::F32((bits as u32 >> 8) as f32 / (1u32 << 24) as f32),
            BaseKind::F64 => Self::F64((bits as u64 >> 11) as f64 / (1u64 << 53) as f64),
            BaseKind::Text => Self::Text(Uuid::from_u128(bits).simple().to_string()[..10].to_string()),
            _ => return None,
        };
        Some(value)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::I32(v) => JsonValue::from(*v),
            Self::I64(v) => JsonValue::from(*v),
            Self::F32(v) => JsonValue::from(f64::from(*v)),
            Self::F64(v) => JsonValue::from(*v),
            Self::Text(v) => JsonValue::from(v.as_str()),
        }
    }
}

impl PartialEq for IdValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for IdValue {}

impl Hash for IdValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::I32(v) => v.hash(state),
            Self::I64(v) => v.hash(state),
            Self::F32(v) => v.to_bits().hash(state),
            Self::F64(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "\"{}\"", v),
        }
    }
}

/// Rust types usable as an entity identity.
pub trait EntityId: Clone + Send + Sync + 'static {
    const KIND: BaseKind;

    fn to_id_value(&self) -> IdValue;
}

impl EntityId for i32 {
    const KIND: BaseKind = BaseKind::I32;

    fn to_id_value(&self) -> IdValue {
        IdValue::I32(*self)
    }
}

impl EntityId for i64 {
    const KIND: BaseKind = BaseKind::I64;

    fn to_id_value(&self) -> IdValue {
        IdValue::I64(*self)
    }
}

impl EntityId for f32 {
    const KIND: BaseKind = BaseKind::F32;

    fn to_id_value(&self) -> IdValue {
        IdValue::F32(*self)
    }
}

impl EntityId for f64 {
    const KIND: BaseKind = BaseKind::F64;

    fn to_id_value(&self) -> IdValue {
        IdValue::F64(*self)
    }
}

impl EntityId for String {
    const KIND: BaseKind = BaseKind::Text;

    fn to_id_value(&self) -> IdValue {
        IdValue::Text(self.clone())
    }
}

/// Uniform random `i64`.
pub fn random_i64() -> i64 {
    mix_halves(Uuid::new_v4().as_u128())
}

/// The low half of a v4 UUID carries fixed variant bits at the top, so it is
/// folded with the high half to cover the whole range.
fn mix_halves(bits: u128) -> i64 {
    ((bits >> 64) as i64) ^ (bits as i64)
}
