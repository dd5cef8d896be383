use std::fmt;

/// Terminal field kinds. Recursion over a record stops at these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Text,
}

impl BaseKind {
    /// Kinds allowed for an identity field.
    pub fn is_identity_kind(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64 | Self::Text)
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::Text => "String",
        };
        f.write_str(name)
    }
}

/// The base container abstractions a field may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    List,
    Set,
    Map,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("Vec"),
            Self::Set => f.write_str("HashSet"),
            Self::Map => f.write_str("HashMap"),
        }
    }
}

/// Lazily produced schema of a nested record. Lazy so that records may name
/// each other without building an infinite value.
pub type RecordRef = fn() -> RecordSchema;

/// Serialized form of a field, as a closed set of tags.
#[derive(Debug, Clone)]
pub enum Shape {
    Base(BaseKind),
    Date,
    Optional(Box<Shape>),
    Array(Box<Shape>),
    List(Box<Shape>),
    Set(Box<Shape>),
    Map(Box<Shape>, Box<Shape>),
    Record(RecordRef),
    /// A concrete container implementation standing in for a base one
    /// (`VecDeque`, `BTreeMap`, ...).
    Specialized {
        name: String,
        kind: ContainerKind,
        params: Vec<Shape>,
    },
}

impl Shape {
    pub fn base(kind: BaseKind) -> Self {
        Self::Base(kind)
    }

    pub fn text() -> Self {
        Self::Base(BaseKind::Text)
    }

    pub fn optional(inner: Shape) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn array(element: Shape) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn list(element: Shape) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: Shape) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(key: Shape, value: Shape) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn record(schema: RecordRef) -> Self {
        Self::Record(schema)
    }

    pub fn specialized(name: impl Into<String>, kind: ContainerKind, params: Vec<Shape>) -> Self {
        Self::Specialized {
            name: name.into(),
            kind,
            params,
        }
    }

    /// Strips `Optional` wrappers.
    pub fn unwrap_optional(&self) -> &Shape {
        match self {
            Self::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.unwrap_optional(), Self::Base(BaseKind::Text))
    }

    /// Date, optional date, or list of dates: the only shapes a TTL index accepts.
    pub fn is_date_like(&self) -> bool {
        match self.unwrap_optional() {
            Self::Date => true,
            Self::List(element) => matches!(element.unwrap_optional(), Self::Date),
            _ => false,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(kind) => write!(f, "{}", kind),
            Self::Date => f.write_str("DateTime"),
            Self::Optional(inner) => write!(f, "Option<{}>", inner),
            Self::Array(element) => write!(f, "[{}]", element),
            Self::List(element) => write!(f, "Vec<{}>", element),
            Self::Set(element) => write!(f, "HashSet<{}>", element),
            Self::Map(key, value) => write!(f, "HashMap<{}, {}>", key, value),
            Self::Record(schema) => f.write_str(&schema().name),
            Self::Specialized { name, params, .. } => {
                let params = params.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "{}<{}>", name, params.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Restricted,
    Private,
}

/// Index declared on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexAttr {
    pub ascending: bool,
    pub unique: bool,
    pub ttl_expire_after_seconds: u64,
}

impl Default for IndexAttr {
    fn default() -> Self {
        Self {
            ascending: true,
            unique: false,
            ttl_expire_after_seconds: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub shape: Shape,
    pub visibility: Visibility,
    /// Serialized out of the record (the read accessor).
    pub readable: bool,
    /// Deserialized into the record (the write accessor).
    pub writable: bool,
    /// Never persisted; skipped by validation.
    pub transient: bool,
    pub identity: bool,
    pub index: Option<IndexAttr>,
    pub index_text: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            visibility: Visibility::Private,
            readable: true,
            writable: true,
            transient: false,
            identity: false,
            index: None,
            index_text: false,
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn public(self) -> Self {
        self.visibility(Visibility::Public)
    }

    pub fn accessors(mut self, readable: bool, writable: bool) -> Self {
        self.readable = readable;
        self.writable = writable;
        self
    }

    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn index(mut self, index: IndexAttr) -> Self {
        self.index = Some(index);
        self
    }

    pub fn index_text(mut self) -> Self {
        self.index_text = true;
        self
    }
}

/// Structural description of a record type.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub name: String,
    /// Fully qualified type path; tells apart records sharing a simple name.
    pub type_path: String,
    pub type_params: Vec<String>,
    pub constructible: bool,
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_path: name.clone(),
            name,
            type_params: Vec::new(),
            constructible: true,
            fields: Vec::new(),
        }
    }

    pub fn type_path(mut self, path: impl Into<String>) -> Self {
        self.type_path = path.into();
        self
    }

    pub fn type_params(mut self, params: Vec<String>) -> Self {
        self.type_params = params;
        self
    }

    pub fn constructible(mut self, constructible: bool) -> Self {
        self.constructible = constructible;
        self
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: Vec<FieldSchema>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Fields that take part in persistence.
    pub fn persistent_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|field| !field.transient)
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }
}
