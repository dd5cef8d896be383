use chrono::{DateTime, Utc};
use docorm::core::{
    BaseKind, ErrorKind, IdentityViolation, RecordSchema, Shape, StructuralViolation, Visibility,
};
use docorm::entity::validator::analyze;
use docorm::{Entity, OrmError, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct Address {
    city: String,
    zip: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
struct PlayerEntity {
    #[orm(id)]
    id: i64,
    #[orm(index(unique))]
    pub display_name: String,
    #[serde(rename = "lvl")]
    level: u32,
    addresses: Vec<Address>,
    tags: HashSet<String>,
    scores: HashMap<String, Vec<i32>>,
    signature: [u8; 4],
    #[orm(index(ttl = 3600))]
    last_login: Option<DateTime<Utc>>,
    #[serde(skip)]
    session_token: String,
}

impl Entity for PlayerEntity {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

fn field_shape(schema: &RecordSchema, name: &str) -> Shape {
    schema
        .get_field(name)
        .unwrap_or_else(|| panic!("missing field {name}"))
        .shape
        .clone()
}

#[test]
fn test_derived_schema_follows_serialized_form() {
    let schema = PlayerEntity::record_schema();
    assert_eq!(schema.name, "PlayerEntity");

    let names = schema.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["id", "displayName", "lvl", "addresses", "tags", "scores", "signature", "lastLogin"]
    );

    let id = schema.get_field("id").unwrap();
    assert!(id.identity);
    assert_eq!(id.visibility, Visibility::Private);
    assert_eq!(schema.get_field("displayName").unwrap().visibility, Visibility::Public);
    assert!(schema.get_field("displayName").unwrap().index.unwrap().unique);
    assert_eq!(
        schema.get_field("lastLogin").unwrap().index.unwrap().ttl_expire_after_seconds,
        3600
    );

    assert!(matches!(field_shape(&schema, "lvl"), Shape::Base(BaseKind::U32)));
    assert!(matches!(field_shape(&schema, "signature"), Shape::Array(_)));
    assert!(field_shape(&schema, "lastLogin").is_date_like());
    match field_shape(&schema, "addresses") {
        Shape::List(element) => match *element {
            Shape::Record(nested) => assert_eq!(nested().name, "Address"),
            other => panic!("unexpected element {other}"),
        },
        other => panic!("unexpected shape {other}"),
    }
    assert_eq!(field_shape(&schema, "scores").to_string(), "HashMap<String, Vec<i32>>");
}

#[test]
fn test_valid_entity_passes_analysis() {
    analyze::<PlayerEntity>().unwrap();
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct Ledger {
    #[orm(id)]
    id: String,
    entries: BTreeMap<String, i64>,
}

impl Entity for Ledger {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[test]
fn test_specialized_container_is_rejected() {
    let err = analyze::<Ledger>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralValidation);
    match err {
        OrmError::Structural { record, field, violation } => {
            assert_eq!(record, "Ledger");
            assert_eq!(field.as_deref(), Some("entries"));
            assert_eq!(
                violation,
                StructuralViolation::ContainerSpecialization {
                    container: "BTreeMap".to_string(),
                    expected: "HashMap".to_string(),
                }
            );
        }
        other => panic!("unexpected error {other}"),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct Leaderboard {
    #[orm(id)]
    id: i32,
    ranks: HashMap<i32, String>,
}

impl Entity for Leaderboard {
    type Id = i32;

    fn id(&self) -> i32 {
        self.id
    }
}

#[test]
fn test_non_text_map_key_is_rejected() {
    let err = analyze::<Leaderboard>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Structural { violation: StructuralViolation::NonTextMapKey, .. }
    ));
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct TreeNode {
    #[orm(id)]
    id: i64,
    children: Vec<TreeNode>,
}

impl Entity for TreeNode {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

#[test]
fn test_self_referencing_record_is_rejected() {
    let err = analyze::<TreeNode>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Structural { violation: StructuralViolation::RecursiveRecord(ref name), .. } if name == "TreeNode"
    ));
}

mod catalog {
    use docorm::Record;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
    pub struct Item {
        pub sku: String,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct Item {
    #[orm(id)]
    id: i64,
    listing: catalog::Item,
}

impl Entity for Item {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

#[test]
fn test_nested_record_with_same_simple_name_is_accepted() {
    analyze::<Item>().unwrap();
    let listing = match field_shape(&Item::record_schema(), "listing") {
        Shape::Record(schema) => schema(),
        other => panic!("expected record shape, got {other:?}"),
    };
    assert_eq!(listing.name, "Item");
    assert_ne!(listing.type_path, Item::record_schema().type_path);
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct Session {
    #[orm(id)]
    id: i64,
    user: String,
    #[orm(transient)]
    #[serde(skip)]
    scratch: Vec<String>,
}

impl Entity for Session {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

#[test]
fn test_transient_field_is_neither_described_nor_stored() {
    analyze::<Session>().unwrap();
    assert!(Session::record_schema().get_field("scratch").is_none());

    let session = Session {
        id: 1,
        user: "ann".to_string(),
        scratch: vec!["draft".to_string()],
    };
    let document = serde_json::to_value(&session).unwrap();
    assert!(document.get("scratch").is_none());
    assert_eq!(document["user"], "ann");
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct AuditEntry {
    #[orm(id)]
    id: i64,
    #[serde(skip_serializing)]
    secret: String,
}

impl Entity for AuditEntry {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

#[test]
fn test_one_way_field_is_rejected() {
    let err = analyze::<AuditEntry>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Structural {
            violation: StructuralViolation::MissingAccessor { readable: false, writable: true },
            ..
        }
    ));
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct PublicId {
    #[orm(id)]
    pub id: i64,
}

impl Entity for PublicId {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

#[test]
fn test_public_identity_field_is_rejected() {
    let err = analyze::<PublicId>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdentityContract);
    assert!(matches!(
        err,
        OrmError::Identity { violation: IdentityViolation::PublicField(ref field), .. } if field == "id"
    ));
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct FlagId {
    #[orm(id)]
    enabled: bool,
}

impl Entity for FlagId {
    type Id = i32;

    fn id(&self) -> i32 {
        i32::from(self.enabled)
    }
}

#[test]
fn test_unsupported_identity_type_is_rejected() {
    let err = analyze::<FlagId>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Identity { violation: IdentityViolation::UnsupportedKind { .. }, .. }
    ));
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct TextualId {
    #[orm(id)]
    id: i64,
}

impl Entity for TextualId {
    type Id = String;

    fn id(&self) -> String {
        self.id.to_string()
    }
}

#[test]
fn test_identity_type_must_match_accessor() {
    let err = analyze::<TextualId>().unwrap_err();
    match err {
        OrmError::Identity { violation: IdentityViolation::KindMismatch { declared, accessor }, .. } => {
            assert_eq!(declared, "i64");
            assert_eq!(accessor, "String");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct StuckId {
    #[orm(id)]
    id: String,
}

impl Entity for StuckId {
    type Id = String;

    fn id(&self) -> String {
        "constant".to_string()
    }
}

#[test]
fn test_accessor_must_return_identity_field() {
    let err = analyze::<StuckId>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Identity { violation: IdentityViolation::AccessorMismatch { .. }, .. }
    ));
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct Versioned {
    #[orm(id)]
    id: f64,
    version: i64,
}

impl Entity for Versioned {
    type Id = f64;

    fn id(&self) -> f64 {
        self.id
    }

    fn version(&self) -> Option<i64> {
        Some(self.version)
    }

    fn set_version(&mut self, version: i64) -> bool {
        self.version = version;
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct ReadOnlyVersion {
    #[orm(id)]
    id: i64,
    version: i64,
}

impl Entity for ReadOnlyVersion {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> Option<i64> {
        Some(self.version)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
struct DriftingVersion {
    #[orm(id)]
    id: i64,
    version: i64,
}

impl Entity for DriftingVersion {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> Option<i64> {
        Some(self.version)
    }

    fn set_version(&mut self, version: i64) -> bool {
        self.version = version.wrapping_add(1);
        true
    }
}

#[test]
fn test_version_accessors() {
    analyze::<Versioned>().unwrap();

    let err = analyze::<ReadOnlyVersion>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Identity {
            violation: IdentityViolation::OneSidedVersion { has_read: true, has_write: false },
            ..
        }
    ));

    let err = analyze::<DriftingVersion>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Identity { violation: IdentityViolation::VersionRoundTrip { .. }, .. }
    ));
}
