use docorm::config::{CacheStrategy, OrmConfig, PersisterKind, PersisterStrategy};
use docorm::core::{BaseKind, ErrorKind, FieldSchema, IndexAttr, RecordSchema, Shape};
use docorm::entity::{EntityDef, EntityDefBuilder};
use docorm::manager::reconcile_indexes;
use docorm::store::{
    Collection, Document, DocumentStore, IndexDirection, IndexSpec, MemoryStore, StoreGateway,
};
use docorm::{IdValue, OrmError};
use serde_json::json;
use std::any::TypeId;
use std::sync::Arc;

struct Event;

fn config() -> OrmConfig {
    OrmConfig::new("index_tests")
        .cache(CacheStrategy::new("default", 10, 0))
        .persister(PersisterStrategy::new("default", PersisterKind::WriteThrough))
}

fn event_schema() -> RecordSchema {
    RecordSchema::new("Event")
        .field(FieldSchema::new("id", Shape::base(BaseKind::I64)).identity())
        .field(FieldSchema::new("code", Shape::text()).index(IndexAttr {
            unique: true,
            ..Default::default()
        }))
        .field(FieldSchema::new("score", Shape::base(BaseKind::I32)).index(IndexAttr {
            ascending: false,
            ..Default::default()
        }))
        .field(FieldSchema::new("created", Shape::Date).index(IndexAttr {
            ttl_expire_after_seconds: 86_400,
            ..Default::default()
        }))
        .field(FieldSchema::new("summary", Shape::text()).index_text())
}

fn define(schema: &RecordSchema) -> EntityDef {
    let config = config();
    EntityDefBuilder::new(&config)
        .build(TypeId::of::<Event>(), schema, "default", "default")
        .unwrap()
}

fn events(store: &Arc<MemoryStore>) -> Collection {
    let gateway = StoreGateway::new();
    gateway.attach(store.clone()).unwrap();
    gateway.collection_named("events").unwrap()
}

fn document(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_reconcile_creates_declared_indexes() {
    let store = Arc::new(MemoryStore::new("app"));
    let collection = events(&store);
    let def = define(&event_schema());

    let created = reconcile_indexes(&collection, &def).await.unwrap();
    let fields = created.iter().map(|spec| spec.field.as_str()).collect::<Vec<_>>();
    assert_eq!(fields, vec!["code", "created", "score", "summary"]);

    let indexes = store.list_indexes("events").await.unwrap();
    let by_name = |name: &str| indexes.iter().find(|it| it.name == name).cloned().unwrap();
    assert!(by_name("code_1").unique);
    assert_eq!(by_name("created_1").ttl_expire_after_seconds, 86_400);
    assert_eq!(by_name("score_-1").keys, vec![("score".to_string(), IndexDirection::Descending)]);
    assert_eq!(by_name("summary_text").keys, vec![("summary".to_string(), IndexDirection::Text)]);
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let store = Arc::new(MemoryStore::new("app"));
    let collection = events(&store);
    let def = define(&event_schema());

    reconcile_indexes(&collection, &def).await.unwrap();
    let calls = store.create_index_calls();
    assert_eq!(calls, 4);

    let created = reconcile_indexes(&collection, &def).await.unwrap();
    assert!(created.is_empty());
    assert_eq!(store.create_index_calls(), calls);
}

#[tokio::test]
async fn test_existing_index_on_field_is_kept() {
    let store = Arc::new(MemoryStore::new("app"));
    let collection = events(&store);
    // same field, different direction: matched by field name, left alone
    collection.create_index(&IndexSpec::ascending("score")).await.unwrap();

    let def = define(&event_schema());
    let created = reconcile_indexes(&collection, &def).await.unwrap();
    assert!(created.iter().all(|spec| spec.field != "score"));
    assert!(store.list_indexes("events").await.unwrap().iter().all(|it| it.name != "score_-1"));
}

#[tokio::test]
async fn test_field_with_regular_and_text_index_gets_one() {
    let store = Arc::new(MemoryStore::new("app"));
    let collection = events(&store);
    let schema = RecordSchema::new("Event")
        .field(FieldSchema::new("id", Shape::base(BaseKind::I64)).identity())
        .field(FieldSchema::new("title", Shape::text()).index(IndexAttr::default()).index_text());
    let def = define(&schema);

    let created = reconcile_indexes(&collection, &def).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].direction, IndexDirection::Ascending);
    assert_eq!(store.create_index_calls(), 1);

    let indexes = store.list_indexes("events").await.unwrap();
    assert!(indexes.iter().any(|it| it.name == "title_1"));
    assert!(indexes.iter().all(|it| it.name != "title_text"));
}

#[tokio::test]
async fn test_second_text_index_is_a_conflict() {
    let store = Arc::new(MemoryStore::new("app"));
    let collection = events(&store);
    collection.create_text_index("title").await.unwrap();

    let def = define(&event_schema());
    let err = reconcile_indexes(&collection, &def).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexConflict);
    match err {
        OrmError::IndexConflict { collection, field, .. } => {
            assert_eq!(collection, "events");
            assert_eq!(field, "summary");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn test_unique_index_over_duplicates_is_a_conflict() {
    let store = Arc::new(MemoryStore::new("app"));
    let collection = events(&store);
    collection
        .upsert(&IdValue::I64(1), document(json!({"id": 1, "code": "A"})))
        .await
        .unwrap();
    collection
        .upsert(&IdValue::I64(2), document(json!({"id": 2, "code": "A"})))
        .await
        .unwrap();

    let def = define(&event_schema());
    let err = reconcile_indexes(&collection, &def).await.unwrap_err();
    assert!(matches!(err, OrmError::IndexConflict { ref field, .. } if field == "code"));
}

#[test]
fn test_invalid_index_declarations_fail_definition() {
    let config = config();
    let builder = EntityDefBuilder::new(&config);

    let ttl_on_text = RecordSchema::new("Event")
        .field(FieldSchema::new("id", Shape::base(BaseKind::I64)).identity())
        .field(FieldSchema::new("code", Shape::text()).index(IndexAttr {
            ttl_expire_after_seconds: 60,
            ..Default::default()
        }));
    let err = builder
        .build(TypeId::of::<Event>(), &ttl_on_text, "default", "default")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexDefinition);

    let two_texts = event_schema().field(FieldSchema::new("details", Shape::text()).index_text());
    let err = builder
        .build(TypeId::of::<Event>(), &two_texts, "default", "default")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexDefinition);
}
