use crate::core::{OrmError, Result};
use crate::entity::EntityDef;
use crate::store::{Collection, IndexInfo, IndexSpec};
use tracing::info;

/// Creates the declared indexes of `def` that `collection` does not have yet.
///
/// Existing indexes are matched by field name only, so running this again
/// against the same store state creates nothing. A field declaring both a
/// regular and a text index gets only the regular one. Returns the created specs.
pub async fn reconcile_indexes(collection: &Collection, def: &EntityDef) -> Result<Vec<IndexSpec>> {
    let mut created = Vec::new();
    if def.index_defs().is_empty() && def.index_text_defs().is_empty() {
        return Ok(created);
    }

    let mut existing = collection.list_indexes().await?;

    let mut index_defs = def.index_defs().values().collect::<Vec<_>>();
    index_defs.sort_by(|a, b| a.field.cmp(&b.field));
    for index in index_defs {
        if is_indexed(&existing, &index.field) {
            continue;
        }
        let spec = if index.ascending {
            IndexSpec::ascending(&index.field)
        } else {
            IndexSpec::descending(&index.field)
        }
        .unique(index.unique)
        .expire_after_seconds(index.ttl_expire_after_seconds);

        collection
            .create_index(&spec)
            .await
            .map_err(|err| as_conflict(collection, &index.field, err))?;
        info!(collection = %collection.name(), field = %index.field, unique = index.unique, "created index");
        existing.push(IndexInfo::from_spec(&spec));
        created.push(spec);
    }

    for text in def.index_text_defs().values() {
        if is_indexed(&existing, &text.field) {
            continue;
        }
        collection
            .create_text_index(&text.field)
            .await
            .map_err(|err| as_conflict(collection, &text.field, err))?;
        info!(collection = %collection.name(), field = %text.field, "created text index");
        let spec = IndexSpec::text(&text.field);
        existing.push(IndexInfo::from_spec(&spec));
        created.push(spec);
    }

    Ok(created)
}

fn is_indexed(existing: &[IndexInfo], field: &str) -> bool {
    existing.iter().any(|index| index.covers(field))
}

fn as_conflict(collection: &Collection, field: &str, err: OrmError) -> OrmError {
    match err {
        conflict @ OrmError::IndexConflict { .. } => conflict,
        other => OrmError::IndexConflict {
            collection: collection.name().to_string(),
            field: field.to_string(),
            reason: other.to_string(),
        },
    }
}
