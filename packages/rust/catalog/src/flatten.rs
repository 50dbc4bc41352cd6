//! Reshape raw Atlas entity documents into a [`CatalogRecord`].
//!
//! Every JSON value is converted to a plain YAML value so the written record
//! always reloads to the same mapping.

use serde_json::Value as Json;
use serde_yaml::Value as Yaml;

use metaenrich_shared::{AttachedSchema, CatalogRecord, ColumnMap, Identifier};

/// Atlas type name of column entities.
const COLUMN_TYPE: &str = "column";

/// Type-name suffix of storage resource-set entities.
const RESOURCE_SET_SUFFIX: &str = "resource_set";

/// Recursively convert JSON into YAML, stringifying numbers YAML cannot
/// carry losslessly.
pub fn to_yaml(value: &Json) -> Yaml {
    match value {
        Json::Null => Yaml::Null,
        Json::Bool(b) => Yaml::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Yaml::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Yaml::Number(u.into())
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => Yaml::Number(f.into()),
                    _ => Yaml::String(n.to_string()),
                }
            }
        }
        Json::String(s) => Yaml::String(s.clone()),
        Json::Array(items) => Yaml::Sequence(items.iter().map(to_yaml).collect()),
        Json::Object(map) => Yaml::Mapping(
            map.iter()
                .map(|(k, v)| (Yaml::String(k.clone()), to_yaml(v)))
                .collect(),
        ),
    }
}

/// `entity.typeName` of an entity document.
pub fn type_name(doc: &Json) -> Option<&str> {
    doc.pointer("/entity/typeName").and_then(Json::as_str)
}

/// Whether the entity is a storage resource set (carries an attached schema).
pub fn is_resource_set(doc: &Json) -> bool {
    type_name(doc).is_some_and(|t| t.ends_with(RESOURCE_SET_SUFFIX))
}

/// Guid of the first attached schema referenced by a resource-set entity.
pub fn attached_schema_guid(doc: &Json) -> Option<String> {
    let attached = doc.pointer("/entity/relationshipAttributes/attachedSchema")?;
    let first = match attached {
        Json::Array(items) => items.first()?,
        other => other,
    };
    first.get("guid").and_then(Json::as_str).map(String::from)
}

/// String form of `entity.attributes.<key>`; non-string scalars are
/// stringified, null or missing is `None`.
pub fn entity_attribute(doc: &Json, key: &str) -> Option<String> {
    match doc.get("entity")?.get("attributes")?.get(key)? {
        Json::Null => None,
        Json::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Column entities from `referredEntities`, keyed by guid.
pub fn columns(doc: &Json) -> ColumnMap {
    let Some(Json::Object(referred)) = doc.get("referredEntities") else {
        return ColumnMap::new();
    };

    referred
        .iter()
        .filter(|(_, entity)| entity.get("typeName").and_then(Json::as_str) == Some(COLUMN_TYPE))
        .map(|(guid, entity)| {
            let attrs = entity
                .get("attributes")
                .map(to_yaml)
                .unwrap_or_else(|| Yaml::Mapping(Default::default()));
            (guid.clone(), attrs)
        })
        .collect()
}

/// Flatten a schema entity document into an [`AttachedSchema`].
pub fn attached_schema(guid: &str, doc: &Json) -> AttachedSchema {
    AttachedSchema {
        guid: guid.to_string(),
        name: entity_attribute(doc, "name"),
        qualified_name: entity_attribute(doc, "qualifiedName"),
        columns: columns(doc),
    }
}

/// Assemble the catalog record for `id`.
pub fn build_record(
    id: &Identifier,
    entity: &Json,
    lineage: Option<&Json>,
    attached: Option<AttachedSchema>,
) -> CatalogRecord {
    CatalogRecord {
        identifier: id.clone(),
        qualified_name: entity_attribute(entity, "qualifiedName"),
        name: entity_attribute(entity, "name"),
        description: entity_attribute(entity, "description"),
        columns: columns(entity),
        lineage: lineage.map(to_yaml),
        attached_schema: attached,
    }
}
