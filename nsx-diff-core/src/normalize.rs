use serde_json::{Map, Value};

use crate::schema::NodeSchema;

/// Fields assigned by the manager or used only for wire serialization.
pub const SERVER_FIELDS: &[&str] = &[
    "_revision",
    "resource_type",
    "_create_time",
    "_create_user",
    "_last_modified_time",
    "_last_modified_user",
    "_system_owned",
    "_protection",
    "_links",
    "_schema",
    "_self",
    "path",
    "parent_path",
    "relative_path",
    "unique_id",
    "realization_id",
    "marked_for_delete",
    "overridden",
];

/// Produce the comparison form of one node.
///
/// Drops null values, server-only fields and the schema's ignored fields, and
/// inserts every declared reference list that is missing as an empty list so
/// that "omitted" and "present but empty" compare equal. Child collections are
/// copied as-is; the diff engine normalizes them when it recurses.
pub fn normalize_node(node: &Map<String, Value>, schema: &NodeSchema) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in node {
        if value.is_null()
            || SERVER_FIELDS.contains(&key.as_str())
            || schema.ignored_fields.iter().any(|f| f == key)
        {
            continue;
        }
        out.insert(key.clone(), strip_nulls(value));
    }

    for field in &schema.reference_lists {
        out.entry(field.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
    }
    out
}

/// Recursively remove null members from nested objects.
pub fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}
