use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::diff::result::{DiffError, DiffReason, DiffResult};
use crate::multiset::Multiset;
use crate::normalize::normalize_node;
use crate::schema::{Cardinality, ChildSchema, NodeSchema};
use crate::signature::service_signature;

/// Compare a desired tree with the existing tree fetched from the manager.
///
/// Neither input is modified. Both sides are normalized per node, then
/// compared top-down: scalars, reference lists, inline services, and finally
/// child collections. The first mismatch short-circuits.
pub fn differs(
    desired: &Value,
    existing: &Value,
    schema: &NodeSchema,
) -> Result<DiffResult, DiffError> {
    let root_path = root_path(desired, schema);
    let want = as_object(desired, &root_path)?;
    let have = as_object(existing, &root_path)?;

    Ok(match diff_node(want, have, schema, &root_path)? {
        Some(reason) => DiffResult::Differs { reason },
        None => DiffResult::Unchanged,
    })
}

/// Return true when `existing` satisfies every value set in `desired`.
///
/// Objects compare key by key over the desired keys only, so fields the
/// manager fills with defaults never count as drift. Arrays compare without
/// regard to order but with multiplicity.
pub fn covers(desired: &Value, existing: &Value) -> bool {
    match (desired, existing) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(k, v)| v.is_null() || have.get(k).is_some_and(|e| covers(v, e))),
        (Value::Array(want), Value::Array(have)) => unordered_covers(want, have),
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        _ => desired == existing,
    }
}

/// Perfect matching of desired onto existing elements under `covers`.
///
/// A desired element may cover several existing ones, so a first-fit pass
/// can starve a later element. Augmenting paths re-seat earlier choices.
fn unordered_covers(want: &[Value], have: &[Value]) -> bool {
    if want.len() != have.len() {
        return false;
    }
    let edges: Vec<Vec<usize>> = want
        .iter()
        .map(|w| {
            have.iter()
                .enumerate()
                .filter_map(|(idx, h)| covers(w, h).then_some(idx))
                .collect()
        })
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; have.len()];
    (0..want.len()).all(|w| {
        let mut seen = vec![false; have.len()];
        augment(w, &edges, &mut owner, &mut seen)
    })
}

fn augment(w: usize, edges: &[Vec<usize>], owner: &mut [Option<usize>], seen: &mut [bool]) -> bool {
    for &h in &edges[w] {
        if seen[h] {
            continue;
        }
        seen[h] = true;
        let free = match owner[h] {
            None => true,
            Some(other) => augment(other, edges, owner, seen),
        };
        if free {
            owner[h] = Some(w);
            return true;
        }
    }
    false
}

fn diff_node(
    desired: &Map<String, Value>,
    existing: &Map<String, Value>,
    schema: &NodeSchema,
    path: &str,
) -> Result<Option<DiffReason>, DiffError> {
    let want = normalize_node(desired, schema);
    let have = normalize_node(existing, schema);

    for (field, value) in &want {
        if schema.is_structural(field) {
            continue;
        }
        let current = have.get(field);
        if !current.is_some_and(|e| covers(value, e)) {
            return Ok(Some(DiffReason::Scalar {
                path: path.to_string(),
                field: field.clone(),
                desired: value.clone(),
                existing: current.cloned(),
            }));
        }
    }

    for field in &schema.reference_lists {
        let d = reference_keys(want.get(field), &format!("{path}.{field}"))?;
        let e = reference_keys(have.get(field), &format!("{path}.{field}"))?;
        if d != e {
            return Ok(Some(DiffReason::References {
                path: path.to_string(),
                field: field.clone(),
                missing: d.surplus_over(&e).into_iter().cloned().collect(),
                unexpected: e.surplus_over(&d).into_iter().cloned().collect(),
            }));
        }
    }

    if let Some(cs) = &schema.custom_services {
        let list_path = format!("{path}.{}", cs.list_field);
        let d = custom_signatures(want.get(&cs.list_field), &cs.entry_key, &list_path)?;
        let e = custom_signatures(have.get(&cs.list_field), &cs.entry_key, &list_path)?;
        if d != e {
            return Ok(Some(DiffReason::CustomServices {
                path: path.to_string(),
                field: cs.list_field.clone(),
                desired: d.len(),
                existing: e.len(),
            }));
        }
    }

    for child in &schema.children {
        let reason = match child.cardinality {
            Cardinality::Many => {
                diff_many(want.get(&child.field), have.get(&child.field), child, path)?
            }
            Cardinality::One => {
                diff_one(want.get(&child.field), have.get(&child.field), child, path)?
            }
        };
        if reason.is_some() {
            return Ok(reason);
        }
    }

    Ok(None)
}

fn diff_many(
    desired: Option<&Value>,
    existing: Option<&Value>,
    child: &ChildSchema,
    parent_path: &str,
) -> Result<Option<DiffReason>, DiffError> {
    // An omitted collection is not managed; an empty one is.
    let Some(desired) = desired else {
        return Ok(None);
    };
    let list_path = format!("{parent_path}.{}", child.field);
    let want = as_list(desired, &list_path)?;
    let have = match existing {
        Some(value) => as_list(value, &list_path)?,
        None => &[],
    };

    if want.len() != have.len() {
        return Ok(Some(DiffReason::ChildCount {
            path: parent_path.to_string(),
            field: child.field.clone(),
            desired: want.len(),
            existing: have.len(),
        }));
    }

    // First occurrence wins so duplicate remote names resolve the same way every run.
    let mut by_key: HashMap<&str, &Map<String, Value>> = HashMap::new();
    let mut by_id: HashMap<&str, &Map<String, Value>> = HashMap::new();
    for item in have {
        let item = as_object(item, &list_path)?;
        if let Some(key) = item.get(&child.schema.key_field).and_then(Value::as_str) {
            by_key.entry(key).or_insert(item);
        }
        if let Some(id) = item.get("id").and_then(Value::as_str) {
            by_id.entry(id).or_insert(item);
        }
    }

    for (idx, item) in want.iter().enumerate() {
        let item = as_object(item, &list_path)?;
        let (key, counterpart) = match item.get(&child.schema.key_field).and_then(Value::as_str) {
            Some(key) => (key.to_string(), by_key.get(key)),
            None => match item.get("id").and_then(Value::as_str) {
                Some(id) => (id.to_string(), by_id.get(id)),
                None => (format!("#{}", idx + 1), None),
            },
        };
        let Some(counterpart) = counterpart else {
            return Ok(Some(DiffReason::MissingChild {
                path: parent_path.to_string(),
                field: child.field.clone(),
                key,
            }));
        };
        let child_path = format!("{list_path}[{key}]");
        if let Some(reason) = diff_node(item, counterpart, &child.schema, &child_path)? {
            return Ok(Some(reason));
        }
    }

    Ok(None)
}

fn diff_one(
    desired: Option<&Value>,
    existing: Option<&Value>,
    child: &ChildSchema,
    parent_path: &str,
) -> Result<Option<DiffReason>, DiffError> {
    let Some(desired) = desired else {
        return Ok(None);
    };
    let child_path = format!("{parent_path}.{}", child.field);
    let want = as_object(desired, &child_path)?;
    match existing.filter(|v| !v.is_null()) {
        Some(value) => {
            let have = as_object(value, &child_path)?;
            diff_node(want, have, &child.schema, &child_path)
        }
        None => Ok(Some(DiffReason::MissingChild {
            path: parent_path.to_string(),
            field: child.field.clone(),
            key: child.schema.kind.clone(),
        })),
    }
}

/// Reference entries keyed by `type:id`; entries without an id are inline definitions.
fn reference_keys(list: Option<&Value>, path: &str) -> Result<Multiset<String>, DiffError> {
    let Some(list) = list else {
        return Ok(Multiset::new());
    };
    let mut keys = Multiset::new();
    for entry in as_list(list, path)? {
        let (Some(kind), Some(id)) = (
            entry.get("target_type").and_then(Value::as_str),
            entry.get("target_id").and_then(Value::as_str),
        ) else {
            continue;
        };
        keys.insert(format!("{kind}:{id}"));
    }
    Ok(keys)
}

fn custom_signatures(
    list: Option<&Value>,
    entry_key: &str,
    path: &str,
) -> Result<Multiset<String>, DiffError> {
    let Some(list) = list else {
        return Ok(Multiset::new());
    };
    let mut out = Multiset::new();
    for entry in as_list(list, path)? {
        if let Some(service) = entry.get(entry_key).and_then(Value::as_object) {
            out.insert(service_signature(service));
        }
    }
    Ok(out)
}

fn root_path(desired: &Value, schema: &NodeSchema) -> String {
    let key = desired
        .get(&schema.key_field)
        .or_else(|| desired.get("id"))
        .and_then(Value::as_str);
    match key {
        Some(key) => format!("{}[{key}]", schema.kind),
        None => schema.kind.clone(),
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, DiffError> {
    value.as_object().ok_or_else(|| DiffError::NotAnObject {
        path: path.to_string(),
    })
}

fn as_list<'a>(value: &'a Value, path: &str) -> Result<&'a [Value], DiffError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| DiffError::NotAList {
            path: path.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::covers;

    #[test]
    fn covers_ignores_server_defaults_in_nested_objects() {
        let desired = json!({"bfd": {"enabled": true}});
        let existing = json!({"bfd": {"enabled": true, "interval": 1000, "multiple": 3}});
        assert!(covers(&desired, &existing));
        assert!(!covers(&existing, &desired));
    }

    #[test]
    fn covers_treats_arrays_as_multisets() {
        assert!(covers(&json!(["a", "b", "a"]), &json!(["a", "a", "b"])));
        assert!(!covers(&json!(["a", "b"]), &json!(["a", "a"])));
        assert!(!covers(&json!(["a"]), &json!(["a", "a"])));
    }

    #[test]
    fn covers_reseats_loose_element_when_a_later_one_needs_its_match() {
        let desired = json!([{"ip": "10.0.0.1"}, {"ip": "10.0.0.1", "admin_distance": 5}]);
        let existing = json!([
            {"ip": "10.0.0.1", "admin_distance": 5},
            {"ip": "10.0.0.1", "admin_distance": 1}
        ]);
        assert!(covers(&desired, &existing));

        let drifted = json!([
            {"ip": "10.0.0.1", "admin_distance": 1},
            {"ip": "10.0.0.1", "admin_distance": 1}
        ]);
        assert!(!covers(&desired, &drifted));
    }

    #[test]
    fn covers_compares_integer_and_float_numerically() {
        assert!(covers(&json!(1), &json!(1.0)));
        assert!(!covers(&json!(1), &json!(2)));
    }
}
