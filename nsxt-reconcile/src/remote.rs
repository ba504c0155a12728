//! Read side of the manager API: paginated listings and existing resource trees.

use serde_json::Value;
use tracing::debug;

use crate::transport::{ApiRequest, Transport, TransportError};

pub const SECTIONS_PATH: &str = "/api/v1/firewall/sections";
pub const TIER0S_PATH: &str = "/policy/api/v1/infra/tier-0s";
pub const INFRA_PATH: &str = "/policy/api/v1/infra";

/// Collect every `results` entry of a listing, following `cursor` until it runs out.
pub fn list_all(transport: &dyn Transport, path: &str) -> Result<Vec<Value>, TransportError> {
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page_path = match &cursor {
            Some(c) => {
                let sep = if path.contains('?') { '&' } else { '?' };
                format!("{path}{sep}cursor={}", urlencoding::encode(c))
            }
            None => path.to_string(),
        };
        let page = transport.request(&ApiRequest::get(page_path))?;
        if let Some(results) = page.get("results").and_then(Value::as_array) {
            items.extend(results.iter().cloned());
        }

        let next = page
            .get("cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty());
        match next {
            Some(next) if cursor.as_deref() != Some(next) => cursor = Some(next.to_string()),
            _ => break,
        }
    }
    debug!(path, count = items.len(), "listed resources");
    Ok(items)
}

/// GET a single object, mapping 404 to `None`.
pub fn get_optional(transport: &dyn Transport, path: &str) -> Result<Option<Value>, TransportError> {
    match transport.request(&ApiRequest::get(path)) {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn list_sections(transport: &dyn Transport) -> Result<Vec<Value>, TransportError> {
    list_all(transport, SECTIONS_PATH)
}

/// Attach the section's rules under `rules`, the same field the desired tree uses.
pub fn fetch_section_tree(
    transport: &dyn Transport,
    section: &Value,
) -> Result<Value, TransportError> {
    let mut tree = section.clone();
    if let (Some(id), Some(obj)) = (object_id(section), tree.as_object_mut()) {
        let rules = list_all(transport, &format!("{SECTIONS_PATH}/{id}/rules"))?;
        obj.insert("rules".to_string(), Value::Array(rules));
    }
    Ok(tree)
}

/// Attach locale services (with interfaces, BGP and neighbors) and static routes.
pub fn fetch_tier0_tree(transport: &dyn Transport, tier0: &Value) -> Result<Value, TransportError> {
    let mut tree = tier0.clone();
    let (Some(id), Some(obj)) = (object_id(tier0), tree.as_object_mut()) else {
        return Ok(tree);
    };
    let base = format!("{TIER0S_PATH}/{id}");

    let mut services = list_all(transport, &format!("{base}/locale-services"))?;
    for ls in services.iter_mut() {
        let Some(ls_id) = object_id(ls) else {
            continue;
        };
        let ls_base = format!("{base}/locale-services/{ls_id}");
        let interfaces = list_all(transport, &format!("{ls_base}/interfaces"))?;
        let bgp = match get_optional(transport, &format!("{ls_base}/bgp"))? {
            Some(mut bgp) => {
                let neighbors = list_all(transport, &format!("{ls_base}/bgp/neighbors"))?;
                if let Some(bgp_obj) = bgp.as_object_mut() {
                    bgp_obj.insert("neighbors".to_string(), Value::Array(neighbors));
                }
                Some(bgp)
            }
            None => None,
        };

        if let Some(ls_obj) = ls.as_object_mut() {
            ls_obj.insert("interfaces".to_string(), Value::Array(interfaces));
            if let Some(bgp) = bgp {
                ls_obj.insert("bgp".to_string(), bgp);
            }
        }
    }
    let routes = list_all(transport, &format!("{base}/static-routes"))?;

    obj.insert("locale_services".to_string(), Value::Array(services));
    obj.insert("static_routes".to_string(), Value::Array(routes));
    Ok(tree)
}

pub fn object_id(value: &Value) -> Option<String> {
    value.get("id").and_then(Value::as_str).map(str::to_string)
}

pub fn object_revision(value: &Value) -> Option<u64> {
    value.get("_revision").and_then(Value::as_u64)
}

/// Children of `parent` stored under `field`, empty when absent.
pub fn child_list<'a>(parent: Option<&'a Value>, field: &str) -> &'a [Value] {
    parent
        .and_then(|p| p.get(field))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// First child whose display name matches, falling back to an id match.
pub fn find_child<'a>(
    children: &'a [Value],
    display_name: Option<&str>,
    id: Option<&str>,
) -> Option<&'a Value> {
    let by = |field: &str, wanted: Option<&str>| {
        let wanted = wanted?;
        children
            .iter()
            .find(|c| c.get(field).and_then(Value::as_str) == Some(wanted))
    };
    by("display_name", display_name).or_else(|| by("id", id))
}
