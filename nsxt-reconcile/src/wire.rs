//! Request bodies.
//!
//! Firewall sections go to the manager API as one `create_with_rules` or
//! `update_with_rules` document. Tier-0 trees go to the policy hierarchical
//! API as an `Infra` document whose children are `Child*` wrappers; a wrapper
//! with `marked_for_delete` removes the object it names.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::model::tier0::{InterfaceSpec, LocaleServiceSpec, NeighborSpec, StaticRouteSpec};
use crate::model::{PolicyPath, ResolvedReference, SectionSpec, State, Tier0Spec};
use crate::remote::{child_list, find_child, object_id};

/// Fixed id of the single BGP configuration under a locale service.
pub const BGP_ID: &str = "bgp";

/// Reference lists on sections and rules. Their order carries no meaning.
const REFERENCE_LISTS: &[&str] = &[
    "applied_tos",
    "context_profiles",
    "destinations",
    "services",
    "sources",
];

/// Body of a section create or update call; updates carry the revision.
///
/// Reference lists are emitted in canonical order so reordered input yields
/// the same body. Rules keep their order, which is their priority.
pub fn section_body(
    spec: &SectionSpec<ResolvedReference>,
    revision: Option<u64>,
) -> Result<String, serde_json::Error> {
    let mut body = serde_json::to_value(spec)?;
    if let Some(obj) = body.as_object_mut() {
        sort_reference_lists(obj);
        if let Some(Value::Array(rules)) = obj.get_mut("rules") {
            rules
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .for_each(sort_reference_lists);
        }
        if let Some(revision) = revision {
            obj.insert("_revision".to_string(), Value::from(revision));
        }
    }
    serde_json::to_string(&body)
}

fn sort_reference_lists(obj: &mut Map<String, Value>) {
    for field in REFERENCE_LISTS {
        if let Some(Value::Array(items)) = obj.get_mut(*field) {
            items.sort_by_cached_key(Value::to_string);
        }
    }
}

/// Id the Tier-0 is addressed by: the desired id, then the existing id, then the display name.
pub fn tier0_id(spec: &Tier0Spec<PolicyPath>, existing: Option<&Value>) -> String {
    spec.id
        .clone()
        .or_else(|| existing.and_then(object_id))
        .unwrap_or_else(|| spec.key().to_string())
}

/// Hierarchical body that creates or updates the Tier-0 and its managed children.
///
/// A child list that is present in the desired tree is authoritative: existing
/// children it does not name, and named children marked `absent`, are deleted.
pub fn tier0_body(
    spec: &Tier0Spec<PolicyPath>,
    existing: Option<&Value>,
    revision: Option<u64>,
) -> Result<String, serde_json::Error> {
    let id = tier0_id(spec, existing);
    let mut tier0 = resource_object(spec, "Tier0", &id, &["locale_services", "static_routes"])?;
    if let Some(revision) = revision {
        tier0.insert("_revision".to_string(), Value::from(revision));
    }

    let mut children = Vec::new();
    if let Some(services) = &spec.locale_services {
        children.extend(sync_children(
            services,
            child_list(existing, "locale_services"),
            "LocaleServices",
            |ls| (&ls.id, &ls.display_name, ls.state),
            locale_service_object,
        )?);
    }
    if let Some(routes) = &spec.static_routes {
        children.extend(sync_children(
            routes,
            child_list(existing, "static_routes"),
            "StaticRoutes",
            |r| (&r.id, &r.display_name, r.state),
            |route: &StaticRouteSpec, id, _| resource_object(route, "StaticRoutes", id, &[]),
        )?);
    }
    attach_children(&mut tier0, children);

    serde_json::to_string(&infra(wrap("Tier0", tier0)))
}

/// Hierarchical body that deletes the Tier-0 and every child fetched with it.
pub fn tier0_delete_body(existing: &Value) -> Result<String, serde_json::Error> {
    let id = object_id(existing).unwrap_or_default();

    let mut children: Vec<Value> = child_list(Some(existing), "static_routes")
        .iter()
        .filter_map(object_id)
        .map(|route_id| delete_wrapper("StaticRoutes", &route_id, Vec::new()))
        .collect();
    for ls in child_list(Some(existing), "locale_services") {
        let Some(ls_id) = object_id(ls) else {
            continue;
        };
        let mut ls_children: Vec<Value> = child_list(Some(ls), "interfaces")
            .iter()
            .filter_map(object_id)
            .map(|iface_id| delete_wrapper("Tier0Interface", &iface_id, Vec::new()))
            .collect();
        let neighbor_deletes: Vec<Value> = child_list(ls.get("bgp"), "neighbors")
            .iter()
            .filter_map(object_id)
            .map(|n_id| delete_wrapper("BgpNeighborConfig", &n_id, Vec::new()))
            .collect();
        if !neighbor_deletes.is_empty() {
            let mut bgp = Map::new();
            bgp.insert("resource_type".to_string(), json!("BgpRoutingConfig"));
            bgp.insert("id".to_string(), json!(BGP_ID));
            attach_children(&mut bgp, neighbor_deletes);
            ls_children.push(wrap("BgpRoutingConfig", bgp));
        }
        children.push(delete_wrapper("LocaleServices", &ls_id, ls_children));
    }

    serde_json::to_string(&infra(delete_wrapper("Tier0", &id, children)))
}

fn locale_service_object(
    ls: &LocaleServiceSpec<PolicyPath>,
    id: &str,
    existing: Option<&Value>,
) -> Result<Map<String, Value>, serde_json::Error> {
    let mut obj = resource_object(ls, "LocaleServices", id, &["interfaces", "bgp"])?;
    let mut children = Vec::new();

    if let Some(interfaces) = &ls.interfaces {
        children.extend(sync_children(
            interfaces,
            child_list(existing, "interfaces"),
            "Tier0Interface",
            |i| (&i.id, &i.display_name, i.state),
            |iface: &InterfaceSpec<PolicyPath>, id, _| {
                resource_object(iface, "Tier0Interface", id, &[])
            },
        )?);
    }

    if let Some(bgp) = &ls.bgp {
        let mut bgp_obj = resource_object(bgp, "BgpRoutingConfig", BGP_ID, &["neighbors"])?;
        if let Some(neighbors) = &bgp.neighbors {
            let existing_bgp = existing.and_then(|ls| ls.get("bgp"));
            let neighbor_children = sync_children(
                neighbors,
                child_list(existing_bgp, "neighbors"),
                "BgpNeighborConfig",
                |n| (&n.id, &n.display_name, n.state),
                |neighbor: &NeighborSpec, id, _| {
                    resource_object(neighbor, "BgpNeighborConfig", id, &[])
                },
            )?;
            attach_children(&mut bgp_obj, neighbor_children);
        }
        children.push(wrap("BgpRoutingConfig", bgp_obj));
    }

    attach_children(&mut obj, children);
    Ok(obj)
}

/// Wrap every desired child, delete absent ones that exist, and delete unnamed extras.
///
/// Wrappers come back ordered by child id.
fn sync_children<T>(
    desired: &[T],
    existing: &[Value],
    kind: &str,
    identity: impl Fn(&T) -> (&Option<String>, &Option<String>, State),
    mut build: impl FnMut(&T, &str, Option<&Value>) -> Result<Map<String, Value>, serde_json::Error>,
) -> Result<Vec<Value>, serde_json::Error> {
    let mut out = Vec::new();
    let mut claimed = BTreeSet::new();

    for item in desired {
        let (id, display_name, state) = identity(item);
        let counterpart = find_child(existing, display_name.as_deref(), id.as_deref());
        let counterpart_id = counterpart.and_then(object_id);
        if let Some(found) = &counterpart_id {
            claimed.insert(found.clone());
        }
        let child_id = id
            .clone()
            .or_else(|| counterpart_id.clone())
            .or_else(|| display_name.clone())
            .unwrap_or_default();

        match state {
            State::Absent => {
                if counterpart.is_some() {
                    out.push(delete_wrapper(kind, &child_id, Vec::new()));
                }
            }
            State::Present => out.push(wrap(kind, build(item, &child_id, counterpart)?)),
        }
    }

    for extra in existing.iter().filter_map(object_id) {
        if !claimed.contains(&extra) {
            out.push(delete_wrapper(kind, &extra, Vec::new()));
        }
    }
    out.sort_by_cached_key(|wrapper| {
        wrapper
            .get(kind)
            .and_then(object_id)
            .unwrap_or_default()
    });
    Ok(out)
}

fn resource_object<T: Serialize>(
    item: &T,
    kind: &str,
    id: &str,
    strip: &[&str],
) -> Result<Map<String, Value>, serde_json::Error> {
    let mut obj = match serde_json::to_value(item)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for field in strip {
        obj.remove(*field);
    }
    obj.insert("resource_type".to_string(), json!(kind));
    obj.insert("id".to_string(), json!(id));
    Ok(obj)
}

fn attach_children(obj: &mut Map<String, Value>, children: Vec<Value>) {
    if !children.is_empty() {
        obj.insert("children".to_string(), Value::Array(children));
    }
}

fn wrap(kind: &str, obj: Map<String, Value>) -> Value {
    let mut wrapper = Map::new();
    wrapper.insert("resource_type".to_string(), json!(format!("Child{kind}")));
    wrapper.insert(kind.to_string(), Value::Object(obj));
    Value::Object(wrapper)
}

fn delete_wrapper(kind: &str, id: &str, children: Vec<Value>) -> Value {
    let mut obj = Map::new();
    obj.insert("resource_type".to_string(), json!(kind));
    obj.insert("id".to_string(), json!(id));
    obj.insert("marked_for_delete".to_string(), json!(true));
    attach_children(&mut obj, children);

    let mut wrapper = match wrap(kind, obj) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    wrapper.insert("marked_for_delete".to_string(), json!(true));
    Value::Object(wrapper)
}

fn infra(child: Value) -> Value {
    json!({"resource_type": "Infra", "children": [child]})
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::{section_body, tier0_body, tier0_delete_body};
    use crate::catalog::Catalog;
    use crate::model::{PolicyPath, PolicyRef, RefSite, SectionSpec, TargetType, Tier0Spec};
    use crate::resolve::resolve_section;

    fn resolved_tier0(value: Value) -> Tier0Spec<PolicyPath> {
        let spec: Tier0Spec = serde_json::from_value(value).expect("tier0");
        spec.try_map_refs(|_: &RefSite, kind: TargetType, r: PolicyRef| -> Result<PolicyPath, ()> {
            Ok(PolicyPath(format!("/{kind}/{}", r.id.or(r.display_name).unwrap_or_default())))
        })
        .expect("map")
    }

    fn parse(body: &str) -> Value {
        serde_json::from_str(body).expect("json body")
    }

    #[test]
    fn section_update_carries_revision() {
        let spec: SectionSpec = serde_json::from_value(json!({
            "display_name": "S1",
            "stateful": true,
            "rules": [{"display_name": "R1", "action": "ALLOW", "sources": [{"target_type": "IPSet", "target_id": "ip-1"}]}]
        }))
        .expect("section");
        let resolved = resolve_section(spec, &Catalog::default()).expect("resolve");

        let create = parse(&section_body(&resolved, None).expect("create"));
        assert!(create.get("_revision").is_none());
        let update = parse(&section_body(&resolved, Some(4)).expect("update"));
        assert_eq!(update["_revision"], json!(4));
        assert_eq!(update["rules"][0]["sources"][0]["target_id"], json!("ip-1"));
    }

    fn resolved_section(rules: Value) -> String {
        let spec: SectionSpec = serde_json::from_value(json!({
            "display_name": "S1",
            "stateful": true,
            "rules": rules
        }))
        .expect("section");
        let resolved = resolve_section(spec, &Catalog::default()).expect("resolve");
        section_body(&resolved, Some(1)).expect("body")
    }

    #[test]
    fn reordered_references_give_identical_section_body() {
        let a = resolved_section(json!([{"display_name": "R1", "action": "ALLOW", "sources": [
            {"target_type": "IPSet", "target_id": "ip-2"},
            {"target_type": "NSGroup", "target_id": "ns-1"},
            {"target_type": "IPSet", "target_id": "ip-1"}
        ]}]));
        let b = resolved_section(json!([{"display_name": "R1", "action": "ALLOW", "sources": [
            {"target_type": "IPSet", "target_id": "ip-1"},
            {"target_type": "IPSet", "target_id": "ip-2"},
            {"target_type": "NSGroup", "target_id": "ns-1"}
        ]}]));
        assert_eq!(a, b);
    }

    #[test]
    fn rule_order_is_kept_as_written() {
        let body = parse(&resolved_section(json!([
            {"display_name": "R2", "action": "DROP"},
            {"display_name": "R1", "action": "ALLOW"}
        ])));
        assert_eq!(body["rules"][0]["display_name"], json!("R2"));
        assert_eq!(body["rules"][1]["display_name"], json!("R1"));
    }

    #[test]
    fn reordered_tier0_children_give_identical_body() {
        let route = |name: &str| json!({"display_name": name, "network": "0.0.0.0/0", "next_hops": [{"ip_address": "192.0.2.1"}]});
        let a = resolved_tier0(json!({"display_name": "T0", "static_routes": [route("b"), route("a")]}));
        let b = resolved_tier0(json!({"display_name": "T0", "static_routes": [route("a"), route("b")]}));
        assert_eq!(
            tier0_body(&a, None, None).expect("a"),
            tier0_body(&b, None, None).expect("b")
        );
    }

    #[test]
    fn tier0_create_nests_child_wrappers() {
        let spec = resolved_tier0(json!({
            "display_name": "T0",
            "ha_mode": "ACTIVE_STANDBY",
            "locale_services": [{
                "display_name": "default",
                "edge_cluster": {"id": "ec-1"},
                "interfaces": [{"display_name": "uplink", "subnets": [{"ip_addresses": ["192.0.2.2"], "prefix_len": 24}], "segment": {"display_name": "transit"}}],
                "bgp": {"local_as_num": "65001", "neighbors": [{"display_name": "peer", "address": "192.0.2.1", "remote_as_num": "65002"}]}
            }],
            "static_routes": [{"display_name": "default-route", "network": "0.0.0.0/0", "next_hops": [{"ip_address": "192.0.2.1"}]}]
        }));

        let body = parse(&tier0_body(&spec, None, None).expect("body"));
        assert_eq!(body["resource_type"], json!("Infra"));
        let tier0 = &body["children"][0]["Tier0"];
        assert_eq!(body["children"][0]["resource_type"], json!("ChildTier0"));
        assert_eq!(tier0["id"], json!("T0"));
        assert_eq!(tier0["ha_mode"], json!("ACTIVE_STANDBY"));
        assert!(tier0.get("locale_services").is_none());

        let ls = &tier0["children"][0]["LocaleServices"];
        assert_eq!(ls["id"], json!("default"));
        assert_eq!(ls["edge_cluster_path"], json!("/EdgeCluster/ec-1"));
        let iface = &ls["children"][0]["Tier0Interface"];
        assert_eq!(iface["segment_path"], json!("/Segment/transit"));
        let bgp = &ls["children"][1]["BgpRoutingConfig"];
        assert_eq!(bgp["id"], json!("bgp"));
        assert_eq!(
            bgp["children"][0]["BgpNeighborConfig"]["neighbor_address"],
            json!("192.0.2.1")
        );
        assert_eq!(
            tier0["children"][1]["StaticRoutes"]["network"],
            json!("0.0.0.0/0")
        );
    }

    #[test]
    fn tier0_update_reuses_ids_and_deletes_extras() {
        let spec = resolved_tier0(json!({
            "display_name": "T0",
            "locale_services": [{
                "display_name": "default",
                "interfaces": [
                    {"display_name": "uplink", "subnets": []},
                    {"display_name": "gone", "state": "absent", "subnets": []},
                    {"display_name": "never-existed", "state": "absent", "subnets": []}
                ]
            }]
        }));
        let existing = json!({
            "id": "t0-id",
            "display_name": "T0",
            "_revision": 2,
            "locale_services": [{
                "id": "ls-1",
                "display_name": "default",
                "interfaces": [
                    {"id": "if-1", "display_name": "uplink"},
                    {"id": "if-2", "display_name": "gone"},
                    {"id": "if-3", "display_name": "stray"}
                ]
            }]
        });

        let body = parse(&tier0_body(&spec, Some(&existing), Some(2)).expect("body"));
        let tier0 = &body["children"][0]["Tier0"];
        assert_eq!(tier0["id"], json!("t0-id"));
        assert_eq!(tier0["_revision"], json!(2));

        let ls = &tier0["children"][0]["LocaleServices"];
        assert_eq!(ls["id"], json!("ls-1"));
        let ifaces: Vec<(String, bool)> = ls["children"]
            .as_array()
            .expect("children")
            .iter()
            .map(|c| {
                (
                    c["Tier0Interface"]["id"].as_str().unwrap_or_default().to_string(),
                    c["marked_for_delete"].as_bool().unwrap_or(false),
                )
            })
            .collect();
        assert_eq!(
            ifaces,
            vec![
                ("if-1".to_string(), false),
                ("if-2".to_string(), true),
                ("if-3".to_string(), true),
            ]
        );
    }

    #[test]
    fn tier0_delete_marks_everything() {
        let existing = json!({
            "id": "t0-id",
            "static_routes": [{"id": "r1"}],
            "locale_services": [{
                "id": "ls-1",
                "interfaces": [{"id": "if-1"}],
                "bgp": {"id": "bgp", "neighbors": [{"id": "n-1"}]}
            }]
        });
        let body = parse(&tier0_delete_body(&existing).expect("body"));
        let wrapper = &body["children"][0];
        assert_eq!(wrapper["marked_for_delete"], json!(true));
        assert_eq!(wrapper["Tier0"]["id"], json!("t0-id"));
        let children = wrapper["Tier0"]["children"].as_array().expect("children");
        assert_eq!(children[0]["StaticRoutes"]["id"], json!("r1"));
        let ls = &children[1]["LocaleServices"];
        assert_eq!(ls["marked_for_delete"], json!(true));
        assert_eq!(ls["children"][0]["Tier0Interface"]["id"], json!("if-1"));
        assert_eq!(
            ls["children"][1]["BgpRoutingConfig"]["children"][0]["BgpNeighborConfig"]["id"],
            json!("n-1")
        );
    }
}
