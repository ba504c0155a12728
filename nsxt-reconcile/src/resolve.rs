//! Display-name references to stable identifiers.
//!
//! Resolution consumes the parsed spec and returns the resolved spec type,
//! so nothing downstream can hold a reference that still needs a name lookup.

use std::collections::BTreeSet;
use std::convert::Infallible;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{path_template, Bucket, Catalog, CatalogEntry, Lookup};
use crate::model::{
    EnforcementPoint, PolicyPath, PolicyRef, RefSite, Reference, ResolvedReference, SectionSpec,
    TargetType, Tier0Spec,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("mandatory parameter missing: no {target_type} objects are available for {owner} {field}")]
    MissingType {
        owner: String,
        field: &'static str,
        target_type: TargetType,
    },
    #[error("{target_type} '{name}' referenced by {owner} {field} exists more than once ({count} matches)")]
    Ambiguous {
        owner: String,
        field: &'static str,
        target_type: TargetType,
        name: String,
        count: usize,
    },
    #[error("unable to find item {target_type} '{name}' referenced by {owner} {field}")]
    NotFound {
        owner: String,
        field: &'static str,
        target_type: TargetType,
        name: String,
    },
    #[error("reference in {owner} {field} has neither a display name nor an id")]
    Incomplete { owner: String, field: &'static str },
    #[error("{kind} with display name '{name}' exists more than once ({count} matches)")]
    DuplicateResource {
        kind: &'static str,
        name: String,
        count: usize,
    },
    #[error("unable to find section '{name}' for section_placement {operation}")]
    AnchorNotFound {
        name: String,
        operation: &'static str,
    },
}

pub fn resolve_section(
    spec: SectionSpec,
    catalog: &Catalog,
) -> Result<SectionSpec<ResolvedReference>, ResolveError> {
    spec.try_map_refs(|site, r| resolve_reference(catalog, site, r))
}

pub fn resolve_tier0(spec: Tier0Spec, catalog: &Catalog) -> Result<Tier0Spec<PolicyPath>, ResolveError> {
    spec.try_map_refs(|site, kind, r| resolve_policy_ref(catalog, site, kind, r))
}

/// Resolve one manager API reference. References by id pass through untouched.
pub fn resolve_reference(
    catalog: &Catalog,
    site: &RefSite,
    reference: Reference,
) -> Result<ResolvedReference, ResolveError> {
    let target_type = reference.target_type;
    if target_type.is_identity() {
        let id = reference
            .target_id
            .or(reference.target_display_name)
            .ok_or_else(|| incomplete(site))?;
        return Ok(ResolvedReference {
            target_type,
            target_id: id,
            path: None,
        });
    }
    if let Some(id) = reference.target_id {
        return Ok(ResolvedReference {
            target_type,
            target_id: id,
            path: None,
        });
    }

    let name = reference
        .target_display_name
        .ok_or_else(|| incomplete(site))?;
    let entry = lookup(catalog, site, target_type, &name)?;
    debug!(owner = %site.owner, field = site.field, %target_type, name = %name, id = %entry.id, "resolved reference");
    Ok(ResolvedReference {
        target_type,
        target_id: entry.id.clone(),
        path: entry.path.clone(),
    })
}

/// Resolve one policy reference to a policy path.
pub fn resolve_policy_ref(
    catalog: &Catalog,
    site: &RefSite,
    kind: TargetType,
    reference: PolicyRef,
) -> Result<PolicyPath, ResolveError> {
    match kind {
        TargetType::EdgeCluster => return resolve_edge_cluster(catalog, site, reference),
        TargetType::EdgeNode => return resolve_edge_node(catalog, site, reference),
        _ => {}
    }
    if let Some(id) = reference.id {
        let listed = catalog
            .bucket(kind)
            .and_then(|b| b.find_by_id(&id))
            .and_then(|e| e.path.clone());
        return listed
            .or_else(|| path_template(kind, &id))
            .map(PolicyPath)
            .ok_or_else(|| not_found(site, kind, &id));
    }

    let name = reference.display_name.ok_or_else(|| incomplete(site))?;
    let entry = lookup(catalog, site, kind, &name)?;
    entry
        .path
        .clone()
        .or_else(|| path_template(kind, &entry.id))
        .map(PolicyPath)
        .ok_or_else(|| not_found(site, kind, &name))
}

/// Edge cluster path under the reference's enforcement point.
fn resolve_edge_cluster(
    catalog: &Catalog,
    site: &RefSite,
    reference: PolicyRef,
) -> Result<PolicyPath, ResolveError> {
    let point = reference.enforcement_point();
    if let Some(id) = &reference.id {
        return Ok(PolicyPath(point.edge_cluster_path(id)));
    }
    let name = reference.display_name.ok_or_else(|| incomplete(site))?;
    let entry = cluster_entry(catalog, site, &point, &name)?;
    Ok(PolicyPath(entry_path(entry, || point.edge_cluster_path(&entry.id))))
}

/// Edge node path, narrowed to the named edge cluster when the reference gives one.
///
/// A node id together with a cluster id needs no lookup. Otherwise the node
/// must be unique within the scope, since node ids repeat across clusters.
fn resolve_edge_node(
    catalog: &Catalog,
    site: &RefSite,
    reference: PolicyRef,
) -> Result<PolicyPath, ResolveError> {
    let point = reference.enforcement_point();
    let cluster = match (&reference.edge_cluster_id, &reference.edge_cluster_display_name) {
        (Some(id), _) => Some(id.clone()),
        (None, Some(name)) => Some(cluster_entry(catalog, site, &point, name)?.id.clone()),
        (None, None) => None,
    };
    if let (Some(id), Some(cluster)) = (&reference.id, &cluster) {
        return Ok(PolicyPath(point.edge_node_path(cluster, id)));
    }

    let scope = match &cluster {
        Some(cluster) => format!("{}/", point.edge_cluster_path(cluster)),
        None => format!("{}/", point.edge_clusters_path()),
    };
    let (wanted, entry) = match (reference.id, reference.display_name) {
        (Some(id), _) => {
            let found = lookup_in(catalog, site, TargetType::EdgeNode, &id, |b| {
                b.lookup_id_under(&id, &scope)
            })?;
            (id, found)
        }
        (None, Some(name)) => {
            let found = lookup_in(catalog, site, TargetType::EdgeNode, &name, |b| {
                b.lookup_under(&name, &scope)
            })?;
            (name, found)
        }
        (None, None) => return Err(incomplete(site)),
    };
    entry
        .path
        .clone()
        .map(PolicyPath)
        .ok_or_else(|| not_found(site, TargetType::EdgeNode, &wanted))
}

fn cluster_entry<'c>(
    catalog: &'c Catalog,
    site: &RefSite,
    point: &EnforcementPoint,
    name: &str,
) -> Result<&'c CatalogEntry, ResolveError> {
    let scope = format!("{}/", point.edge_clusters_path());
    lookup_in(catalog, site, TargetType::EdgeCluster, name, |b| b.lookup_under(name, &scope))
}

fn entry_path(entry: &CatalogEntry, fallback: impl FnOnce() -> String) -> String {
    entry.path.clone().unwrap_or_else(fallback)
}

fn lookup<'c>(
    catalog: &'c Catalog,
    site: &RefSite,
    kind: TargetType,
    name: &str,
) -> Result<&'c CatalogEntry, ResolveError> {
    lookup_in(catalog, site, kind, name, |b| b.lookup(name))
}

fn lookup_in<'c>(
    catalog: &'c Catalog,
    site: &RefSite,
    kind: TargetType,
    name: &str,
    find: impl FnOnce(&'c Bucket) -> Lookup<'c>,
) -> Result<&'c CatalogEntry, ResolveError> {
    let bucket = catalog.bucket(kind).ok_or_else(|| ResolveError::MissingType {
        owner: site.owner.clone(),
        field: site.field,
        target_type: kind,
    })?;
    match find(bucket) {
        Lookup::Found(entry) => Ok(entry),
        Lookup::Ambiguous(count) => Err(ResolveError::Ambiguous {
            owner: site.owner.clone(),
            field: site.field,
            target_type: kind,
            name: name.to_string(),
            count,
        }),
        Lookup::Missing => Err(not_found(site, kind, name)),
    }
}

fn incomplete(site: &RefSite) -> ResolveError {
    ResolveError::Incomplete {
        owner: site.owner.clone(),
        field: site.field,
    }
}

fn not_found(site: &RefSite, kind: TargetType, name: &str) -> ResolveError {
    ResolveError::NotFound {
        owner: site.owner.clone(),
        field: site.field,
        target_type: kind,
        name: name.to_string(),
    }
}

/// Types a firewall section needs looked up by name.
pub fn section_lookup_types(spec: &SectionSpec) -> Vec<TargetType> {
    let mut kinds = BTreeSet::new();
    let _ = spec.clone().try_map_refs(|_, r| {
        if r.target_id.is_none() && !r.target_type.is_identity() {
            kinds.insert(r.target_type);
        }
        Ok::<_, Infallible>(())
    });
    kinds.into_iter().collect()
}

/// Types a Tier-0 tree needs from the catalog.
///
/// An edge node by id still needs the catalog unless its cluster is known,
/// and a cluster given by name needs the edge cluster listing.
pub fn tier0_lookup_types(spec: &Tier0Spec) -> Vec<TargetType> {
    let mut kinds = BTreeSet::new();
    let _ = spec.clone().try_map_refs(|_, kind, r| {
        match kind {
            TargetType::EdgeNode => {
                if r.edge_cluster_id.is_none() && r.edge_cluster_display_name.is_some() {
                    kinds.insert(TargetType::EdgeCluster);
                }
                if r.id.is_none() || !r.has_cluster_scope() {
                    kinds.insert(kind);
                }
            }
            _ if r.id.is_none() => {
                kinds.insert(kind);
            }
            _ => {}
        }
        Ok::<_, Infallible>(())
    });
    kinds.into_iter().collect()
}

/// Enforcement points whose edge clusters and nodes the Tier-0 tree refers to.
pub fn tier0_enforcement_points(spec: &Tier0Spec) -> Vec<EnforcementPoint> {
    let mut points = BTreeSet::new();
    let _ = spec.clone().try_map_refs(|_, kind, r| {
        if kind.is_edge() {
            points.insert(r.enforcement_point());
        }
        Ok::<_, Infallible>(())
    });
    if points.is_empty() {
        points.insert(EnforcementPoint::default());
    }
    points.into_iter().collect()
}

/// The one listed object carrying `name`, if any. Two or more is an error.
pub fn find_by_display_name<'a>(
    items: &'a [Value],
    kind: &'static str,
    name: &str,
) -> Result<Option<&'a Value>, ResolveError> {
    let matches: Vec<&Value> = items
        .iter()
        .filter(|item| item.get("display_name").and_then(Value::as_str) == Some(name))
        .collect();
    match matches.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        many => Err(ResolveError::DuplicateResource {
            kind,
            name: name.to_string(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        find_by_display_name, resolve_section, resolve_tier0, section_lookup_types,
        tier0_enforcement_points, tier0_lookup_types, ResolveError,
    };
    use crate::catalog::{Bucket, Catalog};
    use crate::model::{EnforcementPoint, SectionSpec, TargetType, Tier0Spec};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.insert_bucket(
            TargetType::NsGroup,
            Bucket::from_items(&[
                json!({"id": "ns-1", "display_name": "G1"}),
                json!({"id": "ns-2", "display_name": "dup"}),
                json!({"id": "ns-3", "display_name": "dup"}),
            ]),
        );
        catalog.insert_bucket(
            TargetType::EdgeNode,
            Bucket::from_items(&[json!({
                "id": "0",
                "display_name": "en-a",
                "path": "/infra/sites/default/enforcement-points/default/edge-clusters/ec-1/edge-nodes/0"
            })]),
        );
        catalog.insert_bucket(
            TargetType::Segment,
            Bucket::from_items(&[json!({"id": "seg-1", "display_name": "transit", "path": "/infra/segments/seg-1"})]),
        );
        catalog
    }

    fn section(sources: serde_json::Value) -> SectionSpec {
        serde_json::from_value(json!({
            "display_name": "S1",
            "stateful": true,
            "rules": [{"display_name": "R1", "action": "ALLOW", "sources": sources}]
        }))
        .expect("section")
    }

    #[test]
    fn names_become_ids() {
        let spec = section(json!([
            {"target_type": "NSGroup", "target_display_name": "G1"},
            {"target_type": "IPAddress", "target_display_name": "10.0.0.1"},
            {"target_type": "IPSet", "target_id": "ip-7"}
        ]));
        let resolved = resolve_section(spec, &catalog()).expect("resolve");
        let wire = serde_json::to_value(&resolved).expect("serialize");
        assert_eq!(
            wire["rules"][0]["sources"],
            json!([
                {"target_type": "NSGroup", "target_id": "ns-1"},
                {"target_type": "IPAddress", "target_id": "10.0.0.1"},
                {"target_type": "IPSet", "target_id": "ip-7"}
            ])
        );
    }

    #[test]
    fn ambiguous_name_is_rejected() {
        let spec = section(json!([{"target_type": "NSGroup", "target_display_name": "dup"}]));
        let err = resolve_section(spec, &catalog()).expect_err("ambiguous");
        assert!(matches!(err, ResolveError::Ambiguous { count: 2, .. }));
        assert!(err.to_string().contains("FirewallSection[S1].rules[R1] sources"));
        assert!(err.to_string().contains("exists more than once"));
    }

    #[test]
    fn unknown_name_and_unknown_type_fail() {
        let spec = section(json!([{"target_type": "NSGroup", "target_display_name": "G9"}]));
        let err = resolve_section(spec, &catalog()).expect_err("missing");
        assert!(err.to_string().starts_with("unable to find item NSGroup 'G9'"));

        let spec = section(json!([{"target_type": "IPSet", "target_display_name": "web"}]));
        let err = resolve_section(spec, &catalog()).expect_err("no bucket");
        assert!(matches!(
            err,
            ResolveError::MissingType { target_type: TargetType::IpSet, .. }
        ));
    }

    #[test]
    fn lookup_types_skip_ids_and_identity_types() {
        let spec = section(json!([
            {"target_type": "NSGroup", "target_display_name": "G1"},
            {"target_type": "IPAddress", "target_display_name": "10.0.0.1"},
            {"target_type": "IPSet", "target_id": "ip-7"}
        ]));
        assert_eq!(section_lookup_types(&spec), vec![TargetType::NsGroup]);
    }

    #[test]
    fn tier0_references_become_paths() {
        let spec: Tier0Spec = serde_json::from_value(json!({
            "display_name": "T0",
            "locale_services": [{
                "display_name": "default",
                "edge_cluster": {"id": "ec-1"},
                "interfaces": [{
                    "display_name": "uplink",
                    "subnets": [],
                    "segment": {"display_name": "transit"},
                    "edge_node": {"id": "0"}
                }]
            }]
        }))
        .expect("tier0");
        assert_eq!(
            tier0_lookup_types(&spec),
            vec![TargetType::Segment, TargetType::EdgeNode]
        );

        let resolved = resolve_tier0(spec, &catalog()).expect("resolve");
        let wire = serde_json::to_value(&resolved).expect("serialize");
        let ls = &wire["locale_services"][0];
        assert_eq!(
            ls["edge_cluster_path"],
            json!("/infra/sites/default/enforcement-points/default/edge-clusters/ec-1")
        );
        assert_eq!(ls["interfaces"][0]["segment_path"], json!("/infra/segments/seg-1"));
        assert_eq!(
            ls["interfaces"][0]["edge_path"],
            json!("/infra/sites/default/enforcement-points/default/edge-clusters/ec-1/edge-nodes/0")
        );
    }

    fn interface_edge_node(edge_node: serde_json::Value) -> Tier0Spec {
        serde_json::from_value(json!({
            "display_name": "T0",
            "locale_services": [{
                "display_name": "default",
                "interfaces": [{"display_name": "uplink", "subnets": [], "edge_node": edge_node}]
            }]
        }))
        .expect("tier0")
    }

    fn two_cluster_catalog() -> Catalog {
        let base = "/infra/sites/default/enforcement-points/default/edge-clusters";
        let mut catalog = Catalog::default();
        catalog.insert_bucket(
            TargetType::EdgeCluster,
            Bucket::from_items(&[
                json!({"id": "ec-1", "display_name": "edge-a", "path": format!("{base}/ec-1")}),
                json!({"id": "ec-2", "display_name": "edge-b", "path": format!("{base}/ec-2")}),
            ]),
        );
        catalog.insert_bucket(
            TargetType::EdgeNode,
            Bucket::from_items(&[
                json!({"id": "0", "display_name": "en", "path": format!("{base}/ec-1/edge-nodes/0")}),
                json!({"id": "0", "display_name": "en", "path": format!("{base}/ec-2/edge-nodes/0")}),
            ]),
        );
        catalog
    }

    #[test]
    fn edge_node_needs_its_cluster_when_ids_repeat() {
        let spec = interface_edge_node(json!({"id": "0"}));
        let err = resolve_tier0(spec, &two_cluster_catalog()).expect_err("ambiguous");
        assert!(matches!(err, ResolveError::Ambiguous { count: 2, .. }));

        let spec = interface_edge_node(json!({"display_name": "en", "edge_cluster_display_name": "edge-b"}));
        assert_eq!(
            tier0_lookup_types(&spec),
            vec![TargetType::EdgeCluster, TargetType::EdgeNode]
        );
        let resolved = resolve_tier0(spec, &two_cluster_catalog()).expect("resolve");
        let wire = serde_json::to_value(&resolved).expect("serialize");
        assert_eq!(
            wire["locale_services"][0]["interfaces"][0]["edge_path"],
            json!("/infra/sites/default/enforcement-points/default/edge-clusters/ec-2/edge-nodes/0")
        );
    }

    #[test]
    fn edge_node_by_id_and_cluster_id_needs_no_catalog() {
        let spec = interface_edge_node(json!({
            "id": "1",
            "edge_cluster_id": "ec-7",
            "site_id": "paris",
            "enforcementpoint_id": "ep-2"
        }));
        assert!(tier0_lookup_types(&spec).is_empty());
        assert_eq!(
            tier0_enforcement_points(&spec),
            vec![EnforcementPoint::new("paris", "ep-2")]
        );
        let resolved = resolve_tier0(spec, &Catalog::default()).expect("resolve");
        let wire = serde_json::to_value(&resolved).expect("serialize");
        assert_eq!(
            wire["locale_services"][0]["interfaces"][0]["edge_path"],
            json!("/infra/sites/paris/enforcement-points/ep-2/edge-clusters/ec-7/edge-nodes/1")
        );
    }

    #[test]
    fn duplicate_existing_resource_is_an_error() {
        let items = vec![
            json!({"id": "a", "display_name": "S1"}),
            json!({"id": "b", "display_name": "S1"}),
        ];
        let err = find_by_display_name(&items, "FirewallSection", "S1").expect_err("dup");
        assert_eq!(
            err.to_string(),
            "FirewallSection with display name 'S1' exists more than once (2 matches)"
        );
        assert!(find_by_display_name(&items, "FirewallSection", "S2")
            .expect("lookup")
            .is_none());
    }
}
