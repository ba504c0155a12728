//! Per-run snapshot of the objects references can point at.
//!
//! Each resource type gets a bucket keyed by display name. A bucket keeps
//! every entry seen for a name, so a name listed twice stays visible as
//! ambiguous instead of silently resolving to whichever entry came last.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::model::{EnforcementPoint, TargetType};
use crate::remote::list_all;
use crate::transport::{Transport, TransportError};

const POLICY_API: &str = "/policy/api/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub path: Option<String>,
}

/// Result of looking a display name up in one bucket.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a CatalogEntry),
    Ambiguous(usize),
    Missing,
}

#[derive(Debug, Clone, Default)]
pub struct Bucket {
    by_name: BTreeMap<String, Vec<CatalogEntry>>,
}

impl Bucket {
    /// Build a bucket from listing results; entries without a name or id are skipped.
    pub fn from_items(items: &[Value]) -> Self {
        let mut bucket = Self::default();
        for item in items {
            let (Some(name), Some(id)) = (
                item.get("display_name").and_then(Value::as_str),
                item.get("id").and_then(Value::as_str),
            ) else {
                continue;
            };
            let path = item.get("path").and_then(Value::as_str).map(str::to_string);
            bucket.insert(
                name,
                CatalogEntry {
                    id: id.to_string(),
                    path,
                },
            );
        }
        bucket
    }

    pub fn insert(&mut self, name: &str, entry: CatalogEntry) {
        self.by_name.entry(name.to_string()).or_default().push(entry);
    }

    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        self.lookup_under(name, "")
    }

    /// Name lookup restricted to entries whose policy path starts with `prefix`.
    pub fn lookup_under(&self, name: &str, prefix: &str) -> Lookup<'_> {
        let entries = self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter(|e| e.is_under(prefix));
        pick(entries)
    }

    /// Id lookup restricted like [`Bucket::lookup_under`]; edge node ids repeat across clusters.
    pub fn lookup_id_under(&self, id: &str, prefix: &str) -> Lookup<'_> {
        let entries = self
            .by_name
            .values()
            .flatten()
            .filter(|e| e.id == id && e.is_under(prefix));
        pick(entries)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_name.values().flatten().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl CatalogEntry {
    fn is_under(&self, prefix: &str) -> bool {
        prefix.is_empty() || self.path.as_deref().is_some_and(|p| p.starts_with(prefix))
    }
}

fn pick<'a>(mut entries: impl Iterator<Item = &'a CatalogEntry>) -> Lookup<'a> {
    match (entries.next(), entries.count()) {
        (None, _) => Lookup::Missing,
        (Some(entry), 0) => Lookup::Found(entry),
        (Some(_), rest) => Lookup::Ambiguous(rest + 1),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    buckets: BTreeMap<TargetType, Bucket>,
}

impl Catalog {
    pub fn insert_bucket(&mut self, kind: TargetType, bucket: Bucket) {
        self.buckets.insert(kind, bucket);
    }

    pub fn bucket(&self, kind: TargetType) -> Option<&Bucket> {
        self.buckets.get(&kind)
    }
}

/// Listing endpoint for a type, when it has a flat one.
pub fn list_endpoint(kind: TargetType) -> Option<&'static str> {
    match kind {
        TargetType::NsGroup => Some("/api/v1/ns-groups"),
        TargetType::IpSet => Some("/api/v1/ip-sets"),
        TargetType::LogicalSwitch => Some("/api/v1/logical-switches"),
        TargetType::LogicalPort => Some("/api/v1/logical-ports"),
        TargetType::NsProfile => Some("/api/v1/ns-profiles"),
        TargetType::NsServiceGroup => Some("/api/v1/ns-service-groups"),
        TargetType::NsService => Some("/api/v1/ns-services"),
        TargetType::Segment => Some("/policy/api/v1/infra/segments"),
        TargetType::DhcpRelayConfig => Some("/policy/api/v1/infra/dhcp-relay-configs"),
        TargetType::Ipv6NdraProfile => Some("/policy/api/v1/infra/ipv6-ndra-profiles"),
        TargetType::Ipv6DadProfile => Some("/policy/api/v1/infra/ipv6-dad-profiles"),
        TargetType::EdgeCluster | TargetType::EdgeNode | TargetType::IpAddress => None,
    }
}

/// Policy path of an object of `kind` with the given id, when it can be derived without a lookup.
///
/// Edge paths depend on their enforcement point; see [`EnforcementPoint`].
pub fn path_template(kind: TargetType, id: &str) -> Option<String> {
    match kind {
        TargetType::Segment => Some(format!("/infra/segments/{id}")),
        TargetType::DhcpRelayConfig => Some(format!("/infra/dhcp-relay-configs/{id}")),
        TargetType::Ipv6NdraProfile => Some(format!("/infra/ipv6-ndra-profiles/{id}")),
        TargetType::Ipv6DadProfile => Some(format!("/infra/ipv6-dad-profiles/{id}")),
        _ => None,
    }
}

/// Snapshot one bucket per requested type, with edges from the default enforcement point.
pub fn snapshot(transport: &dyn Transport, kinds: &[TargetType]) -> Result<Catalog, TransportError> {
    snapshot_in(transport, kinds, &[EnforcementPoint::default()])
}

/// Snapshot one bucket per requested type.
///
/// Edge clusters and edge nodes are collected from every enforcement point in
/// `points`; edge nodes have no flat listing and are read cluster by cluster.
pub fn snapshot_in(
    transport: &dyn Transport,
    kinds: &[TargetType],
    points: &[EnforcementPoint],
) -> Result<Catalog, TransportError> {
    let mut catalog = Catalog::default();
    for &kind in kinds {
        let bucket = match kind {
            TargetType::IpAddress => continue,
            TargetType::EdgeCluster => Bucket::from_items(&list_edge_clusters(transport, points)?),
            TargetType::EdgeNode => Bucket::from_items(&list_edge_nodes(transport, points)?),
            _ => match list_endpoint(kind) {
                Some(endpoint) => Bucket::from_items(&list_all(transport, endpoint)?),
                None => continue,
            },
        };
        debug!(kind = %kind, entries = bucket.len(), "catalog bucket loaded");
        catalog.insert_bucket(kind, bucket);
    }
    Ok(catalog)
}

fn list_edge_clusters(
    transport: &dyn Transport,
    points: &[EnforcementPoint],
) -> Result<Vec<Value>, TransportError> {
    let mut clusters = Vec::new();
    for point in points {
        let listed = list_all(transport, &format!("{POLICY_API}{}", point.edge_clusters_path()))?;
        clusters.extend(listed.into_iter().map(|mut cluster| {
            let path = cluster
                .get("id")
                .and_then(Value::as_str)
                .map(|id| point.edge_cluster_path(id));
            fill_path(&mut cluster, path);
            cluster
        }));
    }
    Ok(clusters)
}

fn list_edge_nodes(
    transport: &dyn Transport,
    points: &[EnforcementPoint],
) -> Result<Vec<Value>, TransportError> {
    let mut nodes = Vec::new();
    for point in points {
        let clusters = list_all(transport, &format!("{POLICY_API}{}", point.edge_clusters_path()))?;
        for cluster in clusters {
            let Some(cluster_id) = cluster.get("id").and_then(Value::as_str) else {
                continue;
            };
            let listing = format!("{POLICY_API}{}/edge-nodes", point.edge_cluster_path(cluster_id));
            nodes.extend(list_all(transport, &listing)?.into_iter().map(|mut node| {
                let path = node
                    .get("id")
                    .and_then(Value::as_str)
                    .map(|id| point.edge_node_path(cluster_id, id));
                fill_path(&mut node, path);
                node
            }));
        }
    }
    Ok(nodes)
}

/// Listings normally carry `path`; derive it when the manager left it out.
fn fill_path(item: &mut Value, path: Option<String>) {
    if let (Some(obj), Some(path)) = (item.as_object_mut(), path) {
        obj.entry("path").or_insert(Value::String(path));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{snapshot, snapshot_in, Bucket, Lookup};
    use crate::model::{EnforcementPoint, TargetType};
    use crate::transport::fake::FakeTransport;
    use crate::transport::Method;

    #[test]
    fn duplicate_names_are_ambiguous() {
        let bucket = Bucket::from_items(&[
            json!({"id": "ns-1", "display_name": "G1"}),
            json!({"id": "ns-2", "display_name": "G1"}),
            json!({"id": "ns-3", "display_name": "G2"}),
            json!({"display_name": "no-id"}),
        ]);
        assert_eq!(bucket.lookup("G1"), Lookup::Ambiguous(2));
        assert!(matches!(bucket.lookup("G2"), Lookup::Found(e) if e.id == "ns-3"));
        assert_eq!(bucket.lookup("no-id"), Lookup::Missing);
        assert_eq!(bucket.len(), 3);
        assert_eq!(bucket.find_by_id("ns-2").map(|e| e.id.as_str()), Some("ns-2"));
    }

    #[test]
    fn edge_nodes_are_listed_per_cluster() {
        let clusters = "/policy/api/v1/infra/sites/default/enforcement-points/default/edge-clusters";
        let transport = FakeTransport::new()
            .on(Method::Get, clusters, json!({"results": [{"id": "ec-1", "display_name": "edge"}]}))
            .on(
                Method::Get,
                &format!("{clusters}/ec-1/edge-nodes"),
                json!({"results": [{"id": "0", "display_name": "en-a", "path": "/infra/sites/default/enforcement-points/default/edge-clusters/ec-1/edge-nodes/0"}]}),
            );

        let catalog = snapshot(&transport, &[TargetType::EdgeNode, TargetType::IpAddress])
            .expect("snapshot");
        let bucket = catalog.bucket(TargetType::EdgeNode).expect("bucket");
        match bucket.lookup("en-a") {
            Lookup::Found(entry) => assert!(entry
                .path
                .as_deref()
                .is_some_and(|p| p.ends_with("/edge-nodes/0"))),
            other => panic!("unexpected lookup: {other:?}"),
        }
        assert!(catalog.bucket(TargetType::IpAddress).is_none());
    }

    #[test]
    fn scoped_lookups_filter_by_path() {
        let bucket = Bucket::from_items(&[
            json!({"id": "0", "display_name": "en-a", "path": "/infra/sites/default/enforcement-points/default/edge-clusters/ec-1/edge-nodes/0"}),
            json!({"id": "0", "display_name": "en-a", "path": "/infra/sites/default/enforcement-points/default/edge-clusters/ec-2/edge-nodes/0"}),
        ]);
        let ec1 = "/infra/sites/default/enforcement-points/default/edge-clusters/ec-1/";
        assert_eq!(bucket.lookup("en-a"), Lookup::Ambiguous(2));
        assert!(matches!(bucket.lookup_under("en-a", ec1), Lookup::Found(_)));
        assert_eq!(bucket.lookup_id_under("0", "/infra/"), Lookup::Ambiguous(2));
        assert!(matches!(bucket.lookup_id_under("0", ec1), Lookup::Found(_)));
        assert_eq!(bucket.lookup_under("en-a", "/infra/sites/paris/"), Lookup::Missing);
    }

    #[test]
    fn edge_clusters_are_listed_per_enforcement_point_with_paths() {
        let paris = "/policy/api/v1/infra/sites/paris/enforcement-points/ep-2/edge-clusters";
        let transport = FakeTransport::new().on(
            Method::Get,
            paris,
            json!({"results": [{"id": "c1", "display_name": "edge"}]}),
        );

        let catalog = snapshot_in(
            &transport,
            &[TargetType::EdgeCluster],
            &[EnforcementPoint::new("paris", "ep-2")],
        )
        .expect("snapshot");
        match catalog.bucket(TargetType::EdgeCluster).expect("bucket").lookup("edge") {
            Lookup::Found(entry) => assert_eq!(
                entry.path.as_deref(),
                Some("/infra/sites/paris/enforcement-points/ep-2/edge-clusters/c1")
            ),
            other => panic!("unexpected lookup: {other:?}"),
        }
    }
}
