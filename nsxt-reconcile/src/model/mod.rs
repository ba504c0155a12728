//! Desired-state model.
//!
//! Input documents deserialize into [`DesiredResource`]. Resource specs are
//! generic over their reference type: the parsed form carries display-name
//! references, the resolved form carries only identifiers and paths, so a
//! raw name cannot reach the diff or the wire body.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod firewall;
pub mod tier0;

pub use firewall::SectionSpec;
pub use tier0::Tier0Spec;

/// Whether the resource should exist after the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

impl State {
    pub fn is_absent(&self) -> bool {
        matches!(self, State::Absent)
    }
}

/// Resource types that can be the target of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetType {
    #[serde(rename = "NSGroup")]
    NsGroup,
    #[serde(rename = "IPSet")]
    IpSet,
    LogicalSwitch,
    LogicalPort,
    #[serde(rename = "NSProfile")]
    NsProfile,
    #[serde(rename = "NSServiceGroup")]
    NsServiceGroup,
    #[serde(rename = "NSService")]
    NsService,
    #[serde(rename = "IPAddress")]
    IpAddress,
    Segment,
    EdgeCluster,
    EdgeNode,
    DhcpRelayConfig,
    Ipv6NdraProfile,
    Ipv6DadProfile,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::NsGroup => "NSGroup",
            TargetType::IpSet => "IPSet",
            TargetType::LogicalSwitch => "LogicalSwitch",
            TargetType::LogicalPort => "LogicalPort",
            TargetType::NsProfile => "NSProfile",
            TargetType::NsServiceGroup => "NSServiceGroup",
            TargetType::NsService => "NSService",
            TargetType::IpAddress => "IPAddress",
            TargetType::Segment => "Segment",
            TargetType::EdgeCluster => "EdgeCluster",
            TargetType::EdgeNode => "EdgeNode",
            TargetType::DhcpRelayConfig => "DhcpRelayConfig",
            TargetType::Ipv6NdraProfile => "Ipv6NdraProfile",
            TargetType::Ipv6DadProfile => "Ipv6DadProfile",
        }
    }

    /// Types whose display name is the identifier itself.
    pub fn is_identity(&self) -> bool {
        matches!(self, TargetType::IpAddress)
    }

    /// Types that live under a site and enforcement point.
    pub fn is_edge(&self) -> bool {
        matches!(self, TargetType::EdgeCluster | TargetType::EdgeNode)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manager API reference as written in the desired file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    pub target_type: TargetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// Reference after catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub target_type: TargetType,
    pub target_id: String,
    /// Policy path when the catalog returned one.
    #[serde(skip)]
    pub path: Option<String>,
}

/// Policy API reference as written in the desired file.
///
/// Edge clusters and edge nodes may be scoped to a site and enforcement
/// point (both `default` when unset); an edge node may also name the edge
/// cluster holding it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcementpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cluster_display_name: Option<String>,
}

impl PolicyRef {
    pub fn enforcement_point(&self) -> EnforcementPoint {
        EnforcementPoint::new(
            self.site_id.as_deref().unwrap_or(DEFAULT_SCOPE),
            self.enforcementpoint_id.as_deref().unwrap_or(DEFAULT_SCOPE),
        )
    }

    pub fn has_site_scope(&self) -> bool {
        self.site_id.is_some() || self.enforcementpoint_id.is_some()
    }

    pub fn has_cluster_scope(&self) -> bool {
        self.edge_cluster_id.is_some() || self.edge_cluster_display_name.is_some()
    }
}

const DEFAULT_SCOPE: &str = "default";

/// Site and enforcement point that edge clusters and edge nodes live under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnforcementPoint {
    pub site_id: String,
    pub enforcementpoint_id: String,
}

impl Default for EnforcementPoint {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE, DEFAULT_SCOPE)
    }
}

impl EnforcementPoint {
    pub fn new(site_id: &str, enforcementpoint_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            enforcementpoint_id: enforcementpoint_id.to_string(),
        }
    }

    /// Policy path prefix shared by every edge cluster of this enforcement point.
    pub fn edge_clusters_path(&self) -> String {
        format!(
            "/infra/sites/{}/enforcement-points/{}/edge-clusters",
            self.site_id, self.enforcementpoint_id
        )
    }

    pub fn edge_cluster_path(&self, cluster_id: &str) -> String {
        format!("{}/{cluster_id}", self.edge_clusters_path())
    }

    pub fn edge_node_path(&self, cluster_id: &str, node_id: &str) -> String {
        format!("{}/edge-nodes/{node_id}", self.edge_cluster_path(cluster_id))
    }
}

/// Resolved policy path, serialized as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyPath(pub String);

impl PolicyPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub tag: String,
}

/// Where a reference sits in the desired tree, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSite {
    /// Owner path such as `FirewallSection[S1].rules[R1]`.
    pub owner: String,
    pub field: &'static str,
}

impl RefSite {
    pub fn new(owner: &str, field: &'static str) -> Self {
        Self {
            owner: owner.to_string(),
            field,
        }
    }
}

/// One top-level resource to reconcile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DesiredResource {
    FirewallSection(SectionSpec),
    Tier0(Tier0Spec),
}

impl DesiredResource {
    /// Label used in logs and outcome messages.
    pub fn label(&self) -> String {
        match self {
            DesiredResource::FirewallSection(spec) => spec.label(),
            DesiredResource::Tier0(spec) => spec.label(),
        }
    }

    pub fn state(&self) -> State {
        match self {
            DesiredResource::FirewallSection(spec) => spec.state,
            DesiredResource::Tier0(spec) => spec.state,
        }
    }
}

/// Errors returned when loading a desired-state file.
#[derive(Debug, Error)]
pub enum DesiredLoadError {
    #[error("failed to read desired state file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse desired state file {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("failed to parse desired state file {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Load a desired resource from TOML, or from JSON when the extension is `.json`.
pub fn load_desired(path: &Path) -> Result<DesiredResource, DesiredLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| DesiredLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw).map_err(|source| DesiredLoadError::Json {
            path: path.display().to_string(),
            source,
        })
    } else {
        toml::from_str(&raw).map_err(|source| DesiredLoadError::Toml {
            path: path.display().to_string(),
            source,
        })
    }
}
