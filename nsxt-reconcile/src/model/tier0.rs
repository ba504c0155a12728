//! Tier-0 gateway tree: locale services, interfaces, BGP, neighbors, static routes.
//!
//! Policy references (`edge_cluster`, `segment`, ...) are written by id or
//! display name in the input and serialize as policy paths under their wire
//! names (`edge_cluster_path`, `segment_path`, ...).

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

use super::{PolicyRef, RefSite, State, Tag, TargetType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct Tier0Spec<R = PolicyRef> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ha_mode: Option<HaMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_mode: Option<FailoverMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_firewall: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_whitelisting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rule_logging: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transit_subnets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_transit_subnets: Option<Vec<String>>,
    #[serde(
        rename(serialize = "dhcp_config_paths", deserialize = "dhcp_config"),
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "as_single_item_list"
    )]
    pub dhcp_config: Option<R>,
    #[serde(
        rename(serialize = "ipv6_profile_paths", deserialize = "ipv6_profiles"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ipv6_profiles: Option<Ipv6Profiles<R>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_routes: Option<Vec<StaticRouteSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_services: Option<Vec<LocaleServiceSpec<R>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct LocaleServiceSpec<R = PolicyRef> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub state: State,
    #[serde(
        rename(serialize = "edge_cluster_path", deserialize = "edge_cluster"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub edge_cluster: Option<R>,
    #[serde(
        rename(serialize = "preferred_edge_paths", deserialize = "preferred_edge_nodes"),
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub preferred_edge_nodes: Vec<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_redistribution_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ha_vip_configs: Option<Vec<HaVipConfig>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<InterfaceSpec<R>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgp: Option<BgpSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct InterfaceSpec<R = PolicyRef> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub state: State,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<InterfaceType>,
    pub subnets: Vec<Subnet>,
    #[serde(
        rename(serialize = "segment_path", deserialize = "segment"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub segment: Option<R>,
    #[serde(
        rename(serialize = "edge_path", deserialize = "edge_node"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub edge_node: Option<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urpf_mode: Option<UrpfMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BgpSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_as_num: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecmp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inter_sr_ibgp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipath_relax: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graceful_restart_config: Option<GracefulRestartConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_aggregations: Option<Vec<RouteAggregation>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<Vec<NeighborSpec>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteAggregation {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_only: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GracefulRestartConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<GracefulRestartMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<GracefulRestartTimer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GracefulRestartTimer {
    pub restart_timer: u32,
    pub stale_route_timer: u32,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeighborSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub state: State,
    #[serde(rename(serialize = "neighbor_address", deserialize = "address"))]
    pub address: String,
    pub remote_as_num: String,
    /// Write-only on the manager; never compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_down_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_hop_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bfd: Option<BfdConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_as_in: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graceful_restart_mode: Option<GracefulRestartMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_filtering: Option<Vec<RouteFiltering>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl std::fmt::Debug for NeighborSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighborSpec")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("state", &self.state)
            .field("address", &self.address)
            .field("remote_as_num", &self.remote_as_num)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Address family toggle and prefix-list or route-map paths per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteFiltering {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_family: Option<AddressFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_route_filters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_route_filters: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BfdConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticRouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub state: State,
    pub network: String,
    pub next_hops: Vec<NextHop>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NextHop {
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_distance: Option<u32>,
    /// Interface paths limiting where the next hop applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subnet {
    pub ip_addresses: Vec<String>,
    pub prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HaVipConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub vip_subnets: Vec<Subnet>,
    pub external_interface_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HaMode {
    ActiveActive,
    ActiveStandby,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailoverMode {
    Preemptive,
    NonPreemptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceType {
    External,
    Service,
    Loopback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrpfMode {
    None,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GracefulRestartMode {
    Disable,
    HelperOnly,
    GrAndHelper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    #[serde(rename = "IPV4")]
    Ipv4,
    #[serde(rename = "IPV6")]
    Ipv6,
    #[serde(rename = "VPN")]
    Vpn,
}

/// NDRA and DAD profiles of a Tier-0, sent together as `ipv6_profile_paths`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub struct Ipv6Profiles<R = PolicyRef> {
    #[serde(default)]
    pub ndra: Option<R>,
    #[serde(default)]
    pub dad: Option<R>,
}

impl<R: Serialize> Serialize for Ipv6Profiles<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for profile in self.ndra.iter().chain(self.dad.iter()) {
            seq.serialize_element(profile)?;
        }
        seq.end()
    }
}

fn as_single_item_list<R: Serialize, S: Serializer>(
    value: &Option<R>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(value.iter())
}

/// Display name, falling back to the id.
fn key_of<'a>(display_name: &'a Option<String>, id: &'a Option<String>) -> &'a str {
    display_name
        .as_deref()
        .or(id.as_deref())
        .unwrap_or("<unnamed>")
}

impl<R> Tier0Spec<R> {
    pub fn key(&self) -> &str {
        key_of(&self.display_name, &self.id)
    }

    pub fn label(&self) -> String {
        format!("Tier0[{}]", self.key())
    }

    /// Rewrite every policy reference; `f` also receives the type the field points at.
    pub fn try_map_refs<S, E>(
        self,
        mut f: impl FnMut(&RefSite, TargetType, R) -> Result<S, E>,
    ) -> Result<Tier0Spec<S>, E> {
        let owner = self.label();
        let dhcp_config = self
            .dhcp_config
            .map(|r| f(&RefSite::new(&owner, "dhcp_config"), TargetType::DhcpRelayConfig, r))
            .transpose()?;
        let ipv6_profiles = match self.ipv6_profiles {
            Some(profiles) => Some(Ipv6Profiles {
                ndra: profiles
                    .ndra
                    .map(|r| {
                        let site = RefSite::new(&owner, "ipv6_profiles.ndra");
                        f(&site, TargetType::Ipv6NdraProfile, r)
                    })
                    .transpose()?,
                dad: profiles
                    .dad
                    .map(|r| {
                        let site = RefSite::new(&owner, "ipv6_profiles.dad");
                        f(&site, TargetType::Ipv6DadProfile, r)
                    })
                    .transpose()?,
            }),
            None => None,
        };

        let locale_services = match self.locale_services {
            Some(list) => {
                let mut out = Vec::with_capacity(list.len());
                for ls in list {
                    let ls_owner = format!("{owner}.locale_services[{}]", ls.key());
                    out.push(ls.try_map_refs(&ls_owner, &mut f)?);
                }
                Some(out)
            }
            None => None,
        };

        Ok(Tier0Spec {
            id: self.id,
            display_name: self.display_name,
            description: self.description,
            state: self.state,
            ha_mode: self.ha_mode,
            failover_mode: self.failover_mode,
            disable_firewall: self.disable_firewall,
            force_whitelisting: self.force_whitelisting,
            default_rule_logging: self.default_rule_logging,
            transit_subnets: self.transit_subnets,
            internal_transit_subnets: self.internal_transit_subnets,
            dhcp_config,
            ipv6_profiles,
            tags: self.tags,
            static_routes: self.static_routes,
            locale_services,
        })
    }
}

impl<R: Clone> Tier0Spec<R> {
    /// Copy of the tree with every child marked `absent` removed.
    pub fn without_absent_children(&self) -> Self {
        let mut out = self.clone();
        if let Some(routes) = out.static_routes.as_mut() {
            routes.retain(|r| !r.state.is_absent());
        }
        if let Some(services) = out.locale_services.as_mut() {
            services.retain(|ls| !ls.state.is_absent());
            for ls in services.iter_mut() {
                if let Some(interfaces) = ls.interfaces.as_mut() {
                    interfaces.retain(|i| !i.state.is_absent());
                }
                if let Some(neighbors) = ls.bgp.as_mut().and_then(|b| b.neighbors.as_mut()) {
                    neighbors.retain(|n| !n.state.is_absent());
                }
            }
        }
        out
    }
}

impl<R> LocaleServiceSpec<R> {
    pub fn key(&self) -> &str {
        key_of(&self.display_name, &self.id)
    }

    fn try_map_refs<S, E>(
        self,
        owner: &str,
        f: &mut impl FnMut(&RefSite, TargetType, R) -> Result<S, E>,
    ) -> Result<LocaleServiceSpec<S>, E> {
        let edge_cluster = self
            .edge_cluster
            .map(|r| f(&RefSite::new(owner, "edge_cluster"), TargetType::EdgeCluster, r))
            .transpose()?;
        let site = RefSite::new(owner, "preferred_edge_nodes");
        let preferred_edge_nodes = self
            .preferred_edge_nodes
            .into_iter()
            .map(|r| f(&site, TargetType::EdgeNode, r))
            .collect::<Result<Vec<_>, E>>()?;

        let interfaces = match self.interfaces {
            Some(list) => {
                let mut out = Vec::with_capacity(list.len());
                for iface in list {
                    let iface_owner = format!("{owner}.interfaces[{}]", iface.key());
                    out.push(iface.try_map_refs(&iface_owner, f)?);
                }
                Some(out)
            }
            None => None,
        };

        Ok(LocaleServiceSpec {
            id: self.id,
            display_name: self.display_name,
            description: self.description,
            state: self.state,
            edge_cluster,
            preferred_edge_nodes,
            route_redistribution_types: self.route_redistribution_types,
            ha_vip_configs: self.ha_vip_configs,
            tags: self.tags,
            interfaces,
            bgp: self.bgp,
        })
    }
}

impl<R> InterfaceSpec<R> {
    pub fn key(&self) -> &str {
        key_of(&self.display_name, &self.id)
    }

    fn try_map_refs<S, E>(
        self,
        owner: &str,
        f: &mut impl FnMut(&RefSite, TargetType, R) -> Result<S, E>,
    ) -> Result<InterfaceSpec<S>, E> {
        let segment = self
            .segment
            .map(|r| f(&RefSite::new(owner, "segment"), TargetType::Segment, r))
            .transpose()?;
        let edge_node = self
            .edge_node
            .map(|r| f(&RefSite::new(owner, "edge_node"), TargetType::EdgeNode, r))
            .transpose()?;

        Ok(InterfaceSpec {
            id: self.id,
            display_name: self.display_name,
            description: self.description,
            state: self.state,
            interface_type: self.interface_type,
            subnets: self.subnets,
            segment,
            edge_node,
            mtu: self.mtu,
            urpf_mode: self.urpf_mode,
            tags: self.tags,
        })
    }
}

impl NeighborSpec {
    pub fn key(&self) -> &str {
        key_of(&self.display_name, &self.id)
    }
}

impl StaticRouteSpec {
    pub fn key(&self) -> &str {
        key_of(&self.display_name, &self.id)
    }
}
