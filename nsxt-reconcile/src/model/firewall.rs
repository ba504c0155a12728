use serde::{Deserialize, Serialize};

use super::{RefSite, Reference, State, Tag};

/// Distributed firewall section with its rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct SectionSpec<R = Reference> {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub state: State,
    pub stateful: bool,
    #[serde(default)]
    pub section_type: SectionType,
    #[serde(default)]
    pub applied_tos: Vec<R>,
    #[serde(default, skip_serializing)]
    pub section_placement: Option<Placement>,
    #[serde(default)]
    pub rules: Vec<RuleSpec<R>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct RuleSpec<R = Reference> {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol: Option<IpProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_tag: Option<String>,
    #[serde(default)]
    pub applied_tos: Vec<R>,
    // Servers before 2.4 reject the field entirely.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_profiles: Vec<R>,
    #[serde(default)]
    pub destinations: Vec<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinations_excluded: Option<bool>,
    #[serde(default)]
    pub sources: Vec<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_excluded: Option<bool>,
    #[serde(default)]
    pub services: Vec<ServiceEntry<R>>,
}

/// A rule service: a reference to a service object or an inline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry<R = Reference> {
    Reference(R),
    Custom(CustomServiceEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomServiceEntry {
    pub service: CustomService,
}

/// Inline service definition, tagged by its NSX resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource_type")]
pub enum CustomService {
    #[serde(rename = "L4PortSetNSService")]
    L4PortSet {
        l4_protocol: L4Protocol,
        #[serde(default)]
        source_ports: Vec<String>,
        #[serde(default)]
        destination_ports: Vec<String>,
    },
    #[serde(rename = "IPProtocolNSService")]
    IpProtocol { protocol_number: u8 },
    #[serde(rename = "ICMPTypeNSService")]
    IcmpType {
        protocol: IcmpProtocol,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icmp_type: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icmp_code: Option<u8>,
    },
    #[serde(rename = "IGMPTypeNSService")]
    IgmpType {},
    #[serde(rename = "ALGTypeNSService")]
    AlgType {
        alg: String,
        destination_ports: Vec<String>,
        #[serde(default)]
        source_ports: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionType {
    Layer2,
    #[default]
    Layer3,
    L3redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    Allow,
    Drop,
    Reject,
    Redirect,
    DoNotRedirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpProtocol {
    #[serde(rename = "IPV4")]
    Ipv4,
    #[serde(rename = "IPV6")]
    Ipv6,
    #[serde(rename = "IPV4_IPV6")]
    Ipv4Ipv6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum L4Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcmpProtocol {
    #[serde(rename = "ICMPv4")]
    IcmpV4,
    #[serde(rename = "ICMPv6")]
    IcmpV6,
}

/// Where a new section goes relative to the existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Placement {
    pub operation: PlacementOperation,
    /// Anchor section for `insert_after` and `insert_before`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementOperation {
    InsertTop,
    InsertBottom,
    InsertAfter,
    InsertBefore,
}

impl PlacementOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementOperation::InsertTop => "insert_top",
            PlacementOperation::InsertBottom => "insert_bottom",
            PlacementOperation::InsertAfter => "insert_after",
            PlacementOperation::InsertBefore => "insert_before",
        }
    }

    pub fn needs_anchor(&self) -> bool {
        matches!(
            self,
            PlacementOperation::InsertAfter | PlacementOperation::InsertBefore
        )
    }
}

impl<R> SectionSpec<R> {
    pub fn label(&self) -> String {
        format!("FirewallSection[{}]", self.display_name)
    }

    /// Rewrite every reference in the section and its rules.
    ///
    /// `f` sees section-level lists first, then each rule's lists in rule order.
    pub fn try_map_refs<S, E>(
        self,
        mut f: impl FnMut(&RefSite, R) -> Result<S, E>,
    ) -> Result<SectionSpec<S>, E> {
        let owner = self.label();
        let applied_tos = map_list(&RefSite::new(&owner, "applied_tos"), self.applied_tos, &mut f)?;

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            let rule_owner = format!("{owner}.rules[{}]", rule.display_name);
            rules.push(rule.try_map_refs(&rule_owner, &mut f)?);
        }

        Ok(SectionSpec {
            display_name: self.display_name,
            description: self.description,
            state: self.state,
            stateful: self.stateful,
            section_type: self.section_type,
            applied_tos,
            section_placement: self.section_placement,
            rules,
            tags: self.tags,
        })
    }
}

impl<R> RuleSpec<R> {
    fn try_map_refs<S, E>(
        self,
        owner: &str,
        f: &mut impl FnMut(&RefSite, R) -> Result<S, E>,
    ) -> Result<RuleSpec<S>, E> {
        let applied_tos = map_list(&RefSite::new(owner, "applied_tos"), self.applied_tos, f)?;
        let context_profiles = map_list(
            &RefSite::new(owner, "context_profiles"),
            self.context_profiles,
            f,
        )?;
        let destinations = map_list(&RefSite::new(owner, "destinations"), self.destinations, f)?;
        let sources = map_list(&RefSite::new(owner, "sources"), self.sources, f)?;

        let site = RefSite::new(owner, "services");
        let mut services = Vec::with_capacity(self.services.len());
        for entry in self.services {
            services.push(match entry {
                ServiceEntry::Reference(r) => ServiceEntry::Reference(f(&site, r)?),
                ServiceEntry::Custom(custom) => ServiceEntry::Custom(custom),
            });
        }

        Ok(RuleSpec {
            display_name: self.display_name,
            description: self.description,
            action: self.action,
            direction: self.direction,
            disabled: self.disabled,
            ip_protocol: self.ip_protocol,
            logged: self.logged,
            notes: self.notes,
            rule_tag: self.rule_tag,
            applied_tos,
            context_profiles,
            destinations,
            destinations_excluded: self.destinations_excluded,
            sources,
            sources_excluded: self.sources_excluded,
            services,
        })
    }
}

fn map_list<R, S, E>(
    site: &RefSite,
    items: Vec<R>,
    f: &mut impl FnMut(&RefSite, R) -> Result<S, E>,
) -> Result<Vec<S>, E> {
    items.into_iter().map(|item| f(site, item)).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CustomService, RuleSpec, SectionSpec, ServiceEntry};
    use crate::model::{RefSite, Reference};

    #[test]
    fn services_accept_references_and_inline_definitions() {
        let rule: RuleSpec = serde_json::from_value(json!({
            "display_name": "web",
            "action": "ALLOW",
            "services": [
                {"target_type": "NSService", "target_display_name": "HTTPS"},
                {"service": {"resource_type": "L4PortSetNSService", "l4_protocol": "TCP", "destination_ports": ["8443"]}}
            ]
        }))
        .expect("rule");

        assert!(matches!(rule.services[0], ServiceEntry::Reference(_)));
        match &rule.services[1] {
            ServiceEntry::Custom(entry) => {
                assert!(matches!(entry.service, CustomService::L4PortSet { .. }))
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn map_refs_reports_owner_and_field() {
        let spec: SectionSpec = serde_json::from_value(json!({
            "display_name": "S1",
            "stateful": true,
            "applied_tos": [{"target_type": "NSGroup", "target_id": "ns-0"}],
            "rules": [{
                "display_name": "R1",
                "action": "DROP",
                "sources": [{"target_type": "IPSet", "target_display_name": "bad"}]
            }]
        }))
        .expect("section");

        let mut seen = Vec::new();
        let mapped = spec
            .try_map_refs(|site: &RefSite, r: Reference| -> Result<String, ()> {
                seen.push(format!("{}.{}", site.owner, site.field));
                Ok(r.target_type.to_string())
            })
            .expect("map");

        assert_eq!(
            seen,
            vec![
                "FirewallSection[S1].applied_tos".to_string(),
                "FirewallSection[S1].rules[R1].sources".to_string(),
            ]
        );
        assert_eq!(mapped.rules[0].sources, vec!["IPSet".to_string()]);
    }

    #[test]
    fn empty_context_profiles_are_not_serialized() {
        let spec: SectionSpec = serde_json::from_value(json!({
            "display_name": "S1",
            "stateful": false,
            "rules": [{"display_name": "R1", "action": "ALLOW"}]
        }))
        .expect("section");

        let wire = serde_json::to_value(&spec).expect("serialize");
        assert!(wire["rules"][0].get("context_profiles").is_none());
        assert_eq!(wire["rules"][0]["sources"], json!([]));
        assert_eq!(wire["section_type"], json!("LAYER3"));
        assert!(wire.get("state").is_none());
    }
}
