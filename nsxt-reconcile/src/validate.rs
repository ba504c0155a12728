//! Offline checks on a desired resource.
//!
//! Every check here runs before any request reaches the manager. A desired
//! file that fails validation never produces network traffic.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::firewall::{Placement, ServiceEntry};
use crate::model::{
    DesiredResource, PolicyRef, Reference, SectionSpec, State, TargetType, Tier0Spec,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
}

/// Desired state rejected before reconciliation.
#[derive(Debug, Error)]
#[error("{} validation error(s): {}", .issues.len(), summary(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run every check and fail on the first non-empty result set.
pub fn validate(resource: &DesiredResource) -> Result<(), ValidationError> {
    let issues = validation_issues(resource);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

pub fn validation_issues(resource: &DesiredResource) -> Vec<ValidationIssue> {
    match resource {
        DesiredResource::FirewallSection(spec) => section_issues(spec),
        DesiredResource::Tier0(spec) => tier0_issues(spec),
    }
}

fn issue(code: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        code: code.to_string(),
        message,
    }
}

fn section_issues(spec: &SectionSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let label = spec.label();

    if spec.display_name.trim().is_empty() {
        issues.push(issue(
            "missing_name",
            "firewall section display_name must not be empty".to_string(),
        ));
    }
    if spec.state == State::Present && spec.rules.is_empty() {
        issues.push(issue(
            "missing_rules",
            format!("{label} must include rules"),
        ));
    }
    if let Some(placement) = &spec.section_placement {
        issues.extend(placement_issue(&label, placement));
    }

    issues.extend(duplicate_names(
        &label,
        "rules",
        spec.rules.iter().map(|r| Some(r.display_name.as_str())),
    ));

    issues.extend(reference_issues(&label, "applied_tos", &spec.applied_tos));
    for rule in &spec.rules {
        let owner = format!("{label}.rules[{}]", rule.display_name);
        for (field, list) in [
            ("applied_tos", &rule.applied_tos),
            ("context_profiles", &rule.context_profiles),
            ("destinations", &rule.destinations),
            ("sources", &rule.sources),
        ] {
            issues.extend(reference_issues(&owner, field, list));
        }
        let service_refs: Vec<Reference> = rule
            .services
            .iter()
            .filter_map(|entry| match entry {
                ServiceEntry::Reference(r) => Some(r.clone()),
                ServiceEntry::Custom(_) => None,
            })
            .collect();
        issues.extend(reference_issues(&owner, "services", &service_refs));
    }
    issues
}

fn placement_issue(label: &str, placement: &Placement) -> Option<ValidationIssue> {
    let anchored = placement
        .display_name
        .as_deref()
        .is_some_and(|name| !name.trim().is_empty());
    (placement.operation.needs_anchor() && !anchored).then(|| {
        issue(
            "placement_anchor",
            format!(
                "{label} section_placement {} requires a display_name",
                placement.operation.as_str()
            ),
        )
    })
}

fn reference_issues(owner: &str, field: &str, refs: &[Reference]) -> Vec<ValidationIssue> {
    refs.iter()
        .filter(|r| r.target_display_name.is_none() && r.target_id.is_none())
        .map(|r| {
            issue(
                "incomplete_reference",
                format!(
                    "{owner} {field}: {} reference needs target_display_name or target_id",
                    r.target_type
                ),
            )
        })
        .collect()
}

fn tier0_issues(spec: &Tier0Spec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let label = spec.label();

    if spec.display_name.is_none() && spec.id.is_none() {
        issues.push(issue(
            "missing_name",
            "Tier-0 needs a display_name or an id".to_string(),
        ));
    }
    issues.extend(policy_ref_issues(
        &label,
        "dhcp_config",
        spec.dhcp_config.as_ref(),
        TargetType::DhcpRelayConfig,
    ));
    if let Some(profiles) = &spec.ipv6_profiles {
        issues.extend(policy_ref_issues(
            &label,
            "ipv6_profiles.ndra",
            profiles.ndra.as_ref(),
            TargetType::Ipv6NdraProfile,
        ));
        issues.extend(policy_ref_issues(
            &label,
            "ipv6_profiles.dad",
            profiles.dad.as_ref(),
            TargetType::Ipv6DadProfile,
        ));
    }

    if let Some(routes) = &spec.static_routes {
        issues.extend(unnamed_children(
            &label,
            "static_routes",
            routes.iter().map(|r| (r.display_name.as_deref(), r.id.as_deref())),
        ));
        issues.extend(duplicate_names(
            &label,
            "static_routes",
            routes.iter().map(|r| r.display_name.as_deref()),
        ));
    }

    let Some(services) = &spec.locale_services else {
        return issues;
    };
    issues.extend(unnamed_children(
        &label,
        "locale_services",
        services.iter().map(|s| (s.display_name.as_deref(), s.id.as_deref())),
    ));
    issues.extend(duplicate_names(
        &label,
        "locale_services",
        services.iter().map(|s| s.display_name.as_deref()),
    ));

    for ls in services {
        let ls_owner = format!("{label}.locale_services[{}]", ls.key());
        issues.extend(policy_ref_issues(
            &ls_owner,
            "edge_cluster",
            ls.edge_cluster.as_ref(),
            TargetType::EdgeCluster,
        ));
        for node in &ls.preferred_edge_nodes {
            issues.extend(policy_ref_issues(
                &ls_owner,
                "preferred_edge_nodes",
                Some(node),
                TargetType::EdgeNode,
            ));
        }

        if let Some(interfaces) = &ls.interfaces {
            issues.extend(unnamed_children(
                &ls_owner,
                "interfaces",
                interfaces.iter().map(|i| (i.display_name.as_deref(), i.id.as_deref())),
            ));
            issues.extend(duplicate_names(
                &ls_owner,
                "interfaces",
                interfaces.iter().map(|i| i.display_name.as_deref()),
            ));
            for iface in interfaces {
                let owner = format!("{ls_owner}.interfaces[{}]", iface.key());
                issues.extend(policy_ref_issues(
                    &owner,
                    "segment",
                    iface.segment.as_ref(),
                    TargetType::Segment,
                ));
                issues.extend(policy_ref_issues(
                    &owner,
                    "edge_node",
                    iface.edge_node.as_ref(),
                    TargetType::EdgeNode,
                ));
            }
        }

        if let Some(neighbors) = ls.bgp.as_ref().and_then(|b| b.neighbors.as_ref()) {
            let bgp_owner = format!("{ls_owner}.bgp");
            issues.extend(unnamed_children(
                &bgp_owner,
                "neighbors",
                neighbors.iter().map(|n| (n.display_name.as_deref(), n.id.as_deref())),
            ));
            issues.extend(duplicate_names(
                &bgp_owner,
                "neighbors",
                neighbors.iter().map(|n| n.display_name.as_deref()),
            ));
        }
    }
    issues
}

/// Completeness plus scope fields: sites only on edges, clusters only on edge nodes.
fn policy_ref_issues(
    owner: &str,
    field: &str,
    r: Option<&PolicyRef>,
    kind: TargetType,
) -> Vec<ValidationIssue> {
    let Some(r) = r else {
        return Vec::new();
    };
    let mut issues = Vec::new();
    if r.id.is_none() && r.display_name.is_none() {
        issues.push(issue(
            "incomplete_reference",
            format!("{owner} {field}: reference needs display_name or id"),
        ));
    }
    if r.has_site_scope() && !kind.is_edge() {
        issues.push(issue(
            "unexpected_scope",
            format!("{owner} {field}: site_id and enforcementpoint_id apply to edge clusters and edge nodes only"),
        ));
    }
    if r.has_cluster_scope() && kind != TargetType::EdgeNode {
        issues.push(issue(
            "unexpected_scope",
            format!("{owner} {field}: edge_cluster_id and edge_cluster_display_name apply to edge nodes only"),
        ));
    }
    issues
}

fn unnamed_children<'a>(
    owner: &str,
    field: &str,
    children: impl Iterator<Item = (Option<&'a str>, Option<&'a str>)>,
) -> Vec<ValidationIssue> {
    children
        .enumerate()
        .filter(|(_, (name, id))| name.is_none() && id.is_none())
        .map(|(idx, _)| {
            issue(
                "missing_name",
                format!("{owner}.{field} entry #{} needs a display_name or an id", idx + 1),
            )
        })
        .collect()
}

fn duplicate_names<'a>(
    owner: &str,
    field: &str,
    names: impl Iterator<Item = Option<&'a str>>,
) -> Vec<ValidationIssue> {
    let mut seen = BTreeSet::new();
    let mut dupes = BTreeSet::new();
    for name in names.flatten() {
        if !seen.insert(name) {
            dupes.insert(name);
        }
    }
    if dupes.is_empty() {
        return Vec::new();
    }
    vec![issue(
        "duplicate_name",
        format!(
            "{owner}.{field} has duplicate display_names [{}]; names must be unique within each parent",
            dupes.into_iter().collect::<Vec<_>>().join(", ")
        ),
    )]
}
