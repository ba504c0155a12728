//! Comparison schemas for the resource kinds this crate reconciles.

use nsx_diff_core::{Cardinality, NodeSchema};

pub fn section_schema() -> NodeSchema {
    NodeSchema::new("FirewallSection")
        .with_reference_lists(&["applied_tos"])
        .with_child("rules", Cardinality::Many, rule_schema())
}

fn rule_schema() -> NodeSchema {
    NodeSchema::new("FirewallRule")
        .with_reference_lists(&[
            "applied_tos",
            "context_profiles",
            "destinations",
            "services",
            "sources",
        ])
        .with_custom_services("services", "service")
}

pub fn tier0_schema() -> NodeSchema {
    let neighbor = NodeSchema::new("BgpNeighborConfig").ignoring(&["password"]);
    let bgp = NodeSchema::new("BgpRoutingConfig").with_child("neighbors", Cardinality::Many, neighbor);
    let locale_services = NodeSchema::new("LocaleServices")
        .with_child("interfaces", Cardinality::Many, NodeSchema::new("Tier0Interface"))
        .with_child("bgp", Cardinality::One, bgp);

    NodeSchema::new("Tier0")
        .with_child("locale_services", Cardinality::Many, locale_services)
        .with_child("static_routes", Cardinality::Many, NodeSchema::new("StaticRoutes"))
}
