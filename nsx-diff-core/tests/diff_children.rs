use nsx_diff_core::{differs, Cardinality, DiffReason, NodeSchema};
use serde_json::json;

fn section_schema() -> NodeSchema {
    NodeSchema::new("FirewallSection")
        .with_reference_lists(&["applied_tos"])
        .with_child(
            "rules",
            Cardinality::Many,
            NodeSchema::new("FirewallRule").with_reference_lists(&["sources", "destinations"]),
        )
}

fn tier0_schema() -> NodeSchema {
    NodeSchema::new("Tier0").with_child(
        "locale_services",
        Cardinality::Many,
        NodeSchema::new("LocaleServices").with_child(
            "bgp",
            Cardinality::One,
            NodeSchema::new("BgpRoutingConfig").with_child(
                "neighbors",
                Cardinality::Many,
                NodeSchema::new("BgpNeighborConfig").ignoring(&["password"]),
            ),
        ),
    )
}

#[test]
fn rule_count_mismatch_is_reported() {
    let desired = json!({"display_name": "S1", "rules": [{"display_name": "R1"}, {"display_name": "R2"}]});
    let existing = json!({"display_name": "S1", "rules": [{"display_name": "R1"}]});

    let result = differs(&desired, &existing, &section_schema()).expect("diff");
    assert!(matches!(
        result.reason(),
        Some(DiffReason::ChildCount { desired: 2, existing: 1, .. })
    ));
}

#[test]
fn rules_are_paired_by_name_regardless_of_order() {
    let desired = json!({"display_name": "S1", "rules": [
        {"display_name": "R1", "action": "ALLOW"},
        {"display_name": "R2", "action": "DROP"}
    ]});
    let existing = json!({"display_name": "S1", "rules": [
        {"id": "b", "display_name": "R2", "action": "DROP"},
        {"id": "a", "display_name": "R1", "action": "ALLOW"}
    ]});
    assert!(!differs(&desired, &existing, &section_schema()).expect("diff").differs());
}

#[test]
fn renamed_rule_is_a_missing_child() {
    let desired = json!({"display_name": "S1", "rules": [{"display_name": "R1"}]});
    let existing = json!({"display_name": "S1", "rules": [{"display_name": "old"}]});

    let result = differs(&desired, &existing, &section_schema()).expect("diff");
    match result.reason() {
        Some(DiffReason::MissingChild { path, field, key }) => {
            assert_eq!(path, "FirewallSection[S1]");
            assert_eq!(field, "rules");
            assert_eq!(key, "R1");
        }
        other => panic!("unexpected reason: {other:?}"),
    }
}

#[test]
fn nested_rule_difference_carries_child_path() {
    let desired = json!({"display_name": "S1", "rules": [
        {"display_name": "R1", "sources": [{"target_type": "NSGroup", "target_id": "ns-1"}]}
    ]});
    let existing = json!({"display_name": "S1", "rules": [
        {"display_name": "R1", "sources": [{"target_type": "NSGroup", "target_id": "ns-2"}]}
    ]});

    let result = differs(&desired, &existing, &section_schema()).expect("diff");
    assert_eq!(
        result.reason().map(DiffReason::path),
        Some("FirewallSection[S1].rules[R1]")
    );
}

#[test]
fn omitted_child_collection_is_unmanaged() {
    let desired = json!({"display_name": "S1"});
    let existing = json!({"display_name": "S1", "rules": [{"display_name": "R1"}]});
    assert!(!differs(&desired, &existing, &section_schema()).expect("diff").differs());
}

#[test]
fn empty_child_collection_is_authoritative() {
    let desired = json!({"display_name": "S1", "rules": []});
    let existing = json!({"display_name": "S1", "rules": [{"display_name": "R1"}]});
    assert!(differs(&desired, &existing, &section_schema()).expect("diff").differs());
}

#[test]
fn single_child_present_only_in_desired_differs() {
    let desired = json!({"display_name": "T0", "locale_services": [
        {"display_name": "default", "bgp": {"local_as_num": "65001"}}
    ]});
    let existing = json!({"display_name": "T0", "locale_services": [
        {"display_name": "default"}
    ]});

    let result = differs(&desired, &existing, &tier0_schema()).expect("diff");
    assert!(matches!(
        result.reason(),
        Some(DiffReason::MissingChild { field, .. }) if field == "bgp"
    ));
}

#[test]
fn write_only_neighbor_password_is_ignored() {
    let desired = json!({"display_name": "T0", "locale_services": [
        {"display_name": "default", "bgp": {"neighbors": [
            {"display_name": "peer", "neighbor_address": "10.0.0.1", "password": "s3cret"}
        ]}}
    ]});
    let existing = json!({"display_name": "T0", "locale_services": [
        {"display_name": "default", "bgp": {"enabled": true, "neighbors": [
            {"display_name": "peer", "neighbor_address": "10.0.0.1"}
        ]}}
    ]});
    assert!(!differs(&desired, &existing, &tier0_schema()).expect("diff").differs());
}

#[test]
fn unnamed_children_fall_back_to_id() {
    let desired = json!({"display_name": "T0", "locale_services": [{"id": "default", "route_redistribution_types": ["TIER0_STATIC"]}]});
    let existing = json!({"display_name": "T0", "locale_services": [{"id": "default", "display_name": "default", "route_redistribution_types": ["TIER0_STATIC"]}]});
    assert!(!differs(&desired, &existing, &tier0_schema()).expect("diff").differs());
}

#[test]
fn converged_next_hops_with_server_defaults_are_unchanged() {
    let schema = NodeSchema::new("Tier0").with_child(
        "static_routes",
        Cardinality::Many,
        NodeSchema::new("StaticRoutes"),
    );
    let desired = json!({"display_name": "T0", "static_routes": [{
        "display_name": "r",
        "network": "0.0.0.0/0",
        "next_hops": [{"ip_address": "10.0.0.1"}, {"ip_address": "10.0.0.1", "admin_distance": 5}]
    }]});
    let existing = json!({"id": "t0", "display_name": "T0", "static_routes": [{
        "id": "r",
        "display_name": "r",
        "network": "0.0.0.0/0",
        "next_hops": [
            {"ip_address": "10.0.0.1", "admin_distance": 5},
            {"ip_address": "10.0.0.1", "admin_distance": 1}
        ]
    }]});

    assert!(!differs(&desired, &existing, &schema).expect("diff").differs());
}
