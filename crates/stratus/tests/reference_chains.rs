mod common;

use common::{
    TestRegistries, blueprint_with_version, leaf_messages, leaf_reason_codes, minimal_blueprint,
    resource_ref, sub_field, valid_resource, value_ref,
};
use stratus::schema::{
    ChildReference, ElementMap, Include, LinkSelector, MappingNode, PathSegment,
    ResourceMetadata, StringOrSubstitutions, Substitution, Value, ValueType,
};
use stratus::{ErrorReasonCode, ValidationStatus, validate_blueprint};

#[test]
fn depends_on_cycles_are_reported_once_with_the_smallest_member() {
    let registries = TestRegistries::new();
    let mut blueprint = blueprint_with_version();
    let mut alpha = valid_resource();
    alpha.depends_on = vec!["beta".into()];
    let mut beta = valid_resource();
    beta.depends_on = vec!["alpha".into()];
    blueprint.resources.insert("beta", beta);
    blueprint.resources.insert("alpha", alpha);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();

    let codes = leaf_reason_codes(&report);
    assert_eq!(codes, vec![ErrorReasonCode::ReferenceCycle]);
    assert!(
        leaf_messages(&report)[0].contains("resources.alpha"),
        "cycle should be seeded with the lexicographically smallest member: {}",
        leaf_messages(&report)[0]
    );
}

#[test]
fn substitution_reference_cycles_are_detected() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "first",
        Value {
            value_type: Some(ValueType::String),
            description: None,
            content: Some(MappingNode::StringWithSubstitutions(sub_field(value_ref(
                "second",
            )))),
        },
    );
    blueprint.values.insert(
        "second",
        Value {
            value_type: Some(ValueType::String),
            description: None,
            content: Some(MappingNode::StringWithSubstitutions(sub_field(value_ref(
                "first",
            )))),
        },
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(leaf_reason_codes(&report), vec![ErrorReasonCode::ReferenceCycle]);
}

#[test]
fn link_selector_cycles_are_detected() {
    let registries = TestRegistries::new();
    let mut blueprint = blueprint_with_version();

    let mut first = valid_resource();
    let mut first_labels = ElementMap::new();
    first_labels.insert("tier", "frontend".to_string());
    let mut first_selector = ElementMap::new();
    first_selector.insert("tier", "backend".to_string());
    first.metadata = Some(ResourceMetadata {
        display_name: None,
        labels: first_labels,
        annotations: ElementMap::new(),
        custom: None,
    });
    first.link_selector = Some(LinkSelector {
        by_label: first_selector,
    });

    let mut second = valid_resource();
    let mut second_labels = ElementMap::new();
    second_labels.insert("tier", "backend".to_string());
    let mut second_selector = ElementMap::new();
    second_selector.insert("tier", "frontend".to_string());
    second.metadata = Some(ResourceMetadata {
        display_name: None,
        labels: second_labels,
        annotations: ElementMap::new(),
        custom: None,
    });
    second.link_selector = Some(LinkSelector {
        by_label: second_selector,
    });

    blueprint.resources.insert("gateway", first);
    blueprint.resources.insert("orders", second);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(leaf_reason_codes(&report), vec![ErrorReasonCode::ReferenceCycle]);
    assert!(leaf_messages(&report)[0].contains("resources.gateway"));
}

#[test]
fn link_edges_are_recorded_with_link_tags() {
    let registries = TestRegistries::new();
    let mut blueprint = blueprint_with_version();

    let mut selector = valid_resource();
    let mut by_label = ElementMap::new();
    by_label.insert("app", "orders".to_string());
    selector.link_selector = Some(LinkSelector { by_label });

    let mut labelled = valid_resource();
    let mut labels = ElementMap::new();
    labels.insert("app", "orders".to_string());
    labelled.metadata = Some(ResourceMetadata {
        display_name: None,
        labels,
        annotations: ElementMap::new(),
        custom: None,
    });

    blueprint.resources.insert("gateway", selector);
    blueprint.resources.insert("ordersApi", labelled);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);

    let chains = &report.reference_chains;
    let tagged = chains.find_by_tag("link:resources.gateway");
    assert_eq!(tagged.len(), 1);
    assert_eq!(chains.node(tagged[0]).element_name, "resources.ordersApi");

    let gateway = chains.lookup("resources.gateway").unwrap();
    assert_eq!(chains.node(gateway).references, tagged);
}

#[test]
fn each_dependencies_are_checked_transitively() {
    let registries = TestRegistries::new();
    let mut blueprint = blueprint_with_version();
    blueprint.resources.insert("storage", valid_resource());

    // values.shardHosts references resources.storage, so a template whose
    // `each` consumes the value transitively depends on a resource.
    blueprint.values.insert(
        "shardHosts",
        Value {
            value_type: Some(ValueType::Array),
            description: None,
            content: Some(MappingNode::items(vec![
                MappingNode::StringWithSubstitutions(sub_field(resource_ref(
                    "storage",
                    vec![
                        PathSegment::Field("spec".into()),
                        PathSegment::Field("host".into()),
                    ],
                ))),
            ])),
        },
    );

    let mut template = valid_resource();
    template.each = Some(sub_field(value_ref("shardHosts")));
    blueprint.resources.insert("shards", template);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    let codes = leaf_reason_codes(&report);
    assert_eq!(codes, vec![ErrorReasonCode::EachResourceDependency]);
    let message = &leaf_messages(&report)[0];
    assert!(message.contains("shards"), "message: {message}");
    assert!(message.contains("storage"), "message: {message}");
}

#[test]
fn each_child_dependencies_are_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = blueprint_with_version();
    blueprint.includes.insert(
        "coreInfra",
        Include {
            path: Some(StringOrSubstitutions::literal("core/infra.blueprint.yaml")),
            variables: None,
            metadata: None,
            description: None,
        },
    );

    let mut template = valid_resource();
    template.each = Some(sub_field(Substitution::Child(ChildReference {
        name: "coreInfra".into(),
        export: "subnetIds".into(),
        source_meta: None,
    })));
    blueprint.resources.insert("subnets", template);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(
        leaf_reason_codes(&report),
        vec![ErrorReasonCode::EachChildDependency]
    );
}

#[test]
fn successful_runs_leave_an_acyclic_reference_graph() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert("region", common::string_variable());
    blueprint.values.insert(
        "hostCopy",
        Value {
            value_type: Some(ValueType::String),
            description: None,
            content: Some(MappingNode::StringWithSubstitutions(sub_field(resource_ref(
                "api",
                vec![
                    PathSegment::Field("spec".into()),
                    PathSegment::Field("host".into()),
                ],
            )))),
        },
    );
    let mut dependent = valid_resource();
    dependent.depends_on = vec!["api".into()];
    blueprint.resources.insert("worker", dependent);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);

    // Independent DFS with an on-stack marker over the recorded graph.
    let chains = &report.reference_chains;
    let mut state = vec![0u8; chains.len()];
    for start in 0..chains.len() {
        assert!(
            !dfs_finds_cycle(chains, start, &mut state),
            "reference graph should be acyclic after a successful run"
        );
    }
}

fn dfs_finds_cycle(
    chains: &stratus::ReferenceChainCollector,
    node: usize,
    state: &mut Vec<u8>,
) -> bool {
    match state[node] {
        1 => return true,
        2 => return false,
        _ => {}
    }
    state[node] = 1;
    for &next in &chains.node(node).references {
        if dfs_finds_cycle(chains, next, state) {
            return true;
        }
    }
    state[node] = 2;
    false
}

#[test]
fn diagnostics_order_is_deterministic_across_runs() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert("a", Value::default());
    blueprint.values.insert("b", Value::default());
    blueprint.variables.insert(
        "debug",
        stratus::schema::Variable {
            var_type: stratus::schema::VariableType::Boolean,
            description: None,
            default: None,
            allowed_values: Some(vec![stratus::schema::ScalarValue::bool(true)]),
        },
    );

    let first = validate_blueprint(&blueprint, &registries.params()).unwrap();
    let second = validate_blueprint(&blueprint, &registries.params()).unwrap();

    assert_eq!(first.error, second.error);
    let first_messages = leaf_messages(&first);
    // Variables are validated before values, and values in insertion order.
    assert!(first_messages[0].contains("debug"), "messages: {first_messages:?}");
    assert!(first_messages[1].contains("\"a\""), "messages: {first_messages:?}");
    assert!(first_messages[3].contains("\"b\""), "messages: {first_messages:?}");
}
