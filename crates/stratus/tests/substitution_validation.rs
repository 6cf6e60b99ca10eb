mod common;

use common::{
    TestRegistries, blueprint_with_version, leaf_messages, leaf_reason_codes, minimal_blueprint,
    resource_ref, sub_field, valid_data_source, valid_resource, value_ref, var_ref,
};
use indexmap::IndexMap;
use stratus::schema::{
    ChildReference, Condition, DataSourceReference, ElemRefKind, ElemReference, ElementMap,
    FunctionArg, FunctionCall, Include, MappingNode, PathSegment, ResourceMetadata,
    ResourceReference, ScalarValue, StringOrSubstitutions, Substitution, Value, ValueType,
    Variable, VariableType,
};
use stratus::{
    CancelToken, ChildExportError, ChildExportInfo, ChildExportResolver, DiagnosticLevel,
    ErrorReasonCode, ValidationStatus, validate_blueprint,
};

fn assert_single_code(report: &stratus::ValidationReport, expected: ErrorReasonCode) {
    let codes = leaf_reason_codes(report);
    assert_eq!(codes, vec![expected], "messages: {:?}", leaf_messages(report));
}

fn string_value(content: Substitution) -> Value {
    Value {
        value_type: Some(ValueType::String),
        description: None,
        content: Some(MappingNode::StringWithSubstitutions(sub_field(content))),
    }
}

#[test]
fn missing_variable_reference_is_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert("greeting", string_value(var_ref("missing")));

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("missing variable"));
}

#[test]
fn variable_reference_resolves_to_its_declared_type() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert("region", common::string_variable());
    blueprint.values.insert("regionCopy", string_value(var_ref("region")));

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass);
}

#[test]
fn integer_variable_in_string_value_content_is_a_type_mismatch() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert(
        "replicas",
        Variable {
            var_type: VariableType::Integer,
            description: None,
            default: None,
            allowed_values: None,
        },
    );
    blueprint.values.insert("copy", string_value(var_ref("replicas")));

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidValueType);
}

#[test]
fn value_can_not_reference_itself() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert("loop", string_value(value_ref("loop")));

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
}

#[test]
fn resource_spec_path_resolves_through_the_provider_schema() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "apiHost",
        string_value(resource_ref(
            "api",
            vec![
                PathSegment::Field("spec".into()),
                PathSegment::Field("host".into()),
            ],
        )),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);
}

#[test]
fn unknown_resource_spec_property_is_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "apiMemory",
        string_value(resource_ref(
            "api",
            vec![
                PathSegment::Field("spec".into()),
                PathSegment::Field("memory".into()),
            ],
        )),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("spec.memory"));
}

#[test]
fn referenced_metadata_label_must_exist() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "appLabel",
        string_value(resource_ref(
            "api",
            vec![
                PathSegment::Field("metadata".into()),
                PathSegment::Field("labels".into()),
                PathSegment::Field("app".into()),
            ],
        )),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("missing label"));
}

#[test]
fn template_index_requires_the_resource_to_declare_each() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "first",
        string_value(Substitution::Resource(ResourceReference {
            name: "api".into(),
            template_index: Some(0),
            path: vec![
                PathSegment::Field("spec".into()),
                PathSegment::Field("host".into()),
            ],
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("does not declare \"each\""));
}

#[test]
fn data_source_exported_field_reference_resolves() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.data_sources.insert("network", valid_data_source());
    blueprint.values.insert(
        "vpc",
        string_value(Substitution::DataSource(DataSourceReference {
            name: "network".into(),
            field: "vpcId".into(),
            element_index: None,
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);
}

#[test]
fn unknown_data_source_export_is_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.data_sources.insert("network", valid_data_source());
    blueprint.values.insert(
        "vpc",
        string_value(Substitution::DataSource(DataSourceReference {
            name: "network".into(),
            field: "missing".into(),
            element_index: None,
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
}

#[test]
fn indexing_a_non_array_data_source_field_is_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.data_sources.insert("network", valid_data_source());
    blueprint.values.insert(
        "vpc",
        string_value(Substitution::DataSource(DataSourceReference {
            name: "network".into(),
            field: "vpcId".into(),
            element_index: Some(0),
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("not an array"));
}

#[test]
fn elem_reference_outside_a_template_is_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = blueprint_with_version();
    let mut resource = valid_resource();
    let mut annotations = ElementMap::new();
    annotations.insert(
        "instance",
        sub_field(Substitution::ElemRef(ElemReference {
            kind: ElemRefKind::Index,
            source_meta: None,
        })),
    );
    resource.metadata = Some(ResourceMetadata {
        display_name: None,
        labels: ElementMap::new(),
        annotations,
        custom: None,
    });
    blueprint.resources.insert("api", resource);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
}

#[test]
fn elem_index_resolves_to_integer_inside_a_template() {
    let registries = TestRegistries::new();
    let mut blueprint = blueprint_with_version();

    blueprint.values.insert(
        "hosts",
        Value {
            value_type: Some(ValueType::Array),
            description: None,
            content: Some(MappingNode::items(vec![
                MappingNode::Scalar(ScalarValue::string("a.internal")),
                MappingNode::Scalar(ScalarValue::string("b.internal")),
            ])),
        },
    );

    let mut template = valid_resource();
    template.each = Some(sub_field(value_ref("hosts")));
    let mut annotations = ElementMap::new();
    annotations.insert(
        "instance",
        sub_field(Substitution::ElemRef(ElemReference {
            kind: ElemRefKind::Index,
            source_meta: None,
        })),
    );
    template.metadata = Some(ResourceMetadata {
        display_name: None,
        labels: ElementMap::new(),
        annotations,
        custom: None,
    });
    blueprint.resources.insert("workers", template);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);
    assert!(report.diagnostics.is_empty(), "diagnostics: {:?}", report.diagnostics);
}

#[test]
fn unknown_function_is_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "upper",
        string_value(Substitution::Function(FunctionCall {
            name: "toUpper".into(),
            args: Vec::new(),
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("unknown function"));
}

#[test]
fn function_arity_is_checked_exactly() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "trimmed",
        string_value(Substitution::Function(FunctionCall {
            name: "trim".into(),
            args: Vec::new(),
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("expected 1 but received 0"));
}

#[test]
fn function_argument_types_must_match_the_signature() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert("region", common::string_variable());
    blueprint.values.insert(
        "joined",
        string_value(Substitution::Function(FunctionCall {
            name: "join".into(),
            args: vec![FunctionArg {
                name: None,
                value: var_ref("region"),
            }],
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("argument type mismatch"));
}

#[test]
fn string_choice_arguments_are_checked_against_the_enum() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "encoded",
        string_value(Substitution::Function(FunctionCall {
            name: "encode".into(),
            args: vec![FunctionArg {
                name: None,
                value: Substitution::Literal(ScalarValue::string("xml")),
            }],
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("json, yaml"));
}

#[test]
fn named_arguments_are_rejected_for_ordinary_functions() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "trimmed",
        string_value(Substitution::Function(FunctionCall {
            name: "trim".into(),
            args: vec![FunctionArg {
                name: Some("input".into()),
                value: Substitution::Literal(ScalarValue::string(" padded ")),
            }],
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("named arguments"));
}

#[test]
fn link_arguments_must_name_existing_resources() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    let mut fields = IndexMap::new();
    fields.insert(
        "orderLink".to_string(),
        MappingNode::StringWithSubstitutions(sub_field(Substitution::Function(FunctionCall {
            name: "link".into(),
            args: vec![
                FunctionArg {
                    name: None,
                    value: Substitution::Literal(ScalarValue::string("api")),
                },
                FunctionArg {
                    name: None,
                    value: Substitution::Literal(ScalarValue::string("ordersDb")),
                },
            ],
            source_meta: None,
        }))),
    );
    blueprint.values.insert(
        "links",
        Value {
            value_type: Some(ValueType::Object),
            description: None,
            content: Some(MappingNode::fields(fields)),
        },
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::SubFuncLinkArgResourceNotFound);
    assert!(leaf_messages(&report)[0].contains("ordersDb"));
}

#[test]
fn condition_substitutions_must_resolve_to_boolean() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert("region", common::string_variable());
    let mut conditional = valid_resource();
    conditional.condition = Some(Condition {
        string_value: Some(sub_field(var_ref("region"))),
        ..Condition::default()
    });
    blueprint.resources.insert("regional", conditional);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
}

#[test]
fn boolean_condition_substitution_passes() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert(
        "deployApi",
        Variable {
            var_type: VariableType::Boolean,
            description: None,
            default: Some(ScalarValue::bool(true)),
            allowed_values: None,
        },
    );
    let mut conditional = valid_resource();
    conditional.condition = Some(Condition {
        string_value: Some(sub_field(var_ref("deployApi"))),
        ..Condition::default()
    });
    blueprint.resources.insert("conditional", conditional);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);
}

#[test]
fn any_typed_condition_warns_but_does_not_fail() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    let mut conditional = valid_resource();
    conditional.condition = Some(Condition {
        string_value: Some(sub_field(resource_ref("api", Vec::new()))),
        ..Condition::default()
    });
    blueprint.resources.insert("conditional", conditional);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].level, DiagnosticLevel::Warning);
}

#[test]
fn each_must_resolve_to_an_array() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert("region", common::string_variable());
    let mut template = valid_resource();
    template.each = Some(sub_field(var_ref("region")));
    blueprint.resources.insert("workers", template);

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("must resolve to an array"));
}

#[test]
fn interpolation_is_only_allowed_for_string_values() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.variables.insert("region", common::string_variable());
    blueprint.values.insert(
        "port",
        Value {
            value_type: Some(ValueType::Integer),
            description: None,
            content: Some(MappingNode::StringWithSubstitutions(StringOrSubstitutions {
                values: vec![
                    stratus::schema::StringPart::Literal(stratus::schema::LiteralString {
                        value: "80".into(),
                        source_meta: None,
                    }),
                    stratus::schema::StringPart::Substitution(var_ref("region")),
                ],
                source_meta: None,
            })),
        },
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidValueType);
}

struct StubChildExports;

impl ChildExportResolver for StubChildExports {
    fn resolve_export(
        &self,
        _cancel: &CancelToken,
        child_name: &str,
        export_name: &str,
    ) -> Result<Option<ChildExportInfo>, ChildExportError> {
        match export_name {
            "endpoint" => Ok(Some(ChildExportInfo {
                export_type: stratus::schema::ExportType::Integer,
                field: None,
            })),
            "unresolved" => Ok(None),
            _ => Err(ChildExportError::ExportMissing {
                child: child_name.to_string(),
                export: export_name.to_string(),
            }),
        }
    }
}

fn child_blueprint() -> Include {
    Include {
        path: Some(StringOrSubstitutions::literal("core/infra.blueprint.yaml")),
        variables: None,
        metadata: None,
        description: None,
    }
}

#[test]
fn child_export_type_is_used_when_a_resolver_is_supplied() {
    let registries = TestRegistries::new();
    let resolver = StubChildExports;
    let mut params = registries.params();
    params.child_exports = Some(&resolver);

    let mut blueprint = minimal_blueprint();
    blueprint.includes.insert("coreInfra", child_blueprint());
    blueprint.values.insert(
        "endpointCopy",
        string_value(Substitution::Child(ChildReference {
            name: "coreInfra".into(),
            export: "endpoint".into(),
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &params).unwrap();
    // The child export resolves to integer, which a string value rejects.
    assert_single_code(&report, ErrorReasonCode::InvalidValueType);
}

#[test]
fn missing_child_export_is_reported_by_the_resolver() {
    let registries = TestRegistries::new();
    let resolver = StubChildExports;
    let mut params = registries.params();
    params.child_exports = Some(&resolver);

    let mut blueprint = minimal_blueprint();
    blueprint.includes.insert("coreInfra", child_blueprint());
    blueprint.values.insert(
        "gone",
        string_value(Substitution::Child(ChildReference {
            name: "coreInfra".into(),
            export: "gone".into(),
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &params).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("missing in child blueprint"));
}

#[test]
fn unresolved_child_export_resolves_to_any() {
    let registries = TestRegistries::new();
    let resolver = StubChildExports;
    let mut params = registries.params();
    params.child_exports = Some(&resolver);

    let mut blueprint = minimal_blueprint();
    blueprint.includes.insert("coreInfra", child_blueprint());
    blueprint.values.insert(
        "anything",
        string_value(Substitution::Child(ChildReference {
            name: "coreInfra".into(),
            export: "unresolved".into(),
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &params).unwrap();
    assert_eq!(report.status, ValidationStatus::Pass, "error: {:?}", report.error);
}

#[test]
fn reference_to_a_missing_child_blueprint_is_reported() {
    let registries = TestRegistries::new();
    let mut blueprint = minimal_blueprint();
    blueprint.values.insert(
        "orphan",
        string_value(Substitution::Child(ChildReference {
            name: "nowhere".into(),
            export: "endpoint".into(),
            source_meta: None,
        })),
    );

    let report = validate_blueprint(&blueprint, &registries.params()).unwrap();
    assert_single_code(&report, ErrorReasonCode::InvalidSubstitution);
    assert!(leaf_messages(&report)[0].contains("missing child blueprint"));
}
