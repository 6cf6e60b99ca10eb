#![allow(dead_code)]

use std::collections::BTreeMap;

use stratus::schema::{
    Blueprint, DataSource, DataSourceFilter, DataSourceFilterSearch, DataSourceFilters,
    ElementMap, MappingNode, PathSegment, Resource, ResourceReference, ScalarValue,
    StringOrSubstitutions, Substitution, ValueReference, Variable, VariableReference,
    VariableType,
};
use stratus::{
    CancelToken, DataSourceFieldDefinition, DataSourceTypeDefinition, FieldSchema,
    FilterFieldConflict, FilterOperator, FunctionDefinition, FunctionParameter,
    InMemoryDataSourceRegistry, InMemoryFunctionRegistry, InMemoryResourceRegistry,
    ResolvedType, ResourceSpecDefinition, ValidateParams,
};

pub const API_RESOURCE_TYPE: &str = "celerity/api";
pub const VPC_DATA_SOURCE_TYPE: &str = "celerity/vpc";

/// Registries populated with a small provider fixture shared across the
/// validation test suites.
pub struct TestRegistries {
    pub functions: InMemoryFunctionRegistry,
    pub resources: InMemoryResourceRegistry,
    pub data_sources: InMemoryDataSourceRegistry,
}

impl TestRegistries {
    pub fn new() -> Self {
        let mut functions = InMemoryFunctionRegistry::new();
        functions.insert(FunctionDefinition {
            name: "trim".into(),
            parameters: vec![FunctionParameter {
                param_type: ResolvedType::String,
                string_choices: Vec::new(),
                optional: false,
            }],
            return_type: ResolvedType::String,
            allows_named_args: false,
        });
        functions.insert(FunctionDefinition {
            name: "join".into(),
            parameters: vec![
                FunctionParameter {
                    param_type: ResolvedType::Array,
                    string_choices: Vec::new(),
                    optional: false,
                },
                FunctionParameter {
                    param_type: ResolvedType::String,
                    string_choices: Vec::new(),
                    optional: true,
                },
            ],
            return_type: ResolvedType::String,
            allows_named_args: false,
        });
        functions.insert(FunctionDefinition {
            name: "encode".into(),
            parameters: vec![FunctionParameter {
                param_type: ResolvedType::String,
                string_choices: vec!["json".into(), "yaml".into()],
                optional: false,
            }],
            return_type: ResolvedType::String,
            allows_named_args: false,
        });
        functions.insert(FunctionDefinition {
            name: "object".into(),
            parameters: Vec::new(),
            return_type: ResolvedType::Object,
            allows_named_args: true,
        });
        functions.insert(FunctionDefinition {
            name: "link".into(),
            parameters: vec![
                FunctionParameter {
                    param_type: ResolvedType::Any,
                    string_choices: Vec::new(),
                    optional: false,
                },
                FunctionParameter {
                    param_type: ResolvedType::Any,
                    string_choices: Vec::new(),
                    optional: false,
                },
            ],
            return_type: ResolvedType::Object,
            allows_named_args: false,
        });

        let mut resources = InMemoryResourceRegistry::new();
        let mut api_fields = BTreeMap::new();
        api_fields.insert("host".to_string(), FieldSchema::String);
        api_fields.insert("replicas".to_string(), FieldSchema::Integer);
        api_fields.insert(
            "endpoints".to_string(),
            FieldSchema::Array(Box::new(FieldSchema::String)),
        );
        api_fields.insert(
            "tags".to_string(),
            FieldSchema::Map(Box::new(FieldSchema::String)),
        );
        api_fields.insert("id".to_string(), FieldSchema::String);
        resources.insert_resource_type(
            API_RESOURCE_TYPE,
            ResourceSpecDefinition {
                schema: FieldSchema::Object(api_fields),
                computed_field_paths: vec!["spec.id".into()],
            },
        );
        let mut instance_options = BTreeMap::new();
        instance_options.insert("small".to_string(), ScalarValue::string("t2.small"));
        instance_options.insert("large".to_string(), ScalarValue::string("t2.large"));
        resources.insert_variable_type("aws/ec2/instanceType", instance_options);

        let mut data_sources = InMemoryDataSourceRegistry::new();
        let mut vpc_fields = BTreeMap::new();
        vpc_fields.insert(
            "vpcId".to_string(),
            DataSourceFieldDefinition {
                field_type: stratus::schema::DataSourceFieldType::String,
                supported_operators: vec![FilterOperator::Equals, FilterOperator::NotEquals],
                description: None,
            },
        );
        vpc_fields.insert(
            "region".to_string(),
            DataSourceFieldDefinition {
                field_type: stratus::schema::DataSourceFieldType::String,
                supported_operators: vec![FilterOperator::Equals],
                description: None,
            },
        );
        vpc_fields.insert(
            "subnets".to_string(),
            DataSourceFieldDefinition {
                field_type: stratus::schema::DataSourceFieldType::Array,
                supported_operators: vec![FilterOperator::Equals, FilterOperator::Contains],
                description: None,
            },
        );
        vpc_fields.insert(
            "cidr".to_string(),
            DataSourceFieldDefinition {
                field_type: stratus::schema::DataSourceFieldType::String,
                supported_operators: vec![FilterOperator::Equals],
                description: None,
            },
        );
        data_sources.insert_type(
            VPC_DATA_SOURCE_TYPE,
            DataSourceTypeDefinition {
                fields: vpc_fields,
                filter_conflicts: vec![FilterFieldConflict {
                    field_a: "vpcId".into(),
                    field_b: "cidr".into(),
                }],
            },
        );

        Self {
            functions,
            resources,
            data_sources,
        }
    }

    pub fn params(&self) -> ValidateParams<'_> {
        ValidateParams {
            functions: &self.functions,
            resources: &self.resources,
            data_sources: &self.data_sources,
            child_exports: None,
            cancel: CancelToken::new(),
        }
    }
}

impl Default for TestRegistries {
    fn default() -> Self {
        Self::new()
    }
}

/// A blueprint with a supported version and nothing else.
pub fn blueprint_with_version() -> Blueprint {
    Blueprint {
        version: Some(ScalarValue::string("2025-05-12")),
        ..Blueprint::default()
    }
}

/// A resource of the fixture API type with a small valid spec.
pub fn valid_resource() -> Resource {
    let mut spec_fields = indexmap::IndexMap::new();
    spec_fields.insert(
        "host".to_string(),
        MappingNode::Scalar(ScalarValue::string("orders.internal")),
    );
    spec_fields.insert(
        "replicas".to_string(),
        MappingNode::Scalar(ScalarValue::int(2)),
    );
    Resource {
        resource_type: Some(ScalarValue::string(API_RESOURCE_TYPE)),
        spec: Some(MappingNode::fields(spec_fields)),
        ..Resource::default()
    }
}

/// A data source of the fixture VPC type with a valid filter and exports.
pub fn valid_data_source() -> DataSource {
    let mut exports = ElementMap::new();
    exports.insert(
        "vpcId",
        stratus::schema::DataSourceFieldExport {
            export_type: Some(ScalarValue::string("string")),
            alias_for: None,
            description: None,
        },
    );
    DataSource {
        data_source_type: Some(ScalarValue::string(VPC_DATA_SOURCE_TYPE)),
        filter: Some(DataSourceFilters {
            filters: vec![DataSourceFilter {
                field: Some(ScalarValue::string("vpcId")),
                operator: Some(ScalarValue::string("=")),
                search: Some(DataSourceFilterSearch {
                    values: vec![StringOrSubstitutions::literal("vpc-1234")],
                    source_meta: None,
                }),
                source_meta: None,
            }],
        }),
        exports,
        ..DataSource::default()
    }
}

/// A minimal valid blueprint: supported version plus one valid resource.
pub fn minimal_blueprint() -> Blueprint {
    let mut blueprint = blueprint_with_version();
    blueprint.resources.insert("api", valid_resource());
    blueprint
}

pub fn string_variable() -> Variable {
    Variable {
        var_type: VariableType::String,
        description: None,
        default: None,
        allowed_values: None,
    }
}

pub fn var_ref(name: &str) -> Substitution {
    Substitution::Variable(VariableReference {
        name: name.into(),
        source_meta: None,
    })
}

pub fn value_ref(name: &str) -> Substitution {
    Substitution::Value(ValueReference {
        name: name.into(),
        path: Vec::new(),
        source_meta: None,
    })
}

pub fn resource_ref(name: &str, path: Vec<PathSegment>) -> Substitution {
    Substitution::Resource(ResourceReference {
        name: name.into(),
        template_index: None,
        path,
        source_meta: None,
    })
}

pub fn sub_field(sub: Substitution) -> StringOrSubstitutions {
    StringOrSubstitutions::substitution(sub)
}

/// Flattened reason codes of a report's error tree, in recorded order.
pub fn leaf_reason_codes(report: &stratus::ValidationReport) -> Vec<stratus::ErrorReasonCode> {
    report
        .error
        .as_ref()
        .map(|error| {
            error
                .leaf_errors()
                .into_iter()
                .map(|leaf| leaf.reason_code)
                .collect()
        })
        .unwrap_or_default()
}

/// Flattened messages of a report's error tree, in recorded order.
pub fn leaf_messages(report: &stratus::ValidationReport) -> Vec<String> {
    report
        .error
        .as_ref()
        .map(|error| {
            error
                .leaf_errors()
                .into_iter()
                .map(|leaf| leaf.message.clone())
                .collect()
        })
        .unwrap_or_default()
}
