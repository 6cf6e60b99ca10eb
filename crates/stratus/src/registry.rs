//! Provider registries the validator resolves type information against.
//!
//! Registries are read-only collaborators owned by the host. Lookup
//! failures are infrastructure errors and abort the run; everything a user
//! can fix in the blueprint is reported through diagnostics instead. Every
//! method takes the run's [`CancelToken`] so implementations backed by
//! remote providers can honour cancellation and deadlines; the in-memory
//! implementations ignore it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::CancelToken;
use crate::errors::RegistryError;
use crate::schema::{DataSourceFieldType, ExportType, ScalarKind, ScalarValue, ValueType, VariableType};

/// The type a substitution expression resolves to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
    Function,
    Any,
}

impl ResolvedType {
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ResolvedType::String
                | ResolvedType::Integer
                | ResolvedType::Float
                | ResolvedType::Boolean
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedType::String => "string",
            ResolvedType::Integer => "integer",
            ResolvedType::Float => "float",
            ResolvedType::Boolean => "boolean",
            ResolvedType::Array => "array",
            ResolvedType::Object => "object",
            ResolvedType::Function => "function",
            ResolvedType::Any => "any",
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ScalarKind> for ResolvedType {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::String => ResolvedType::String,
            ScalarKind::Integer => ResolvedType::Integer,
            ScalarKind::Float => ResolvedType::Float,
            ScalarKind::Boolean => ResolvedType::Boolean,
        }
    }
}

impl From<ValueType> for ResolvedType {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::String => ResolvedType::String,
            ValueType::Integer => ResolvedType::Integer,
            ValueType::Float => ResolvedType::Float,
            ValueType::Boolean => ResolvedType::Boolean,
            ValueType::Object => ResolvedType::Object,
            ValueType::Array => ResolvedType::Array,
        }
    }
}

impl From<ExportType> for ResolvedType {
    fn from(export_type: ExportType) -> Self {
        match export_type {
            ExportType::String => ResolvedType::String,
            ExportType::Object => ResolvedType::Object,
            ExportType::Integer => ResolvedType::Integer,
            ExportType::Float => ResolvedType::Float,
            ExportType::Array => ResolvedType::Array,
            ExportType::Boolean => ResolvedType::Boolean,
        }
    }
}

impl From<DataSourceFieldType> for ResolvedType {
    fn from(field_type: DataSourceFieldType) -> Self {
        match field_type {
            DataSourceFieldType::String => ResolvedType::String,
            DataSourceFieldType::Integer => ResolvedType::Integer,
            DataSourceFieldType::Float => ResolvedType::Float,
            DataSourceFieldType::Boolean => ResolvedType::Boolean,
            DataSourceFieldType::Array => ResolvedType::Array,
        }
    }
}

impl From<&VariableType> for ResolvedType {
    fn from(var_type: &VariableType) -> Self {
        match var_type {
            VariableType::String => ResolvedType::String,
            VariableType::Integer => ResolvedType::Integer,
            VariableType::Float => ResolvedType::Float,
            VariableType::Boolean => ResolvedType::Boolean,
            // Custom variable types are scalar tags backed by provider
            // options and resolve as strings in substitutions.
            VariableType::Custom(_) => ResolvedType::String,
        }
    }
}

/// Provider-declared schema for a resource spec, walked by the mapping-node
/// validator and navigated by resource property references.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FieldSchema {
    String,
    Integer,
    Float,
    Boolean,
    Array(Box<FieldSchema>),
    Object(BTreeMap<String, FieldSchema>),
    Map(Box<FieldSchema>),
    Union(Vec<FieldSchema>),
}

impl FieldSchema {
    pub fn type_label(&self) -> &'static str {
        match self {
            FieldSchema::String => "string",
            FieldSchema::Integer => "integer",
            FieldSchema::Float => "float",
            FieldSchema::Boolean => "boolean",
            FieldSchema::Array(_) => "array",
            FieldSchema::Object(_) => "object",
            FieldSchema::Map(_) => "map",
            FieldSchema::Union(_) => "union",
        }
    }

    /// The resolved type of a substitution that references a field with
    /// this schema. Unions cannot be narrowed without evaluating, so they
    /// resolve to `any`.
    pub fn resolved_type(&self) -> ResolvedType {
        match self {
            FieldSchema::String => ResolvedType::String,
            FieldSchema::Integer => ResolvedType::Integer,
            FieldSchema::Float => ResolvedType::Float,
            FieldSchema::Boolean => ResolvedType::Boolean,
            FieldSchema::Array(_) => ResolvedType::Array,
            FieldSchema::Object(_) | FieldSchema::Map(_) => ResolvedType::Object,
            FieldSchema::Union(_) => ResolvedType::Any,
        }
    }
}

/// A resource type's spec schema plus the paths the provider computes at
/// deploy time (which therefore must not be set in a blueprint).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpecDefinition {
    pub schema: FieldSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub computed_field_paths: Vec<String>,
}

/// Signature of a substitution function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    pub return_type: ResolvedType,
    #[serde(default)]
    pub allows_named_args: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionParameter {
    #[serde(rename = "type")]
    pub param_type: ResolvedType,
    /// When non-empty, a string literal argument must be one of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub string_choices: Vec<String>,
    #[serde(default)]
    pub optional: bool,
}

/// Definition of a single data source field a provider can filter on and
/// export.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceFieldDefinition {
    #[serde(rename = "type")]
    pub field_type: DataSourceFieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_operators: Vec<FilterOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A pair of filter fields a provider declares as mutually exclusive.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterFieldConflict {
    pub field_a: String,
    pub field_b: String,
}

/// The closed set of data source filter operators.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "notContains")]
    NotContains,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
    #[serde(rename = "hasKey")]
    HasKey,
    #[serde(rename = "notHasKey")]
    NotHasKey,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notIn")]
    NotIn,
}

/// Every supported filter operator, in the order they are documented.
pub const SUPPORTED_FILTER_OPERATORS: [FilterOperator; 14] = [
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::Contains,
    FilterOperator::NotContains,
    FilterOperator::StartsWith,
    FilterOperator::EndsWith,
    FilterOperator::HasKey,
    FilterOperator::NotHasKey,
    FilterOperator::GreaterThan,
    FilterOperator::GreaterThanOrEqual,
    FilterOperator::LessThan,
    FilterOperator::LessThanOrEqual,
    FilterOperator::In,
    FilterOperator::NotIn,
];

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "=",
            FilterOperator::NotEquals => "!=",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "notContains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::HasKey => "hasKey",
            FilterOperator::NotHasKey => "notHasKey",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        SUPPORTED_FILTER_OPERATORS
            .iter()
            .copied()
            .find(|op| op.as_str() == raw)
    }

    /// The operator list rendered for error messages.
    pub fn supported_list() -> String {
        SUPPORTED_FILTER_OPERATORS
            .iter()
            .map(|op| op.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog of substitution functions.
pub trait FunctionRegistry: Send + Sync {
    fn has_function(&self, cancel: &CancelToken, name: &str) -> Result<bool, RegistryError>;
    fn definition(
        &self,
        cancel: &CancelToken,
        name: &str,
    ) -> Result<FunctionDefinition, RegistryError>;
}

/// Catalog of resource types and provider-defined variable types.
pub trait ResourceRegistry: Send + Sync {
    fn has_resource_type(
        &self,
        cancel: &CancelToken,
        resource_type: &str,
    ) -> Result<bool, RegistryError>;

    fn spec_definition(
        &self,
        cancel: &CancelToken,
        resource_type: &str,
    ) -> Result<ResourceSpecDefinition, RegistryError>;

    /// Options for a provider-defined custom variable type. `None` means
    /// the type is unknown to every loaded provider (a user error, not an
    /// infrastructure failure).
    fn custom_variable_type_options(
        &self,
        cancel: &CancelToken,
        variable_type: &str,
    ) -> Result<Option<BTreeMap<String, ScalarValue>>, RegistryError>;
}

/// Catalog of data source types.
pub trait DataSourceRegistry: Send + Sync {
    fn has_data_source_type(
        &self,
        cancel: &CancelToken,
        data_source_type: &str,
    ) -> Result<bool, RegistryError>;

    fn field_definitions(
        &self,
        cancel: &CancelToken,
        data_source_type: &str,
    ) -> Result<BTreeMap<String, DataSourceFieldDefinition>, RegistryError>;

    fn filter_field_conflicts(
        &self,
        cancel: &CancelToken,
        data_source_type: &str,
    ) -> Result<Vec<FilterFieldConflict>, RegistryError>;
}

/// Export metadata resolved from a child blueprint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChildExportInfo {
    pub export_type: ExportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Failure from the optional child-export lookup. `ExportMissing` is a user
/// error (the child resolved but does not declare the export); anything
/// else aborts the run.
#[derive(Debug, Error)]
pub enum ChildExportError {
    #[error("child blueprint \"{child}\" does not export \"{export}\"")]
    ExportMissing { child: String, export: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Optional capability that resolves exports of child blueprints without
/// parsing them during this pass. `Ok(None)` means the child could not be
/// resolved and the reference type stays `any`.
pub trait ChildExportResolver: Send + Sync {
    fn resolve_export(
        &self,
        cancel: &CancelToken,
        child_name: &str,
        export_name: &str,
    ) -> Result<Option<ChildExportInfo>, ChildExportError>;
}

/// Serde-loadable function catalog used by tests and the CLI.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryFunctionRegistry {
    #[serde(default)]
    functions: BTreeMap<String, FunctionDefinition>,
}

impl InMemoryFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: FunctionDefinition) {
        self.functions.insert(definition.name.clone(), definition);
    }
}

impl FunctionRegistry for InMemoryFunctionRegistry {
    fn has_function(&self, _cancel: &CancelToken, name: &str) -> Result<bool, RegistryError> {
        Ok(self.functions.contains_key(name))
    }

    fn definition(
        &self,
        _cancel: &CancelToken,
        name: &str,
    ) -> Result<FunctionDefinition, RegistryError> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Lookup(format!("no definition for function \"{name}\"")))
    }
}

/// Serde-loadable resource type catalog used by tests and the CLI.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryResourceRegistry {
    #[serde(default)]
    resource_types: BTreeMap<String, ResourceSpecDefinition>,
    #[serde(default)]
    variable_types: BTreeMap<String, BTreeMap<String, ScalarValue>>,
}

impl InMemoryResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_resource_type(
        &mut self,
        resource_type: impl Into<String>,
        definition: ResourceSpecDefinition,
    ) {
        self.resource_types.insert(resource_type.into(), definition);
    }

    pub fn insert_variable_type(
        &mut self,
        variable_type: impl Into<String>,
        options: BTreeMap<String, ScalarValue>,
    ) {
        self.variable_types.insert(variable_type.into(), options);
    }
}

impl ResourceRegistry for InMemoryResourceRegistry {
    fn has_resource_type(
        &self,
        _cancel: &CancelToken,
        resource_type: &str,
    ) -> Result<bool, RegistryError> {
        Ok(self.resource_types.contains_key(resource_type))
    }

    fn spec_definition(
        &self,
        _cancel: &CancelToken,
        resource_type: &str,
    ) -> Result<ResourceSpecDefinition, RegistryError> {
        self.resource_types
            .get(resource_type)
            .cloned()
            .ok_or_else(|| {
                RegistryError::Lookup(format!(
                    "no spec definition for resource type \"{resource_type}\""
                ))
            })
    }

    fn custom_variable_type_options(
        &self,
        _cancel: &CancelToken,
        variable_type: &str,
    ) -> Result<Option<BTreeMap<String, ScalarValue>>, RegistryError> {
        Ok(self.variable_types.get(variable_type).cloned())
    }
}

/// A data source type's fields and pairwise filter conflicts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceTypeDefinition {
    #[serde(default)]
    pub fields: BTreeMap<String, DataSourceFieldDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_conflicts: Vec<FilterFieldConflict>,
}

/// Serde-loadable data source catalog used by tests and the CLI.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryDataSourceRegistry {
    #[serde(default)]
    data_source_types: BTreeMap<String, DataSourceTypeDefinition>,
}

impl InMemoryDataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_type(
        &mut self,
        data_source_type: impl Into<String>,
        definition: DataSourceTypeDefinition,
    ) {
        self.data_source_types
            .insert(data_source_type.into(), definition);
    }
}

impl DataSourceRegistry for InMemoryDataSourceRegistry {
    fn has_data_source_type(
        &self,
        _cancel: &CancelToken,
        data_source_type: &str,
    ) -> Result<bool, RegistryError> {
        Ok(self.data_source_types.contains_key(data_source_type))
    }

    fn field_definitions(
        &self,
        _cancel: &CancelToken,
        data_source_type: &str,
    ) -> Result<BTreeMap<String, DataSourceFieldDefinition>, RegistryError> {
        self.data_source_types
            .get(data_source_type)
            .map(|def| def.fields.clone())
            .ok_or_else(|| {
                RegistryError::Lookup(format!(
                    "no field definitions for data source type \"{data_source_type}\""
                ))
            })
    }

    fn filter_field_conflicts(
        &self,
        _cancel: &CancelToken,
        data_source_type: &str,
    ) -> Result<Vec<FilterFieldConflict>, RegistryError> {
        self.data_source_types
            .get(data_source_type)
            .map(|def| def.filter_conflicts.clone())
            .ok_or_else(|| {
                RegistryError::Lookup(format!(
                    "no filter conflicts for data source type \"{data_source_type}\""
                ))
            })
    }
}
