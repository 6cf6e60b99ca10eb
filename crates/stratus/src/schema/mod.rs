//! The blueprint schema tree.
//!
//! This is the in-memory form produced by a surface-syntax front-end
//! (YAML/JSON): ordered element maps with per-key source metadata, scalar
//! values with positions, and string fields that may embed substitution
//! expressions. The validator treats the whole tree as immutable.

pub mod mapping;
pub mod substitutions;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use mapping::{MappingNode, Scalar, ScalarKind, ScalarValue};
pub use substitutions::{
    ChildReference, DataSourceReference, ElemRefKind, ElemReference, FunctionArg, FunctionCall,
    LiteralString, PathSegment, ResourceReference, StringOrSubstitutions, StringPart, Substitution,
    ValueReference, VariableReference,
};

use crate::source::SourceMeta;

/// An insertion-ordered map of named entities with per-key source metadata.
///
/// Iteration order is the order the parser inserted keys in, which keeps
/// diagnostics deterministic for a given document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementMap<T> {
    #[serde(default = "IndexMap::new")]
    pub values: IndexMap<String, T>,
    #[serde(default = "IndexMap::new", skip_serializing_if = "IndexMap::is_empty")]
    pub source_meta: IndexMap<String, SourceMeta>,
}

impl<T> Default for ElementMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ElementMap<T> {
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
            source_meta: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.values.get(name)
    }

    pub fn meta(&self, name: &str) -> Option<&SourceMeta> {
        self.source_meta.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.values.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), value);
    }

    pub fn insert_with_meta(&mut self, name: impl Into<String>, value: T, meta: SourceMeta) {
        let name = name.into();
        self.source_meta.insert(name.clone(), meta);
        self.values.insert(name, value);
    }
}

/// The root declarative document.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformList>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub variables: ElementMap<Variable>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub values: ElementMap<Value>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub includes: ElementMap<Include>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub resources: ElementMap<Resource>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub data_sources: ElementMap<DataSource>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub exports: ElementMap<Export>,
}

/// Ordered transform names with the source position of each entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransformList {
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_meta: Vec<SourceMeta>,
}

impl TransformList {
    /// Position of the transform at `index`, when the parser recorded one.
    pub fn meta(&self, index: usize) -> Option<&SourceMeta> {
        self.source_meta.get(index)
    }
}

/// A typed input parameter of the blueprint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<ScalarValue>>,
}

/// The declared type of a variable: one of the core scalar types or a
/// provider-defined custom type tag such as `aws/ec2/instanceType`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariableType {
    String,
    Integer,
    Float,
    Boolean,
    Custom(String),
}

impl VariableType {
    pub fn as_str(&self) -> &str {
        match self {
            VariableType::String => "string",
            VariableType::Integer => "integer",
            VariableType::Float => "float",
            VariableType::Boolean => "boolean",
            VariableType::Custom(name) => name.as_str(),
        }
    }

    pub fn custom_type(&self) -> Option<&str> {
        match self {
            VariableType::Custom(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// The scalar kind values of this variable type must have. Custom types
    /// are scalar-valued; their kind comes from the provider's options.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            VariableType::String => Some(ScalarKind::String),
            VariableType::Integer => Some(ScalarKind::Integer),
            VariableType::Float => Some(ScalarKind::Float),
            VariableType::Boolean => Some(ScalarKind::Boolean),
            VariableType::Custom(_) => None,
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for VariableType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VariableType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "string" => VariableType::String,
            "integer" => VariableType::Integer,
            "float" => VariableType::Float,
            "boolean" => VariableType::Boolean,
            _ => VariableType::Custom(raw),
        })
    }
}

/// A named, typed piece of derived data.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MappingNode>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Object => "object",
            ValueType::Array => "array",
        };
        write!(f, "{label}")
    }
}

/// A child blueprint pulled in by path.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Include {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<MappingNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MappingNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<StringOrSubstitutions>,
}

/// A deployable resource declaration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// An array-valued substitution that turns this resource into a
    /// template producing one instance per array element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub each: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selector: Option<LinkSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<MappingNode>,
}

impl Resource {
    pub fn is_template(&self) -> bool {
        self.each.is_some()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub labels: ElementMap<String>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub annotations: ElementMap<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<MappingNode>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkSelector {
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub by_label: ElementMap<String>,
}

/// A recursive deployment condition: exactly one of the four branches must
/// be populated on any nested node.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// An external data lookup resolved at deploy time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_source_type: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DataSourceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<DataSourceFilters>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub exports: ElementMap<DataSourceFieldExport>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "ElementMap::is_empty")]
    pub annotations: ElementMap<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<MappingNode>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceFilters {
    pub filters: Vec<DataSourceFilter>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<ScalarValue>,
    /// Raw operator string; validated against the global operator enum and
    /// the provider's per-field operator set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<DataSourceFilterSearch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceFilterSearch {
    pub values: Vec<StringOrSubstitutions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// An exported field of a data source, keyed by alias in the enclosing map.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceFieldExport {
    /// Raw declared type; validated against [`DataSourceFieldType`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub export_type: Option<ScalarValue>,
    /// The provider field this alias exports; defaults to the alias itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<StringOrSubstitutions>,
}

impl DataSourceFieldExport {
    /// The provider field name this export reads from.
    pub fn source_field<'a>(&'a self, alias: &'a str) -> &'a str {
        self.alias_for.as_deref().unwrap_or(alias)
    }
}

/// A named output of the blueprint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    /// Raw declared type; validated against [`ExportType`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub export_type: Option<ScalarValue>,
    /// Dotted path to the exported field, e.g. `resources.orderApi.spec.id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<StringOrSubstitutions>,
}

/// The closed set of types an export may declare.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    String,
    Object,
    Integer,
    Float,
    Array,
    Boolean,
}

impl ExportType {
    pub const ALL: [ExportType; 6] = [
        ExportType::String,
        ExportType::Object,
        ExportType::Integer,
        ExportType::Float,
        ExportType::Array,
        ExportType::Boolean,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(ExportType::String),
            "object" => Some(ExportType::Object),
            "integer" => Some(ExportType::Integer),
            "float" => Some(ExportType::Float),
            "array" => Some(ExportType::Array),
            "boolean" => Some(ExportType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::String => "string",
            ExportType::Object => "object",
            ExportType::Integer => "integer",
            ExportType::Float => "float",
            ExportType::Array => "array",
            ExportType::Boolean => "boolean",
        }
    }

    /// The valid set rendered for error messages, in declaration order.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|ty| ty.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of types a data source field may declare.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceFieldType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
}

impl DataSourceFieldType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(DataSourceFieldType::String),
            "integer" => Some(DataSourceFieldType::Integer),
            "float" => Some(DataSourceFieldType::Float),
            "boolean" => Some(DataSourceFieldType::Boolean),
            "array" => Some(DataSourceFieldType::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceFieldType::String => "string",
            DataSourceFieldType::Integer => "integer",
            DataSourceFieldType::Float => "float",
            DataSourceFieldType::Boolean => "boolean",
            DataSourceFieldType::Array => "array",
        }
    }
}

impl fmt::Display for DataSourceFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
