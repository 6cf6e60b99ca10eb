//! AST produced by the `${…}` substitution expression parser.
//!
//! The parser itself is an external collaborator; this module only defines
//! the tree the validator type-checks. Every node carries the source
//! metadata recorded by the parser.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::schema::mapping::ScalarValue;
use crate::source::SourceMeta;

/// A string field that may interleave literal text with substitution
/// expressions. A single-element list is either a pure literal or a pure
/// expression; more than one element represents string interpolation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StringOrSubstitutions {
    pub values: Vec<StringPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

impl StringOrSubstitutions {
    /// A pure literal string with no substitutions.
    pub fn literal<S: Into<String>>(value: S) -> Self {
        Self {
            values: vec![StringPart::Literal(LiteralString {
                value: value.into(),
                source_meta: None,
            })],
            source_meta: None,
        }
    }

    /// A single-expression field wrapping one substitution.
    pub fn substitution(sub: Substitution) -> Self {
        Self {
            values: vec![StringPart::Substitution(sub)],
            source_meta: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the field interpolates more than one part.
    pub fn is_interpolated(&self) -> bool {
        self.values.len() > 1
    }

    pub fn has_substitutions(&self) -> bool {
        self.values
            .iter()
            .any(|part| matches!(part, StringPart::Substitution(_)))
    }

    /// The single substitution expression, if this field is exactly one.
    pub fn single_substitution(&self) -> Option<&Substitution> {
        match self.values.as_slice() {
            [StringPart::Substitution(sub)] => Some(sub),
            _ => None,
        }
    }

    /// The concatenated literal text, if no part is a substitution.
    pub fn literal_text(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.values {
            match part {
                StringPart::Literal(lit) => out.push_str(&lit.value),
                StringPart::Substitution(_) => return None,
            }
        }
        Some(out)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum StringPart {
    Literal(LiteralString),
    Substitution(Substitution),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiteralString {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// A single substitution expression.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Substitution {
    Variable(VariableReference),
    Value(ValueReference),
    Resource(ResourceReference),
    DataSource(DataSourceReference),
    Child(ChildReference),
    ElemRef(ElemReference),
    Function(FunctionCall),
    Literal(ScalarValue),
}

impl Substitution {
    pub fn source_meta(&self) -> Option<&SourceMeta> {
        match self {
            Substitution::Variable(sub) => sub.source_meta.as_ref(),
            Substitution::Value(sub) => sub.source_meta.as_ref(),
            Substitution::Resource(sub) => sub.source_meta.as_ref(),
            Substitution::DataSource(sub) => sub.source_meta.as_ref(),
            Substitution::Child(sub) => sub.source_meta.as_ref(),
            Substitution::ElemRef(sub) => sub.source_meta.as_ref(),
            Substitution::Function(sub) => sub.source_meta.as_ref(),
            Substitution::Literal(scalar) => scalar.source_meta.as_ref(),
        }
    }
}

/// `${variables.<name>}`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariableReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// `${values.<name>}` with an optional path into the value content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// `${resources.<name>}` with an optional template index and property path.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    pub name: String,
    /// Index into a resource template's instances; only legal when the
    /// referenced resource declares `each`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// `${datasources.<name>.<field>}` with an optional element index for
/// array-typed fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceReference {
    pub name: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// `${children.<name>.<export>}`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChildReference {
    pub name: String,
    pub export: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// `${elem.value}` / `${elem.index}`: the current element of a resource
/// template iteration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElemReference {
    pub kind: ElemRefKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElemRefKind {
    Value,
    Index,
}

/// A function call expression, e.g. `${trim(variables.name)}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Vec<FunctionArg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
}

/// A positional (`name: None`) or named function argument.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionArg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: Substitution,
}

/// One step of a property path through a value or resource reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PathSegment {
    Field(String),
    Index(i64),
}

/// Renders a property path the way it appears in the surface syntax,
/// e.g. `spec.ports[0].containerPort`.
pub fn render_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathSegment::Index(index) => {
                let _ = write!(out, "[{index}]");
            }
        }
    }
    out
}
