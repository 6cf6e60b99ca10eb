//! Mapping nodes: the typed tree that represents free-form user-supplied
//! data such as resource specs, value content, and include variables.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::schema::substitutions::StringOrSubstitutions;
use crate::source::SourceMeta;

/// A scalar literal as it appears in a blueprint document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Bool(_) => ScalarKind::Boolean,
            Scalar::Int(_) => ScalarKind::Integer,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Str(_) => ScalarKind::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Str(value) => write!(f, "{value}"),
        }
    }
}

/// The type of a scalar literal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::String => write!(f, "string"),
            ScalarKind::Integer => write!(f, "integer"),
            ScalarKind::Float => write!(f, "float"),
            ScalarKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// A scalar with the source position it was parsed at.
///
/// Serialises as a bare scalar when no position is attached, and as a
/// `{ value, sourceMeta }` mapping otherwise; both forms deserialise.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarValue {
    pub value: Scalar,
    pub source_meta: Option<SourceMeta>,
}

impl ScalarValue {
    pub fn new(value: Scalar) -> Self {
        Self {
            value,
            source_meta: None,
        }
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        Self::new(Scalar::Str(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Self::new(Scalar::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(Scalar::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Scalar::Bool(value))
    }

    pub fn with_meta(mut self, meta: SourceMeta) -> Self {
        self.source_meta = Some(meta);
        self
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn kind(&self) -> ScalarKind {
        self.value.kind()
    }
}

impl Serialize for ScalarValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &self.source_meta {
            None => self.value.serialize(serializer),
            Some(meta) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("value", &self.value)?;
                map.serialize_entry("sourceMeta", meta)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ScalarValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ScalarValueVisitor;

        impl<'de> Visitor<'de> for ScalarValueVisitor {
            type Value = ScalarValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a scalar or a {value, sourceMeta} mapping")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
                Ok(ScalarValue::bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Ok(ScalarValue::int(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                i64::try_from(value)
                    .map(ScalarValue::int)
                    .map_err(|_| E::custom("integer scalar out of range"))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
                Ok(ScalarValue::float(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(ScalarValue::string(value))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut value: Option<Scalar> = None;
                let mut source_meta: Option<SourceMeta> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "value" => {
                            if value.is_some() {
                                return Err(de::Error::duplicate_field("value"));
                            }
                            value = Some(map.next_value()?);
                        }
                        "sourceMeta" => {
                            if source_meta.is_some() {
                                return Err(de::Error::duplicate_field("sourceMeta"));
                            }
                            source_meta = Some(map.next_value()?);
                        }
                        other => {
                            return Err(de::Error::unknown_field(other, &["value", "sourceMeta"]));
                        }
                    }
                }

                let value = value.ok_or_else(|| de::Error::missing_field("value"))?;
                Ok(ScalarValue { value, source_meta })
            }
        }

        deserializer.deserialize_any(ScalarValueVisitor)
    }
}

/// Free-form user-supplied data: a discriminated union with exactly one
/// branch populated per node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum MappingNode {
    Scalar(ScalarValue),
    Fields {
        fields: IndexMap<String, MappingNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_meta: Option<SourceMeta>,
    },
    Items {
        items: Vec<MappingNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_meta: Option<SourceMeta>,
    },
    StringWithSubstitutions(StringOrSubstitutions),
}

impl MappingNode {
    pub fn source_meta(&self) -> Option<&SourceMeta> {
        match self {
            MappingNode::Scalar(scalar) => scalar.source_meta.as_ref(),
            MappingNode::Fields { source_meta, .. } => source_meta.as_ref(),
            MappingNode::Items { source_meta, .. } => source_meta.as_ref(),
            MappingNode::StringWithSubstitutions(value) => value.source_meta.as_ref(),
        }
    }

    /// The surface type of this node, used in type-mismatch messages.
    pub fn surface_label(&self) -> &'static str {
        match self {
            MappingNode::Scalar(scalar) => match scalar.kind() {
                ScalarKind::String => "string",
                ScalarKind::Integer => "integer",
                ScalarKind::Float => "float",
                ScalarKind::Boolean => "boolean",
            },
            MappingNode::Fields { .. } => "object",
            MappingNode::Items { .. } => "array",
            MappingNode::StringWithSubstitutions(_) => "string with substitutions",
        }
    }

    /// True for a node with no meaningful content, e.g. an empty object or
    /// an empty string-with-substitutions list.
    pub fn is_empty(&self) -> bool {
        match self {
            MappingNode::Scalar(_) => false,
            MappingNode::Fields { fields, .. } => fields.is_empty(),
            MappingNode::Items { items, .. } => items.is_empty(),
            MappingNode::StringWithSubstitutions(value) => value.is_empty(),
        }
    }

    pub fn fields(fields: IndexMap<String, MappingNode>) -> Self {
        MappingNode::Fields {
            fields,
            source_meta: None,
        }
    }

    pub fn items(items: Vec<MappingNode>) -> Self {
        MappingNode::Items {
            items,
            source_meta: None,
        }
    }
}
