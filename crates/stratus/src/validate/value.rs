//! Value validation: declared type, non-empty content, and content
//! type-checking through the mapping-node and substitution validators.

use crate::diagnostics::Diagnostic;
use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::refgraph::ReferenceChainCollector;
use crate::schema::{MappingNode, ScalarKind, Value, ValueType};
use crate::source::{SourceMeta, optional_range};
use crate::validate::mapping::validate_free_form;
use crate::validate::substitutions::{SubUsage, validate_string_field};
use crate::validate::{ElementScope, validate_element_name};

pub(crate) fn validate_value(
    name: &str,
    value: &Value,
    meta: Option<&SourceMeta>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    validate_element_name(name, "value", ErrorReasonCode::InvalidValue, meta, errors);
    let element_range = meta.map(SourceMeta::range);

    if let Some(description) = &value.description {
        validate_string_field(
            description,
            SubUsage::Description,
            "description",
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }

    if value.value_type.is_none() {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidValue,
                format!(
                    "validation failed due to a missing type for value \"{name}\", a type \
                     must be provided"
                ),
            )
            .with_range(element_range),
        );
    }

    let Some(content) = &value.content else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidValue,
                format!(
                    "validation failed due to missing content for value \"{name}\", values \
                     must define a content field"
                ),
            )
            .with_range(element_range),
        );
        return Ok(());
    };

    if content.is_empty() {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidValue,
                format!("validation failed due to empty content being provided for value \"{name}\""),
            )
            .with_range(optional_range(&content.source_meta().copied()).or(element_range)),
        );
        return Ok(());
    }

    validate_content(name, value.value_type, content, scope, collector, diagnostics, errors)
}

fn validate_content(
    name: &str,
    declared: Option<ValueType>,
    content: &MappingNode,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    let content_range = optional_range(&content.source_meta().copied());

    match content {
        MappingNode::StringWithSubstitutions(field) => {
            let usage = match declared {
                Some(value_type) => SubUsage::ValueContent(value_type),
                None => SubUsage::General,
            };
            validate_string_field(field, usage, "content", scope, collector, diagnostics, errors)?;
            Ok(())
        }
        MappingNode::Scalar(scalar) => {
            if let Some(declared) = declared {
                if !scalar_matches_value_type(scalar.kind(), declared) {
                    errors.push(content_mismatch(name, declared, content, content_range));
                }
            }
            Ok(())
        }
        MappingNode::Fields { .. } => {
            if let Some(declared) = declared {
                if declared != ValueType::Object {
                    errors.push(content_mismatch(name, declared, content, content_range));
                }
            }
            validate_free_form(content, "content", 0, scope, collector, diagnostics, errors)
        }
        MappingNode::Items { .. } => {
            if let Some(declared) = declared {
                if declared != ValueType::Array {
                    errors.push(content_mismatch(name, declared, content, content_range));
                }
            }
            validate_free_form(content, "content", 0, scope, collector, diagnostics, errors)
        }
    }
}

fn content_mismatch(
    name: &str,
    declared: ValueType,
    content: &MappingNode,
    range: Option<crate::source::DiagnosticRange>,
) -> LoadError {
    LoadError::new(
        ErrorReasonCode::InvalidValueType,
        format!(
            "validation failed due to the content of value \"{name}\" not matching its \
             declared type \"{declared}\", found \"{}\"",
            content.surface_label()
        ),
    )
    .with_range(range)
}

fn scalar_matches_value_type(kind: ScalarKind, declared: ValueType) -> bool {
    matches!(
        (kind, declared),
        (ScalarKind::String, ValueType::String)
            | (ScalarKind::Integer, ValueType::Integer)
            | (ScalarKind::Integer, ValueType::Float)
            | (ScalarKind::Float, ValueType::Float)
            | (ScalarKind::Boolean, ValueType::Boolean)
    )
}
