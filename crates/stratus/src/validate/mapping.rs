//! Recursive typed walk of mapping nodes, either against a provider
//! schema (resource specs) or free-form (include variables/metadata,
//! nested value content, custom resource metadata).

use std::collections::BTreeSet;

use crate::diagnostics::Diagnostic;
use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::refgraph::ReferenceChainCollector;
use crate::registry::FieldSchema;
use crate::schema::{MappingNode, ScalarKind};
use crate::source::{DiagnosticRange, optional_range};
use crate::validate::substitutions::{SubUsage, validate_string_field};
use crate::validate::{ElementScope, MAX_TRAVERSE_DEPTH, has_substitution_token};

fn depth_exceeded(diagnostics: &mut Vec<Diagnostic>, range: Option<DiagnosticRange>) {
    diagnostics.push(Diagnostic::info(
        format!(
            "Exceeded max traverse depth of {MAX_TRAVERSE_DEPTH}. Skipping further validation."
        ),
        range,
    ));
}

/// Pre-pass over a mapping node that rejects substitution tokens inside
/// object keys on every branch, including branches the schema walk may
/// skip.
pub(crate) fn check_map_keys(node: &MappingNode, path: &str, errors: &mut Vec<LoadError>) {
    match node {
        MappingNode::Fields { fields, source_meta } => {
            for (key, child) in fields {
                if has_substitution_token(key) {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidMapKey,
                            format!(
                                "validation failed due to a substitution being used in the \
                                 object key \"{key}\" at \"{path}\", substitutions are not \
                                 supported in map keys"
                            ),
                        )
                        .with_range(optional_range(source_meta)),
                    );
                    continue;
                }
                check_map_keys(child, &format!("{path}.{key}"), errors);
            }
        }
        MappingNode::Items { items, .. } => {
            for (index, item) in items.iter().enumerate() {
                check_map_keys(item, &format!("{path}[{index}]"), errors);
            }
        }
        MappingNode::Scalar(_) | MappingNode::StringWithSubstitutions(_) => {}
    }
}

/// Walks `node` against a provider-supplied schema. Keys containing
/// substitution tokens are skipped silently here; [`check_map_keys`] runs
/// first and reports them.
pub(crate) fn validate_with_schema(
    node: &MappingNode,
    schema: &FieldSchema,
    computed: &BTreeSet<String>,
    path: &str,
    depth: usize,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    scope.params.cancel.check()?;
    let range = optional_range(&node.source_meta().copied());

    if depth >= MAX_TRAVERSE_DEPTH {
        depth_exceeded(diagnostics, range);
        return Ok(());
    }

    if computed.contains(path) {
        errors.push(
            LoadError::new(
                ErrorReasonCode::ComputedFieldInBlueprint,
                format!(
                    "validation failed due to the computed field \"{path}\" being set in the \
                     blueprint, computed fields are populated by the provider at deploy time"
                ),
            )
            .with_range(range),
        );
        return Ok(());
    }

    if let FieldSchema::Union(members) = schema {
        for member in members {
            let mut trial_diagnostics = Vec::new();
            let mut trial_errors = Vec::new();
            validate_with_schema(
                node,
                member,
                computed,
                path,
                depth,
                scope,
                collector,
                &mut trial_diagnostics,
                &mut trial_errors,
            )?;
            if trial_errors.is_empty() {
                diagnostics.extend(trial_diagnostics);
                return Ok(());
            }
        }
        let members_label = members
            .iter()
            .map(FieldSchema::type_label)
            .collect::<Vec<_>>()
            .join(", ");
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidMappingNode,
                format!(
                    "validation failed due to the value at \"{path}\" not matching any of the \
                     expected types: {members_label}"
                ),
            )
            .with_range(range),
        );
        return Ok(());
    }

    match (node, schema) {
        (MappingNode::Scalar(scalar), _) => {
            if !scalar_matches_schema(scalar.kind(), schema) {
                push_type_mismatch(path, schema.type_label(), node.surface_label(), range, errors);
            }
            Ok(())
        }
        (MappingNode::StringWithSubstitutions(field), _) => {
            validate_string_field(
                field,
                SubUsage::MappingField(schema.resolved_type()),
                path,
                scope,
                collector,
                diagnostics,
                errors,
            )?;
            Ok(())
        }
        (MappingNode::Fields { fields, .. }, FieldSchema::Object(attrs)) => {
            for (key, child) in fields {
                if has_substitution_token(key) {
                    continue;
                }
                let child_path = format!("{path}.{key}");
                match attrs.get(key) {
                    Some(attr_schema) => validate_with_schema(
                        child,
                        attr_schema,
                        computed,
                        &child_path,
                        depth + 1,
                        scope,
                        collector,
                        diagnostics,
                        errors,
                    )?,
                    None => errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidMappingNode,
                            format!(
                                "validation failed due to an unknown field \"{key}\" at \
                                 \"{path}\", the field is not defined in the schema"
                            ),
                        )
                        .with_range(optional_range(&child.source_meta().copied()).or(range)),
                    ),
                }
            }
            Ok(())
        }
        (MappingNode::Fields { fields, .. }, FieldSchema::Map(value_schema)) => {
            for (key, child) in fields {
                if has_substitution_token(key) {
                    continue;
                }
                validate_with_schema(
                    child,
                    value_schema,
                    computed,
                    &format!("{path}.{key}"),
                    depth + 1,
                    scope,
                    collector,
                    diagnostics,
                    errors,
                )?;
            }
            Ok(())
        }
        (MappingNode::Items { items, .. }, FieldSchema::Array(item_schema)) => {
            for (index, item) in items.iter().enumerate() {
                validate_with_schema(
                    item,
                    item_schema,
                    computed,
                    &format!("{path}[{index}]"),
                    depth + 1,
                    scope,
                    collector,
                    diagnostics,
                    errors,
                )?;
            }
            Ok(())
        }
        (MappingNode::Fields { .. }, _) | (MappingNode::Items { .. }, _) => {
            push_type_mismatch(path, schema.type_label(), node.surface_label(), range, errors);
            Ok(())
        }
    }
}

/// Walks free-form content with no schema: the depth guard, map-key checks,
/// and substitution type-checking still apply.
pub(crate) fn validate_free_form(
    node: &MappingNode,
    path: &str,
    depth: usize,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    scope.params.cancel.check()?;
    let range = optional_range(&node.source_meta().copied());

    if depth >= MAX_TRAVERSE_DEPTH {
        depth_exceeded(diagnostics, range);
        return Ok(());
    }

    match node {
        MappingNode::Scalar(_) => Ok(()),
        MappingNode::StringWithSubstitutions(field) => {
            validate_string_field(
                field,
                SubUsage::General,
                path,
                scope,
                collector,
                diagnostics,
                errors,
            )?;
            Ok(())
        }
        MappingNode::Fields { fields, source_meta } => {
            for (key, child) in fields {
                if has_substitution_token(key) {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidMapKey,
                            format!(
                                "validation failed due to a substitution being used in the \
                                 object key \"{key}\" at \"{path}\", substitutions are not \
                                 supported in map keys"
                            ),
                        )
                        .with_range(optional_range(source_meta)),
                    );
                    continue;
                }
                validate_free_form(
                    child,
                    &format!("{path}.{key}"),
                    depth + 1,
                    scope,
                    collector,
                    diagnostics,
                    errors,
                )?;
            }
            Ok(())
        }
        MappingNode::Items { items, .. } => {
            for (index, item) in items.iter().enumerate() {
                validate_free_form(
                    item,
                    &format!("{path}[{index}]"),
                    depth + 1,
                    scope,
                    collector,
                    diagnostics,
                    errors,
                )?;
            }
            Ok(())
        }
    }
}

fn scalar_matches_schema(kind: ScalarKind, schema: &FieldSchema) -> bool {
    matches!(
        (kind, schema),
        (ScalarKind::String, FieldSchema::String)
            | (ScalarKind::Integer, FieldSchema::Integer)
            | (ScalarKind::Integer, FieldSchema::Float)
            | (ScalarKind::Float, FieldSchema::Float)
            | (ScalarKind::Boolean, FieldSchema::Boolean)
    )
}

fn push_type_mismatch(
    path: &str,
    expected: &str,
    actual: &str,
    range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) {
    errors.push(
        LoadError::new(
            ErrorReasonCode::InvalidMappingNode,
            format!(
                "validation failed due to an unexpected value type at \"{path}\", expected \
                 \"{expected}\" but found \"{actual}\""
            ),
        )
        .with_range(range),
    );
}
