//! Resource validation: type lookup, metadata and link-selector rules,
//! dependencies, conditions, `each`, and the provider-schema spec walk.

use std::collections::BTreeSet;

use crate::diagnostics::Diagnostic;
use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::refgraph::{ReferenceChainCollector, dependency_tag, link_tag};
use crate::schema::{Condition, Resource};
use crate::source::{DiagnosticRange, SourceMeta, optional_range};
use crate::validate::mapping::{check_map_keys, validate_free_form, validate_with_schema};
use crate::validate::substitutions::{SubUsage, validate_string_field};
use crate::validate::{ElementScope, has_substitution_token, validate_element_name};

pub(crate) fn validate_resource(
    name: &str,
    resource: &Resource,
    meta: Option<&SourceMeta>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    validate_element_name(name, "resource", ErrorReasonCode::InvalidResource, meta, errors);
    let element_range = meta.map(SourceMeta::range);

    let resource_type = validate_resource_type(name, resource, element_range, scope, errors)?;

    if let Some(description) = &resource.description {
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

    validate_metadata(name, resource, element_range, scope, collector, diagnostics, errors)?;
    validate_link_selector(name, resource, element_range, errors);
    validate_depends_on(name, resource, element_range, scope, collector, errors);
    collect_link_edges(name, resource, scope, collector);

    if let Some(condition) = &resource.condition {
        validate_condition(condition, 0, scope, collector, diagnostics, errors)?;
    }

    if let Some(each) = &resource.each {
        validate_string_field(each, SubUsage::Each, "each", scope, collector, diagnostics, errors)?;
    }

    if let Some(spec) = &resource.spec {
        check_map_keys(spec, "spec", errors);
        if let Some(resource_type) = resource_type {
            let definition = scope
                .params
                .resources
                .spec_definition(&scope.params.cancel, &resource_type)?;
            let computed: BTreeSet<String> =
                definition.computed_field_paths.iter().cloned().collect();
            validate_with_schema(
                spec,
                &definition.schema,
                &computed,
                "spec",
                0,
                scope,
                collector,
                diagnostics,
                errors,
            )?;
        }
    }

    Ok(())
}

/// Checks the resource type tag and returns it when a loaded provider
/// supplies it, so the spec walk knows whether a schema is available.
fn validate_resource_type(
    name: &str,
    resource: &Resource,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    errors: &mut Vec<LoadError>,
) -> Result<Option<String>, ValidateError> {
    let Some(type_scalar) = &resource.resource_type else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidResource,
                format!(
                    "validation failed due to a missing type for resource \"{name}\", a type \
                     must be provided"
                ),
            )
            .with_range(element_range),
        );
        return Ok(None);
    };
    let type_range = optional_range(&type_scalar.source_meta).or(element_range);
    let Some(resource_type) = type_scalar.as_str() else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidResource,
                format!(
                    "validation failed due to a type that is not a string being provided for \
                     resource \"{name}\""
                ),
            )
            .with_range(type_range),
        );
        return Ok(None);
    };

    if !scope
        .params
        .resources
        .has_resource_type(&scope.params.cancel, resource_type)?
    {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidResource,
                format!(
                    "validation failed due to the resource type \"{resource_type}\" not being \
                     supported by any of the loaded providers"
                ),
            )
            .with_range(type_range),
        );
        return Ok(None);
    }

    Ok(Some(resource_type.to_string()))
}

fn validate_metadata(
    name: &str,
    resource: &Resource,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    let Some(metadata) = &resource.metadata else {
        return Ok(());
    };

    if let Some(display_name) = &metadata.display_name {
        validate_string_field(
            display_name,
            SubUsage::DisplayName,
            "metadata.displayName",
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }

    for (key, value) in metadata.labels.iter() {
        let label_range = metadata.labels.meta(key).map(SourceMeta::range).or(element_range);
        if has_substitution_token(key) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    format!(
                        "validation failed due to a substitution being used in the label key \
                         \"{key}\" of resource \"{name}\", labels can not contain \
                         substitutions"
                    ),
                )
                .with_range(label_range),
            );
        }
        if has_substitution_token(value) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    format!(
                        "validation failed due to a substitution being used in the value of \
                         label \"{key}\" of resource \"{name}\", labels can not contain \
                         substitutions"
                    ),
                )
                .with_range(label_range),
            );
        }
    }

    for (key, value) in metadata.annotations.iter() {
        if has_substitution_token(key) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    format!(
                        "validation failed due to a substitution being used in the annotation \
                         key \"{key}\" of resource \"{name}\", annotation keys can not \
                         contain substitutions"
                    ),
                )
                .with_range(metadata.annotations.meta(key).map(SourceMeta::range).or(element_range)),
            );
            continue;
        }
        validate_string_field(
            value,
            SubUsage::Annotation,
            &format!("metadata.annotations.{key}"),
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }

    if let Some(custom) = &metadata.custom {
        validate_free_form(custom, "metadata.custom", 0, scope, collector, diagnostics, errors)?;
    }

    Ok(())
}

fn validate_link_selector(
    name: &str,
    resource: &Resource,
    element_range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) {
    let Some(selector) = &resource.link_selector else {
        return;
    };
    for (key, value) in selector.by_label.iter() {
        let range = selector.by_label.meta(key).map(SourceMeta::range).or(element_range);
        if has_substitution_token(key) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    format!(
                        "validation failed due to a substitution being used in the link \
                         selector label key \"{key}\" of resource \"{name}\", link selector \
                         labels can not contain substitutions"
                    ),
                )
                .with_range(range),
            );
        }
        if has_substitution_token(value) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    format!(
                        "validation failed due to a substitution being used in the link \
                         selector label value for key \"{key}\" of resource \"{name}\", link \
                         selector labels can not contain substitutions"
                    ),
                )
                .with_range(range),
            );
        }
    }
}

fn validate_depends_on(
    name: &str,
    resource: &Resource,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    errors: &mut Vec<LoadError>,
) {
    for dependency in &resource.depends_on {
        if has_substitution_token(dependency) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    format!(
                        "validation failed due to a substitution being used in the \
                         \"dependsOn\" list of resource \"{name}\", dependencies must be \
                         static resource names"
                    ),
                )
                .with_range(element_range),
            );
            continue;
        }
        if dependency == name {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    format!("validation failed due to resource \"{name}\" depending on itself"),
                )
                .with_range(element_range),
            );
            continue;
        }
        if !scope.blueprint.resources.contains(dependency) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::MissingResourceDependency,
                    format!(
                        "validation failed due to resource \"{name}\" depending on a missing \
                         resource \"{dependency}\""
                    ),
                )
                .with_range(element_range),
            );
            continue;
        }
        let user = format!("resources.{name}");
        collector.collect(
            &format!("resources.{dependency}"),
            Some(&user),
            &[dependency_tag(&user)],
        );
    }
}

/// Records a `link:` edge to every resource whose labels match this
/// resource's link selector.
fn collect_link_edges(
    name: &str,
    resource: &Resource,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
) {
    let Some(selector) = &resource.link_selector else {
        return;
    };
    let user = format!("resources.{name}");
    for (key, value) in selector.by_label.iter() {
        for (other_name, other) in scope.blueprint.resources.iter() {
            if other_name == name {
                continue;
            }
            let matches = other
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.labels.get(key))
                .is_some_and(|label| label == value);
            if matches {
                collector.collect(
                    &format!("resources.{other_name}"),
                    Some(&user),
                    &[link_tag(&user)],
                );
            }
        }
    }
}

/// Walks the condition tree with an explicit depth counter. Exactly one of
/// `and`, `or`, `not`, and `stringValue` must be populated on any nested
/// node; a top-level condition with no branches is treated the same as an
/// absent one. Leaves must resolve to boolean (or `any`, which warns).
pub(crate) fn validate_condition(
    condition: &Condition,
    depth: usize,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    scope.params.cancel.check()?;
    let range = optional_range(&condition.source_meta);

    let populated = usize::from(condition.and.is_some())
        + usize::from(condition.or.is_some())
        + usize::from(condition.not.is_some())
        + usize::from(condition.string_value.is_some());

    if populated == 0 {
        if depth > 0 {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidResource,
                    "validation failed due to an empty nested condition, a nested condition \
                     must define one of \"and\", \"or\", \"not\" or \"stringValue\"",
                )
                .with_range(range),
            );
        }
        return Ok(());
    }
    if populated > 1 {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidResource,
                "validation failed due to a condition defining more than one of \"and\", \
                 \"or\", \"not\" and \"stringValue\"",
            )
            .with_range(range),
        );
    }

    if let Some(children) = &condition.and {
        validate_composite_children(
            "and",
            children,
            depth,
            range,
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }
    if let Some(children) = &condition.or {
        validate_composite_children(
            "or",
            children,
            depth,
            range,
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }
    if let Some(child) = &condition.not {
        validate_condition(child, depth + 1, scope, collector, diagnostics, errors)?;
    }
    if let Some(leaf) = &condition.string_value {
        validate_string_field(
            leaf,
            SubUsage::Condition,
            "condition",
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn validate_composite_children(
    label: &str,
    children: &[Condition],
    depth: usize,
    range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    if children.is_empty() {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidResource,
                format!(
                    "validation failed due to an empty \"{label}\" condition list, \
                     \"{label}\" must contain at least one condition"
                ),
            )
            .with_range(range),
        );
        return Ok(());
    }
    for child in children {
        validate_condition(child, depth + 1, scope, collector, diagnostics, errors)?;
    }
    Ok(())
}
