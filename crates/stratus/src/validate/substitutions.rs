//! Type-checks substitution expressions against the enclosing blueprint and
//! the provider registries, recording reference-chain edges as it resolves
//! them.

use crate::diagnostics::Diagnostic;
use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::refgraph::{ReferenceChainCollector, sub_ref_prop_tag, sub_ref_tag};
use crate::registry::{ChildExportError, FieldSchema, FunctionDefinition, ResolvedType};
use crate::schema::substitutions::render_path;
use crate::schema::{
    ChildReference, DataSourceReference, ElemRefKind, ElemReference, FunctionCall, PathSegment,
    Resource, ResourceReference, Scalar, StringOrSubstitutions, StringPart, Substitution,
    ValueReference, ValueType, VariableReference,
};
use crate::source::{DiagnosticRange, optional_range};
use crate::validate::{ElementRef, ElementScope};

/// The context a string-with-substitutions field is validated in, which
/// decides the per-context type constraint applied to resolved expressions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum SubUsage {
    Description,
    DisplayName,
    IncludePath,
    Annotation,
    Condition,
    Each,
    ValueContent(ValueType),
    /// A mapping-node field with a schema-derived expected type.
    MappingField(ResolvedType),
    /// Free-form data: no constraint on the resolved type.
    General,
}

impl SubUsage {
    /// The noun used in primitive-only constraint messages, for the usages
    /// that have one.
    fn primitive_noun(&self) -> Option<&'static str> {
        match self {
            SubUsage::Description => Some("description"),
            SubUsage::DisplayName => Some("display name"),
            SubUsage::IncludePath => Some("include path"),
            SubUsage::Annotation => Some("annotation value"),
            _ => None,
        }
    }
}

/// Validates every part of a string-with-substitutions field under `usage`
/// and returns the field's overall resolved type, or `None` when a failure
/// was recorded. Sibling parts are always validated even after a failure.
pub(crate) fn validate_string_field(
    field: &StringOrSubstitutions,
    usage: SubUsage,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<Option<ResolvedType>, ValidateError> {
    scope.params.cancel.check()?;
    let field_range = optional_range(&field.source_meta);

    if field.values.is_empty() {
        if usage == SubUsage::Each {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidSubstitution,
                    format!(
                        "validation failed due to an empty \"each\" substitution in \
                         \"{}\", \"each\" must be a single substitution resolving to an array",
                        scope.element
                    ),
                )
                .with_range(field_range),
            );
            return Ok(None);
        }
        return Ok(Some(ResolvedType::String));
    }

    if usage == SubUsage::Each {
        return validate_each_field(field, property_path, scope, collector, diagnostics, errors);
    }

    if field.is_interpolated() {
        check_interpolation_context(usage, property_path, scope, field_range, errors);
        for part in &field.values {
            if let StringPart::Substitution(sub) = part {
                let part_range = optional_range(&sub.source_meta().copied());
                if let Some(resolved) =
                    validate_substitution(sub, property_path, scope, collector, diagnostics, errors)?
                {
                    if !resolved.is_primitive() && resolved != ResolvedType::Any {
                        errors.push(
                            LoadError::new(
                                ErrorReasonCode::InvalidSubstitution,
                                format!(
                                    "validation failed due to a substitution resolving to type \
                                     \"{resolved}\" being used in string interpolation, only \
                                     primitive values can be interpolated"
                                ),
                            )
                            .with_range(part_range.or(field_range)),
                        );
                    }
                }
            }
        }
        return Ok(Some(ResolvedType::String));
    }

    match &field.values[0] {
        StringPart::Literal(_) => {
            Ok(check_literal_context(usage, property_path, field_range, errors))
        }
        StringPart::Substitution(sub) => {
            let Some(resolved) =
                validate_substitution(sub, property_path, scope, collector, diagnostics, errors)?
            else {
                return Ok(None);
            };
            let range = optional_range(&sub.source_meta().copied()).or(field_range);
            Ok(apply_usage_constraint(
                usage,
                resolved,
                property_path,
                range,
                diagnostics,
                errors,
            ))
        }
    }
}

/// `each` must be a single expression resolving to an array; `any` is
/// accepted with a warning and checked again at deploy time.
fn validate_each_field(
    field: &StringOrSubstitutions,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<Option<ResolvedType>, ValidateError> {
    let field_range = optional_range(&field.source_meta);
    let Some(sub) = field.single_substitution() else {
        let shape = if field.is_interpolated() {
            "an interpolated string"
        } else {
            "a string literal"
        };
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to \"each\" being provided as {shape} in \"{}\", \
                     \"each\" must be a single substitution resolving to an array",
                    scope.element
                ),
            )
            .with_range(field_range),
        );
        return Ok(None);
    };

    let Some(resolved) =
        validate_substitution(sub, property_path, scope, collector, diagnostics, errors)?
    else {
        return Ok(None);
    };
    let range = optional_range(&sub.source_meta().copied()).or(field_range);
    match resolved {
        ResolvedType::Array => Ok(Some(ResolvedType::Array)),
        ResolvedType::Any => {
            diagnostics.push(Diagnostic::warning(
                format!(
                    "An \"each\" substitution in \"{}\" resolves to type \"any\" at runtime, \
                     the value will be checked for an array during deployment.",
                    scope.element
                ),
                range,
            ));
            Ok(Some(ResolvedType::Any))
        }
        other => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidSubstitution,
                    format!(
                        "validation failed due to an \"each\" substitution in \"{}\" resolving \
                         to type \"{other}\", \"each\" must resolve to an array",
                        scope.element
                    ),
                )
                .with_range(range),
            );
            Ok(None)
        }
    }
}

/// Interpolation always produces a string, so contexts expecting any other
/// concrete type reject interpolated fields up front.
fn check_interpolation_context(
    usage: SubUsage,
    property_path: &str,
    scope: &ElementScope<'_>,
    range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) {
    match usage {
        SubUsage::ValueContent(declared) if declared != ValueType::String => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidValueType,
                    format!(
                        "validation failed due to string interpolation being used in the \
                         content of \"{}\" declared as \"{declared}\", interpolation is only \
                         supported for string values",
                        scope.element
                    ),
                )
                .with_range(range),
            );
        }
        SubUsage::MappingField(expected)
            if !matches!(expected, ResolvedType::String | ResolvedType::Any) =>
        {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidMappingNode,
                    format!(
                        "validation failed due to string interpolation being used at \
                         \"{property_path}\" where a value of type \"{expected}\" is expected"
                    ),
                )
                .with_range(range),
            );
        }
        SubUsage::Condition => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidSubstitution,
                    "validation failed due to string interpolation being used in a condition, \
                     conditions must resolve to boolean values",
                )
                .with_range(range),
            );
        }
        _ => {}
    }
}

/// A pure literal resolves to a string; contexts expecting something else
/// reject it here.
fn check_literal_context(
    usage: SubUsage,
    property_path: &str,
    range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) -> Option<ResolvedType> {
    match usage {
        SubUsage::Condition => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidSubstitution,
                    "validation failed due to a string literal being used in a condition, \
                     conditions must resolve to boolean values",
                )
                .with_range(range),
            );
            None
        }
        SubUsage::ValueContent(declared) if declared != ValueType::String => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidValueType,
                    format!(
                        "validation failed due to a string literal being used as the content \
                         of a value declared as \"{declared}\""
                    ),
                )
                .with_range(range),
            );
            None
        }
        SubUsage::MappingField(expected)
            if !matches!(expected, ResolvedType::String | ResolvedType::Any) =>
        {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidMappingNode,
                    format!(
                        "validation failed due to an unexpected value type at \
                         \"{property_path}\", expected \"{expected}\" but found \"string\""
                    ),
                )
                .with_range(range),
            );
            None
        }
        _ => Some(ResolvedType::String),
    }
}

fn apply_usage_constraint(
    usage: SubUsage,
    resolved: ResolvedType,
    property_path: &str,
    range: Option<DiagnosticRange>,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Option<ResolvedType> {
    if let Some(noun) = usage.primitive_noun() {
        return if resolved.is_primitive() {
            Some(resolved)
        } else if resolved == ResolvedType::Any {
            diagnostics.push(Diagnostic::warning(
                format!(
                    "A substitution in a {noun} resolves to type \"any\" at runtime, the \
                     value will be checked for a primitive during deployment."
                ),
                range,
            ));
            Some(ResolvedType::Any)
        } else {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidSubstitution,
                    format!(
                        "validation failed due to a substitution resolving to type \
                         \"{resolved}\" being used in a {noun}, a {noun} may only contain \
                         primitive values"
                    ),
                )
                .with_range(range),
            );
            None
        };
    }

    match usage {
        SubUsage::Condition => match resolved {
            ResolvedType::Boolean => Some(resolved),
            ResolvedType::Any => {
                diagnostics.push(Diagnostic::warning(
                    "A condition substitution resolves to type \"any\" at runtime, the value \
                     will be checked for a boolean during deployment.",
                    range,
                ));
                Some(ResolvedType::Any)
            }
            other => {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidSubstitution,
                        format!(
                            "validation failed due to a condition substitution resolving to \
                             type \"{other}\", conditions must resolve to boolean values"
                        ),
                    )
                    .with_range(range),
                );
                None
            }
        },
        SubUsage::ValueContent(declared) => {
            let expected: ResolvedType = declared.into();
            if resolved == expected || resolved == ResolvedType::Any {
                Some(resolved)
            } else {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidValueType,
                        format!(
                            "validation failed due to a substitution resolving to type \
                             \"{resolved}\" being used in the content of a value declared as \
                             \"{declared}\""
                        ),
                    )
                    .with_range(range),
                );
                None
            }
        }
        SubUsage::MappingField(expected) => {
            let compatible = expected == ResolvedType::Any
                || resolved == ResolvedType::Any
                || resolved == expected
                || (expected == ResolvedType::Float && resolved == ResolvedType::Integer);
            if compatible {
                Some(resolved)
            } else {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidMappingNode,
                        format!(
                            "validation failed due to a substitution at \"{property_path}\" \
                             resolving to type \"{resolved}\", expected \"{expected}\""
                        ),
                    )
                    .with_range(range),
                );
                None
            }
        }
        // General and the usages handled above.
        _ => Some(resolved),
    }
}

/// Type-infers a single substitution expression, recording reference-chain
/// edges for every element it resolves. Returns `None` when a failure was
/// recorded in `errors`.
pub(crate) fn validate_substitution(
    sub: &Substitution,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<Option<ResolvedType>, ValidateError> {
    scope.params.cancel.check()?;
    match sub {
        Substitution::Literal(scalar) => Ok(Some(scalar.kind().into())),
        Substitution::Variable(reference) => {
            Ok(resolve_variable(reference, property_path, scope, collector, errors))
        }
        Substitution::Value(reference) => {
            Ok(resolve_value(reference, property_path, scope, collector, errors))
        }
        Substitution::Resource(reference) => {
            resolve_resource(reference, property_path, scope, collector, errors)
        }
        Substitution::DataSource(reference) => {
            Ok(resolve_data_source(reference, property_path, scope, collector, errors))
        }
        Substitution::Child(reference) => {
            resolve_child(reference, property_path, scope, collector, errors)
        }
        Substitution::ElemRef(reference) => Ok(resolve_elem_ref(reference, scope, errors)),
        Substitution::Function(call) => {
            validate_function(call, property_path, scope, collector, diagnostics, errors)
        }
    }
}

/// Records an edge from the current element to `element_name`. Exports are
/// not reference-graph nodes, so references resolved while validating an
/// export field are not recorded.
fn record_reference(
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    element_name: &str,
    property_path: &str,
) {
    if matches!(scope.element, ElementRef::Export(_)) {
        return;
    }
    let user = scope.element.element_id();
    let tag = if property_path.is_empty() {
        sub_ref_tag(&user)
    } else {
        sub_ref_prop_tag(&user, property_path)
    };
    collector.collect(element_name, Some(&user), &[tag]);
}

fn resolve_variable(
    reference: &VariableReference,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    errors: &mut Vec<LoadError>,
) -> Option<ResolvedType> {
    let range = optional_range(&reference.source_meta);
    let Some(variable) = scope.blueprint.variables.get(&reference.name) else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to a missing variable \"{}\", the \
                     variable is not defined in the blueprint",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return None;
    };

    record_reference(
        scope,
        collector,
        &format!("variables.{}", reference.name),
        property_path,
    );
    Some((&variable.var_type).into())
}

fn resolve_value(
    reference: &ValueReference,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    errors: &mut Vec<LoadError>,
) -> Option<ResolvedType> {
    let range = optional_range(&reference.source_meta);
    if scope.element == ElementRef::Value(&reference.name) {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to value \"{}\" referencing itself",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return None;
    }
    let Some(value) = scope.blueprint.values.get(&reference.name) else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to a missing value \"{}\", the \
                     value is not defined in the blueprint",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return None;
    };

    record_reference(
        scope,
        collector,
        &format!("values.{}", reference.name),
        property_path,
    );

    // Value content is free-form, so a path into it cannot be narrowed
    // beyond `any`; a bare reference resolves to the declared type.
    if !reference.path.is_empty() {
        return Some(ResolvedType::Any);
    }
    Some(
        value
            .value_type
            .map(ResolvedType::from)
            .unwrap_or(ResolvedType::Any),
    )
}

fn resolve_resource(
    reference: &ResourceReference,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    errors: &mut Vec<LoadError>,
) -> Result<Option<ResolvedType>, ValidateError> {
    let range = optional_range(&reference.source_meta);
    if scope.element == ElementRef::Resource(&reference.name) {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to resource \"{}\" referencing itself",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return Ok(None);
    }
    let Some(resource) = scope.blueprint.resources.get(&reference.name) else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to a missing resource \"{}\", the \
                     resource is not defined in the blueprint",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return Ok(None);
    };

    if reference.template_index.is_some() && !resource.is_template() {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to an index being used to reference resource \
                     \"{}\" which does not declare \"each\", only resource templates can be \
                     indexed",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return Ok(None);
    }

    record_reference(
        scope,
        collector,
        &format!("resources.{}", reference.name),
        property_path,
    );

    resolve_resource_property(reference, resource, scope, range, errors)
}

/// Navigates a resource reference's property path. A bare reference stands
/// for the whole resource state and resolves to `any`.
fn resolve_resource_property(
    reference: &ResourceReference,
    resource: &Resource,
    scope: &ElementScope<'_>,
    range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) -> Result<Option<ResolvedType>, ValidateError> {
    let path = reference.path.as_slice();
    let Some((first, rest)) = path.split_first() else {
        return Ok(Some(ResolvedType::Any));
    };

    let unknown_property = |errors: &mut Vec<LoadError>| {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to an unknown property \"{}\" of \
                     resource \"{}\"",
                    render_path(path),
                    reference.name
                ),
            )
            .with_range(range),
        );
        None
    };

    match first {
        PathSegment::Field(name) if name == "spec" => {
            let Some(resource_type) = resource
                .resource_type
                .as_ref()
                .and_then(|scalar| scalar.as_str())
            else {
                // The resource validator reports the missing type.
                return Ok(Some(ResolvedType::Any));
            };
            let cancel = &scope.params.cancel;
            if !scope.params.resources.has_resource_type(cancel, resource_type)? {
                return Ok(Some(ResolvedType::Any));
            }
            let definition = scope.params.resources.spec_definition(cancel, resource_type)?;
            match navigate_field_schema(&definition.schema, rest) {
                Some(resolved) => Ok(Some(resolved)),
                None => Ok(unknown_property(errors)),
            }
        }
        PathSegment::Field(name) if name == "metadata" => {
            Ok(resolve_metadata_path(reference, resource, rest, range, errors)
                .or_else(|| unknown_property(errors)))
        }
        _ => Ok(unknown_property(errors)),
    }
}

/// Metadata paths validate against a fixed set: `displayName` (primitive,
/// no children), `labels.<key>` / `annotations.<key>` (key present), and
/// free-form `custom.*`.
fn resolve_metadata_path(
    reference: &ResourceReference,
    resource: &Resource,
    rest: &[PathSegment],
    range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) -> Option<ResolvedType> {
    let Some((section, tail)) = rest.split_first() else {
        return Some(ResolvedType::Object);
    };
    let metadata = resource.metadata.as_ref();

    match section {
        PathSegment::Field(name) if name == "displayName" && tail.is_empty() => {
            Some(ResolvedType::String)
        }
        PathSegment::Field(name) if name == "labels" => match tail {
            [PathSegment::Field(key)] => {
                if metadata.is_some_and(|meta| meta.labels.contains(key)) {
                    Some(ResolvedType::String)
                } else {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidSubstitution,
                            format!(
                                "validation failed due to a reference to a missing label \
                                 \"{key}\" of resource \"{}\"",
                                reference.name
                            ),
                        )
                        .with_range(range),
                    );
                    // Reported precisely above; suppress the generic error.
                    Some(ResolvedType::String)
                }
            }
            _ => None,
        },
        PathSegment::Field(name) if name == "annotations" => match tail {
            [PathSegment::Field(key)] => {
                if metadata.is_some_and(|meta| meta.annotations.contains(key)) {
                    Some(ResolvedType::String)
                } else {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidSubstitution,
                            format!(
                                "validation failed due to a reference to a missing annotation \
                                 \"{key}\" of resource \"{}\"",
                                reference.name
                            ),
                        )
                        .with_range(range),
                    );
                    Some(ResolvedType::String)
                }
            }
            _ => None,
        },
        PathSegment::Field(name) if name == "custom" => Some(ResolvedType::Any),
        _ => None,
    }
}

/// Walks a provider field schema along a property path. `None` means the
/// path does not exist in the schema.
fn navigate_field_schema(schema: &FieldSchema, segments: &[PathSegment]) -> Option<ResolvedType> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(schema.resolved_type());
    };
    match (schema, first) {
        (FieldSchema::Object(attrs), PathSegment::Field(name)) => {
            attrs.get(name).and_then(|field| navigate_field_schema(field, rest))
        }
        (FieldSchema::Map(value), PathSegment::Field(_)) => navigate_field_schema(value, rest),
        (FieldSchema::Array(item), PathSegment::Index(_)) => navigate_field_schema(item, rest),
        (FieldSchema::Union(members), _) => {
            let mut resolved: Option<ResolvedType> = None;
            for member in members {
                if let Some(member_type) = navigate_field_schema(member, segments) {
                    match resolved {
                        Some(existing) if existing != member_type => {
                            return Some(ResolvedType::Any);
                        }
                        _ => resolved = Some(member_type),
                    }
                }
            }
            resolved
        }
        _ => None,
    }
}

fn resolve_data_source(
    reference: &DataSourceReference,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    errors: &mut Vec<LoadError>,
) -> Option<ResolvedType> {
    let range = optional_range(&reference.source_meta);
    if scope.element == ElementRef::DataSource(&reference.name) {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to data source \"{}\" referencing itself",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return None;
    }
    let Some(data_source) = scope.blueprint.data_sources.get(&reference.name) else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to a missing data source \"{}\", \
                     the data source is not defined in the blueprint",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return None;
    };

    let Some(export) = data_source.exports.get(&reference.field) else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to an unknown exported field \
                     \"{}\" of data source \"{}\"",
                    reference.field, reference.name
                ),
            )
            .with_range(range),
        );
        return None;
    };

    record_reference(
        scope,
        collector,
        &format!("datasources.{}", reference.name),
        property_path,
    );

    // A missing or invalid export type is reported by the data source
    // validator; the reference resolves to `any` in the meantime.
    let Some(field_type) = export
        .export_type
        .as_ref()
        .and_then(|scalar| scalar.as_str())
        .and_then(crate::schema::DataSourceFieldType::parse)
    else {
        return Some(ResolvedType::Any);
    };

    if reference.element_index.is_some() {
        if field_type != crate::schema::DataSourceFieldType::Array {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidSubstitution,
                    format!(
                        "validation failed due to an index being used with exported field \
                         \"{}\" of data source \"{}\" which is not an array",
                        reference.field, reference.name
                    ),
                )
                .with_range(range),
            );
            return None;
        }
        // Array element types are not declared by data source fields.
        return Some(ResolvedType::Any);
    }

    Some(field_type.into())
}

fn resolve_child(
    reference: &ChildReference,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    errors: &mut Vec<LoadError>,
) -> Result<Option<ResolvedType>, ValidateError> {
    let range = optional_range(&reference.source_meta);
    if scope.element == ElementRef::Child(&reference.name) {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to include \"{}\" referencing itself",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return Ok(None);
    }
    if !scope.blueprint.includes.contains(&reference.name) {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to a missing child blueprint \
                     \"{}\", the include is not defined in the blueprint",
                    reference.name
                ),
            )
            .with_range(range),
        );
        return Ok(None);
    }

    record_reference(
        scope,
        collector,
        &format!("children.{}", reference.name),
        property_path,
    );

    let Some(resolver) = scope.params.child_exports else {
        // Child blueprints are not parsed during this pass.
        return Ok(Some(ResolvedType::Any));
    };
    match resolver.resolve_export(&scope.params.cancel, &reference.name, &reference.export) {
        Ok(Some(info)) => Ok(Some(info.export_type.into())),
        Ok(None) => Ok(Some(ResolvedType::Any)),
        Err(ChildExportError::ExportMissing { child, export }) => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidSubstitution,
                    format!(
                        "validation failed due to a reference to export \"{export}\" which is \
                         missing in child blueprint \"{child}\""
                    ),
                )
                .with_range(range),
            );
            Ok(None)
        }
        Err(ChildExportError::Registry(err)) => Err(err.into()),
    }
}

fn resolve_elem_ref(
    reference: &ElemReference,
    scope: &ElementScope<'_>,
    errors: &mut Vec<LoadError>,
) -> Option<ResolvedType> {
    let range = optional_range(&reference.source_meta);
    let ElementRef::Resource(resource_name) = scope.element else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                "validation failed due to an element reference being used outside of a \
                 resource, element references can only be used within a resource that \
                 declares \"each\"",
            )
            .with_range(range),
        );
        return None;
    };
    let declares_each = scope
        .blueprint
        .resources
        .get(resource_name)
        .is_some_and(Resource::is_template);
    if !declares_each {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to an element reference being used in resource \
                     \"{resource_name}\" which does not declare \"each\""
                ),
            )
            .with_range(range),
        );
        return None;
    }
    match reference.kind {
        ElemRefKind::Index => Some(ResolvedType::Integer),
        ElemRefKind::Value => Some(ResolvedType::Any),
    }
}

fn validate_function(
    call: &FunctionCall,
    property_path: &str,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<Option<ResolvedType>, ValidateError> {
    let cancel = &scope.params.cancel;
    let range = optional_range(&call.source_meta);

    if !scope.params.functions.has_function(cancel, &call.name)? {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to a reference to an unknown function \"{}\", the \
                     function is not provided by any of the loaded providers",
                    call.name
                ),
            )
            .with_range(range),
        );
        return Ok(None);
    }
    let definition = scope.params.functions.definition(cancel, &call.name)?;

    // Argument expressions are validated regardless of signature problems
    // so every failure surfaces in one pass.
    let mut positional: Vec<(&crate::schema::FunctionArg, Option<ResolvedType>)> = Vec::new();
    let mut has_named = false;
    for arg in &call.args {
        let resolved =
            validate_substitution(&arg.value, property_path, scope, collector, diagnostics, errors)?;
        if arg.name.is_some() {
            has_named = true;
        } else {
            positional.push((arg, resolved));
        }
    }

    if has_named && !definition.allows_named_args {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidSubstitution,
                format!(
                    "validation failed due to named arguments being provided in a call to \
                     function \"{}\", named arguments are only supported by the \"object\" \
                     function",
                    call.name
                ),
            )
            .with_range(range),
        );
    } else if !definition.allows_named_args {
        check_arity(call, &definition, positional.len(), range, errors);
        check_positional_args(call, &definition, &positional, errors);
    }

    if call.name == "link" {
        check_link_args(call, scope, errors);
    }

    Ok(Some(definition.return_type))
}

fn check_arity(
    call: &FunctionCall,
    definition: &FunctionDefinition,
    given: usize,
    range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) {
    let total = definition.parameters.len();
    let required = definition
        .parameters
        .iter()
        .filter(|param| !param.optional)
        .count();
    if given >= required && given <= total {
        return;
    }
    let expected = if required == total {
        format!("{total}")
    } else {
        format!("between {required} and {total}")
    };
    errors.push(
        LoadError::new(
            ErrorReasonCode::InvalidSubstitution,
            format!(
                "validation failed due to an invalid number of arguments being provided for \
                 function \"{}\", expected {expected} but received {given}",
                call.name
            ),
        )
        .with_range(range),
    );
}

fn check_positional_args(
    call: &FunctionCall,
    definition: &FunctionDefinition,
    positional: &[(&crate::schema::FunctionArg, Option<ResolvedType>)],
    errors: &mut Vec<LoadError>,
) {
    for (index, ((arg, resolved), param)) in positional
        .iter()
        .zip(definition.parameters.iter())
        .enumerate()
    {
        let arg_range = optional_range(&arg.value.source_meta().copied());
        if let Some(resolved) = resolved {
            let compatible = param.param_type == ResolvedType::Any
                || *resolved == ResolvedType::Any
                || *resolved == param.param_type;
            if !compatible {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidSubstitution,
                        format!(
                            "validation failed due to an argument type mismatch in a call to \
                             function \"{}\", argument {index} must resolve to type \"{}\" \
                             but resolves to \"{resolved}\"",
                            call.name, param.param_type
                        ),
                    )
                    .with_range(arg_range),
                );
                continue;
            }
        }

        if !param.string_choices.is_empty() {
            if let Substitution::Literal(scalar) = &arg.value {
                if let Some(choice) = scalar.as_str() {
                    if !param.string_choices.iter().any(|allowed| allowed == choice) {
                        errors.push(
                            LoadError::new(
                                ErrorReasonCode::InvalidSubstitution,
                                format!(
                                    "validation failed due to an invalid string choice \
                                     \"{choice}\" being provided for argument {index} of \
                                     function \"{}\", must be one of: {}",
                                    call.name,
                                    param.string_choices.join(", ")
                                ),
                            )
                            .with_range(arg_range),
                        );
                    }
                }
            }
        }
    }
}

/// Both arguments of the built-in `link` function must name resources that
/// exist in the blueprint.
fn check_link_args(call: &FunctionCall, scope: &ElementScope<'_>, errors: &mut Vec<LoadError>) {
    for arg in call.args.iter().filter(|arg| arg.name.is_none()) {
        let arg_range = optional_range(&arg.value.source_meta().copied());
        let resource_name = match &arg.value {
            Substitution::Resource(reference) => Some(reference.name.as_str()),
            Substitution::Literal(scalar) => match &scalar.value {
                Scalar::Str(name) => Some(name.as_str()),
                _ => None,
            },
            _ => None,
        };
        match resource_name {
            Some(name) => {
                if !scope.blueprint.resources.contains(name) {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::SubFuncLinkArgResourceNotFound,
                            format!(
                                "validation failed due to resource \"{name}\" in a call to \
                                 \"link\" not existing in the blueprint"
                            ),
                        )
                        .with_range(arg_range),
                    );
                }
            }
            None => {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidSubstitution,
                        "validation failed due to an invalid argument being provided in a \
                         call to \"link\", arguments must be resource references or resource \
                         names",
                    )
                    .with_range(arg_range),
                );
            }
        }
    }
}
